// Path-based user equilibrium: shortest paths found each iteration become columns, and flow is
// then moved between the columns of each OD pair towards the cheapest one.
use ndarray::prelude::*;
use rayon::prelude::*;

use super::single_source_shortest_path;
use super::Assignment;
use super::AssignmentError;
use super::ColumnKey;
use super::ColumnVec;
use super::Link;
use super::ShortestPathTree;
use super::EPSILON;
use super::MIN_OD_VOL;


/// Convergence of the column update passes, one entry per completed pass.
#[derive(Clone, Debug, PartialEq)]
pub struct ColumnGenerationReport {
    pub total_gaps: Array1<f64>,
    pub relative_gaps: Array1<f64>,
}

impl ColumnGenerationReport {
    pub fn final_relative_gap(&self) -> Option<f64> {
        return self.relative_gaps.iter().last().cloned();
    }
}

pub(crate) fn check_iterations(name: &str, value: i64) -> Result<usize, AssignmentError> {
    if value < 0 {
        return Err(AssignmentError::NegativeIterations{name: name.to_string(), value});
    }
    return Ok(value as usize);
}

/// Runs `column_gen_num` iterations that add shortest paths to the column pool, then
/// `column_update_num` passes that only move flow between existing columns.  With a
/// `rel_gap_tolerance`, the update passes stop once the relative gap drops below it.
///
/// Generation starts each OD pair that isn't route-fixed over: its existing columns are kept
/// but emptied, so the pool never carries more than the OD volume.  With no generation
/// iterations, the existing column volumes are rebalanced as they are.
///
/// On return, link flows and travel times match the final column volumes.
pub fn find_ue(assignment: &mut Assignment, column_gen_num: i64, column_update_num: i64,
               rel_gap_tolerance: Option<f64>)
               -> Result<ColumnGenerationReport, AssignmentError> {
    let column_gen_num = check_iterations("column_gen_num", column_gen_num)?;
    let column_update_num = check_iterations("column_update_num", column_update_num)?;
    if let Some(tol) = rel_gap_tolerance {
        if !(tol >= 0.) {
            return Err(AssignmentError::InvalidSettings(
                format!("rel_gap_tolerance must be non-negative, but got {}", tol)));
        }
    }

    assignment.setup_spnetworks();
    log::info!("find user equilibrium with column generation: {} generation and {} update \
                iterations", column_gen_num, column_update_num);

    if column_gen_num > 0 {
        clear_column_volumes(assignment);
    }
    for ii in 0..column_gen_num {
        if ii > 0 {
            update_link_and_column_volume(assignment, ii, true);
        }
        assignment.update_link_travel_times();
        assignment.update_spnetwork_costs();
        generate_columns(assignment, ii);
        log::info!("column generation iteration {}: {} columns", ii,
                   assignment.column_pool.num_columns());
    }

    let mut total_gaps = vec![];
    let mut relative_gaps = vec![];
    for jj in 0..column_update_num {
        update_link_and_column_volume(assignment, jj, false);
        assignment.update_link_travel_times();
        let (total_gap, total_sys_cost) = update_column_gradient_cost_and_flow(assignment, jj);
        let rel_gap = total_gap / total_sys_cost.max(EPSILON);
        log::info!("column update iteration {}: total gap {:.4}, relative gap {:.6}", jj,
                   total_gap, rel_gap);
        total_gaps.push(total_gap);
        relative_gaps.push(rel_gap);
        if let Some(tol) = rel_gap_tolerance {
            if rel_gap < tol {
                log::info!("relative gap is below {}, stopping early", tol);
                break;
            }
        }
    }

    // bring links and columns in line with the final volumes
    update_link_and_column_volume(assignment, column_update_num, false);
    assignment.update_link_travel_times();
    assignment.update_spnetwork_costs();
    update_column_attributes(assignment);

    return Ok(ColumnGenerationReport {
        total_gaps: Array1::from(total_gaps),
        relative_gaps: Array1::from(relative_gaps),
    });
}

/// Sets every link's flow to the PCE-weighted sum of the volumes of the columns using it.
///
/// If `self_reducing` is set and `iter_num` > 0, each column not in a route-fixed OD pair then
/// keeps only iter_num / (iter_num + 1) of its volume, making room for the volume the next
/// round of column generation adds.  The loaded link flows are from before the reduction.
pub fn update_link_and_column_volume(assignment: &mut Assignment, iter_num: usize,
                                     self_reducing: bool) {
    let num_periods = assignment.network.num_periods();
    let links = assignment.network.links_mut();
    for link in links.iter_mut() {
        for tau in 0..num_periods {
            link.flow_vol[tau] = 0.;
        }
    }

    let reduction = iter_num as f64 / (iter_num + 1) as f64;
    for (key, cv) in assignment.column_pool.iter_mut() {
        let pce = assignment.agent_types[key.agent_type].pce;
        let tau = key.demand_period;
        let reduce = self_reducing && iter_num > 0 && !cv.is_route_fixed();
        for column in cv.columns_mut().iter_mut() {
            let volume = column.volume();
            for link_no in column.links() {
                links[*link_no].flow_vol[tau] += volume * pce;
            }
            if reduce {
                column.set_volume(volume * reduction);
            }
        }
    }
}

/// Zeroes the column volumes of every OD pair that isn't route-fixed.
fn clear_column_volumes(assignment: &mut Assignment) {
    for (_, cv) in assignment.column_pool.iter_mut() {
        if cv.is_route_fixed() {
            continue;
        }
        for column in cv.columns_mut().iter_mut() {
            column.set_volume(0.);
        }
    }
}

fn generate_columns(assignment: &mut Assignment, iter_num: usize) {
    let network = &assignment.network;
    let graph = &assignment.graph;
    let sp_algorithm = assignment.sp_algorithm;
    let pool = &mut assignment.column_pool;
    let zones = network.zones();

    for spn in &assignment.spnetworks {
        let trees: Vec<(usize, ShortestPathTree)> = spn.orig_zones().par_iter().map(|oz| {
            let tree = single_source_shortest_path(graph, spn.link_costs(), zones[*oz].centroid,
                                                   sp_algorithm);
            return (*oz, tree);
        }).collect();

        for (orig_zone, tree) in &trees {
            for dest_zone in spn.dest_zones(*orig_zone) {
                let key = ColumnKey::new(spn.agent_type(), spn.demand_period(), *orig_zone,
                                         *dest_zone);
                let od_vol = match pool.get(&key) {
                    Some(cv) if !cv.is_route_fixed() => cv.od_volume(),
                    _ => continue,
                };
                if od_vol <= MIN_OD_VOL {
                    continue;
                }
                let volume = od_vol / (iter_num + 1) as f64;
                let dest_node = zones[*dest_zone].centroid;
                if !pool.add_path_from_tree(key, tree, dest_node, volume, network) {
                    log::debug!("no path from zone {} to zone {}", zones[*orig_zone].id,
                                zones[*dest_zone].id);
                }
            }
        }
    }
}

fn path_cost(path_links: &Vec<usize>, links: &Vec<Link>, tau: usize, vot: f64) -> f64 {
    return path_links.iter().map(|ll| links[*ll].generalized_cost(tau, vot)).sum();
}

/// Returns the total gap and total system cost over all OD pairs that aren't route-fixed.
fn update_column_gradient_cost_and_flow(assignment: &mut Assignment, iter_num: usize)
                                        -> (f64, f64) {
    let links = assignment.network.links();
    let mut total_gap = 0.;
    let mut total_sys_cost = 0.;
    for (key, cv) in assignment.column_pool.iter_mut() {
        if cv.is_route_fixed() || cv.od_volume() <= MIN_OD_VOL {
            continue;
        }
        let vot = assignment.agent_types[key.agent_type].vot;
        let (gap, sys_cost) = rebalance_column_vec(cv, links, key.demand_period, vot, iter_num);
        total_gap += gap;
        total_sys_cost += sys_cost;
    }
    return (total_gap, total_sys_cost);
}

/// Moves volume from every column of `cv` to its least-cost column, in proportion to how much
/// more each costs.  The step shrinks as od_volume / (iter_num + 2), and a column never gives
/// up more volume than it has.  Returns this OD pair's gap and system cost.
fn rebalance_column_vec(cv: &mut ColumnVec, links: &Vec<Link>, tau: usize, vot: f64,
                        iter_num: usize) -> (f64, f64) {
    let mut sys_cost = 0.;
    let mut least_cost = f64::MAX;
    let mut least_idx = 0;
    for (idx, column) in cv.columns_mut().iter_mut().enumerate() {
        let cost = path_cost(column.links(), links, tau, vot);
        column.set_gradient_cost(cost);
        sys_cost += cost * column.volume();
        if cost < least_cost {
            least_cost = cost;
            least_idx = idx;
        }
    }
    if cv.num_columns() < 2 {
        return (0., sys_cost);
    }

    let step_size = cv.od_volume() / (iter_num + 2) as f64;
    let mut gap = 0.;
    let mut total_switched = 0.;
    for (idx, column) in cv.columns_mut().iter_mut().enumerate() {
        if idx == least_idx {
            column.set_gradient_diffs(0., 0.);
            continue;
        }
        let abs_diff = column.gradient_cost() - least_cost;
        let rel_diff = abs_diff / least_cost.max(EPSILON);
        column.set_gradient_diffs(abs_diff, rel_diff);
        gap += abs_diff * column.volume();
        let switched = (step_size * rel_diff).min(column.volume());
        column.set_volume(column.volume() - switched);
        total_switched += switched;
    }
    let least = &mut cv.columns_mut()[least_idx];
    least.set_volume(least.volume() + total_switched);
    return (gap, sys_cost);
}

fn update_column_attributes(assignment: &mut Assignment) {
    let network = &assignment.network;
    for (key, cv) in assignment.column_pool.iter_mut() {
        let vot = assignment.agent_types[key.agent_type].vot;
        let tau = key.demand_period;
        for column in cv.columns_mut().iter_mut() {
            column.refresh_attributes(network, tau);
            let cost = path_cost(column.links(), network.links(), tau, vot);
            column.set_gradient_cost(cost);
        }
    }
}
