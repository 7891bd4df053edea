// Link-based user equilibrium by Frank-Wolfe: all-or-nothing loads from each iteration's
// shortest paths are blended into the current flows by a bisection line search.
use ndarray::prelude::*;
use rayon::prelude::*;

use super::colgen::check_iterations;
use super::cost_model;
use super::single_source_shortest_path;
use super::Assignment;
use super::AssignmentError;
use super::ColumnKey;
use super::Link;
use super::ShortestPathTree;
use super::EPSILON;
use super::MIN_OD_VOL;


const MAX_BISECTION_STEPS: usize = 50;


#[derive(Clone, Debug, PartialEq)]
pub struct FrankWolfeOptions {
    pub max_iter_num: i64,
    /// with this off every iteration takes the full all-or-nothing step
    pub line_search: bool,
    /// stop once the relative gap of every period is below this
    pub rel_gap_tolerance: Option<f64>,
    /// bracket width and derivative magnitude at which bisection stops
    pub tolerance: f64,
}

impl Default for FrankWolfeOptions {
    fn default() -> FrankWolfeOptions {
        return FrankWolfeOptions {
            max_iter_num: 40,
            line_search: true,
            rel_gap_tolerance: None,
            tolerance: 1e-6,
        };
    }
}


#[derive(Clone, Debug, PartialEq)]
pub struct FrankWolfeReport {
    /// one row per iteration, one column per demand period
    pub relative_gaps: Array2<f64>,
    /// the step taken in each iteration and period
    pub step_sizes: Array2<f64>,
}

impl FrankWolfeReport {
    pub fn num_iterations(&self) -> usize {
        return self.relative_gaps.nrows();
    }

    /// The largest relative gap over all periods in the last iteration.
    pub fn final_relative_gap(&self) -> Option<f64> {
        let last = self.relative_gaps.nrows().checked_sub(1)?;
        return Some(self.relative_gaps.row(last).fold(0., |max, gap| f64::max(max, *gap)));
    }
}


/// Runs Frank-Wolfe from empty links.  Link flows, auxiliary flows and travel times are left
/// at the final iterate; the column pool gets no paths.
pub fn find_ue_fw(assignment: &mut Assignment, options: &FrankWolfeOptions)
                  -> Result<FrankWolfeReport, AssignmentError> {
    let max_iter_num = check_iterations("max_iter_num", options.max_iter_num)?;
    if !(options.tolerance > 0.) {
        return Err(AssignmentError::InvalidSettings(
            format!("line search tolerance must be positive, but got {}", options.tolerance)));
    }

    assignment.setup_spnetworks();
    let num_links = assignment.network.num_links();
    let num_periods = assignment.network.num_periods();
    let num_spns = assignment.spnetworks.len();
    log::info!("find user equilibrium with Frank-Wolfe: {} iterations over {} sub-networks",
               max_iter_num, num_spns);

    for link in assignment.network.links_mut().iter_mut() {
        for tau in 0..num_periods {
            link.flow_vol[tau] = 0.;
            link.aux_flow[tau] = 0.;
        }
    }
    assignment.update_link_travel_times();

    let mut flows: Vec<Array1<f64>> = vec![Array1::zeros(num_links); num_spns];
    let mut aux_flows: Vec<Array1<f64>> = vec![Array1::zeros(num_links); num_spns];
    let total_demand = assignment.total_demand();
    let mut relative_gaps = Array2::<f64>::zeros((max_iter_num, num_periods));
    let mut step_sizes = Array2::<f64>::zeros((max_iter_num, num_periods));
    let mut num_iterations = 0;

    for ii in 0..max_iter_num {
        assignment.update_spnetwork_costs();
        let min_sys_costs = all_or_nothing(assignment, &mut aux_flows);

        for tau in 0..num_periods {
            let mut cur_sys_cost = 0.;
            for (ss, spn) in assignment.spnetworks.iter().enumerate() {
                if spn.demand_period() == tau {
                    cur_sys_cost += spn.link_costs().dot(&flows[ss]);
                }
            }
            relative_gaps[[ii, tau]] = if cur_sys_cost <= EPSILON {
                if total_demand[tau] > MIN_OD_VOL { 1. } else { 0. }
            } else {
                (cur_sys_cost - min_sys_costs[tau]) / cur_sys_cost.max(EPSILON)
            };

            let step = if ii == 0 || !options.line_search {
                1.
            } else {
                let (agg_flows, agg_aux) = aggregate_flows(assignment, &flows, &aux_flows, tau);
                let toll_term = toll_derivative(assignment, &flows, &aux_flows, tau);
                line_search(assignment.network.links(), &agg_flows, &agg_aux, toll_term,
                            options.tolerance)
            };
            step_sizes[[ii, tau]] = step;
            for (ss, spn) in assignment.spnetworks.iter().enumerate() {
                if spn.demand_period() == tau {
                    let direction = &aux_flows[ss] - &flows[ss];
                    flows[ss].scaled_add(step, &direction);
                }
            }
        }

        load_links(assignment, &flows, &aux_flows);
        assignment.update_link_travel_times();
        num_iterations = ii + 1;

        log::info!("Frank-Wolfe iteration {}: relative gaps {}", ii,
                   relative_gaps.row(ii).iter().map(|gg| format!("{:.6}", gg)).
                       collect::<Vec<String>>().join(", "));
        if let Some(tol) = options.rel_gap_tolerance {
            if relative_gaps.row(ii).iter().all(|gg| *gg < tol) {
                log::info!("every relative gap is below {}, stopping early", tol);
                break;
            }
        }
    }
    assignment.update_spnetwork_costs();

    return Ok(FrankWolfeReport {
        relative_gaps: relative_gaps.slice(s![..num_iterations, ..]).to_owned(),
        step_sizes: step_sizes.slice(s![..num_iterations, ..]).to_owned(),
    });
}

/// Loads every OD pair's whole volume onto its current shortest path, into `aux_flows`.
/// Returns the cost of doing so, per period.
fn all_or_nothing(assignment: &Assignment, aux_flows: &mut Vec<Array1<f64>>) -> Vec<f64> {
    let network = &assignment.network;
    let zones = network.zones();
    let links = network.links();
    let mut min_sys_costs = vec![0.; network.num_periods()];

    for (ss, spn) in assignment.spnetworks.iter().enumerate() {
        aux_flows[ss].fill(0.);
        let trees: Vec<(usize, ShortestPathTree)> = spn.orig_zones().par_iter().map(|oz| {
            let tree = single_source_shortest_path(&assignment.graph, spn.link_costs(),
                                                   zones[*oz].centroid, assignment.sp_algorithm);
            return (*oz, tree);
        }).collect();

        for (orig_zone, tree) in &trees {
            for dest_zone in spn.dest_zones(*orig_zone) {
                let key = ColumnKey::new(spn.agent_type(), spn.demand_period(), *orig_zone,
                                         *dest_zone);
                let od_vol = match assignment.column_pool.get(&key) {
                    Some(cv) => cv.od_volume(),
                    None => continue,
                };
                let dest_node = zones[*dest_zone].centroid;
                if od_vol <= MIN_OD_VOL || !tree.is_reachable(dest_node) {
                    continue;
                }
                for link_no in tree.link_path_to(dest_node) {
                    if !links[link_no].is_connector() {
                        aux_flows[ss][link_no] += od_vol;
                    }
                }
                min_sys_costs[spn.demand_period()] += od_vol * tree.labels[dest_node];
            }
        }
    }
    return min_sys_costs;
}

/// PCE-weighted current and auxiliary flows of one period, summed over its sub-networks.
fn aggregate_flows(assignment: &Assignment, flows: &Vec<Array1<f64>>,
                   aux_flows: &Vec<Array1<f64>>, tau: usize) -> (Vec<f64>, Vec<f64>) {
    let num_links = assignment.network.num_links();
    let mut agg_flows = Array1::<f64>::zeros(num_links);
    let mut agg_aux = Array1::<f64>::zeros(num_links);
    for (ss, spn) in assignment.spnetworks.iter().enumerate() {
        if spn.demand_period() == tau {
            agg_flows.scaled_add(spn.pce(), &flows[ss]);
            agg_aux.scaled_add(spn.pce(), &aux_flows[ss]);
        }
    }
    return (agg_flows.to_vec(), agg_aux.to_vec());
}

/// The toll part of the objective's derivative along the search direction of one period.
/// Each sub-network prices tolls at its own value of time, so this is not PCE-weighted.
fn toll_derivative(assignment: &Assignment, flows: &Vec<Array1<f64>>,
                   aux_flows: &Vec<Array1<f64>>, tau: usize) -> f64 {
    let mut derivative = 0.;
    for (ss, spn) in assignment.spnetworks.iter().enumerate() {
        if spn.demand_period() != tau {
            continue;
        }
        for link in assignment.network.links() {
            if link.is_connector() {
                continue;
            }
            let direction = aux_flows[ss][link.no] - flows[ss][link.no];
            derivative += link.toll_cost(spn.vot()) * direction;
        }
    }
    return derivative;
}

fn load_links(assignment: &mut Assignment, flows: &Vec<Array1<f64>>,
              aux_flows: &Vec<Array1<f64>>) {
    let num_periods = assignment.network.num_periods();
    let links = assignment.network.links_mut();
    for link in links.iter_mut() {
        for tau in 0..num_periods {
            link.flow_vol[tau] = 0.;
            link.aux_flow[tau] = 0.;
        }
    }
    for (ss, spn) in assignment.spnetworks.iter().enumerate() {
        let tau = spn.demand_period();
        for link in links.iter_mut() {
            link.flow_vol[tau] += spn.pce() * flows[ss][link.no];
            link.aux_flow[tau] += spn.pce() * aux_flows[ss][link.no];
        }
    }
}

/// Bisects [0, 1] for the step at which the directional derivative from `flows` towards
/// `aux_flows` changes sign.
fn line_search(links: &Vec<Link>, flows: &[f64], aux_flows: &[f64], toll_derivative: f64,
               tolerance: f64) -> f64 {
    let mut left = 0.;
    let mut right = 1.;
    for _ in 0..MAX_BISECTION_STEPS {
        let mid = (left + right) / 2.;
        let derivative = cost_model::directional_derivative(links, flows, aux_flows,
                                                            toll_derivative, mid);
        if derivative.abs() < tolerance {
            return mid;
        }
        if derivative > 0. {
            right = mid;
        } else {
            left = mid;
        }
        if right - left < tolerance {
            break;
        }
    }
    return (left + right) / 2.;
}
