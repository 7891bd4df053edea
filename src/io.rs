use std::error::Error;
use std::fs::File;
use std::path::Path;

use itertools::Itertools;

use super::colgen;
use super::config_utils;
use super::config_utils::Row;
use super::Assignment;
use super::ColumnKey;
use super::EPSILON;


const ROUTE_ASSIGNMENT_FILE: &str = "route_assignment.csv";
const LINK_PERFORMANCE_FILE: &str = "link_performance.csv";
const PATH_SEP: &str = ";";


/// Writes every column with volume to `route_assignment.csv` in `output_dir`, with nodes and
/// links given by their external ids.
pub fn output_columns(assignment: &Assignment, output_dir: &Path) -> Result<(), Box<dyn Error>> {
    let path = output_dir.join(ROUTE_ASSIGNMENT_FILE);
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(&["agent_id", "o_zone_id", "d_zone_id", "path_id", "agent_type",
                          "demand_period", "volume", "toll", "travel_time", "distance",
                          "node_sequence", "link_sequence"])?;

    let network = assignment.network();
    let nodes = network.nodes();
    let links = network.links();
    let zones = network.zones();
    let mut agent_id = 0;
    for key in assignment.column_pool().sorted_keys() {
        let cv = match assignment.column_pool().get(&key) {
            Some(cv) => cv,
            None => continue,
        };
        let agent_type = &assignment.agent_types()[key.agent_type].name;
        let demand_period = &assignment.demand_periods()[key.demand_period].name;
        for column in cv.columns() {
            if column.volume() <= 0. {
                continue;
            }
            agent_id += 1;
            let node_seq = column.nodes().iter().map(|nn| &nodes[*nn].id).join(PATH_SEP);
            let link_seq = column.links().iter().map(|ll| &links[*ll].id).join(PATH_SEP);
            writer.write_record(&[agent_id.to_string(),
                                  zones[key.orig_zone].id.clone(),
                                  zones[key.dest_zone].id.clone(),
                                  column.id().to_string(),
                                  agent_type.clone(),
                                  demand_period.clone(),
                                  column.volume().to_string(),
                                  column.toll().to_string(),
                                  column.travel_time().to_string(),
                                  column.distance().to_string(),
                                  node_seq,
                                  link_seq])?;
        }
    }
    writer.flush()?;
    log::info!("wrote {} paths to {}", agent_id, path.display());
    return Ok(());
}

/// Writes the flow and travel time of every physical link in every period to
/// `link_performance.csv` in `output_dir`.  Speeds are in mph.
pub fn output_link_performance(assignment: &Assignment, output_dir: &Path)
                               -> Result<(), Box<dyn Error>> {
    let path = output_dir.join(LINK_PERFORMANCE_FILE);
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(&["link_id", "from_node_id", "to_node_id", "time_period", "volume",
                          "travel_time", "speed", "VOC"])?;

    let network = assignment.network();
    let nodes = network.nodes();
    for link in network.links().iter().filter(|ll| !ll.is_connector()) {
        for dp in assignment.demand_periods() {
            let travel_time = link.travel_time(dp.no);
            let speed = link.length / (travel_time.max(EPSILON) / 60.);
            writer.write_record(&[link.id.clone(),
                                  nodes[link.from_node_no].id.clone(),
                                  nodes[link.to_node_no].id.clone(),
                                  dp.time_period.clone(),
                                  link.flow_volume(dp.no).to_string(),
                                  travel_time.to_string(),
                                  speed.to_string(),
                                  link.voc(dp.no).to_string()])?;
        }
    }
    writer.flush()?;
    log::info!("wrote link performance to {}", path.display());
    return Ok(());
}

/// Reads the columns in `route_assignment.csv` from `input_dir` into the column pool, adding
/// each column's volume to its OD pair's demand, and loads the network with them.  Rows that
/// don't match the network or the assignment's agent types and periods are skipped.
///
/// Returns the number of columns read.
pub fn load_columns(assignment: &mut Assignment, input_dir: &Path)
                    -> Result<usize, Box<dyn Error>> {
    let path = input_dir.join(ROUTE_ASSIGNMENT_FILE);
    let file = File::open(&path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut num_loaded = 0;

    for result in reader.deserialize() {
        let row: Row = result?;
        let at_no = match config_utils::get_field(&row, "agent_type").
            and_then(|at| assignment.get_agent_type_no(at).ok()) {
            Some(at_no) => at_no,
            None => {
                log::warn!("skipping a column with an unknown agent type");
                continue;
            }
        };
        let dp_no = match config_utils::get_field(&row, "demand_period").
            and_then(|dp| assignment.get_demand_period_no(dp).ok()) {
            Some(dp_no) => dp_no,
            None => {
                log::warn!("skipping a column with an unknown demand period");
                continue;
            }
        };

        let network = &assignment.network;
        let o_zone_id = config_utils::get_field(&row, "o_zone_id").unwrap_or("");
        let d_zone_id = config_utils::get_field(&row, "d_zone_id").unwrap_or("");
        let (orig_zone, dest_zone) = match (network.get_zone_idx_by_id(o_zone_id),
                                            network.get_zone_idx_by_id(d_zone_id)) {
            (Some(oz), Some(dz)) => (oz, dz),
            _ => {
                log::warn!("zone {} or {} is not in the network, skipping their column",
                           o_zone_id, d_zone_id);
                continue;
            }
        };
        let volume = match config_utils::get_f64_field(&row, "volume") {
            Some(volume) if volume >= 0. => volume,
            _ => {
                log::warn!("no valid volume for a column from zone {} to zone {}", o_zone_id,
                           d_zone_id);
                continue;
            }
        };

        let link_seq = config_utils::get_field(&row, "link_sequence").unwrap_or("");
        let link_nos: Option<Vec<usize>> = link_seq.split(PATH_SEP).
            map(|id| network.get_link_idx_by_id(id.trim())).collect();
        let link_nos = match link_nos {
            Some(link_nos) if !link_nos.is_empty() => link_nos,
            _ => {
                log::warn!("column from zone {} to zone {} uses unknown links, skipping it",
                           o_zone_id, d_zone_id);
                continue;
            }
        };
        let links = network.links();
        let mut node_nos = vec![links[link_nos[0]].from_node_no];
        node_nos.extend(link_nos.iter().map(|ll| links[*ll].to_node_no));

        let key = ColumnKey::new(at_no, dp_no, orig_zone, dest_zone);
        let cv = assignment.column_pool.get_or_create(key);
        cv.increase_od_volume(volume);
        cv.add_path_volume(link_nos, node_nos, volume, network);
        num_loaded += 1;
    }

    colgen::update_link_and_column_volume(assignment, 0, false);
    assignment.update_link_travel_times();
    let network = &assignment.network;
    for (key, cv) in assignment.column_pool.iter_mut() {
        for column in cv.columns_mut().iter_mut() {
            column.refresh_attributes(network, key.demand_period);
        }
    }
    log::info!("loaded {} columns from {}", num_loaded, path.display());
    return Ok(num_loaded);
}
