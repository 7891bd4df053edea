use std::error::Error;
use std::fs::File;
use std::path::Path;

use super::config_utils;
use super::config_utils::Row;
use super::AgentSettings;
use super::ColumnKey;
use super::ColumnPool;
use super::Network;
use super::PeriodSettings;
use super::ZoneConnectivity;
use super::MIN_OD_VOL;


/// A class of travellers sharing a value of time and a vehicle size.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentType {
    pub no: usize,
    pub name: String,
    pub description: String,
    /// dollars per hour
    pub vot: f64,
    pub pce: f64,
}

impl AgentType {
    pub fn new(no: usize, name: &str, vot: f64, pce: f64) -> AgentType {
        return AgentType {
            no,
            name: name.to_string(),
            description: name.to_string(),
            vot,
            pce,
        };
    }

    pub fn from_settings(no: usize, settings: &AgentSettings) -> AgentType {
        return AgentType {
            no,
            name: settings.name.clone(),
            description: settings.description.clone(),
            vot: settings.vot,
            pce: settings.pce,
        };
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DemandPeriod {
    pub no: usize,
    pub name: String,
    pub time_period: String,
    pub duration_minutes: u32,
}

impl DemandPeriod {
    /// A malformed `time_period` gives a duration of zero minutes.
    pub fn new(no: usize, name: &str, time_period: &str) -> DemandPeriod {
        let duration_minutes = config_utils::get_num_minutes_from_time_period(time_period).
            unwrap_or(0);
        return DemandPeriod {
            no,
            name: name.to_string(),
            time_period: time_period.to_string(),
            duration_minutes,
        };
    }

    pub fn from_settings(no: usize, settings: &PeriodSettings) -> DemandPeriod {
        return DemandPeriod::new(no, &settings.name, &settings.time_period);
    }
}


#[derive(Clone, Debug, Default, PartialEq)]
pub struct DemandSummary {
    pub valid_volume: f64,
    pub invalid_od_count: usize,
    pub invalid_volume: f64,
}

impl DemandSummary {
    pub fn merge(&mut self, other: &DemandSummary) {
        self.valid_volume += other.valid_volume;
        self.invalid_od_count += other.invalid_od_count;
        self.invalid_volume += other.invalid_volume;
    }
}

/// Reads an `o_zone_id,d_zone_id,volume` table into `pool`.  Rows that can't be assigned are
/// skipped and counted rather than failing the read.
pub fn read_demand(path: &Path, agent_type: &AgentType, demand_period: &DemandPeriod,
                   network: &Network, pool: &mut ColumnPool,
                   connectivity: Option<&ZoneConnectivity>)
                   -> Result<DemandSummary, Box<dyn Error>> {
    let file = File::open(path)?;
    let mut reader = csv::Reader::from_reader(file);
    let mut summary = DemandSummary::default();

    for result in reader.deserialize() {
        let row: Row = result?;
        let o_zone_id = config_utils::get_field(&row, "o_zone_id").unwrap_or("");
        let d_zone_id = config_utils::get_field(&row, "d_zone_id").unwrap_or("");
        let volume = match config_utils::get_f64_field(&row, "volume") {
            Some(volume) => volume,
            None => {
                log::warn!("no valid volume from zone {} to zone {}", o_zone_id, d_zone_id);
                summary.invalid_od_count += 1;
                continue;
            }
        };
        if volume <= MIN_OD_VOL {
            continue;
        }

        let (orig_zone, dest_zone) = match (network.get_zone_idx_by_id(o_zone_id),
                                            network.get_zone_idx_by_id(d_zone_id)) {
            (Some(oz), Some(dz)) => (oz, dz),
            _ => {
                log::warn!("zone {} or {} is not in the network, skipping their demand",
                           o_zone_id, d_zone_id);
                summary.invalid_od_count += 1;
                summary.invalid_volume += volume;
                continue;
            }
        };
        if orig_zone == dest_zone {
            log::debug!("skipping intrazonal demand in zone {}", o_zone_id);
            summary.invalid_od_count += 1;
            summary.invalid_volume += volume;
            continue;
        }
        if let Some(conn) = connectivity {
            if !conn.are_od_connected(orig_zone, dest_zone) {
                log::warn!("zone {} can't reach zone {}, skipping their demand", o_zone_id,
                           d_zone_id);
                summary.invalid_od_count += 1;
                summary.invalid_volume += volume;
                continue;
            }
        }

        let key = ColumnKey::new(agent_type.no, demand_period.no, orig_zone, dest_zone);
        pool.get_or_create(key).increase_od_volume(volume);
        summary.valid_volume += volume;
    }

    if summary.valid_volume == 0. {
        log::warn!("no valid demand in {} for {} in {}", path.display(), agent_type.name,
                   demand_period.name);
    } else {
        log::info!("read {} trips of {} in {} from {}", summary.valid_volume, agent_type.name,
                   demand_period.name, path.display());
    }
    if summary.invalid_od_count > 0 {
        log::warn!("{} OD pairs with {} trips were skipped", summary.invalid_od_count,
                   summary.invalid_volume);
    }
    return Ok(summary);
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use approx::assert_relative_eq;
    use tempfile::tempdir;
    use crate::test_utils;
    use crate::Link;

    #[test]
    fn test_demand_period() {
        let dp = DemandPeriod::new(1, "PM", "1600_1830");
        assert_eq!(dp.duration_minutes, 150);
        assert_eq!(DemandPeriod::new(0, "bad", "late").duration_minutes, 0);
        assert_eq!(DemandPeriod::new(0, "AM", "0é0_0800").duration_minutes, 0);
        assert_eq!(DemandPeriod::new(0, "night", "2300_2459").duration_minutes, 0);
    }

    #[test]
    fn test_read_demand() -> Result<(), Box<dyn Error>> {
        let mut network = test_utils::diamond_network(1);
        // zone 3 can be entered but never left
        network.add_node("z", Some("3"));
        network.add_link("d", "z", Link::new("dz", 1., 1, 50., 60.));
        network.setup_centroids();
        let connectivity = ZoneConnectivity::from_network(&network);

        let dir = tempdir()?;
        let path = dir.path().join("demand.csv");
        let demand = "o_zone_id,d_zone_id,volume\n\
                      1,2,60\n\
                      1,2,40\n\
                      1,3,5\n\
                      2,2,7\n\
                      1,9,11\n\
                      3,1,13\n\
                      2,1,0\n\
                      2,1,abc\n";
        File::create(&path)?.write_all(demand.as_bytes())?;

        let agent = AgentType::new(0, "a", 10., 1.);
        let period = DemandPeriod::new(0, "AM", "0700_0800");
        let mut pool = ColumnPool::new();
        let summary = read_demand(&path, &agent, &period, &network, &mut pool,
                                  Some(&connectivity))?;
        assert_relative_eq!(summary.valid_volume, 105.);
        assert_eq!(summary.invalid_od_count, 4);
        assert_relative_eq!(summary.invalid_volume, 31.);

        let od_vols: HashMap<ColumnKey, f64> = pool.iter().
            map(|(key, cv)| (*key, cv.od_volume())).collect();
        let zone = |id: &str| network.get_zone_idx_by_id(id).unwrap();
        let true_vols: HashMap<ColumnKey, f64> = [
            (ColumnKey::new(0, 0, zone("1"), zone("2")), 100.),
            (ColumnKey::new(0, 0, zone("1"), zone("3")), 5.),
        ].iter().cloned().collect();
        test_utils::compare_hashmaps(&od_vols, &true_vols);

        // without a connectivity check, the demand out of zone 3 is kept
        let mut pool = ColumnPool::new();
        let summary = read_demand(&path, &agent, &period, &network, &mut pool, None)?;
        assert_relative_eq!(summary.valid_volume, 118.);
        assert_eq!(pool.len(), 3);
        Ok(())
    }
}
