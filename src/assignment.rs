use std::error::Error;
use std::str::FromStr;

use itertools::iproduct;
use ndarray::prelude::*;

use super::cost_model;
use super::demand;
use super::single_source_shortest_path;
use super::AgentType;
use super::AssignmentError;
use super::AssignmentSettings;
use super::ColumnKey;
use super::ColumnPool;
use super::DemandPeriod;
use super::DemandSummary;
use super::ForwardStar;
use super::Network;
use super::ShortestPathAlgorithm;
use super::SubNetwork;
use super::ZoneConnectivity;
use super::MIN_OD_VOL;


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignmentMode {
    ColumnGeneration,
    FrankWolfe,
}

impl FromStr for AssignmentMode {
    type Err = AssignmentError;

    fn from_str(mode: &str) -> Result<AssignmentMode, AssignmentError> {
        match mode.to_lowercase().as_str() {
            "column_generation" | "cg" | "ue" => Ok(AssignmentMode::ColumnGeneration),
            "frank_wolfe" | "fw" => Ok(AssignmentMode::FrankWolfe),
            _ => Err(AssignmentError::InvalidMode(mode.to_string())),
        }
    }
}


#[derive(Clone, Debug, PartialEq)]
pub struct ShortestPathResult {
    pub cost: f64,
    pub node_ids: Vec<String>,
    pub link_ids: Vec<String>,
}


/// Owns everything one assignment run works on.
pub struct Assignment {
    pub(crate) network: Network,
    pub(crate) graph: ForwardStar,
    pub(crate) agent_types: Vec<AgentType>,
    pub(crate) demand_periods: Vec<DemandPeriod>,
    pub(crate) column_pool: ColumnPool,
    pub(crate) spnetworks: Vec<SubNetwork>,
    pub(crate) sp_algorithm: ShortestPathAlgorithm,
}

impl Assignment {
    /// `network` must have been built with one period per entry of `demand_periods`.
    pub fn new(network: Network, agent_types: Vec<AgentType>, demand_periods: Vec<DemandPeriod>,
               sp_algorithm: ShortestPathAlgorithm) -> Assignment {
        let graph = ForwardStar::from_network(&network);
        return Assignment {
            network,
            graph,
            agent_types,
            demand_periods,
            column_pool: ColumnPool::new(),
            spnetworks: vec![],
            sp_algorithm,
        };
    }

    /// Validates `settings` and reads the network from its directory.  Demand is read
    /// separately by `read_demand_files`.
    pub fn from_settings(settings: &AssignmentSettings) -> Result<Assignment, Box<dyn Error>> {
        settings.validate()?;
        let agent_types: Vec<AgentType> = settings.agents.iter().enumerate().
            map(|(ii, aa)| AgentType::from_settings(ii, aa)).collect();
        let demand_periods: Vec<DemandPeriod> = settings.demand_periods.iter().enumerate().
            map(|(ii, pp)| DemandPeriod::from_settings(ii, pp)).collect();
        let network = Network::from_csv(&settings.base_dir, demand_periods.len(),
                                        settings.length_unit()?, settings.speed_unit()?)?;
        return Ok(Assignment::new(network, agent_types, demand_periods,
                                  settings.sp_algorithm()?));
    }

    /// Reads every demand file listed in `settings`.  OD pairs that can't be connected are
    /// skipped.
    pub fn read_demand_files(&mut self, settings: &AssignmentSettings)
                             -> Result<DemandSummary, Box<dyn Error>> {
        let connectivity = ZoneConnectivity::from_network(&self.network);
        let mut summary = DemandSummary::default();
        for file in &settings.demand_files {
            let at_no = self.get_agent_type_no(&file.agent_type)?;
            let dp_no = self.get_demand_period_no(&file.period)?;
            let path = settings.resolve_path(&file.file_name);
            let file_summary = demand::read_demand(&path, &self.agent_types[at_no],
                                                   &self.demand_periods[dp_no], &self.network,
                                                   &mut self.column_pool, Some(&connectivity))?;
            summary.merge(&file_summary);
        }
        return Ok(summary);
    }

    /// Adds `volume` trips between two zones, given by their external ids.
    pub fn add_demand(&mut self, agent_type: &str, demand_period: &str, o_zone_id: &str,
                      d_zone_id: &str, volume: f64) -> Result<(), AssignmentError> {
        let at_no = self.get_agent_type_no(agent_type)?;
        let dp_no = self.get_demand_period_no(demand_period)?;
        let orig_zone = self.network.get_zone_idx_by_id(o_zone_id).
            ok_or(AssignmentError::UnknownZone(o_zone_id.to_string()))?;
        let dest_zone = self.network.get_zone_idx_by_id(d_zone_id).
            ok_or(AssignmentError::UnknownZone(d_zone_id.to_string()))?;
        let key = ColumnKey::new(at_no, dp_no, orig_zone, dest_zone);
        self.column_pool.get_or_create(key).increase_od_volume(volume);
        return Ok(());
    }

    pub fn get_agent_type_no(&self, name: &str) -> Result<usize, AssignmentError> {
        return self.agent_types.iter().position(|aa| aa.name == name).
            ok_or(AssignmentError::UnknownAgentType(name.to_string()));
    }

    pub fn get_demand_period_no(&self, name: &str) -> Result<usize, AssignmentError> {
        return self.demand_periods.iter().position(|dp| dp.name == name).
            ok_or(AssignmentError::UnknownDemandPeriod(name.to_string()));
    }

    /// Builds one sub-network per class and period pair from the demand in the column pool.
    pub fn setup_spnetworks(&mut self) {
        let mut spnetworks = vec![];
        for (at, dp) in iproduct!(self.agent_types.iter(), self.demand_periods.iter()) {
            let spn = SubNetwork::new(at, dp, self.network.links(), &self.column_pool);
            if spn.orig_zones().is_empty() {
                continue;
            }
            log::debug!("sub-network for {} in {} has {} origins", at.name, dp.name,
                        spn.orig_zones().len());
            spnetworks.push(spn);
        }
        self.spnetworks = spnetworks;
    }

    pub(crate) fn update_link_travel_times(&mut self) {
        let num_periods = self.network.num_periods();
        cost_model::update_links_travel_time(self.network.links_mut(), num_periods);
    }

    pub(crate) fn update_spnetwork_costs(&mut self) {
        let links = self.network.links();
        for spn in self.spnetworks.iter_mut() {
            spn.update_link_costs(links);
        }
    }

    /// The free-flow shortest path between two nodes for the first traveller class, or None if
    /// `to_node_id` can't be reached.
    pub fn find_shortest_path(&self, from_node_id: &str, to_node_id: &str)
                              -> Result<Option<ShortestPathResult>, AssignmentError> {
        let from_no = self.network.get_node_idx_by_id(from_node_id).
            ok_or(AssignmentError::UnknownNode(from_node_id.to_string()))?;
        let to_no = self.network.get_node_idx_by_id(to_node_id).
            ok_or(AssignmentError::UnknownNode(to_node_id.to_string()))?;
        let vot = match self.agent_types.first() {
            Some(at) => at.vot,
            None => f64::INFINITY,
        };
        let costs: Array1<f64> = self.network.links().iter().
            map(|ll| ll.free_flow_cost(vot)).collect();
        let tree = single_source_shortest_path(&self.graph, &costs, from_no, self.sp_algorithm);
        if !tree.is_reachable(to_no) {
            return Ok(None);
        }
        let links = self.network.links();
        let nodes = self.network.nodes();
        return Ok(Some(ShortestPathResult {
            cost: tree.labels[to_no],
            node_ids: tree.node_path_to(to_no).iter().map(|nn| nodes[*nn].id.clone()).collect(),
            link_ids: tree.link_path_to(to_no).iter().map(|ll| links[*ll].id.clone()).collect(),
        }));
    }

    /// Total demand of each period over all classes and OD pairs.
    pub fn total_demand(&self) -> Vec<f64> {
        let mut totals = vec![0.; self.demand_periods.len()];
        for (key, cv) in self.column_pool.iter() {
            if cv.od_volume() > MIN_OD_VOL {
                totals[key.demand_period] += cv.od_volume();
            }
        }
        return totals;
    }

    pub fn network(&self) -> &Network {
        return &self.network;
    }

    pub fn network_mut(&mut self) -> &mut Network {
        return &mut self.network;
    }

    pub fn agent_types(&self) -> &Vec<AgentType> {
        return &self.agent_types;
    }

    pub fn demand_periods(&self) -> &Vec<DemandPeriod> {
        return &self.demand_periods;
    }

    pub fn column_pool(&self) -> &ColumnPool {
        return &self.column_pool;
    }

    pub fn column_pool_mut(&mut self) -> &mut ColumnPool {
        return &mut self.column_pool;
    }

    pub fn spnetworks(&self) -> &Vec<SubNetwork> {
        return &self.spnetworks;
    }

    pub fn sp_algorithm(&self) -> ShortestPathAlgorithm {
        return self.sp_algorithm;
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::test_utils;
    use crate::Link;

    #[test]
    fn test_mode() {
        assert_eq!("column_generation".parse::<AssignmentMode>(), Ok(AssignmentMode::ColumnGeneration));
        assert_eq!("FW".parse::<AssignmentMode>(), Ok(AssignmentMode::FrankWolfe));
        assert_eq!("dta".parse::<AssignmentMode>(),
                   Err(AssignmentError::InvalidMode(String::from("dta"))));
    }

    #[test]
    fn test_add_demand() {
        let mut assignment = test_utils::diamond_assignment(0., ShortestPathAlgorithm::Fifo);
        assert!(assignment.add_demand("a", "AM", "1", "2", 20.).is_ok());
        assert!(assignment.add_demand("a", "AM", "1", "2", 5.).is_ok());
        assert_eq!(assignment.add_demand("x", "AM", "1", "2", 5.),
                   Err(AssignmentError::UnknownAgentType(String::from("x"))));
        assert_eq!(assignment.add_demand("a", "PM", "1", "2", 5.),
                   Err(AssignmentError::UnknownDemandPeriod(String::from("PM"))));
        assert_eq!(assignment.add_demand("a", "AM", "1", "7", 5.),
                   Err(AssignmentError::UnknownZone(String::from("7"))));
        assert_eq!(assignment.add_demand("a", "AM", "9", "2", 5.),
                   Err(AssignmentError::UnknownZone(String::from("9"))));
        assert_eq!(assignment.total_demand(), vec![25.]);

        assignment.setup_spnetworks();
        assert_eq!(assignment.spnetworks().len(), 1);
        assert_eq!(assignment.spnetworks()[0].orig_zones(), vec![0]);
    }

    #[test]
    fn test_calibration_fields() {
        let mut assignment = test_utils::diamond_assignment(100., ShortestPathAlgorithm::Deque);
        crate::find_ue(&mut assignment, 5, 5, None).unwrap();
        let link_no = assignment.network().get_link_idx_by_id("oa").unwrap();
        let zone_no = assignment.network().get_zone_idx_by_id("1").unwrap();
        let key = ColumnKey::new(0, 0, zone_no, 1);

        let link = &mut assignment.network_mut().links_mut()[link_no];
        assert_eq!(link.obs_count(), None);
        assert_eq!(link.est_dev(), 0.);
        link.set_obs_count(Some(70.));
        let dev = link.flow_volume(0) - 70.;
        link.set_est_dev(dev);

        let zone = &mut assignment.network_mut().zones_mut()[zone_no];
        assert_eq!(zone.prod_obs(), None);
        zone.set_prod_obs(Some(90.));
        zone.set_prod_est_dev(10.);
        zone.set_attr_obs(Some(110.));
        zone.set_attr_est_dev(-10.);

        let path_costs: Vec<f64> = assignment.column_pool().get(&key).unwrap().columns().
            iter().map(|cc| cc.gradient_cost()).collect();
        for column in assignment.column_pool_mut().get_mut(&key).unwrap().columns_mut() {
            let deviation_cost = column.gradient_cost() + 2. * dev;
            column.set_gradient_cost(deviation_cost);
        }
        let cv = assignment.column_pool().get(&key).unwrap();
        for (column, path_cost) in cv.columns().iter().zip(&path_costs) {
            assert_relative_eq!(column.gradient_cost(), path_cost + 2. * dev);
        }

        // another solve refreshes the gradient costs and leaves the observations alone
        crate::find_ue(&mut assignment, 0, 1, None).unwrap();
        let link = &assignment.network().links()[link_no];
        assert_eq!(link.obs_count(), Some(70.));
        assert_eq!(link.est_dev(), dev);
        let zone = &assignment.network().zones()[zone_no];
        assert_eq!((zone.prod_obs(), zone.prod_est_dev()), (Some(90.), 10.));
        assert_eq!((zone.attr_obs(), zone.attr_est_dev()), (Some(110.), -10.));
        let cv = assignment.column_pool().get(&key).unwrap();
        for column in cv.columns() {
            let path_cost: f64 = column.links().iter().
                map(|ll| assignment.network().links()[*ll].generalized_cost(0, 10.)).sum();
            assert_relative_eq!(column.gradient_cost(), path_cost);
        }
    }

    #[test]
    fn test_find_shortest_path() {
        let assignment = test_utils::diamond_assignment(100., ShortestPathAlgorithm::Dijkstra);
        let path = assignment.find_shortest_path("o", "d").unwrap().unwrap();
        assert_eq!(path.cost, 10.);
        assert_eq!(path.node_ids, vec!["o", "a", "d"]);
        assert_eq!(path.link_ids, vec!["oa", "ad"]);

        assert_eq!(assignment.find_shortest_path("d", "o").unwrap(), None);
        assert_eq!(assignment.find_shortest_path("o", "q"),
                   Err(AssignmentError::UnknownNode(String::from("q"))));
    }

    #[test]
    fn test_find_shortest_path_with_toll() {
        let mut network = test_utils::diamond_network(1);
        network.add_link("o", "d", Link::new("od", 8., 1, 50., 60.).with_toll(1.));
        let assignment = Assignment::new(network, vec![AgentType::new(0, "a", 60., 1.)],
                                         vec![DemandPeriod::new(0, "AM", "0700_0800")],
                                         ShortestPathAlgorithm::Deque);
        // 8 minutes plus a $1 toll at $60/hour beats the 10 minute route
        let path = assignment.find_shortest_path("o", "d").unwrap().unwrap();
        assert_eq!(path.link_ids, vec!["od"]);
        assert_relative_eq!(path.cost, 9.);
    }
}
