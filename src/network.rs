// this file defines the road network that traffic is assigned to: nodes, directed links, and
// the zones that demand travels between.
use std::collections::HashMap;
use std::error::Error;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use petgraph::algo::kosaraju_scc;
use petgraph::graphmap::DiGraphMap;

use super::config_utils;
use super::config_utils::Row;
use super::AssignmentError;
use super::EPSILON;


static DEFAULT_LANES: u32 = 1;
static DEFAULT_FREE_SPEED: f64 = 60.;
static DEFAULT_LANE_CAPACITY: f64 = 1999.;
static DEFAULT_VDF_ALPHA: f64 = 0.15;
static DEFAULT_VDF_BETA: f64 = 4.;


#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LengthUnit {
    Mile,
    Kilometer,
    Meter,
}

impl LengthUnit {
    pub fn to_miles(&self, length: f64) -> f64 {
        match self {
            LengthUnit::Mile => length,
            LengthUnit::Kilometer => length / 1.609,
            LengthUnit::Meter => length / 1609.,
        }
    }
}

impl FromStr for LengthUnit {
    type Err = AssignmentError;

    fn from_str(unit: &str) -> Result<LengthUnit, AssignmentError> {
        match unit.to_lowercase().as_str() {
            "mile" | "mi" | "miles" => Ok(LengthUnit::Mile),
            "km" | "kilometer" | "kilometers" => Ok(LengthUnit::Kilometer),
            "m" | "meter" | "meters" => Ok(LengthUnit::Meter),
            _ => Err(AssignmentError::InvalidUnit{kind: String::from("length"),
                                                  unit: unit.to_string()}),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SpeedUnit {
    Mph,
    Kmh,
}

impl SpeedUnit {
    pub fn to_mph(&self, speed: f64) -> f64 {
        match self {
            SpeedUnit::Mph => speed,
            SpeedUnit::Kmh => speed / 1.609,
        }
    }
}

impl FromStr for SpeedUnit {
    type Err = AssignmentError;

    fn from_str(unit: &str) -> Result<SpeedUnit, AssignmentError> {
        match unit.to_lowercase().as_str() {
            "mph" => Ok(SpeedUnit::Mph),
            "kmh" | "kph" => Ok(SpeedUnit::Kmh),
            _ => Err(AssignmentError::InvalidUnit{kind: String::from("speed"),
                                                  unit: unit.to_string()}),
        }
    }
}


#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub no: usize,
    pub id: String,
    pub zone_id: Option<String>,
    /// true only for the synthetic centroid built for a zone with several nodes
    pub is_centroid: bool,
    pub outgoing_links: Vec<usize>,
    pub incoming_links: Vec<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Link {
    pub no: usize,
    pub id: String,
    pub from_node_no: usize,
    pub to_node_no: usize,
    /// miles
    pub length: f64,
    pub lanes: u32,
    /// vehicles per hour over all lanes
    pub capacity: f64,
    /// mph
    pub free_speed: f64,
    /// free-flow travel time in minutes
    pub fftt: f64,
    pub vdf_alpha: f64,
    pub vdf_beta: f64,
    pub toll: f64,
    pub(crate) flow_vol: Vec<f64>,
    pub(crate) travel_time: Vec<f64>,
    pub(crate) aux_flow: Vec<f64>,
    obs_count: Option<f64>,
    est_dev: f64,
}

impl Link {
    /// Creates a link that isn't attached to any nodes yet.  `lane_capacity` is per lane per
    /// hour, `length` in miles and `free_speed` in mph.
    pub fn new(id: &str, length: f64, lanes: u32, lane_capacity: f64, free_speed: f64) -> Link {
        let fftt = length / free_speed.max(EPSILON) * 60.;
        return Link {
            no: 0,
            id: id.to_string(),
            from_node_no: 0,
            to_node_no: 0,
            length,
            lanes,
            capacity: lane_capacity * lanes as f64,
            free_speed,
            fftt,
            vdf_alpha: DEFAULT_VDF_ALPHA,
            vdf_beta: DEFAULT_VDF_BETA,
            toll: 0.,
            flow_vol: vec![],
            travel_time: vec![],
            aux_flow: vec![],
            obs_count: None,
            est_dev: 0.,
        };
    }

    pub fn with_vdf(mut self, alpha: f64, beta: f64) -> Link {
        self.vdf_alpha = alpha;
        self.vdf_beta = beta;
        return self;
    }

    pub fn with_toll(mut self, toll: f64) -> Link {
        self.toll = toll;
        return self;
    }

    /// Zero-length links join zone centroids to the physical network.
    pub fn is_connector(&self) -> bool {
        return self.length == 0.;
    }

    pub fn flow_volume(&self, tau: usize) -> f64 {
        return self.flow_vol[tau];
    }

    pub fn travel_time(&self, tau: usize) -> f64 {
        return self.travel_time[tau];
    }

    pub fn aux_flow(&self, tau: usize) -> f64 {
        return self.aux_flow[tau];
    }

    pub fn voc(&self, tau: usize) -> f64 {
        return self.flow_vol[tau] / self.capacity.max(EPSILON);
    }

    pub fn obs_count(&self) -> Option<f64> {
        return self.obs_count;
    }

    pub fn set_obs_count(&mut self, obs_count: Option<f64>) {
        self.obs_count = obs_count;
    }

    pub fn est_dev(&self) -> f64 {
        return self.est_dev;
    }

    pub fn set_est_dev(&mut self, est_dev: f64) {
        self.est_dev = est_dev;
    }

    fn init_periods(&mut self, num_periods: usize) {
        self.flow_vol = vec![0.; num_periods];
        self.travel_time = vec![self.fftt; num_periods];
        self.aux_flow = vec![0.; num_periods];
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Zone {
    pub no: usize,
    pub id: String,
    pub nodes: Vec<usize>,
    pub centroid: usize,
    prod_obs: Option<f64>,
    attr_obs: Option<f64>,
    prod_est_dev: f64,
    attr_est_dev: f64,
}

impl Zone {
    pub fn prod_obs(&self) -> Option<f64> {
        return self.prod_obs;
    }

    pub fn set_prod_obs(&mut self, obs: Option<f64>) {
        self.prod_obs = obs;
    }

    pub fn attr_obs(&self) -> Option<f64> {
        return self.attr_obs;
    }

    pub fn set_attr_obs(&mut self, obs: Option<f64>) {
        self.attr_obs = obs;
    }

    pub fn prod_est_dev(&self) -> f64 {
        return self.prod_est_dev;
    }

    pub fn set_prod_est_dev(&mut self, dev: f64) {
        self.prod_est_dev = dev;
    }

    pub fn attr_est_dev(&self) -> f64 {
        return self.attr_est_dev;
    }

    pub fn set_attr_est_dev(&mut self, dev: f64) {
        self.attr_est_dev = dev;
    }
}


pub struct Network {
    nodes: Vec<Node>,
    links: Vec<Link>,
    zones: Vec<Zone>,
    node_idxs_by_id: HashMap<String, usize>,
    link_idxs_by_id: HashMap<String, usize>,
    zone_idxs_by_id: HashMap<String, usize>,
    num_periods: usize,
}

impl Network {
    pub fn new(num_periods: usize) -> Network {
        return Network {
            nodes: vec![],
            links: vec![],
            zones: vec![],
            node_idxs_by_id: HashMap::new(),
            link_idxs_by_id: HashMap::new(),
            zone_idxs_by_id: HashMap::new(),
            num_periods,
        };
    }

    /// Reads node.csv and link.csv from `dir`, then builds zone centroids.
    pub fn from_csv(dir: &Path, num_periods: usize, length_unit: LengthUnit,
                    speed_unit: SpeedUnit) -> Result<Network, Box<dyn Error>> {
        let mut network = Network::new(num_periods);

        let file = File::open(dir.join("node.csv"))?;
        let mut reader = csv::Reader::from_reader(file);
        for result in reader.deserialize() {
            let row: Row = result?;
            let node_id = match config_utils::get_field(&row, "node_id") {
                Some(node_id) => node_id,
                None => {
                    log::warn!("skipping a node with no node_id");
                    continue;
                }
            };
            let zone_id = config_utils::get_field(&row, "zone_id");
            if network.add_node(node_id, zone_id).is_none() {
                log::warn!("duplicate node_id {}, skipping it", node_id);
            }
        }
        log::info!("the number of nodes is {}", network.num_nodes());

        let file = File::open(dir.join("link.csv"))?;
        let mut reader = csv::Reader::from_reader(file);
        for result in reader.deserialize() {
            let row: Row = result?;
            if let Some(link) = link_from_row(&row, length_unit, speed_unit) {
                let from_id = config_utils::get_field(&row, "from_node_id").unwrap_or("");
                let to_id = config_utils::get_field(&row, "to_node_id").unwrap_or("");
                let link_id = link.id.clone();
                if network.link_idxs_by_id.contains_key(&link_id) {
                    log::warn!("duplicate link_id {}, skipping it", link_id);
                } else if network.add_link(from_id, to_id, link).is_none() {
                    log::warn!("link {} joins unknown nodes {} and {}, skipping it", link_id,
                               from_id, to_id);
                }
            }
        }
        log::info!("the number of links is {}", network.num_links());

        network.setup_centroids();
        if network.num_zones() == 0 {
            return Err(Box::new(AssignmentError::MissingZones));
        }
        log::info!("the number of zones is {}", network.num_zones());
        network.log_components();
        return Ok(network);
    }

    /// Returns the new node's index, or None if the id is already taken.
    pub fn add_node(&mut self, node_id: &str, zone_id: Option<&str>) -> Option<usize> {
        if self.node_idxs_by_id.contains_key(node_id) {
            return None;
        }
        let no = self.nodes.len();
        self.nodes.push(Node {
            no,
            id: node_id.to_string(),
            zone_id: zone_id.map(|zz| zz.to_string()),
            is_centroid: false,
            outgoing_links: vec![],
            incoming_links: vec![],
        });
        self.node_idxs_by_id.insert(node_id.to_string(), no);
        return Some(no);
    }

    /// Attaches `link` between two existing nodes.  Returns the link's index, or None if
    /// either node is unknown or the link id is taken.
    pub fn add_link(&mut self, from_id: &str, to_id: &str, mut link: Link) -> Option<usize> {
        if self.link_idxs_by_id.contains_key(&link.id) {
            return None;
        }
        let from_no = *self.node_idxs_by_id.get(from_id)?;
        let to_no = *self.node_idxs_by_id.get(to_id)?;
        let no = self.links.len();
        link.no = no;
        link.from_node_no = from_no;
        link.to_node_no = to_no;
        link.init_periods(self.num_periods);
        self.nodes[from_no].outgoing_links.push(no);
        self.nodes[to_no].incoming_links.push(no);
        self.link_idxs_by_id.insert(link.id.clone(), no);
        self.links.push(link);
        return Some(no);
    }

    /// Groups nodes into zones by their zone id.  A zone of one node uses that node as its
    /// centroid; larger zones get a synthetic centroid joined to each member by a pair of
    /// connectors.  Safe to call again after adding nodes.
    pub fn setup_centroids(&mut self) {
        self.zones.clear();
        self.zone_idxs_by_id.clear();
        let mut members: Vec<(String, Vec<usize>)> = vec![];
        for node in &self.nodes {
            if node.is_centroid {
                continue;
            }
            if let Some(zone_id) = &node.zone_id {
                match self.zone_idxs_by_id.get(zone_id) {
                    Some(zone_no) => members[*zone_no].1.push(node.no),
                    None => {
                        self.zone_idxs_by_id.insert(zone_id.clone(), members.len());
                        members.push((zone_id.clone(), vec![node.no]));
                    }
                }
            }
        }

        for (zone_no, (zone_id, nodes)) in members.into_iter().enumerate() {
            let centroid = if nodes.len() == 1 {
                nodes[0]
            } else {
                self.add_centroid(&zone_id, &nodes)
            };
            self.zones.push(Zone {
                no: zone_no,
                id: zone_id,
                nodes,
                centroid,
                prod_obs: None,
                attr_obs: None,
                prod_est_dev: 0.,
                attr_est_dev: 0.,
            });
        }
    }

    fn add_centroid(&mut self, zone_id: &str, nodes: &Vec<usize>) -> usize {
        let centroid_id = format!("zone_centroid_{}", zone_id);
        if let Some(existing) = self.node_idxs_by_id.get(&centroid_id) {
            return *existing;
        }
        let centroid_no = self.nodes.len();
        self.nodes.push(Node {
            no: centroid_no,
            id: centroid_id.clone(),
            zone_id: Some(zone_id.to_string()),
            is_centroid: true,
            outgoing_links: vec![],
            incoming_links: vec![],
        });
        self.node_idxs_by_id.insert(centroid_id.clone(), centroid_no);
        log::debug!("zone {} gets centroid {} with {} connectors", zone_id, centroid_id,
                    nodes.len() * 2);

        for node_no in nodes {
            let node_id = self.nodes[*node_no].id.clone();
            for (from_id, to_id) in &[(&centroid_id, &node_id), (&node_id, &centroid_id)] {
                let link_id = format!("connector_{}_{}", from_id, to_id);
                let connector = Link::new(&link_id, 0., DEFAULT_LANES, DEFAULT_LANE_CAPACITY,
                                          DEFAULT_FREE_SPEED);
                self.add_link(from_id, to_id, connector);
            }
        }
        return centroid_no;
    }

    /// Logs the strongly connected components of the physical network.
    pub fn log_components(&self) -> usize {
        let mut graph = DiGraphMap::new();
        for node in &self.nodes {
            if !node.is_centroid {
                graph.add_node(node.no);
            }
        }
        for link in &self.links {
            if !link.is_connector() {
                graph.add_edge(link.from_node_no, link.to_node_no, ());
            }
        }
        let comps = kosaraju_scc(&graph);
        if comps.len() > 1 {
            log::warn!("there are {} strongly connected components", comps.len());
            for comp in &comps {
                if comp.len() < 10 {
                    let ids: Vec<&str> = comp.iter().map(|nn| self.nodes[*nn].id.as_str()).
                        collect();
                    log::debug!("component has nodes: {:?}", ids);
                }
            }
        } else {
            log::info!("the network is strongly connected");
        }
        return comps.len();
    }

    pub fn num_nodes(&self) -> usize {
        return self.nodes.len();
    }

    pub fn num_links(&self) -> usize {
        return self.links.len();
    }

    pub fn num_zones(&self) -> usize {
        return self.zones.len();
    }

    pub fn num_periods(&self) -> usize {
        return self.num_periods;
    }

    pub fn nodes(&self) -> &Vec<Node> {
        return &self.nodes;
    }

    pub fn links(&self) -> &Vec<Link> {
        return &self.links;
    }

    pub fn links_mut(&mut self) -> &mut Vec<Link> {
        return &mut self.links;
    }

    pub fn zones(&self) -> &Vec<Zone> {
        return &self.zones;
    }

    pub fn zones_mut(&mut self) -> &mut Vec<Zone> {
        return &mut self.zones;
    }

    pub fn get_node_idx_by_id(&self, id: &str) -> Option<usize> {
        return self.node_idxs_by_id.get(id).copied();
    }

    pub fn get_link_idx_by_id(&self, id: &str) -> Option<usize> {
        return self.link_idxs_by_id.get(id).copied();
    }

    pub fn get_zone_idx_by_id(&self, id: &str) -> Option<usize> {
        return self.zone_idxs_by_id.get(id).copied();
    }
}

fn link_from_row(row: &Row, length_unit: LengthUnit, speed_unit: SpeedUnit) -> Option<Link> {
    let link_id = match config_utils::get_field(row, "link_id") {
        Some(link_id) => link_id,
        None => {
            log::warn!("skipping a link with no link_id");
            return None;
        }
    };
    let length = match config_utils::get_f64_field(row, "length") {
        Some(length) if length >= 0. => length_unit.to_miles(length),
        _ => {
            log::warn!("link {} has no valid length, skipping it", link_id);
            return None;
        }
    };
    let lanes = config_utils::get_u32_field(row, "lanes").unwrap_or(DEFAULT_LANES);
    let free_speed = config_utils::get_f64_field(row, "free_speed").
        map(|ss| speed_unit.to_mph(ss)).unwrap_or(DEFAULT_FREE_SPEED);
    let lane_capacity = config_utils::get_f64_field(row, "capacity").
        unwrap_or(DEFAULT_LANE_CAPACITY);
    let alpha = config_utils::get_f64_field(row, "VDF_alpha1").
        or(config_utils::get_f64_field(row, "VDF_alpha")).unwrap_or(DEFAULT_VDF_ALPHA);
    let beta = config_utils::get_f64_field(row, "VDF_beta1").
        or(config_utils::get_f64_field(row, "VDF_beta")).unwrap_or(DEFAULT_VDF_BETA);
    let toll = config_utils::get_f64_field(row, "toll").unwrap_or(0.);

    let link = Link::new(link_id, length, lanes, lane_capacity, free_speed).
        with_vdf(alpha, beta).with_toll(toll);
    return Some(link);
}


/// Counts, for each zone, the links leaving and entering its nodes.  Demand between zones that
/// can't be left or entered is never loaded.
pub struct ZoneConnectivity {
    outgoing: Vec<usize>,
    incoming: Vec<usize>,
}

impl ZoneConnectivity {
    pub fn from_network(network: &Network) -> ZoneConnectivity {
        let mut outgoing = vec![0; network.num_zones()];
        let mut incoming = vec![0; network.num_zones()];
        for zone in network.zones() {
            for node_no in &zone.nodes {
                let node = &network.nodes()[*node_no];
                outgoing[zone.no] += node.outgoing_links.iter().
                    filter(|ll| !network.links()[**ll].is_connector()).count();
                incoming[zone.no] += node.incoming_links.iter().
                    filter(|ll| !network.links()[**ll].is_connector()).count();
            }
        }
        return ZoneConnectivity {outgoing, incoming};
    }

    pub fn are_od_connected(&self, orig_zone: usize, dest_zone: usize) -> bool {
        let has_out = self.outgoing.get(orig_zone).map_or(false, |cc| *cc > 0);
        let has_in = self.incoming.get(dest_zone).map_or(false, |cc| *cc > 0);
        return has_out && has_in;
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    #[test]
    fn test_units() {
        assert_eq!("KM".parse::<LengthUnit>(), Ok(LengthUnit::Kilometer));
        assert_eq!("meter".parse::<LengthUnit>(), Ok(LengthUnit::Meter));
        assert!("furlong".parse::<LengthUnit>().is_err());
        assert_eq!("kph".parse::<SpeedUnit>(), Ok(SpeedUnit::Kmh));
        assert_eq!(LengthUnit::Meter.to_miles(1609.), 1.);
        assert_relative_eq!(SpeedUnit::Kmh.to_mph(1.609 * 30.), 30.);
    }

    #[test]
    fn test_add_links() {
        let mut network = Network::new(2);
        assert_eq!(network.add_node("1", Some("10")), Some(0));
        assert_eq!(network.add_node("2", None), Some(1));
        assert_eq!(network.add_node("1", None), None);
        let link = Link::new("a", 2., 2, 1000., 30.);
        assert_eq!(network.add_link("1", "2", link.clone()), Some(0));
        assert_eq!(network.add_link("1", "2", link.clone()), None);
        assert_eq!(network.add_link("1", "7", Link::new("b", 1., 1, 1., 1.)), None);

        let ll = &network.links()[0];
        assert_eq!(ll.capacity, 2000.);
        assert_eq!(ll.fftt, 4.);
        assert_eq!(ll.travel_time(1), 4.);
        assert_eq!(ll.flow_volume(1), 0.);
        assert_eq!(network.nodes()[0].outgoing_links, vec![0]);
        assert_eq!(network.nodes()[1].incoming_links, vec![0]);
    }

    #[test]
    fn test_setup_centroids() {
        let mut network = Network::new(1);
        network.add_node("1", Some("A"));
        network.add_node("2", Some("B"));
        network.add_node("3", Some("B"));
        network.add_node("4", None);
        network.add_link("1", "2", Link::new("12", 1., 1, 100., 60.));
        network.add_link("1", "3", Link::new("13", 1., 1, 100., 60.));
        network.setup_centroids();

        assert_eq!(network.num_zones(), 2);
        let zone_a = network.zones()[network.get_zone_idx_by_id("A").unwrap()].clone();
        assert_eq!(zone_a.centroid, 0);
        let zone_b = network.zones()[network.get_zone_idx_by_id("B").unwrap()].clone();
        assert_eq!(zone_b.nodes, vec![1, 2]);
        let centroid = &network.nodes()[zone_b.centroid];
        assert!(centroid.is_centroid);
        assert_eq!(centroid.outgoing_links.len(), 2);
        assert_eq!(centroid.incoming_links.len(), 2);
        // physical links come first
        assert_eq!(network.num_links(), 6);
        for link in &network.links()[2..] {
            assert!(link.is_connector());
            assert_eq!(link.fftt, 0.);
        }

        // a second call rebuilds the same zones without new connectors
        network.setup_centroids();
        assert_eq!(network.num_zones(), 2);
        assert_eq!(network.num_links(), 6);

        let conn = ZoneConnectivity::from_network(&network);
        assert!(conn.are_od_connected(zone_a.no, zone_b.no));
        assert!(!conn.are_od_connected(zone_b.no, zone_a.no));
    }

    #[test]
    fn test_from_csv() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let nodes = "node_id,zone_id,x_coord\n1,1,0\n2,,1\n2,,1\n3,2,2\n";
        let links = "link_id,from_node_id,to_node_id,length,lanes,free_speed,capacity,\
                     VDF_alpha1,VDF_beta1,toll\n\
                     12,1,2,1000,2,50,,0.2,,\n\
                     23,2,3,2000,1,,1000,,5,1.5\n\
                     34,3,4,1000,1,50,1000,,,\n\
                     31,3,1,,1,50,1000,,,\n";
        File::create(dir.path().join("node.csv"))?.write_all(nodes.as_bytes())?;
        File::create(dir.path().join("link.csv"))?.write_all(links.as_bytes())?;

        let network = Network::from_csv(dir.path(), 1, LengthUnit::Meter, SpeedUnit::Kmh)?;
        assert_eq!(network.num_nodes(), 3);
        assert_eq!(network.num_links(), 2);
        assert_eq!(network.num_zones(), 2);

        let l12 = &network.links()[network.get_link_idx_by_id("12").unwrap()];
        assert_relative_eq!(l12.length, 1000. / 1609.);
        assert_relative_eq!(l12.free_speed, 50. / 1.609);
        assert_eq!(l12.capacity, 2. * 1999.);
        assert_eq!(l12.vdf_alpha, 0.2);
        assert_eq!(l12.vdf_beta, 4.);
        let l23 = &network.links()[network.get_link_idx_by_id("23").unwrap()];
        assert_eq!(l23.free_speed, 60.);
        assert_eq!(l23.vdf_beta, 5.);
        assert_eq!(l23.toll, 1.5);
        Ok(())
    }

    #[test]
    fn test_from_csv_without_zones() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        File::create(dir.path().join("node.csv"))?.write_all(b"node_id,zone_id\n1,\n2,\n")?;
        File::create(dir.path().join("link.csv"))?.
            write_all(b"link_id,from_node_id,to_node_id,length\n1,1,2,1\n")?;
        let result = Network::from_csv(dir.path(), 1, LengthUnit::Mile, SpeedUnit::Mph);
        assert!(result.is_err());
        Ok(())
    }
}
