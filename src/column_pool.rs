use std::collections::hash_map::Entry::{Occupied, Vacant};
use std::collections::HashMap;

use super::Network;
use super::ShortestPathTree;


/// Identifies one OD pair of one traveller class in one demand period.  All four fields are
/// sequence numbers, not external ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnKey {
    pub agent_type: usize,
    pub demand_period: usize,
    pub orig_zone: usize,
    pub dest_zone: usize,
}

impl ColumnKey {
    pub fn new(agent_type: usize, demand_period: usize, orig_zone: usize, dest_zone: usize)
               -> ColumnKey {
        return ColumnKey {agent_type, demand_period, orig_zone, dest_zone};
    }
}


/// One path between an OD pair and the volume travelling on it.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    id: usize,
    volume: f64,
    links: Vec<usize>,
    nodes: Vec<usize>,
    distance: f64,
    toll: f64,
    travel_time: f64,
    gradient_cost: f64,
    gradient_cost_abs_diff: f64,
    gradient_cost_rel_diff: f64,
}

impl Column {
    fn new(id: usize, links: Vec<usize>, nodes: Vec<usize>, network: &Network) -> Column {
        let mut column = Column {
            id,
            volume: 0.,
            links,
            nodes,
            distance: 0.,
            toll: 0.,
            travel_time: 0.,
            gradient_cost: 0.,
            gradient_cost_abs_diff: 0.,
            gradient_cost_rel_diff: 0.,
        };
        for link_no in &column.links {
            let link = &network.links()[*link_no];
            column.distance += link.length;
            column.toll += link.toll;
            column.travel_time += link.fftt;
        }
        return column;
    }

    pub fn id(&self) -> usize {
        return self.id;
    }

    pub fn volume(&self) -> f64 {
        return self.volume;
    }

    pub(crate) fn set_volume(&mut self, volume: f64) {
        self.volume = volume;
    }

    /// link sequence numbers in travel order
    pub fn links(&self) -> &Vec<usize> {
        return &self.links;
    }

    /// node sequence numbers in travel order
    pub fn nodes(&self) -> &Vec<usize> {
        return &self.nodes;
    }

    pub fn distance(&self) -> f64 {
        return self.distance;
    }

    pub fn toll(&self) -> f64 {
        return self.toll;
    }

    pub fn travel_time(&self) -> f64 {
        return self.travel_time;
    }

    pub fn gradient_cost(&self) -> f64 {
        return self.gradient_cost;
    }

    pub fn set_gradient_cost(&mut self, cost: f64) {
        self.gradient_cost = cost;
    }

    pub fn gradient_cost_abs_diff(&self) -> f64 {
        return self.gradient_cost_abs_diff;
    }

    pub fn gradient_cost_rel_diff(&self) -> f64 {
        return self.gradient_cost_rel_diff;
    }

    pub(crate) fn set_gradient_diffs(&mut self, abs_diff: f64, rel_diff: f64) {
        self.gradient_cost_abs_diff = abs_diff;
        self.gradient_cost_rel_diff = rel_diff;
    }

    /// Recomputes travel time, toll and distance from the links' current state in period `tau`.
    pub(crate) fn refresh_attributes(&mut self, network: &Network, tau: usize) {
        self.travel_time = 0.;
        self.toll = 0.;
        self.distance = 0.;
        for link_no in &self.links {
            let link = &network.links()[*link_no];
            self.travel_time += link.travel_time(tau);
            self.toll += link.toll;
            self.distance += link.length;
        }
    }
}


/// All the columns of one OD pair, plus the pair's demand.
#[derive(Clone, Debug, Default)]
pub struct ColumnVec {
    od_vol: f64,
    route_fixed: bool,
    columns: Vec<Column>,
    column_idxs: HashMap<Vec<usize>, usize>,
}

impl ColumnVec {
    pub fn new() -> ColumnVec {
        return ColumnVec::default();
    }

    pub fn od_volume(&self) -> f64 {
        return self.od_vol;
    }

    pub fn increase_od_volume(&mut self, volume: f64) {
        self.od_vol += volume;
    }

    /// A route-fixed OD pair keeps its column volumes as given: it is neither generated for nor
    /// rebalanced.
    pub fn is_route_fixed(&self) -> bool {
        return self.route_fixed;
    }

    pub fn set_route_fixed(&mut self, route_fixed: bool) {
        self.route_fixed = route_fixed;
    }

    pub fn columns(&self) -> &Vec<Column> {
        return &self.columns;
    }

    pub fn columns_mut(&mut self) -> &mut Vec<Column> {
        return &mut self.columns;
    }

    pub fn num_columns(&self) -> usize {
        return self.columns.len();
    }

    pub fn total_column_volume(&self) -> f64 {
        return self.columns.iter().map(|cc| cc.volume).sum();
    }

    pub fn get_column_by_links(&self, links: &Vec<usize>) -> Option<&Column> {
        return self.column_idxs.get(links).map(|idx| &self.columns[*idx]);
    }

    /// Adds `volume` to the column following `links`, creating the column if this path is new.
    /// Returns the column's index in this vector.
    pub fn add_path_volume(&mut self, links: Vec<usize>, nodes: Vec<usize>, volume: f64,
                           network: &Network) -> usize {
        let idx = match self.column_idxs.entry(links) {
            Occupied(ent) => *ent.get(),
            Vacant(ent) => {
                let idx = self.columns.len();
                let column = Column::new(idx, ent.key().clone(), nodes, network);
                self.columns.push(column);
                ent.insert(idx);
                idx
            }
        };
        self.columns[idx].volume += volume;
        return idx;
    }
}


/// Maps every OD pair to its columns.  Entries are created when demand for the pair is first
/// seen.
#[derive(Clone, Debug, Default)]
pub struct ColumnPool {
    column_vecs: HashMap<ColumnKey, ColumnVec>,
}

impl ColumnPool {
    pub fn new() -> ColumnPool {
        return ColumnPool::default();
    }

    pub fn get(&self, key: &ColumnKey) -> Option<&ColumnVec> {
        return self.column_vecs.get(key);
    }

    pub fn get_mut(&mut self, key: &ColumnKey) -> Option<&mut ColumnVec> {
        return self.column_vecs.get_mut(key);
    }

    pub fn get_or_create(&mut self, key: ColumnKey) -> &mut ColumnVec {
        return self.column_vecs.entry(key).or_insert_with(ColumnVec::new);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ColumnKey, &ColumnVec)> {
        return self.column_vecs.iter();
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ColumnKey, &mut ColumnVec)> {
        return self.column_vecs.iter_mut();
    }

    /// All keys in ascending order, for deterministic output.
    pub fn sorted_keys(&self) -> Vec<ColumnKey> {
        let mut keys: Vec<ColumnKey> = self.column_vecs.keys().cloned().collect();
        keys.sort();
        return keys;
    }

    pub fn len(&self) -> usize {
        return self.column_vecs.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.column_vecs.is_empty();
    }

    pub fn num_columns(&self) -> usize {
        return self.column_vecs.values().map(|cv| cv.num_columns()).sum();
    }

    /// Follows `tree` back from `dest_node` to its origin and adds `volume` to the matching
    /// column of `key`.  Returns false, changing nothing, if there is no such path or no entry
    /// for `key`.
    pub fn add_path_from_tree(&mut self, key: ColumnKey, tree: &ShortestPathTree,
                              dest_node: usize, volume: f64, network: &Network) -> bool {
        let links = tree.link_path_to(dest_node);
        if links.is_empty() {
            return false;
        }
        let column_vec = match self.column_vecs.get_mut(&key) {
            Some(cv) => cv,
            None => return false,
        };
        let nodes = tree.node_path_to(dest_node);
        column_vec.add_path_volume(links, nodes, volume, network);
        return true;
    }
}
