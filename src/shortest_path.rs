use std::cmp::Ordering;
use std::collections::VecDeque;
use std::str::FromStr;

use ndarray::prelude::*;
use priority_queue::PriorityQueue;

use super::AssignmentError;
use super::Network;
use super::MAX_LABEL_COST;


/// Which worklist discipline the label-correcting search uses.  All three give the same labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShortestPathAlgorithm {
    /// re-insert improved nodes at the back of a FIFO queue
    Fifo,
    /// nodes that were scanned before go to the front of the deque, new ones to the back
    Deque,
    /// label-setting search with a binary heap; every node is settled exactly once
    Dijkstra,
}

impl Default for ShortestPathAlgorithm {
    fn default() -> ShortestPathAlgorithm {
        return ShortestPathAlgorithm::Deque;
    }
}

impl FromStr for ShortestPathAlgorithm {
    type Err = AssignmentError;

    fn from_str(name: &str) -> Result<ShortestPathAlgorithm, AssignmentError> {
        match name.to_lowercase().as_str() {
            "fifo" => Ok(ShortestPathAlgorithm::Fifo),
            "deque" => Ok(ShortestPathAlgorithm::Deque),
            "dijkstra" | "heap" => Ok(ShortestPathAlgorithm::Dijkstra),
            _ => Err(AssignmentError::InvalidShortestPathAlgorithm(name.to_string())),
        }
    }
}


/// A forward-star view of the network's topology.  Outgoing links of each node are stored
/// contiguously, so the search never touches the `Link` structs themselves.
#[derive(Clone, Debug)]
pub struct ForwardStar {
    first_link: Vec<usize>,
    link_nos: Vec<usize>,
    to_nodes: Vec<usize>,
    thru_blocked: Vec<bool>,
}

impl ForwardStar {
    /// `links[ii]` gives the (from, to) nodes of link `ii`.
    pub fn new(num_nodes: usize, links: &[(usize, usize)]) -> ForwardStar {
        let mut counts = vec![0; num_nodes + 1];
        for (from, _) in links {
            counts[*from + 1] += 1;
        }
        for ii in 0..num_nodes {
            counts[ii + 1] += counts[ii];
        }
        let first_link = counts.clone();
        let mut link_nos = vec![0; links.len()];
        let mut to_nodes = vec![0; links.len()];
        let mut next_slot = counts;
        for (link_no, (from, to)) in links.iter().enumerate() {
            let slot = next_slot[*from];
            link_nos[slot] = link_no;
            to_nodes[slot] = *to;
            next_slot[*from] += 1;
        }
        return ForwardStar {
            first_link,
            link_nos,
            to_nodes,
            thru_blocked: vec![false; num_nodes],
        };
    }

    /// Synthetic zone centroids are blocked, so that paths can only start or end at them.
    pub fn from_network(network: &Network) -> ForwardStar {
        let links: Vec<(usize, usize)> = network.links().iter().
            map(|ll| (ll.from_node_no, ll.to_node_no)).collect();
        let mut graph = ForwardStar::new(network.num_nodes(), &links);
        for node in network.nodes() {
            if node.is_centroid {
                graph.block_thru_traffic(node.no);
            }
        }
        return graph;
    }

    /// Stops the search from scanning out of `node` unless the search starts there.
    pub fn block_thru_traffic(&mut self, node: usize) {
        self.thru_blocked[node] = true;
    }

    pub fn num_nodes(&self) -> usize {
        return self.thru_blocked.len();
    }

    pub fn num_links(&self) -> usize {
        return self.link_nos.len();
    }

    fn outgoing(&self, node: usize) -> impl Iterator<Item = (usize, usize)> + '_ {
        let range = self.first_link[node]..self.first_link[node + 1];
        return self.link_nos[range.clone()].iter().cloned().
            zip(self.to_nodes[range].iter().cloned());
    }
}


/// Labels and predecessors from one origin to every node.  Unreachable nodes keep
/// MAX_LABEL_COST and have no predecessor.
#[derive(Clone, Debug)]
pub struct ShortestPathTree {
    pub origin: usize,
    pub labels: Array1<f64>,
    pub node_preds: Vec<Option<usize>>,
    pub link_preds: Vec<Option<usize>>,
}

impl ShortestPathTree {
    fn new(num_nodes: usize, origin: usize) -> ShortestPathTree {
        let mut labels = Array1::from_elem(num_nodes, MAX_LABEL_COST);
        labels[origin] = 0.;
        return ShortestPathTree {
            origin,
            labels,
            node_preds: vec![None; num_nodes],
            link_preds: vec![None; num_nodes],
        };
    }

    pub fn is_reachable(&self, node: usize) -> bool {
        return self.labels[node] < MAX_LABEL_COST;
    }

    /// The links from the origin to `dest`, in travel order.  Empty when `dest` is the origin
    /// or can't be reached.
    pub fn link_path_to(&self, dest: usize) -> Vec<usize> {
        let mut path = vec![];
        let mut node = dest;
        while let Some(link) = self.link_preds[node] {
            path.push(link);
            match self.node_preds[node] {
                Some(pred) => node = pred,
                None => break,
            }
        }
        path.reverse();
        return path;
    }

    /// The nodes from the origin to `dest` in travel order, including both ends.
    pub fn node_path_to(&self, dest: usize) -> Vec<usize> {
        if !self.is_reachable(dest) {
            return vec![];
        }
        let mut path = vec![dest];
        let mut node = dest;
        while let Some(pred) = self.node_preds[node] {
            path.push(pred);
            node = pred;
        }
        path.reverse();
        return path;
    }
}


/// Computes minimum-cost labels from `origin` over `link_costs`, which must be non-negative.
pub fn single_source_shortest_path(graph: &ForwardStar, link_costs: &Array1<f64>,
                                   origin: usize, algorithm: ShortestPathAlgorithm)
                                   -> ShortestPathTree {
    let mut tree = ShortestPathTree::new(graph.num_nodes(), origin);
    match algorithm {
        ShortestPathAlgorithm::Fifo => label_correcting(graph, link_costs, &mut tree, false),
        ShortestPathAlgorithm::Deque => label_correcting(graph, link_costs, &mut tree, true),
        ShortestPathAlgorithm::Dijkstra => heap_dijkstra(graph, link_costs, &mut tree),
    }
    return tree;
}

#[derive(Clone, Copy, PartialEq)]
enum ScanStatus {
    Unvisited,
    Queued,
    Scanned,
}

fn label_correcting(graph: &ForwardStar, link_costs: &Array1<f64>, tree: &mut ShortestPathTree,
                    front_for_rescans: bool) {
    let mut status = vec![ScanStatus::Unvisited; graph.num_nodes()];
    let mut queue = VecDeque::new();
    queue.push_back(tree.origin);
    status[tree.origin] = ScanStatus::Queued;

    while let Some(node) = queue.pop_front() {
        status[node] = ScanStatus::Scanned;
        if node != tree.origin && graph.thru_blocked[node] {
            continue;
        }
        let node_label = tree.labels[node];
        for (link, next) in graph.outgoing(node) {
            let new_label = node_label + link_costs[link];
            if new_label < tree.labels[next] {
                tree.labels[next] = new_label;
                tree.node_preds[next] = Some(node);
                tree.link_preds[next] = Some(link);
                match status[next] {
                    ScanStatus::Queued => (),
                    ScanStatus::Scanned if front_for_rescans => queue.push_front(next),
                    _ => queue.push_back(next),
                }
                status[next] = ScanStatus::Queued;
            }
        }
    }
}


#[derive(Clone, Debug)]
struct BHeapNode {
    node: usize,
    label: f64,
}

impl BHeapNode {
    fn new(node: usize, label: f64) -> BHeapNode {
        return BHeapNode{node, label};
    }
}

impl Ord for BHeapNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // reverse the ordering so the priority queue pops the smallest label first
        if self.label < other.label {
            return Ordering::Greater;
        }
        else if self.label > other.label {
            return Ordering::Less;
        }
        else {
            return other.node.cmp(&self.node);
        }
    }
}

// Implementing Ord requires all of the below traits
impl PartialOrd for BHeapNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        return Some(self.cmp(other));
    }
}

impl PartialEq for BHeapNode {
    fn eq(&self, other: &Self) -> bool {
        return self.cmp(other) == Ordering::Equal;
    }
}

impl Eq for BHeapNode{}

fn heap_dijkstra(graph: &ForwardStar, link_costs: &Array1<f64>, tree: &mut ShortestPathTree) {
    let mut settled = vec![false; graph.num_nodes()];
    let mut label_pqueue = PriorityQueue::new();
    label_pqueue.push(tree.origin, BHeapNode::new(tree.origin, 0.));

    while let Some((node, _)) = label_pqueue.pop() {
        settled[node] = true;
        if node != tree.origin && graph.thru_blocked[node] {
            continue;
        }
        let node_label = tree.labels[node];
        for (link, next) in graph.outgoing(node) {
            if settled[next] {
                continue;
            }
            let new_label = node_label + link_costs[link];
            if new_label < tree.labels[next] {
                tree.labels[next] = new_label;
                tree.node_preds[next] = Some(node);
                tree.link_preds[next] = Some(link);
                let new_pq_node = BHeapNode::new(next, new_label);
                // update the priority if it's in the queue, or insert it if not
                if let None = label_pqueue.change_priority(&next, new_pq_node.clone()) {
                    label_pqueue.push(next, new_pq_node);
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand_isaac::Isaac64Rng;
    use crate::test_utils;

    static ALGORITHMS: [ShortestPathAlgorithm; 3] = [
        ShortestPathAlgorithm::Fifo,
        ShortestPathAlgorithm::Deque,
        ShortestPathAlgorithm::Dijkstra,
    ];

    fn graph_from_edges(num_nodes: usize, edges: &[(usize, usize, f64)])
                        -> (ForwardStar, Array1<f64>) {
        let links: Vec<(usize, usize)> = edges.iter().map(|(ff, tt, _)| (*ff, *tt)).collect();
        let costs: Array1<f64> = edges.iter().map(|(_, _, cc)| *cc).collect();
        return (ForwardStar::new(num_nodes, &links), costs);
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!("FIFO".parse::<ShortestPathAlgorithm>(), Ok(ShortestPathAlgorithm::Fifo));
        assert_eq!("heap".parse::<ShortestPathAlgorithm>(), Ok(ShortestPathAlgorithm::Dijkstra));
        assert!("bellman".parse::<ShortestPathAlgorithm>().is_err());
    }

    #[test]
    fn test_forward_star() {
        let graph = ForwardStar::new(4, &[(2, 3), (0, 1), (2, 0), (0, 2)]);
        assert_eq!(graph.num_nodes(), 4);
        assert_eq!(graph.num_links(), 4);
        let out0: Vec<(usize, usize)> = graph.outgoing(0).collect();
        assert_eq!(out0, vec![(1, 1), (3, 2)]);
        let out2: Vec<(usize, usize)> = graph.outgoing(2).collect();
        assert_eq!(out2, vec![(0, 3), (2, 0)]);
        assert_eq!(graph.outgoing(1).count(), 0);
        assert_eq!(graph.outgoing(3).count(), 0);
    }

    #[test]
    fn test_cyclic_graph() {
        // 0 ----> 1 ----> 4 ----> 5
        // ^       |       ^       |
        // |       v       |       v
        // 3 <---- 2       7 <---- 6
        let edges = [(0, 1, 1.), (1, 2, 2.), (2, 3, 1.), (3, 0, 1.), (1, 4, 6.), (4, 5, 1.),
                     (5, 6, 0.5), (6, 7, 1.), (7, 4, 1.), (2, 6, 1.5)];
        let (graph, costs) = graph_from_edges(8, &edges);
        let true_labels = [4., 0., 2., 3., 5.5, 6.5, 3.5, 4.5];
        for algo in &ALGORITHMS {
            let tree = single_source_shortest_path(&graph, &costs, 1, *algo);
            for (node, label) in true_labels.iter().enumerate() {
                assert_relative_eq!(tree.labels[node], *label);
            }
            assert_eq!(tree.node_path_to(4), vec![1, 2, 6, 7, 4]);
            assert_eq!(tree.link_path_to(4), vec![1, 9, 7, 8]);
            assert_eq!(tree.link_path_to(1), Vec::<usize>::new());
        }
    }

    #[test]
    fn test_dag() {
        let edges = [(0, 1, 2.), (0, 2, 1.), (2, 1, 0.5), (1, 3, 1.), (2, 3, 3.), (3, 4, 0.),
                     (1, 4, 4.)];
        let (graph, costs) = graph_from_edges(5, &edges);
        let true_labels = [0., 1.5, 1., 2.5, 2.5];
        for algo in &ALGORITHMS {
            let tree = single_source_shortest_path(&graph, &costs, 0, *algo);
            for (node, label) in true_labels.iter().enumerate() {
                assert_relative_eq!(tree.labels[node], *label);
            }
            assert_eq!(tree.node_preds[0], None);
            assert_eq!(tree.link_preds[1], Some(2));
        }
    }

    #[test]
    fn test_no_outgoing_links() {
        let (graph, costs) = graph_from_edges(3, &[(1, 0, 1.), (1, 2, 1.)]);
        for algo in &ALGORITHMS {
            let tree = single_source_shortest_path(&graph, &costs, 0, *algo);
            assert_eq!(tree.labels[0], 0.);
            assert_eq!(tree.labels[1], MAX_LABEL_COST);
            assert_eq!(tree.labels[2], MAX_LABEL_COST);
            assert!(!tree.is_reachable(2));
            assert!(tree.node_preds.iter().all(|pp| pp.is_none()));
            assert!(tree.link_path_to(2).is_empty());
            assert!(tree.node_path_to(2).is_empty());
        }
    }

    #[test]
    fn test_thru_blocked() {
        // the only route from 0 to 2 passes through 1
        let (mut graph, costs) = graph_from_edges(4, &[(0, 1, 1.), (1, 2, 1.), (3, 1, 1.)]);
        graph.block_thru_traffic(1);
        for algo in &ALGORITHMS {
            let tree = single_source_shortest_path(&graph, &costs, 0, *algo);
            assert_eq!(tree.labels[1], 1.);
            assert_eq!(tree.labels[2], MAX_LABEL_COST);
            // a blocked node is still a valid origin
            let tree = single_source_shortest_path(&graph, &costs, 1, *algo);
            assert_eq!(tree.labels[2], 1.);
        }
    }

    #[test]
    fn test_against_brute_force() {
        let mut rng = Isaac64Rng::seed_from_u64(1234);
        for _ in 0..20 {
            let edges = test_utils::random_graph_edges(6, 10, &mut rng);
            let (graph, costs) = graph_from_edges(6, &edges);
            for origin in 0..6 {
                let true_labels = test_utils::brute_force_labels(6, &edges, origin);
                for algo in &ALGORITHMS {
                    let tree = single_source_shortest_path(&graph, &costs, origin, *algo);
                    for node in 0..6 {
                        match true_labels[node] {
                            Some(label) => assert_relative_eq!(tree.labels[node], label,
                                                               epsilon=1e-9),
                            None => assert_eq!(tree.labels[node], MAX_LABEL_COST),
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_disciplines_agree_on_random_graphs() {
        let mut rng = Isaac64Rng::seed_from_u64(99);
        for _ in 0..10 {
            let edges = test_utils::random_graph_edges(30, 90, &mut rng);
            let (graph, costs) = graph_from_edges(30, &edges);
            for origin in 0..30 {
                let fifo = single_source_shortest_path(&graph, &costs, origin,
                                                       ShortestPathAlgorithm::Fifo);
                for algo in &ALGORITHMS[1..] {
                    let tree = single_source_shortest_path(&graph, &costs, origin, *algo);
                    for node in 0..30 {
                        assert_relative_eq!(tree.labels[node], fifo.labels[node], epsilon=1e-9);
                    }
                }
            }
        }
    }
}
