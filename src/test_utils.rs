use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt::Debug;

use petgraph::algo::all_simple_paths;
use petgraph::graph::DiGraph;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use rand::Rng;
use rand_isaac::Isaac64Rng;

use super::AgentType;
use super::Assignment;
use super::DemandPeriod;
use super::Link;
use super::Network;
use super::ShortestPathAlgorithm;


/// Checks that the contents of two hashmaps are the same.
pub fn compare_hashmaps<KK, VV>(query_map: &HashMap<KK, VV>, true_map: &HashMap<KK, VV>)
    where KK: Debug + Eq + std::hash::Hash,
    VV: Debug + PartialEq,
{
    assert_eq!(query_map.len(), true_map.len());

    for (true_key, true_val) in true_map {
        match query_map.get(true_key) {
            Some(val) => assert_eq!(val, true_val),
            None => assert!(false, "Key {:?} missing!", true_key),
        }
    }
}

/// Two parallel routes between zone "1" (node o) and zone "2" (node d):
///
///       5       5
///   o ----> a ----> d
///   |               ^
///   +-----> b ------+
///      7.5     7.5
///
/// Link costs are free-flow minutes; every link has capacity 50 and BPR 0.15 / 4.
pub fn diamond_network(num_periods: usize) -> Network {
    let mut network = Network::new(num_periods);
    network.add_node("o", Some("1"));
    network.add_node("a", None);
    network.add_node("b", None);
    network.add_node("d", Some("2"));
    for (id, from, to, length) in &[("oa", "o", "a", 5.), ("ad", "a", "d", 5.),
                                    ("ob", "o", "b", 7.5), ("bd", "b", "d", 7.5)] {
        let link = Link::new(id, *length, 1, 50., 60.).with_vdf(0.15, 4.);
        network.add_link(from, to, link);
    }
    network.setup_centroids();
    return network;
}

/// The diamond network with one auto class, one period, and `demand` trips from zone 1 to 2.
pub fn diamond_assignment(demand: f64, sp_algorithm: ShortestPathAlgorithm) -> Assignment {
    return tolled_diamond_assignment(demand, 0., sp_algorithm);
}

/// Same as `diamond_assignment`, with `toll` dollars on link oa.  The class's value of time is
/// $10/hour, so each dollar adds 6 minutes.
pub fn tolled_diamond_assignment(demand: f64, toll: f64, sp_algorithm: ShortestPathAlgorithm)
                                 -> Assignment {
    let agent_types = vec![AgentType::new(0, "a", 10., 1.)];
    let demand_periods = vec![DemandPeriod::new(0, "AM", "0700_0800")];
    let mut network = diamond_network(1);
    let tolled = network.links()[0].clone().with_toll(toll);
    network.links_mut()[0] = tolled;
    let mut assignment = Assignment::new(network, agent_types, demand_periods, sp_algorithm);
    if demand > 0. {
        assignment.add_demand("a", "AM", "1", "2", demand).unwrap();
    }
    return assignment;
}

/// Random directed edges without self-loops or parallel edges.  About a tenth of the costs are
/// exactly zero.
pub fn random_graph_edges(num_nodes: usize, num_edges: usize, rng: &mut Isaac64Rng)
                          -> Vec<(usize, usize, f64)> {
    let num_edges = num_edges.min(num_nodes * (num_nodes - 1));
    let mut seen = HashSet::new();
    let mut edges = vec![];
    while edges.len() < num_edges {
        let from = rng.gen_range(0..num_nodes);
        let to = rng.gen_range(0..num_nodes);
        if from == to || seen.contains(&(from, to)) {
            continue;
        }
        seen.insert((from, to));
        let cost = if rng.gen::<f64>() < 0.1 { 0. } else { rng.gen_range(0.1..10.) };
        edges.push((from, to, cost));
    }
    return edges;
}

/// Shortest-path labels found by enumerating every simple path.  None for unreachable nodes.
pub fn brute_force_labels(num_nodes: usize, edges: &[(usize, usize, f64)], origin: usize)
                          -> Vec<Option<f64>> {
    let mut graph: DiGraph<(), f64> = DiGraph::new();
    let node_idxs: Vec<NodeIndex> = (0..num_nodes).map(|_| graph.add_node(())).collect();
    for (from, to, cost) in edges {
        graph.add_edge(node_idxs[*from], node_idxs[*to], *cost);
    }

    let mut labels = vec![None; num_nodes];
    labels[origin] = Some(0.);
    for dest in 0..num_nodes {
        if dest == origin {
            continue;
        }
        let paths = all_simple_paths::<Vec<NodeIndex>, _>(&graph, node_idxs[origin],
                                                           node_idxs[dest], 0, None);
        for path in paths {
            let cost: f64 = path.windows(2).map(|ww| {
                graph.edges_connecting(ww[0], ww[1]).map(|ee| *ee.weight()).
                    fold(f64::INFINITY, f64::min)
            }).sum();
            labels[dest] = match labels[dest] {
                Some(best) if best <= cost => Some(best),
                _ => Some(cost),
            };
        }
    }
    return labels;
}
