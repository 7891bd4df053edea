use std::collections::BTreeMap;

use ndarray::prelude::*;

use super::AgentType;
use super::ColumnPool;
use super::DemandPeriod;
use super::Link;
use super::MIN_OD_VOL;


/// The network as seen by one traveller class in one demand period: a private cost for every
/// link, and the OD pairs of that class and period that carry demand.
#[derive(Clone, Debug)]
pub struct SubNetwork {
    agent_type: usize,
    demand_period: usize,
    vot: f64,
    pce: f64,
    link_costs: Array1<f64>,
    // origin zone -> destination zones, both sorted
    od_pairs: BTreeMap<usize, Vec<usize>>,
}

impl SubNetwork {
    pub fn new(agent_type: &AgentType, demand_period: &DemandPeriod, links: &Vec<Link>,
               pool: &ColumnPool) -> SubNetwork {
        let mut od_pairs: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (key, cv) in pool.iter() {
            if key.agent_type != agent_type.no || key.demand_period != demand_period.no {
                continue;
            }
            if cv.od_volume() <= MIN_OD_VOL {
                continue;
            }
            od_pairs.entry(key.orig_zone).or_insert(vec![]).push(key.dest_zone);
        }
        for dests in od_pairs.values_mut() {
            dests.sort();
        }

        let mut spn = SubNetwork {
            agent_type: agent_type.no,
            demand_period: demand_period.no,
            vot: agent_type.vot,
            pce: agent_type.pce,
            link_costs: Array1::zeros(links.len()),
            od_pairs,
        };
        spn.update_link_costs(links);
        return spn;
    }

    /// Sets each link's cost to its generalized cost in this period for this class.
    pub fn update_link_costs(&mut self, links: &Vec<Link>) {
        for link in links {
            self.link_costs[link.no] = link.generalized_cost(self.demand_period, self.vot);
        }
    }

    pub fn agent_type(&self) -> usize {
        return self.agent_type;
    }

    pub fn demand_period(&self) -> usize {
        return self.demand_period;
    }

    pub fn vot(&self) -> f64 {
        return self.vot;
    }

    pub fn pce(&self) -> f64 {
        return self.pce;
    }

    pub fn link_costs(&self) -> &Array1<f64> {
        return &self.link_costs;
    }

    /// Zones that send demand in this sub-network, in ascending order.
    pub fn orig_zones(&self) -> Vec<usize> {
        return self.od_pairs.keys().cloned().collect();
    }

    pub fn dest_zones(&self, orig_zone: usize) -> &[usize] {
        match self.od_pairs.get(&orig_zone) {
            Some(dests) => dests,
            None => &[],
        }
    }
}
