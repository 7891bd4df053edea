use super::Link;
use super::EPSILON;


/// The BPR volume-delay function.  Zero capacity is floored at EPSILON rather than dividing by
/// zero, so an overloaded zero-capacity link just gets very slow.
pub fn bpr_travel_time(fftt: f64, volume: f64, capacity: f64, alpha: f64, beta: f64) -> f64 {
    return fftt * (1. + alpha * (volume / capacity.max(EPSILON)).powf(beta));
}

impl Link {
    /// Travel time in minutes this link would have carrying `volume`.
    pub fn travel_time_at(&self, volume: f64) -> f64 {
        if self.is_connector() {
            return 0.;
        }
        return bpr_travel_time(self.fftt, volume, self.capacity, self.vdf_alpha, self.vdf_beta);
    }

    pub fn update_travel_time(&mut self, tau: usize) {
        self.travel_time[tau] = self.travel_time_at(self.flow_vol[tau]);
    }

    /// The toll in minutes at the given value of time ($/hour).
    pub fn toll_cost(&self, vot: f64) -> f64 {
        return self.toll / vot.max(EPSILON) * 60.;
    }

    /// Travel time plus toll converted to minutes.
    pub fn generalized_cost(&self, tau: usize, vot: f64) -> f64 {
        return self.travel_time[tau] + self.toll_cost(vot);
    }

    /// Same as `generalized_cost`, but at free flow.
    pub fn free_flow_cost(&self, vot: f64) -> f64 {
        return self.fftt + self.toll_cost(vot);
    }
}

pub(crate) fn update_links_travel_time(links: &mut Vec<Link>, num_periods: usize) {
    for link in links.iter_mut() {
        for tau in 0..num_periods {
            link.update_travel_time(tau);
        }
    }
}

/// The derivative of the Beckmann objective along the direction from `flows` to `aux_flows`,
/// evaluated `step` of the way along it.  Connectors are left out.
///
/// Tolls are linear in the flows, so their share of the derivative doesn't depend on `step`
/// and is passed in as `toll_derivative`.
pub(crate) fn directional_derivative(links: &Vec<Link>, flows: &[f64], aux_flows: &[f64],
                                     toll_derivative: f64, step: f64) -> f64 {
    let mut derivative = toll_derivative;
    for link in links {
        if link.is_connector() {
            continue;
        }
        let flow = flows[link.no];
        let diff = aux_flows[link.no] - flow;
        derivative += link.travel_time_at(flow + step * diff) * diff;
    }
    return derivative;
}
