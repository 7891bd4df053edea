// imports of other modules from this crate
mod error;
pub use error::AssignmentError;

mod config_utils;

mod settings;
pub use settings::{AgentSettings, AssignmentSettings, DemandFileSettings, PeriodSettings};

mod network;
pub use network::{LengthUnit, Link, Network, Node, SpeedUnit, Zone, ZoneConnectivity};

mod cost_model;
pub use cost_model::bpr_travel_time;

mod shortest_path;
pub use shortest_path::{single_source_shortest_path, ForwardStar, ShortestPathAlgorithm,
                        ShortestPathTree};

mod column_pool;
pub use column_pool::{Column, ColumnKey, ColumnPool, ColumnVec};

mod demand;
pub use demand::{read_demand, AgentType, DemandPeriod, DemandSummary};

mod sub_network;
pub use sub_network::SubNetwork;

mod assignment;
pub use assignment::{Assignment, AssignmentMode, ShortestPathResult};

mod colgen;
pub use colgen::{find_ue, update_link_and_column_volume, ColumnGenerationReport};

mod frank_wolfe;
pub use frank_wolfe::{find_ue_fw, FrankWolfeOptions, FrankWolfeReport};

mod io;
pub use io::{load_columns, output_columns, output_link_performance};

#[cfg(test)]
mod test_utils;


/// Label given to nodes the shortest-path search never reaches.  It must exceed any realizable
/// path cost.
pub const MAX_LABEL_COST: f64 = 2147483647.0;
/// Floor for any denominator that could otherwise be zero.
pub const EPSILON: f64 = 0.00001;
/// OD pairs with less demand than this are never assigned.
pub const MIN_OD_VOL: f64 = 0.000001;
