use thiserror::Error;


/// Errors that reject a run before any assignment loop starts.  Problems with individual data
/// records are logged and skipped instead of surfacing here.
#[derive(Error, Debug, PartialEq)]
pub enum AssignmentError {
    #[error("invalid assignment mode '{0}': choose column_generation or frank_wolfe")]
    InvalidMode(String),
    #[error("invalid shortest path algorithm '{0}': choose fifo, deque, or dijkstra")]
    InvalidShortestPathAlgorithm(String),
    #[error("{name} must be non-negative, but got {value}")]
    NegativeIterations{name: String, value: i64},
    #[error("invalid {kind} unit '{unit}'")]
    InvalidUnit{kind: String, unit: String},
    #[error("agent type '{0}' is not defined in the settings")]
    UnknownAgentType(String),
    #[error("demand period '{0}' is not defined in the settings")]
    UnknownDemandPeriod(String),
    #[error("invalid settings: {0}")]
    InvalidSettings(String),
    #[error("there are no valid zones in the node table")]
    MissingZones,
    #[error("node id {0} is not in the network")]
    UnknownNode(String),
    #[error("zone id {0} is not in the network")]
    UnknownZone(String),
}
