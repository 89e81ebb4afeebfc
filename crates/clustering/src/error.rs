use formats::{PointListError, RegionCollectionError};

#[derive(Debug, Clone, PartialEq)]
pub enum ClusterError {
    /// Region input is not a usable polygon/multipolygon collection.
    Data(String),
    /// A region name that the current region index does not know.
    UnknownRegion(String),
    InvalidViewport(String),
    /// A strategy produced output that breaks the partition contract.
    InvariantViolation(String),
    Config(String),
}

impl std::fmt::Display for ClusterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterError::Data(reason) => write!(f, "data error: {reason}"),
            ClusterError::UnknownRegion(name) => write!(f, "unknown region: {name}"),
            ClusterError::InvalidViewport(reason) => write!(f, "invalid viewport: {reason}"),
            ClusterError::InvariantViolation(reason) => {
                write!(f, "cluster invariant violated: {reason}")
            }
            ClusterError::Config(reason) => write!(f, "invalid configuration: {reason}"),
        }
    }
}

impl std::error::Error for ClusterError {}

impl From<RegionCollectionError> for ClusterError {
    fn from(e: RegionCollectionError) -> Self {
        ClusterError::Data(e.to_string())
    }
}

impl From<PointListError> for ClusterError {
    fn from(e: PointListError) -> Self {
        ClusterError::Data(e.to_string())
    }
}
