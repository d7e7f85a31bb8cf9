pub mod config;
pub mod error;
pub mod text;
pub mod types;

pub use config::Config;
pub use error::DemandScoutError;
pub use types::{
    Cluster, ClusterSummary, DemandCandidate, Evidence, NormalizedItem, PostOutcome,
    PostingRecord, PostingStatus, RawItem, Verdict,
};
