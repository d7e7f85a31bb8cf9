pub mod cluster;
pub mod extractor;
pub mod judge;
pub mod ledger;
pub mod normalizer;
pub mod pipeline;
pub mod poster;
pub mod report;
pub mod sources;
pub mod stats;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
