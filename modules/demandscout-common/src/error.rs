use thiserror::Error;

#[derive(Error, Debug)]
pub enum DemandScoutError {
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("Judge error: {0}")]
    Judge(String),

    #[error("Posting error: {0}")]
    Posting(String),

    #[error("Posting ledger error: {0}")]
    Ledger(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
