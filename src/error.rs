use link_control::LinkError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("cannot open replay log {path}: {source}")]
    Log {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("replay task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LeaseError {
    #[error("interface {0} is already held by another impairment controller")]
    InterfaceBusy(String),
}

#[derive(Error, Debug)]
pub enum SequencerError {
    #[error("interface {0} does not exist")]
    InterfaceMissing(String),

    #[error("no connectivity to {target} via {interface} before the scenario started")]
    NoInitialConnectivity { interface: String, target: String },

    #[error(transparent)]
    Lease(#[from] LeaseError),

    #[error("link control failed: {0}")]
    Link(#[from] LinkError),
}
