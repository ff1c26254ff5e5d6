use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A column the filter needs is missing under every accepted spelling.
    #[error("archive {archive}: missing column {column}")]
    Schema { archive: String, column: String },
    /// Download, extraction or read failure for a single archive.
    #[error("archive {archive}: failed to fetch: {source}")]
    Fetch {
        archive: String,
        #[source]
        source: io::Error,
    },
    /// A worker panicked while processing a single archive.
    #[error("archive {archive}: worker panicked: {message}")]
    Panic { archive: String, message: String },
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid boundary {name}: {reason}")]
    Boundary { name: String, reason: String },
    #[error("no sink registered for boundary {boundary}")]
    UnknownBoundary { boundary: String },
    #[error("sink queue for boundary {boundary} is closed")]
    SinkClosed { boundary: String },
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("invalid configuration: {0}")]
    Config(String),
}
