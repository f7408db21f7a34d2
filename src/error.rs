use std::path::PathBuf;

use thiserror::Error;

/// Reasons a call audit listing could not be loaded. Each one leaves the
/// table empty until the next fetch.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("could not reach the call audit service: {0}")]
    Network(#[source] reqwest::Error),

    #[error("call audit service returned HTTP {status}")]
    Status { status: u16 },

    #[error("unexpected call audit response: {0}")]
    Shape(String),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
