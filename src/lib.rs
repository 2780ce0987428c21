pub mod config;
pub mod core;
pub mod hist;
pub mod lumi;
pub mod mask;
pub mod nanoaod;
pub mod report;
pub mod storage;

pub mod efficiency_cmd;
pub mod flatten_cmd;
pub mod merge_cmd;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TnpError {
    #[error("{0}")]
    Message(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{context}: {source}")]
    Csv {
        context: String,
        #[source]
        source: csv::Error,
    },
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl TnpError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        TnpError::Io { context: context.into(), source }
    }

    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        TnpError::Json { context: context.into(), source }
    }

    pub fn csv(context: impl Into<String>, source: csv::Error) -> Self {
        TnpError::Csv { context: context.into(), source }
    }
}

pub type TnpResult<T> = Result<T, TnpError>;

// Shared helpers
pub fn sha256_hex(bytes: &[u8]) -> String {
    use sha256::digest;
    digest(bytes)
}

pub fn now_string() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "".to_string())
}

/// Read a whole file, tagging the error with what it was for.
pub fn read_input(path: &std::path::Path, what: &str) -> TnpResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| TnpError::io(format!("failed to read {what} {}", path.display()), e))
}
