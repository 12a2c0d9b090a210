use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("API_KEY environment variable is not set")]
    MissingApiKey,
    #[error("failed to load .env file: {0}")]
    DotEnv(#[from] dotenvy::Error),
    #[error("failed to walk source tree: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("failed to read source {path}: {source}")]
    SourceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no .{extension} files found under {root}")]
    NoSources { root: PathBuf, extension: String },
    #[error("request to the translation service failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("translation service returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("malformed response chunk: {0}")]
    MalformedChunk(#[from] serde_json::Error),
    #[error("failed to read response stream: {0}")]
    StreamIo(#[source] std::io::Error),
    #[error("failed to write {path}: {source}")]
    OutputIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to start {tool}: {source}")]
    ToolSpawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} failed with {}", describe_code(.code))]
    ToolFailed { tool: String, code: Option<i32> },
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "a signal".into(),
    }
}
