// SPDX-License-Identifier: MIT

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize record for {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: SerializeError,
    },

    #[error("failed to deserialize record from {path}: {source}")]
    Deserialize {
        path: PathBuf,
        #[source]
        source: SerializeError,
    },

    #[error("gave up renaming {path} onto its target after {attempts} attempts: {source}")]
    RenameExhausted {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}
