// SPDX-License-Identifier: MIT

//! Newline-delimited JSON framing over the daemon's Unix domain socket
//! (spec.md §4.9 / SPEC_FULL.md §4.9): the simplest transport consistent
//! with "no distributed coordination" — one JSON value per line, either
//! direction.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};

#[derive(Debug, Error)]
pub enum FramingError {
    #[error("connection closed")]
    Closed,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read one JSON value terminated by `\n`. Returns `Err(Closed)` on EOF
/// with no partial data, matching a clean peer disconnect.
pub async fn read_frame<R, T>(reader: &mut R) -> Result<T, FramingError>
where
    R: tokio::io::AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    let bytes_read = reader.read_line(&mut line).await?;
    if bytes_read == 0 {
        return Err(FramingError::Closed);
    }
    Ok(serde_json::from_str(line.trim_end())?)
}

/// Serialize `value` as one JSON line and flush it.
pub async fn write_frame<W, T>(writer: &mut W, value: &T) -> Result<(), FramingError>
where
    W: tokio::io::AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}
