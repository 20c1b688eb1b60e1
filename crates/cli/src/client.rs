// SPDX-License-Identifier: MIT

//! A thin client for the `herdctld` IPC socket (spec.md §6): connect,
//! write one [`Request`] frame, and read back [`Response`] frames.

use crate::exit_error::ExitError;
use herdctl_wire::{read_frame, write_frame, FramingError, Request, Response};
use std::path::Path;
use tokio::net::UnixStream;

pub struct Connection {
    reader: tokio::io::BufReader<tokio::net::unix::OwnedReadHalf>,
    writer: tokio::net::unix::OwnedWriteHalf,
}

impl Connection {
    pub async fn connect(socket_path: &Path) -> Result<Self, ExitError> {
        let stream = UnixStream::connect(socket_path).await.map_err(|e| {
            ExitError::generic(format!("could not connect to herdctld at {}: {e}", socket_path.display()))
        })?;
        let (read_half, writer) = stream.into_split();
        Ok(Self { reader: tokio::io::BufReader::new(read_half), writer })
    }

    pub async fn send(&mut self, request: &Request) -> Result<(), ExitError> {
        write_frame(&mut self.writer, request).await.map_err(frame_error)
    }

    /// Read one response frame. `Err(Closed)` surfaces as a clean "the
    /// connection ended" error rather than a generic IO failure.
    pub async fn recv(&mut self) -> Result<Response, ExitError> {
        match read_frame(&mut self.reader).await {
            Ok(response) => Ok(response),
            Err(FramingError::Closed) => Err(ExitError::generic("herdctld closed the connection unexpectedly")),
            Err(e) => Err(frame_error(e)),
        }
    }

    /// Send `request` and read back exactly one response frame, failing
    /// on an `Error` frame.
    pub async fn roundtrip(&mut self, request: &Request) -> Result<Response, ExitError> {
        self.send(request).await?;
        let response = self.recv().await?;
        if let Response::Error { message } = &response {
            return Err(ExitError::generic(message.clone()));
        }
        Ok(response)
    }
}

fn frame_error(e: FramingError) -> ExitError {
    ExitError::generic(format!("herdctld protocol error: {e}"))
}
