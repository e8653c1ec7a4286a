// Copyright (c) 2026 Faro Project Developers. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::net::TcpStream;

use crate::error::Error;

/// Opaque transport of one session.
///
/// The engine is transport-agnostic: TLS handshakes, WebSocket upgrades and
/// the accept loop live outside of it. What reaches a session is a byte
/// stream, either a plain TCP socket or an in-memory duplex pipe used by
/// device shims and tests.
#[derive(Debug)]
pub enum Stream {
    Tcp(TcpStream),
    Mem(DuplexStream),
}

impl Stream {
    /// Read some bytes into `buf`.
    ///
    /// Returns 0 at end of stream.
    ///
    /// # Errors
    ///
    /// Returns error if the underlying transport fails.
    pub async fn read_buf(&mut self, buf: &mut Vec<u8>) -> Result<usize, Error> {
        match self {
            Self::Tcp(tcp_stream) => Ok(tcp_stream.read_buf(buf).await?),
            Self::Mem(mem_stream) => Ok(mem_stream.read_buf(buf).await?),
        }
    }

    /// Write whole `buf` to the transport.
    ///
    /// # Errors
    ///
    /// Returns error if the underlying transport fails.
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<(), Error> {
        match self {
            Self::Tcp(tcp_stream) => Ok(tcp_stream.write_all(buf).await?),
            Self::Mem(mem_stream) => Ok(mem_stream.write_all(buf).await?),
        }
    }

    /// Flush pending bytes and shut the write half down.
    ///
    /// # Errors
    ///
    /// Returns error if the underlying transport fails.
    pub async fn shutdown(&mut self) -> Result<(), Error> {
        match self {
            Self::Tcp(tcp_stream) => Ok(tcp_stream.shutdown().await?),
            Self::Mem(mem_stream) => Ok(mem_stream.shutdown().await?),
        }
    }
}

impl From<TcpStream> for Stream {
    fn from(stream: TcpStream) -> Self {
        Self::Tcp(stream)
    }
}

impl From<DuplexStream> for Stream {
    fn from(stream: DuplexStream) -> Self {
        Self::Mem(stream)
    }
}
