//! A streaming palette service over TCP.
//!
//! A client opens a connection, uploads an encoded image as a sequence of
//! [`InputChunk`]s followed by an end frame, and receives the encoded palette image
//! as a sequence of [`OutputChunk`]s followed by an end frame (or a single error frame).
//! Each connection carries exactly one request.
//! See the [`protocol`] module for the frame format.
//!
//! ```no_run
//! # use pixelforge::service::{PaletteClient, PaletteServer, ServiceConfig, ExtractParams};
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let server = PaletteServer::bind(ServiceConfig::default()).await?;
//! let addr = server.local_addr()?;
//! tokio::spawn(server.serve());
//!
//! let image = std::fs::read("sprite.png")?;
//! let params = ExtractParams { colors_per_row: 8, ..ExtractParams::default() };
//! let response = PaletteClient::connect(addr)
//!     .await?
//!     .extract_palette(&image, "sprite.png", "png", params)
//!     .await?;
//! std::fs::write("palette.png", response.palette_bytes)?;
//! # Ok(())
//! # }
//! ```

mod client;
pub mod protocol;
mod server;

pub use client::{PaletteClient, PaletteResponse};
pub use protocol::{ExtractParams, InputChunk, InputFrame, OutputChunk, OutputFrame, ProtocolError};
pub use server::PaletteServer;

use crate::{codec::CodecError, PaletteConfig, PaletteError};
use std::{
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr},
};
use thiserror::Error;

/// The port the service listens on by default.
pub const DEFAULT_PORT: u16 = 9090;

/// The settings of a [`PaletteServer`] (and the chunk size of a [`PaletteClient`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    /// The address to listen on.
    ///
    /// The default is `0.0.0.0`.
    pub host: IpAddr,
    /// The port to listen on.
    ///
    /// The default is [`DEFAULT_PORT`]. Use `0` to pick a free port.
    pub port: u16,
    /// The size of each chunk of palette image bytes sent back to the client.
    ///
    /// The default is 64 KiB.
    pub chunk_size: usize,
    /// The largest upload the server accepts, in bytes.
    ///
    /// This also caps the length of every field of every frame.
    /// The default is 64 MiB.
    pub max_upload: usize,
    /// The largest palette image the server renders, in pixels.
    ///
    /// Requests whose palette image would be larger fail before it is allocated.
    /// The default is 64 Mi pixels (256 MiB of RGBA).
    pub max_output_pixels: u64,
    /// The defaults for parameters a request leaves at zero.
    pub palette: PaletteConfig,
}

impl ServiceConfig {
    /// Creates a new [`ServiceConfig`] with the default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            chunk_size: 64 * 1024,
            max_upload: 64 * 1024 * 1024,
            max_output_pixels: 64 * 1024 * 1024,
            palette: PaletteConfig::new(),
        }
    }

    /// The socket address formed by `host` and `port`.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// An error from the palette service, on either side of the connection.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A frame could not be read.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// The connection failed.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    /// The upload could not be decoded or the palette image could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The palette image could not be built.
    #[error(transparent)]
    Palette(#[from] PaletteError),
    /// The upload is larger than the server accepts.
    #[error("upload exceeds the maximum of {max} bytes")]
    UploadTooLarge {
        /// The configured maximum.
        max: usize,
    },
    /// The requested palette image has more pixels than the server renders.
    #[error("palette image exceeds the maximum of {max} pixels")]
    OutputTooLarge {
        /// The configured maximum.
        max: u64,
    },
    /// The palette image sent by the server is larger than the client accepts.
    #[error("palette image exceeds the maximum of {max} bytes")]
    ResponseTooLarge {
        /// The configured maximum.
        max: usize,
    },
    /// The palette task panicked or was cancelled.
    #[error("palette task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    /// The server answered with an error frame.
    #[error("server error: {0}")]
    Remote(String),
    /// The connection closed before the end frame.
    #[error("connection closed before the palette was complete")]
    Incomplete,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_address() {
        let config = ServiceConfig::default();
        assert_eq!(config.addr(), SocketAddr::from(([0, 0, 0, 0], 9090)));
        assert_eq!(config.palette, PaletteConfig::default());
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            ServiceError::UploadTooLarge { max: 10 }.to_string(),
            "upload exceeds the maximum of 10 bytes"
        );
        assert_eq!(
            ServiceError::Palette(PaletteError::Compose(crate::ComposeError::EmptyPalette)).to_string(),
            "cannot assemble palette image: cannot assemble a palette image from an empty palette"
        );
    }
}
