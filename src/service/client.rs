use super::{ExtractParams, InputChunk, InputFrame, OutputFrame, ServiceConfig, ServiceError};

use bytes::Bytes;
use std::io;
use tokio::{
    io::{AsyncWriteExt, BufReader, BufWriter},
    net::{TcpStream, ToSocketAddrs},
};
use tracing::debug;

/// The palette image returned by a [`PaletteServer`](super::PaletteServer).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PaletteResponse {
    /// The encoded palette image.
    pub palette_bytes: Vec<u8>,
    /// The file name echoed by the server.
    pub file_name: String,
    /// The format the palette image is encoded in.
    pub format: String,
}

/// A client for a [`PaletteServer`](super::PaletteServer).
///
/// Each client carries exactly one request, so [`PaletteClient::extract_palette`]
/// consumes it.
#[derive(Debug)]
pub struct PaletteClient {
    stream: TcpStream,
    chunk_size: usize,
    max_response: usize,
}

impl PaletteClient {
    /// Opens a connection to the server at `addr`.
    ///
    /// # Errors
    /// Returns an error if the connection could not be established.
    pub async fn connect(addr: impl ToSocketAddrs) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let defaults = ServiceConfig::new();
        Ok(Self {
            stream,
            chunk_size: defaults.chunk_size,
            max_response: defaults.max_upload,
        })
    }

    /// Sets the number of image bytes sent per chunk.
    ///
    /// The default matches [`ServiceConfig::chunk_size`].
    #[must_use]
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Sets the largest palette image accepted from the server.
    ///
    /// The default matches [`ServiceConfig::max_upload`].
    #[must_use]
    pub fn max_response(mut self, max_response: usize) -> Self {
        self.max_response = max_response;
        self
    }

    /// Uploads an encoded image and waits for its encoded palette image.
    ///
    /// Every chunk carries `file_name`, `format` and `params`.
    /// An empty `image` is still sent as one empty chunk so that the server sees the parameters.
    ///
    /// # Errors
    /// Returns [`ServiceError::Remote`] if the server answered with an error frame,
    /// [`ServiceError::Incomplete`] if the connection closed before the end frame,
    /// and a transport or protocol error if the connection failed.
    pub async fn extract_palette(
        self,
        image: &[u8],
        file_name: &str,
        format: &str,
        params: ExtractParams,
    ) -> Result<PaletteResponse, ServiceError> {
        let Self { stream, chunk_size, max_response } = self;
        let (reader, writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut writer = BufWriter::new(writer);

        let pieces = if image.is_empty() {
            vec![image]
        } else {
            image.chunks(chunk_size).collect::<Vec<_>>()
        };

        for piece in &pieces {
            let frame = InputFrame::Chunk(InputChunk {
                file_bytes: Bytes::copy_from_slice(piece),
                file_name: file_name.into(),
                format: format.into(),
                params,
            });
            frame.write(&mut writer).await?;
        }
        InputFrame::End.write(&mut writer).await?;
        writer.flush().await?;
        debug!(chunks = pieces.len(), bytes = image.len(), "upload sent");

        let mut response = PaletteResponse::default();
        loop {
            match OutputFrame::read(&mut reader, max_response).await? {
                Some(OutputFrame::Chunk(chunk)) => {
                    if response.palette_bytes.len() + chunk.palette_bytes.len() > max_response {
                        return Err(ServiceError::ResponseTooLarge { max: max_response });
                    }
                    response.palette_bytes.extend_from_slice(&chunk.palette_bytes);
                    response.file_name = chunk.file_name;
                    response.format = chunk.format;
                }
                Some(OutputFrame::End) => return Ok(response),
                Some(OutputFrame::Error(message)) => return Err(ServiceError::Remote(message)),
                None => return Err(ServiceError::Incomplete),
            }
        }
    }
}
