use super::{ExtractParams, InputFrame, OutputChunk, OutputFrame, ServiceConfig, ServiceError};

use crate::{codec, compose, PaletteConfig, PaletteError, PalettePipeline, TileLayout};

use bytes::{Bytes, BytesMut};
use image::DynamicImage;
use std::{future::Future, io, net::SocketAddr, sync::Arc, time::Instant};
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter},
    net::{TcpListener, TcpStream},
};
use tracing::{debug, info, warn};

/// An uploaded image and the parameters of its last chunk.
#[derive(Debug, Default)]
struct Upload {
    bytes: BytesMut,
    file_name: String,
    format: String,
    params: ExtractParams,
}

/// A TCP server answering palette requests.
///
/// Every connection carries one request. Connections are handled concurrently,
/// and the palette itself is computed on tokio's blocking thread pool.
#[derive(Debug)]
pub struct PaletteServer {
    listener: TcpListener,
    config: Arc<ServiceConfig>,
}

impl PaletteServer {
    /// Binds a listener to the address in `config`.
    ///
    /// # Errors
    /// Returns an error if the address could not be bound.
    pub async fn bind(config: ServiceConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(config.addr()).await?;
        info!(addr = %listener.local_addr()?, "palette service listening");
        Ok(Self { listener, config: Arc::new(config) })
    }

    /// The address the server is actually listening on.
    ///
    /// Useful when the configured port was `0`.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections forever.
    ///
    /// Failing to accept one connection is logged and does not stop the server.
    pub async fn serve(self) {
        loop {
            self.accept().await;
        }
    }

    /// Accepts connections until `shutdown` completes.
    ///
    /// Requests that are already running are left to finish on their own.
    pub async fn serve_with_shutdown(self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("palette service shutting down");
                    return;
                }
                () = self.accept() => {}
            }
        }
    }

    /// Accepts one connection and spawns a task to handle it.
    async fn accept(&self) {
        match self.listener.accept().await {
            Ok((stream, peer)) => {
                let config = Arc::clone(&self.config);
                tokio::spawn(handle_connection(stream, peer, config));
            }
            Err(err) => warn!(%err, "failed to accept connection"),
        }
    }
}

/// Runs one request on `stream` and closes it.
async fn handle_connection(stream: TcpStream, peer: SocketAddr, config: Arc<ServiceConfig>) {
    debug!(%peer, "connection accepted");
    let (reader, writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut writer = BufWriter::new(writer);

    if let Err(err) = respond(&mut reader, &mut writer, &config).await {
        warn!(%peer, %err, "palette request aborted");
        // best effort, the peer may already be gone
        let frame = OutputFrame::Error(err.to_string());
        if frame.write(&mut writer).await.is_ok() {
            let _ = writer.flush().await;
        }
    }
}

/// Receives an upload, computes its palette image and streams it back.
async fn respond<R, W>(reader: &mut R, writer: &mut W, config: &ServiceConfig) -> Result<(), ServiceError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let start = Instant::now();
    let upload = receive(reader, config.max_upload).await?;
    let Upload { bytes, file_name, format, params } = upload;
    let received = bytes.len();

    let palette_config = config.palette;
    let max_output_pixels = config.max_output_pixels;
    let hint = format.clone();
    let output = tokio::task::spawn_blocking(move || {
        render(&bytes, &hint, params, palette_config, max_output_pixels)
    })
    .await??;

    let chunk_size = config.chunk_size.max(1);
    let output = Bytes::from(output);
    for offset in (0..output.len()).step_by(chunk_size) {
        let end = (offset + chunk_size).min(output.len());
        let frame = OutputFrame::Chunk(OutputChunk {
            palette_bytes: output.slice(offset..end),
            file_name: file_name.clone(),
            format: format.clone(),
        });
        frame.write(writer).await?;
    }
    OutputFrame::End.write(writer).await?;
    writer.flush().await?;

    info!(
        file_name = %file_name,
        format = %format,
        received,
        sent = output.len(),
        elapsed = ?start.elapsed(),
        "palette extracted"
    );
    Ok(())
}

/// Reads chunks until an end frame or a clean EOF.
///
/// The bytes of all chunks are concatenated, while the name, format and parameters
/// of the last chunk replace those of earlier ones.
async fn receive<R>(reader: &mut R, max_upload: usize) -> Result<Upload, ServiceError>
where
    R: AsyncRead + Unpin,
{
    let mut upload = Upload::default();
    let mut chunks = 0usize;

    while let Some(InputFrame::Chunk(chunk)) = InputFrame::read(reader, max_upload).await? {
        if upload.bytes.len() + chunk.file_bytes.len() > max_upload {
            return Err(ServiceError::UploadTooLarge { max: max_upload });
        }
        upload.bytes.extend_from_slice(&chunk.file_bytes);
        upload.file_name = chunk.file_name;
        upload.format = chunk.format;
        upload.params = chunk.params;
        chunks += 1;
    }

    debug!(chunks, bytes = upload.bytes.len(), "upload received");
    Ok(upload)
}

/// Decodes an upload, builds its palette image and encodes it in the upload's format.
fn render(
    bytes: &[u8],
    format: &str,
    params: ExtractParams,
    config: PaletteConfig,
    max_output_pixels: u64,
) -> Result<Vec<u8>, ServiceError> {
    let image = codec::decode(bytes, format)?.into_rgba8();

    let pipeline = PalettePipeline::new(&image)
        .config(config)
        .colors_per_row(params.colors_per_row)
        .tile_size(params.tile_width, params.tile_height)
        .max_colors(params.color_count as usize);
    let layout = pipeline.layout();

    // a single row is the smallest possible output
    check_output(layout, 1, max_output_pixels)?;

    #[cfg(feature = "threads")]
    let palette = pipeline.palette_par()?;
    #[cfg(not(feature = "threads"))]
    let palette = pipeline.palette();

    check_output(layout, palette.len(), max_output_pixels)?;

    #[cfg(feature = "threads")]
    let palette = compose::compose_par(&palette, layout);
    #[cfg(not(feature = "threads"))]
    let palette = compose::compose(&palette, layout);

    let palette = palette.map_err(PaletteError::from)?;
    Ok(codec::encode(&DynamicImage::ImageRgba8(palette), format)?)
}

/// Fails if the palette image for `colors` tiles would have more than `max` pixels.
fn check_output(layout: TileLayout, colors: usize, max: u64) -> Result<(), ServiceError> {
    let pixels = layout
        .image_dimensions(colors)
        .map(|(width, height)| u64::from(width) * u64::from(height));

    match pixels {
        Some(pixels) if pixels <= max => Ok(()),
        _ => Err(ServiceError::OutputTooLarge { max }),
    }
}
