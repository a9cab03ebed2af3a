//! The frame format spoken between [`PaletteClient`](super::PaletteClient)
//! and [`PaletteServer`](super::PaletteServer).
//!
//! Every frame starts with one kind byte:
//!
//! | kind | request (client to server) | response (server to client) |
//! |------|----------------------------|-----------------------------|
//! | `0`  | end of upload              | end of palette              |
//! | `1`  | [`InputChunk`]             | [`OutputChunk`]             |
//! | `2`  |                            | error message               |
//!
//! Chunk fields follow in declaration order. Byte blobs and strings are written as a
//! big-endian `u32` length followed by that many bytes, integers as big-endian `u32`s.

use bytes::{BufMut, Bytes, BytesMut};
use std::{io, string::FromUtf8Error};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Marks the end of a stream.
const KIND_END: u8 = 0;
/// Marks a chunk frame.
const KIND_CHUNK: u8 = 1;
/// Marks an error frame (responses only).
const KIND_ERROR: u8 = 2;

/// An error while reading a frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The underlying stream failed.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    /// The stream ended in the middle of a frame.
    #[error("stream ended in the middle of a frame")]
    Truncated,
    /// The kind byte is not valid in this direction.
    #[error("unknown frame kind {0}")]
    UnknownKind(u8),
    /// A length prefix exceeds the allowed maximum.
    #[error("field of {len} bytes exceeds the maximum of {max} bytes")]
    TooLong {
        /// The announced length.
        len: usize,
        /// The allowed maximum.
        max: usize,
    },
    /// A string field is not valid UTF-8.
    #[error("string field is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),
}

/// The palette parameters carried by every [`InputChunk`].
///
/// A value of `0` asks the server to use its configured default
/// (for `color_count`, `0` means no cap).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtractParams {
    /// The number of tiles per row.
    pub colors_per_row: u32,
    /// The tile width in pixels.
    pub tile_width: u32,
    /// The tile height in pixels.
    pub tile_height: u32,
    /// The maximum number of palette entries.
    pub color_count: u32,
}

/// One piece of an uploaded image.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputChunk {
    /// A slice of the encoded image.
    pub file_bytes: Bytes,
    /// The name of the uploaded file.
    pub file_name: String,
    /// The container format of the upload, e.g. `png`.
    pub format: String,
    /// The palette parameters.
    pub params: ExtractParams,
}

/// A frame sent from the client to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputFrame {
    /// A piece of the upload.
    Chunk(InputChunk),
    /// The upload is complete.
    End,
}

/// One piece of the encoded palette image.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutputChunk {
    /// A slice of the encoded palette image.
    pub palette_bytes: Bytes,
    /// The name of the uploaded file.
    pub file_name: String,
    /// The container format of the palette image.
    pub format: String,
}

/// A frame sent from the server to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFrame {
    /// A piece of the palette image.
    Chunk(OutputChunk),
    /// The palette image is complete.
    End,
    /// The request failed. No further frames follow.
    Error(String),
}

impl InputFrame {
    /// Appends the encoded frame to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Self::Chunk(chunk) => {
                dst.put_u8(KIND_CHUNK);
                put_blob(dst, &chunk.file_bytes);
                put_blob(dst, chunk.file_name.as_bytes());
                put_blob(dst, chunk.format.as_bytes());
                let ExtractParams { colors_per_row, tile_width, tile_height, color_count } = chunk.params;
                dst.put_u32(colors_per_row);
                dst.put_u32(tile_width);
                dst.put_u32(tile_height);
                dst.put_u32(color_count);
            }
            Self::End => dst.put_u8(KIND_END),
        }
    }

    /// Reads the next frame, or `None` if the stream ended cleanly before it.
    ///
    /// No length prefix may exceed `max_len`.
    pub async fn read<R>(reader: &mut R, max_len: usize) -> Result<Option<Self>, ProtocolError>
    where
        R: AsyncRead + Unpin,
    {
        let Some(kind) = read_kind(reader).await? else {
            return Ok(None);
        };

        let frame = match kind {
            KIND_END => Self::End,
            KIND_CHUNK => Self::Chunk(InputChunk {
                file_bytes: read_blob(reader, max_len).await?,
                file_name: read_string(reader, max_len).await?,
                format: read_string(reader, max_len).await?,
                params: ExtractParams {
                    colors_per_row: read_u32(reader).await?,
                    tile_width: read_u32(reader).await?,
                    tile_height: read_u32(reader).await?,
                    color_count: read_u32(reader).await?,
                },
            }),
            kind => return Err(ProtocolError::UnknownKind(kind)),
        };

        Ok(Some(frame))
    }

    /// Encodes and writes the frame to `writer`.
    pub async fn write<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        writer.write_all(&buf).await
    }
}

impl OutputFrame {
    /// Appends the encoded frame to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Self::Chunk(chunk) => {
                dst.put_u8(KIND_CHUNK);
                put_blob(dst, &chunk.palette_bytes);
                put_blob(dst, chunk.file_name.as_bytes());
                put_blob(dst, chunk.format.as_bytes());
            }
            Self::End => dst.put_u8(KIND_END),
            Self::Error(message) => {
                dst.put_u8(KIND_ERROR);
                put_blob(dst, message.as_bytes());
            }
        }
    }

    /// Reads the next frame, or `None` if the stream ended cleanly before it.
    ///
    /// No length prefix may exceed `max_len`.
    pub async fn read<R>(reader: &mut R, max_len: usize) -> Result<Option<Self>, ProtocolError>
    where
        R: AsyncRead + Unpin,
    {
        let Some(kind) = read_kind(reader).await? else {
            return Ok(None);
        };

        let frame = match kind {
            KIND_END => Self::End,
            KIND_CHUNK => Self::Chunk(OutputChunk {
                palette_bytes: read_blob(reader, max_len).await?,
                file_name: read_string(reader, max_len).await?,
                format: read_string(reader, max_len).await?,
            }),
            KIND_ERROR => Self::Error(read_string(reader, max_len).await?),
            kind => return Err(ProtocolError::UnknownKind(kind)),
        };

        Ok(Some(frame))
    }

    /// Encodes and writes the frame to `writer`.
    pub async fn write<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        writer.write_all(&buf).await
    }
}

/// Writes a length-prefixed byte blob.
///
/// Blobs are capped by the upload and chunk sizes, so their length always fits in a `u32`.
#[allow(clippy::cast_possible_truncation)]
fn put_blob(dst: &mut BytesMut, bytes: &[u8]) {
    dst.put_u32(bytes.len() as u32);
    dst.put_slice(bytes);
}

/// Maps an unexpected EOF inside a frame to [`ProtocolError::Truncated`].
fn truncated(err: io::Error) -> ProtocolError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        ProtocolError::Truncated
    } else {
        ProtocolError::Io(err)
    }
}

/// Reads the kind byte, returning `None` on a clean EOF.
async fn read_kind<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<u8>, ProtocolError> {
    match reader.read_u8().await {
        Ok(kind) => Ok(Some(kind)),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(err) => Err(err.into()),
    }
}

async fn read_u32<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u32, ProtocolError> {
    reader.read_u32().await.map_err(truncated)
}

async fn read_blob<R: AsyncRead + Unpin>(reader: &mut R, max_len: usize) -> Result<Bytes, ProtocolError> {
    let declared = read_u32(reader).await?;
    let len = declared as usize;
    if len > max_len {
        return Err(ProtocolError::TooLong { len, max: max_len });
    }

    // grows with the bytes that actually arrive, not with the declared length
    let mut buf = Vec::new();
    (&mut *reader).take(u64::from(declared)).read_to_end(&mut buf).await?;
    if buf.len() < len {
        return Err(ProtocolError::Truncated);
    }
    Ok(buf.into())
}

async fn read_string<R: AsyncRead + Unpin>(reader: &mut R, max_len: usize) -> Result<String, ProtocolError> {
    let bytes = read_blob(reader, max_len).await?;
    Ok(String::from_utf8(bytes.to_vec())?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const MAX: usize = 1024;

    fn chunk() -> InputChunk {
        InputChunk {
            file_bytes: Bytes::from_static(&[1, 2, 3, 4, 5]),
            file_name: "sprite.png".into(),
            format: "png".into(),
            params: ExtractParams {
                colors_per_row: 3,
                tile_width: 50,
                tile_height: 40,
                color_count: 7,
            },
        }
    }

    fn encoded(frame: &InputFrame) -> Vec<u8> {
        let mut buf = BytesMut::new();
        frame.encode(&mut buf);
        buf.to_vec()
    }

    #[test]
    fn input_chunk_layout() {
        let bytes = encoded(&InputFrame::Chunk(chunk()));
        let mut expected = vec![KIND_CHUNK, 0, 0, 0, 5, 1, 2, 3, 4, 5];
        expected.extend([0, 0, 0, 10]);
        expected.extend(b"sprite.png");
        expected.extend([0, 0, 0, 3]);
        expected.extend(b"png");
        expected.extend([0, 0, 0, 3, 0, 0, 0, 50, 0, 0, 0, 40, 0, 0, 0, 7]);
        assert_eq!(bytes, expected);
        assert_eq!(encoded(&InputFrame::End), vec![KIND_END]);
    }

    #[tokio::test]
    async fn input_frames() {
        let mut bytes = encoded(&InputFrame::Chunk(chunk()));
        bytes.extend(encoded(&InputFrame::Chunk(InputChunk::default())));
        bytes.extend(encoded(&InputFrame::End));

        let mut reader = bytes.as_slice();
        assert_eq!(InputFrame::read(&mut reader, MAX).await.unwrap(), Some(InputFrame::Chunk(chunk())));
        assert_eq!(
            InputFrame::read(&mut reader, MAX).await.unwrap(),
            Some(InputFrame::Chunk(InputChunk::default()))
        );
        assert_eq!(InputFrame::read(&mut reader, MAX).await.unwrap(), Some(InputFrame::End));
        assert_eq!(InputFrame::read(&mut reader, MAX).await.unwrap(), None);
    }

    #[tokio::test]
    async fn output_frames() {
        let frames = [
            OutputFrame::Chunk(OutputChunk {
                palette_bytes: Bytes::from_static(b"palette"),
                file_name: "sprite.png".into(),
                format: "png".into(),
            }),
            OutputFrame::Error("cannot assemble palette image".into()),
            OutputFrame::End,
        ];

        let mut writer = Vec::new();
        for frame in &frames {
            frame.write(&mut writer).await.unwrap();
        }

        let mut reader = writer.as_slice();
        for frame in frames {
            assert_eq!(OutputFrame::read(&mut reader, MAX).await.unwrap(), Some(frame));
        }
        assert_eq!(OutputFrame::read(&mut reader, MAX).await.unwrap(), None);
    }

    #[tokio::test]
    async fn truncated_frame() {
        let bytes = encoded(&InputFrame::Chunk(chunk()));
        for len in 1..bytes.len() {
            let mut reader = &bytes[..len];
            assert!(matches!(
                InputFrame::read(&mut reader, MAX).await,
                Err(ProtocolError::Truncated)
            ));
        }
    }

    #[tokio::test]
    async fn declared_length_without_payload() {
        let mut reader: &[u8] = &[KIND_ERROR, 0xFF, 0xFF, 0xFF, 0xFF, b'a'];
        assert!(matches!(
            OutputFrame::read(&mut reader, usize::MAX).await,
            Err(ProtocolError::Truncated)
        ));
    }

    #[tokio::test]
    async fn unknown_kind() {
        let mut reader: &[u8] = &[9];
        assert!(matches!(
            OutputFrame::read(&mut reader, MAX).await,
            Err(ProtocolError::UnknownKind(9))
        ));

        // error frames only flow from server to client
        let mut reader: &[u8] = &[KIND_ERROR, 0, 0, 0, 0];
        assert!(matches!(
            InputFrame::read(&mut reader, MAX).await,
            Err(ProtocolError::UnknownKind(KIND_ERROR))
        ));
    }

    #[tokio::test]
    async fn oversized_field() {
        let bytes = encoded(&InputFrame::Chunk(chunk()));
        let mut reader = bytes.as_slice();
        assert!(matches!(
            InputFrame::read(&mut reader, 4).await,
            Err(ProtocolError::TooLong { len: 5, max: 4 })
        ));
    }

    #[tokio::test]
    async fn invalid_utf8() {
        let mut reader: &[u8] = &[KIND_ERROR, 0, 0, 0, 2, 0xC3, 0x28];
        assert!(matches!(
            OutputFrame::read(&mut reader, MAX).await,
            Err(ProtocolError::InvalidUtf8(_))
        ));
    }
}
