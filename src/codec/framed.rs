use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use crate::config::{Config, Limits};
use crate::error::{Error, Result};
use crate::protocol::{Frame, FrameDecoder, generate_mask};

/// Reads server frames from the receiving half of a transport.
///
/// `read_frame` is cancel-safe: bytes are moved into the decoder only after a
/// read completes, so dropping the future loses nothing.
#[derive(Debug)]
pub struct FrameReader<R> {
    io: R,
    decoder: FrameDecoder,
    chunk: Vec<u8>,
}

impl<R> FrameReader<R> {
    /// Create a reader with the given limits and read chunk size.
    #[must_use]
    pub fn new(io: R, limits: Limits, read_buffer_size: usize) -> Self {
        let read_buffer_size = read_buffer_size.max(1);
        Self {
            io,
            decoder: FrameDecoder::with_capacity(limits, read_buffer_size),
            chunk: vec![0; read_buffer_size],
        }
    }

    /// Feed bytes that arrived before the reader existed.
    ///
    /// Used for data the server sent right behind its handshake response.
    pub fn seed(&mut self, data: &[u8]) {
        self.decoder.extend(data);
    }

    #[must_use]
    pub fn into_inner(self) -> R {
        self.io
    }
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Read the next frame.
    ///
    /// Returns `Ok(None)` when the peer closes the transport between frames.
    ///
    /// # Errors
    ///
    /// Framing errors from the decoder, transport errors, and `Error::Io` when
    /// the transport ends in the middle of a frame.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
        read_frame_from(&mut self.io, &mut self.decoder, &mut self.chunk).await
    }
}

/// Writes masked client frames to the sending half of a transport.
#[derive(Debug)]
pub struct FrameWriter<W> {
    io: W,
    buf: BytesMut,
}

impl<W> FrameWriter<W> {
    #[must_use]
    pub fn new(io: W, write_buffer_size: usize) -> Self {
        Self {
            io,
            buf: BytesMut::with_capacity(write_buffer_size),
        }
    }

    #[must_use]
    pub fn into_inner(self) -> W {
        self.io
    }
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Mask `frame` with a fresh key and write it. Does not flush.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame violates control-frame rules, no masking
    /// key can be generated, or the transport fails.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        write_frame_to(&mut self.io, &mut self.buf, frame).await
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.io.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.io.shutdown().await?;
        Ok(())
    }
}

/// Frame-level client codec over a single bidirectional stream.
#[derive(Debug)]
pub struct WebSocketCodec<T> {
    io: T,
    decoder: FrameDecoder,
    chunk: Vec<u8>,
    write_buf: BytesMut,
    config: Config,
}

impl<T> WebSocketCodec<T> {
    #[must_use]
    pub fn new(io: T, config: Config) -> Self {
        let read_buffer_size = config.read_buffer_size.max(1);
        Self {
            io,
            decoder: FrameDecoder::with_capacity(config.limits.clone(), read_buffer_size),
            chunk: vec![0; read_buffer_size],
            write_buf: BytesMut::with_capacity(config.write_buffer_size),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Feed bytes that arrived before the codec existed.
    pub fn seed(&mut self, data: &[u8]) {
        self.decoder.extend(data);
    }

    #[must_use]
    pub fn into_inner(self) -> T {
        self.io
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> WebSocketCodec<T> {
    /// See [`FrameReader::read_frame`].
    ///
    /// # Errors
    ///
    /// See [`FrameReader::read_frame`].
    pub async fn read_frame(&mut self) -> Result<Option<Frame>> {
        read_frame_from(&mut self.io, &mut self.decoder, &mut self.chunk).await
    }

    /// See [`FrameWriter::write_frame`].
    ///
    /// # Errors
    ///
    /// See [`FrameWriter::write_frame`].
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        write_frame_to(&mut self.io, &mut self.write_buf, frame).await
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.io.flush().await?;
        Ok(())
    }

    /// Split into independently owned reader and writer halves.
    ///
    /// Bytes already buffered by the decoder move to the reader.
    #[must_use]
    pub fn into_split(self) -> (FrameReader<ReadHalf<T>>, FrameWriter<WriteHalf<T>>) {
        let (read_half, write_half) = tokio::io::split(self.io);
        let reader = FrameReader {
            io: read_half,
            decoder: self.decoder,
            chunk: self.chunk,
        };
        let writer = FrameWriter {
            io: write_half,
            buf: self.write_buf,
        };
        (reader, writer)
    }
}

async fn read_frame_from<R: AsyncRead + Unpin>(
    io: &mut R,
    decoder: &mut FrameDecoder,
    chunk: &mut [u8],
) -> Result<Option<Frame>> {
    loop {
        if let Some(frame) = decoder.next_frame()? {
            return Ok(Some(frame));
        }

        let n = io.read(chunk).await?;
        if n == 0 {
            if decoder.is_mid_frame() {
                return Err(Error::Io(format!(
                    "Transport closed with {} bytes of an incomplete frame buffered",
                    decoder.buffered()
                )));
            }
            return Ok(None);
        }
        decoder.extend(&chunk[..n]);
    }
}

async fn write_frame_to<W: AsyncWrite + Unpin>(
    io: &mut W,
    buf: &mut BytesMut,
    frame: &Frame,
) -> Result<()> {
    frame.validate()?;
    let mask = generate_mask()?;

    buf.clear();
    buf.resize(frame.wire_size(true), 0);
    let written = frame.write(buf, Some(mask))?;
    io.write_all(&buf[..written]).await?;
    Ok(())
}
