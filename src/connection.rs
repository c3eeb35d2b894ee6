use crate::config::{config_log_request_or_default, LOGGER};
use crate::frame::Frame;

use std::io;

use bytes::BytesMut;
use slog::info;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;

/// Size of the per-connection request buffer. A request that does
/// not fit in a single read of this buffer is treated as truncated
/// and the connection is closed.
const READ_BUFFER_SIZE: usize = 512;

/// Send and receive `Frame` values from a remote peer.
///
/// To read a request, `read_frame` performs a single buffered read
/// and decodes exactly one frame from whatever arrived; a partial or
/// malformed buffer is an error, not a retry. Responses are encoded
/// wholesale and flushed before the next request is read, so within
/// one connection commands execute strictly in wire-arrival order.
#[derive(Debug)]
pub struct Connection {
    stream: BufWriter<TcpStream>,

    // Request buffer, private to this connection.
    buffer: BytesMut,
}

impl Connection {
    /// Create a new `Connection`, backed by `socket`. Read and write
    /// buffers are initialized.
    pub fn new(socket: TcpStream) -> Connection {
        Connection {
            stream: BufWriter::new(socket),
            buffer: BytesMut::with_capacity(READ_BUFFER_SIZE),
        }
    }

    /// Read a single request frame from the underlying stream.
    ///
    /// Returns `Ok(None)` once the peer has closed the socket.
    /// Decoder failures of any kind bubble up as errors and cause
    /// the caller to drop the connection.
    pub async fn read_frame(&mut self) -> crate::Result<Option<Frame>> {
        self.buffer.clear();

        let n = self.stream.read_buf(&mut self.buffer).await?;
        if n == 0 {
            return Ok(None);
        }

        if config_log_request_or_default() {
            info!(
                LOGGER,
                "request buffer, {:?}",
                String::from_utf8_lossy(&self.buffer)
            );
        }

        let frame = Frame::decode(&self.buffer)?;
        Ok(Some(frame))
    }

    /// Write a single frame to the underlying stream and flush it.
    pub async fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        let encoded = frame.encode();
        self.stream.write_all(&encoded).await?;
        self.stream.flush().await
    }
}
