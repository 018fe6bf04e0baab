use std::io::{ErrorKind, Read};

use bytes::{Buf, Bytes, BytesMut};
use framelink_transport::{Transport, TransportKind};
use tracing::{debug, trace};

use crate::codec::{decode_into, FrameConfig, DELIMITER};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// On stream links the reader starts out of sync: everything up to the first
/// delimiter is assumed to be the tail of a frame from an earlier session and
/// is thrown away. After that, bytes are buffered until a delimiter closes a
/// frame. Partial reads are handled internally; callers always get complete
/// frames or an error.
///
/// On datagram links every read is one frame and no scanning happens.
pub struct FrameReader<T> {
    inner: T,
    kind: TransportKind,
    buf: BytesMut,
    /// Bytes of `buf` already known to hold no delimiter.
    scanned: usize,
    synced: bool,
    discarded: u64,
    empty_frames: u64,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T, kind: TransportKind) -> Self {
        Self::with_config(inner, kind, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, kind: TransportKind, config: FrameConfig) -> Self {
        Self {
            inner,
            kind,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            scanned: 0,
            synced: !kind.is_stream(),
            discarded: 0,
            empty_frames: 0,
            config,
        }
    }

    /// Whether the reader is aligned to a frame boundary.
    pub fn is_synced(&self) -> bool {
        self.synced
    }

    /// Total bytes thrown away while resynchronizing.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Empty stream frames (back-to-back delimiters) skipped since sync.
    pub fn empty_frames(&self) -> u64 {
        self.empty_frames
    }

    /// Discard input up to and including the next delimiter.
    ///
    /// Returns immediately if the reader is already synced. EOF before a
    /// delimiter is [`FrameError::ConnectionClosed`].
    pub fn resync(&mut self) -> Result<()> {
        while !self.synced {
            if let Some(pos) = self.buf.iter().position(|&b| b == DELIMITER) {
                self.discard(pos + 1);
                self.synced = true;
                debug!(discarded = self.discarded, "frame stream synchronized");
                break;
            }

            let len = self.buf.len();
            self.discard(len);
            if self.fill(READ_CHUNK_SIZE)? == 0 {
                return Err(FrameError::ConnectionClosed);
            }
        }
        Ok(())
    }

    /// Read the next raw (still encoded) frame, without its delimiter.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached; any
    /// partially received frame is dropped.
    pub fn read_frame(&mut self) -> Result<Bytes> {
        if self.kind.is_stream() {
            self.read_stream_frame()
        } else {
            self.read_datagram()
        }
    }

    /// Read and decode the next frame.
    ///
    /// A frame that fails to decode is reported as
    /// [`FrameError::Decode`]; the reader stays aligned and the next call
    /// returns the following frame.
    pub fn read_payload(&mut self) -> Result<Bytes> {
        let frame = self.read_frame()?;
        let mut payload = BytesMut::with_capacity(frame.len());
        decode_into(&frame, &mut payload)?;
        Ok(payload.freeze())
    }

    fn read_stream_frame(&mut self) -> Result<Bytes> {
        let max = self.config.max_frame_len();
        loop {
            self.resync()?;

            if let Some(pos) = self.buf[self.scanned..]
                .iter()
                .position(|&b| b == DELIMITER)
            {
                let end = self.scanned + pos;
                let frame = self.buf.split_to(end).freeze();
                self.buf.advance(1);
                self.scanned = 0;

                if frame.is_empty() {
                    // Resync already consumed the peer's preamble, so this is
                    // a stray delimiter.
                    self.empty_frames += 1;
                    trace!(empty_frames = self.empty_frames, "skipped empty frame");
                    continue;
                }
                if frame.len() > max {
                    return Err(FrameError::Oversized { max });
                }
                return Ok(frame);
            }
            self.scanned = self.buf.len();

            if self.buf.len() > max {
                // Drop the runaway frame and wait for the delimiter that ends it.
                let len = self.buf.len();
                self.discard(len);
                self.synced = false;
                return Err(FrameError::Oversized { max });
            }

            if self.fill(READ_CHUNK_SIZE)? == 0 {
                if !self.buf.is_empty() {
                    debug!(partial = self.buf.len(), "peer closed mid-frame");
                }
                let len = self.buf.len();
                self.discard(len);
                return Err(FrameError::ConnectionClosed);
            }
        }
    }

    fn read_datagram(&mut self) -> Result<Bytes> {
        loop {
            self.buf.clear();
            if self.fill(self.config.max_datagram_size)? == 0 {
                trace!("skipping empty datagram");
                continue;
            }
            return Ok(self.buf.split().freeze());
        }
    }

    /// Drop `n` bytes from the front of the buffer, counting them as discarded.
    fn discard(&mut self, n: usize) {
        if n > 0 {
            trace!(bytes = n, "discarding unsynchronized input");
        }
        self.buf.advance(n);
        self.scanned = 0;
        self.discarded += n as u64;
    }

    /// One read from the inner stream into the buffer.
    fn fill(&mut self, limit: usize) -> Result<usize> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let mut owned;
        let chunk: &mut [u8] = if limit <= READ_CHUNK_SIZE {
            &mut chunk[..limit]
        } else {
            owned = vec![0u8; limit];
            &mut owned
        };

        loop {
            match self.inner.read(chunk) {
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(FrameError::Timeout)
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frames.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<T: Transport> FrameReader<T> {
    /// Create a frame reader for a link, taking the frame kind from the link
    /// and applying the read timeout from config.
    pub fn for_link(inner: T, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        let kind = inner.kind();
        Ok(Self::with_config(inner, kind, config))
    }
}

pub(crate) fn transport_to_frame_error(err: framelink_transport::TransportError) -> FrameError {
    match err {
        framelink_transport::TransportError::Io(io)
        | framelink_transport::TransportError::Accept(io) => FrameError::Io(io),
        framelink_transport::TransportError::Bind { source, .. }
        | framelink_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
