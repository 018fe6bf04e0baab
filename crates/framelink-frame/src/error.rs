/// Structural problems found while undoing COBS byte stuffing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// A frame must contain at least one overhead byte.
    #[error("empty frame")]
    Empty,

    /// A delimiter byte appeared inside the stuffed region.
    #[error("unexpected delimiter at offset {offset}")]
    UnexpectedDelimiter { offset: usize },

    /// An overhead byte points past the end of the frame.
    #[error("overhead byte {code:#04x} at offset {offset} runs past end of frame ({available} bytes left)")]
    Truncated {
        offset: usize,
        code: u8,
        available: usize,
    },
}

/// Errors that can occur during frame encoding, decoding, and I/O.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The encoded frame cannot fit in a single datagram.
    #[error("encoded frame too large for one datagram ({size} bytes, max {max})")]
    DatagramTooLarge { size: usize, max: usize },

    /// A received frame could not be decoded.
    #[error("malformed frame: {0}")]
    Decode(#[from] DecodeError),

    /// More than `max` bytes arrived without a delimiter.
    #[error("frame exceeds {max} encoded bytes without a delimiter")]
    Oversized { max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A read timeout elapsed before a complete frame arrived.
    #[error("timed out waiting for frame data")]
    Timeout,

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    /// A single bad frame; the stream stays usable.
    pub fn is_corrupt_frame(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::Oversized { .. })
    }

    /// The link is dead or in an unknown state and must be rebuilt.
    pub fn is_connection_fault(&self) -> bool {
        matches!(self, Self::Io(_) | Self::ConnectionClosed)
    }

    /// The payload was rejected before anything was written.
    pub fn is_encoding(&self) -> bool {
        matches!(
            self,
            Self::PayloadTooLarge { .. } | Self::DatagramTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
