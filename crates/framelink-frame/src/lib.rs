//! COBS delimiter framing for point-to-point links.
//!
//! Every payload is byte-stuffed with Consistent Overhead Byte Stuffing so the
//! encoded form never contains `0x00`. On stream links (TCP, RFCOMM) a `0x00`
//! then terminates each frame; on datagram links (UDP) one datagram carries
//! exactly one frame.
//!
//! A stream reader joining mid-conversation throws away everything up to the
//! first delimiter and is aligned from then on. A corrupt frame costs only
//! that frame.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode, decode_into, encode, encode_frame, encode_into, max_encoded_len, FrameConfig,
    DEFAULT_MAX_DATAGRAM, DEFAULT_MAX_PAYLOAD, DELIMITER, MAX_RUN, MAX_UDP_DATAGRAM,
};
pub use error::{DecodeError, FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
