use bytes::{BufMut, BytesMut};
use framelink_transport::TransportKind;

use crate::error::{DecodeError, FrameError, Result};

/// Frame delimiter. Never appears inside an encoded frame.
pub const DELIMITER: u8 = 0x00;

/// Longest run of non-delimiter bytes one overhead byte can describe.
pub const MAX_RUN: usize = 254;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Default receive buffer for one datagram.
///
/// Longer datagrams are truncated by the socket; the truncated frame then
/// usually fails to decode and is reported like any other corrupt frame.
pub const DEFAULT_MAX_DATAGRAM: usize = 128;

/// Largest UDP payload over IPv4.
pub const MAX_UDP_DATAGRAM: usize = 65_507;

/// Worst-case encoded size for a payload of `len` bytes (excluding delimiter).
pub fn max_encoded_len(len: usize) -> usize {
    len + len / MAX_RUN + 1
}

/// COBS-encode `payload`.
///
/// ```
/// let encoded = framelink_frame::encode(b"AB\x00CD");
/// assert_eq!(encoded, [0x03, b'A', b'B', 0x03, b'C', b'D']);
/// ```
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut dst = BytesMut::with_capacity(max_encoded_len(payload.len()));
    encode_into(payload, &mut dst);
    dst.to_vec()
}

/// COBS-encode `payload`, appending to `dst`.
///
/// Each run of non-zero bytes is prefixed by an overhead byte holding the
/// run length plus one. A run that reaches [`MAX_RUN`] bytes gets code
/// `0xFF`, which implies no zero after it.
pub fn encode_into(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(max_encoded_len(payload.len()));
    let mut code_at = dst.len();
    dst.put_u8(0);
    let mut code: u8 = 1;

    for &byte in payload {
        if byte != DELIMITER {
            dst.put_u8(byte);
            code += 1;
        }
        if byte == DELIMITER || code == 0xFF {
            dst[code_at] = code;
            code_at = dst.len();
            dst.put_u8(0);
            code = 1;
        }
    }
    dst[code_at] = code;
}

/// Undo COBS encoding of one frame (without its delimiter).
pub fn decode(frame: &[u8]) -> std::result::Result<Vec<u8>, DecodeError> {
    let mut dst = BytesMut::with_capacity(frame.len());
    decode_into(frame, &mut dst)?;
    Ok(dst.to_vec())
}

/// Undo COBS encoding, appending the payload to `dst`.
///
/// On error `dst` is left as it was.
pub fn decode_into(frame: &[u8], dst: &mut BytesMut) -> std::result::Result<(), DecodeError> {
    if frame.is_empty() {
        return Err(DecodeError::Empty);
    }

    let start_len = dst.len();
    let result = decode_runs(frame, dst);
    if result.is_err() {
        dst.truncate(start_len);
    }
    result
}

fn decode_runs(frame: &[u8], dst: &mut BytesMut) -> std::result::Result<(), DecodeError> {
    dst.reserve(frame.len());
    let mut pos = 0usize;
    while pos < frame.len() {
        let code = frame[pos];
        if code == DELIMITER {
            return Err(DecodeError::UnexpectedDelimiter { offset: pos });
        }

        let run_start = pos + 1;
        let run_end = pos + code as usize;
        if run_end > frame.len() {
            return Err(DecodeError::Truncated {
                offset: pos,
                code,
                available: frame.len() - run_start,
            });
        }

        let run = &frame[run_start..run_end];
        if let Some(i) = run.iter().position(|&b| b == DELIMITER) {
            return Err(DecodeError::UnexpectedDelimiter {
                offset: run_start + i,
            });
        }
        dst.extend_from_slice(run);

        pos = run_end;
        if code != 0xFF && pos < frame.len() {
            dst.put_u8(DELIMITER);
        }
    }
    Ok(())
}

/// Encode `payload` into its wire form for a link of the given kind.
///
/// Wire format:
/// ```text
/// stream:    [COBS(payload)][0x00]
/// datagram:  [COBS(payload)]          (one datagram)
/// ```
pub fn encode_frame(
    payload: &[u8],
    kind: TransportKind,
    max_payload: usize,
    dst: &mut BytesMut,
) -> Result<()> {
    if payload.len() > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: max_payload,
        });
    }

    let start_len = dst.len();
    encode_into(payload, dst);
    match kind {
        TransportKind::Stream => dst.put_u8(DELIMITER),
        TransportKind::Datagram => {
            let size = dst.len() - start_len;
            if size > MAX_UDP_DATAGRAM {
                dst.truncate(start_len);
                return Err(FrameError::DatagramTooLarge {
                    size,
                    max: MAX_UDP_DATAGRAM,
                });
            }
        }
    }
    Ok(())
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Receive buffer for one datagram. Default: 128 bytes.
    pub max_datagram_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
    /// Write a lone delimiter before the first frame on a new stream link so
    /// the receiver's resync does not swallow that frame. Default: true.
    pub sync_preamble: bool,
}

impl FrameConfig {
    /// Largest encoded frame a reader will buffer before giving up on it.
    pub fn max_frame_len(&self) -> usize {
        max_encoded_len(self.max_payload_size)
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            max_datagram_size: DEFAULT_MAX_DATAGRAM,
            read_timeout: None,
            write_timeout: None,
            sync_preamble: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_embedded_zero() {
        let encoded = encode(b"AB\x00CD");
        assert_eq!(encoded, [0x03, b'A', b'B', 0x03, b'C', b'D']);
        assert!(!encoded.contains(&DELIMITER));
        assert_eq!(decode(&encoded).unwrap(), b"AB\x00CD");
    }

    #[test]
    fn stream_frame_appends_delimiter() {
        let mut buf = BytesMut::new();
        encode_frame(b"AB\x00CD", TransportKind::Stream, DEFAULT_MAX_PAYLOAD, &mut buf).unwrap();

        assert_eq!(buf.last(), Some(&DELIMITER));
        assert!(!buf[..buf.len() - 1].contains(&DELIMITER));
        assert_eq!(decode(&buf[..buf.len() - 1]).unwrap(), b"AB\x00CD");
    }

    #[test]
    fn datagram_frame_has_no_delimiter() {
        let mut buf = BytesMut::new();
        encode_frame(b"hi", TransportKind::Datagram, DEFAULT_MAX_PAYLOAD, &mut buf).unwrap();
        assert_eq!(buf.as_ref(), [0x03, b'h', b'i']);
    }

    #[test]
    fn edge_payloads() {
        assert_eq!(encode(b""), [0x01]);
        assert_eq!(encode(b"\x00"), [0x01, 0x01]);
        assert_eq!(encode(b"\x00\x00"), [0x01, 0x01, 0x01]);
        assert_eq!(encode(b"\x11\x00"), [0x02, 0x11, 0x01]);

        assert_eq!(decode(&[0x01]).unwrap(), b"");
        assert_eq!(decode(&[0x01, 0x01]).unwrap(), b"\x00");
        assert_eq!(decode(&[0x01, 0x01, 0x01]).unwrap(), b"\x00\x00");
    }

    #[test]
    fn long_runs_split_at_254() {
        let payload = vec![0x42u8; MAX_RUN];
        let encoded = encode(&payload);
        assert_eq!(encoded[0], 0xFF);
        assert_eq!(encoded.len(), max_encoded_len(payload.len()));
        assert_eq!(decode(&encoded).unwrap(), payload);

        let payload = vec![0x42u8; MAX_RUN + 1];
        let encoded = encode(&payload);
        assert_eq!(encoded[0], 0xFF);
        assert_eq!(encoded[MAX_RUN + 1], 0x02);
        assert_eq!(decode(&encoded).unwrap(), payload);
    }

    #[test]
    fn decode_rejects_empty() {
        assert_eq!(decode(&[]), Err(DecodeError::Empty));
    }

    #[test]
    fn decode_rejects_overrun() {
        let err = decode(&[0x05, b'a', b'b']).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Truncated {
                offset: 0,
                code: 0x05,
                available: 2
            }
        );
    }

    #[test]
    fn decode_rejects_interior_delimiter() {
        assert_eq!(
            decode(&[0x03, b'a', 0x00]),
            Err(DecodeError::UnexpectedDelimiter { offset: 2 })
        );
        assert_eq!(
            decode(&[0x02, b'a', 0x00]),
            Err(DecodeError::UnexpectedDelimiter { offset: 2 })
        );
    }

    #[test]
    fn decode_into_restores_buffer_on_error() {
        let mut dst = BytesMut::from(&b"keep"[..]);
        assert!(decode_into(&[0x02, b'x', 0x09], &mut dst).is_err());
        assert_eq!(dst.as_ref(), b"keep");
    }

    #[test]
    fn payload_too_large_rejected() {
        let mut buf = BytesMut::new();
        let err = encode_frame(b"oversized", TransportKind::Stream, 4, &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 9, max: 4 }));
        assert!(buf.is_empty());
    }

    #[test]
    fn datagram_frame_must_fit_udp() {
        let payload = vec![1u8; MAX_UDP_DATAGRAM];
        let mut buf = BytesMut::from(&b"prefix"[..]);
        let err = encode_frame(&payload, TransportKind::Datagram, usize::MAX, &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::DatagramTooLarge { .. }));
        assert_eq!(buf.as_ref(), b"prefix");
    }
}
