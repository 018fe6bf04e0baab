use std::io::{ErrorKind, Write};

use bytes::BytesMut;
use framelink_transport::{Transport, TransportKind};
use tracing::trace;

use crate::codec::{encode_frame, FrameConfig, DELIMITER};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to any `Write` stream.
///
/// Each [`send`](Self::send) encodes one payload and writes it with a single
/// `write` call per datagram, or a full write loop on streams. On a stream
/// link the very first write is prefixed with a lone delimiter (see
/// [`FrameConfig::sync_preamble`]).
pub struct FrameWriter<T> {
    inner: T,
    kind: TransportKind,
    buf: BytesMut,
    preamble_pending: bool,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T, kind: TransportKind) -> Self {
        Self::with_config(inner, kind, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, kind: TransportKind, config: FrameConfig) -> Self {
        Self {
            inner,
            kind,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            preamble_pending: kind.is_stream() && config.sync_preamble,
            config,
        }
    }

    /// Encode and send one payload.
    ///
    /// Nothing is written if the payload is rejected. A write timeout is
    /// reported as [`FrameError::Io`]: part of the frame may already be on
    /// the wire, so the link cannot be trusted afterwards.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.buf.clear();
        if self.preamble_pending {
            self.buf.extend_from_slice(&[DELIMITER]);
        }
        let preamble = self.buf.len();
        if let Err(err) = encode_frame(payload, self.kind, self.config.max_payload_size, &mut self.buf) {
            self.buf.clear();
            return Err(err);
        }
        // A peer reads datagrams into a buffer of the same configured size;
        // anything longer would arrive truncated.
        let size = self.buf.len() - preamble;
        if self.kind == TransportKind::Datagram && size > self.config.max_datagram_size {
            self.buf.clear();
            return Err(FrameError::DatagramTooLarge {
                size,
                max: self.config.max_datagram_size,
            });
        }

        match self.kind {
            TransportKind::Stream => self.write_all_buffered()?,
            TransportKind::Datagram => self.write_datagram()?,
        }
        self.preamble_pending = false;
        trace!(
            payload = payload.len(),
            wire = self.buf.len() - preamble,
            "frame sent"
        );

        self.flush()
    }

    fn write_all_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
        Ok(())
    }

    fn write_datagram(&mut self) -> Result<()> {
        loop {
            match self.inner.write(&self.buf) {
                Ok(n) if n == self.buf.len() => return Ok(()),
                Ok(_) => return Err(FrameError::Io(ErrorKind::WriteZero.into())),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Kind of link this writer frames for.
    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frame encoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<T: Transport> FrameWriter<T> {
    /// Create a frame writer for a link, taking the frame kind from the link
    /// and applying the write timeout from config.
    pub fn for_link(inner: T, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        let kind = inner.kind();
        Ok(Self::with_config(inner, kind, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::codec::{decode, DEFAULT_MAX_DATAGRAM};
    use crate::reader::FrameReader;

    fn written(writer: FrameWriter<Cursor<Vec<u8>>>) -> Vec<u8> {
        writer.into_inner().into_inner()
    }

    #[test]
    fn write_single_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()), TransportKind::Stream);
        writer.send(b"hello").unwrap();

        let wire = written(writer);
        assert_eq!(wire, [0x00, 0x06, b'h', b'e', b'l', b'l', b'o', 0x00]);
    }

    #[test]
    fn preamble_only_once() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()), TransportKind::Stream);
        writer.send(b"a").unwrap();
        writer.send(b"b").unwrap();

        let wire = written(writer);
        assert_eq!(wire, [0x00, 0x02, b'a', 0x00, 0x02, b'b', 0x00]);
    }

    #[test]
    fn preamble_can_be_disabled() {
        let cfg = FrameConfig {
            sync_preamble: false,
            ..FrameConfig::default()
        };
        let mut writer =
            FrameWriter::with_config(Cursor::new(Vec::new()), TransportKind::Stream, cfg);
        writer.send(b"a").unwrap();
        assert_eq!(written(writer), [0x02, b'a', 0x00]);
    }

    #[test]
    fn datagrams_have_no_delimiters() {
        let mut writer = FrameWriter::new(DatagramSink::default(), TransportKind::Datagram);
        writer.send(b"x\x00y").unwrap();
        writer.send(b"").unwrap();

        let sent = writer.into_inner().datagrams;
        assert_eq!(sent, vec![vec![0x02, b'x', 0x02, b'y'], vec![0x01]]);
        assert_eq!(decode(&sent[0]).unwrap(), b"x\x00y");
    }

    #[test]
    fn datagram_must_fit_receive_buffer() {
        let mut writer = FrameWriter::new(DatagramSink::default(), TransportKind::Datagram);
        // 127 payload bytes encode to exactly the default 128-byte datagram.
        writer.send(&[7u8; DEFAULT_MAX_DATAGRAM - 1]).unwrap();

        let err = writer.send(&[7u8; DEFAULT_MAX_DATAGRAM]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::DatagramTooLarge { size: 129, max: DEFAULT_MAX_DATAGRAM }
        ));
        assert!(err.is_encoding());
        assert_eq!(writer.into_inner().datagrams.len(), 1);
    }

    #[test]
    fn short_datagram_write_is_an_error() {
        let mut writer = FrameWriter::new(ShortWriter, TransportKind::Datagram);
        let err = writer.send(b"abc").unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WriteZero));
    }

    #[test]
    fn payload_too_large_rejected() {
        let cfg = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut writer =
            FrameWriter::with_config(Cursor::new(Vec::new()), TransportKind::Stream, cfg);

        let err = writer.send(b"oversized").unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert!(err.is_encoding());

        // The preamble is still owed to the first frame that does go out.
        writer.send(b"ok").unwrap();
        assert_eq!(written(writer), [0x00, 0x03, b'o', b'k', 0x00]);
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink, TransportKind::Stream);

        writer.send(b"x").unwrap();

        assert!(flag.load(Ordering::SeqCst));
        assert_eq!(writer.into_inner().data, [0x00, 0x02, b'x', 0x00]);
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()), TransportKind::Stream);

        assert_eq!(writer.kind(), TransportKind::Stream);
        let _ = writer.get_ref();
        let _ = writer.get_mut();
        writer.set_max_payload_size(12);
        assert_eq!(writer.config().max_payload_size, 12);
        let _inner = writer.into_inner();
    }

    #[test]
    fn handles_interrupted_write_and_flush() {
        let writer_impl = InterruptedWriteThenFlush {
            wrote_once: false,
            flush_interrupted: false,
            data: Vec::new(),
        };

        let mut writer = FrameWriter::new(writer_impl, TransportKind::Stream);
        writer.send(b"retry").unwrap();

        let inner = writer.into_inner();
        assert!(!inner.data.is_empty());
    }

    #[test]
    fn write_timeout_is_a_link_fault() {
        let mut writer = FrameWriter::new(TimedOutWriter, TransportKind::Stream);
        let err = writer.send(b"x").unwrap_err();
        assert!(err.is_connection_fault());
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter, TransportKind::Stream);
        let err = writer.send(b"x").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn written_bytes_decode() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::new()), TransportKind::Stream);
        writer.send(b"z").unwrap();
        writer.send(b"\x00\x00\x00").unwrap();

        let wire = written(writer);
        let mut reader = FrameReader::new(Cursor::new(wire), TransportKind::Stream);
        assert_eq!(reader.read_payload().unwrap().as_ref(), b"z");
        assert_eq!(reader.read_payload().unwrap().as_ref(), b"\x00\x00\x00");
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct DatagramSink {
        datagrams: Vec<Vec<u8>>,
    }

    impl Write for DatagramSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.datagrams.push(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct InterruptedWriteThenFlush {
        wrote_once: bool,
        flush_interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for InterruptedWriteThenFlush {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.wrote_once {
                self.wrote_once = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_interrupted {
                self.flush_interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            Ok(())
        }
    }

    struct TimedOutWriter;

    impl Write for TimedOutWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ShortWriter;

    impl Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len() / 2)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
