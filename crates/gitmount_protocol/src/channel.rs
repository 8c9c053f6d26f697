//! A framed message channel over a byte stream.

use crate::codec::{LineCodec, Message, PayloadCodec};
use crate::error::{ProtocolError, ProtocolResult};
use crate::frame::{FrameDecoder, FrameFormat};
use std::io::{ErrorKind, Read, Write};
use tracing::trace;

const READ_CHUNK: usize = 4096;

/// Sends and receives [`Message`]s over any `Read + Write` stream.
///
/// Reads are buffered until a full frame is available, so short reads and
/// `Interrupted` are tolerated. A zero-length read means the peer closed the
/// stream. `WouldBlock` and `TimedOut` surface as [`ProtocolError::Timeout`]
/// with any partial frame kept for the next call.
#[derive(Debug)]
pub struct FramedChannel<S, C = LineCodec> {
    stream: S,
    codec: C,
    format: FrameFormat,
    decoder: FrameDecoder,
}

impl<S: Read + Write> FramedChannel<S, LineCodec> {
    /// Creates a channel with the default prefix width and the line codec.
    pub fn new(stream: S) -> Self {
        Self::with_codec(stream, FrameFormat::default(), LineCodec)
    }
}

impl<S: Read + Write, C: PayloadCodec> FramedChannel<S, C> {
    /// Creates a channel with an explicit frame format and codec.
    pub fn with_codec(stream: S, format: FrameFormat, codec: C) -> Self {
        Self {
            stream,
            codec,
            format,
            decoder: FrameDecoder::new(format),
        }
    }

    /// Returns a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Encodes and writes one message as a single frame.
    pub fn send(&mut self, message: &Message) -> ProtocolResult<()> {
        let payload = self.codec.encode(message)?;
        let frame = self.format.encode(&payload)?;
        self.stream.write_all(&frame).map_err(map_io)?;
        self.stream.flush().map_err(map_io)?;
        trace!(len = frame.len(), "sent frame");
        Ok(())
    }

    /// Reads the next message.
    ///
    /// Returns `Ok(None)` when the peer closes the stream cleanly between
    /// frames. Closing in the middle of a frame is a corrupt frame.
    pub fn recv(&mut self) -> ProtocolResult<Option<Message>> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(payload) = self.decoder.next_frame()? {
                trace!(len = payload.len(), "received frame");
                return self.codec.decode(&payload).map(Some);
            }

            let want = self.decoder.wanted().min(READ_CHUNK);
            let n = match self.stream.read(&mut chunk[..want]) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(map_io(e)),
            };
            if n == 0 {
                if self.decoder.buffered() == 0 {
                    return Ok(None);
                }
                return Err(ProtocolError::corrupt_frame(format!(
                    "peer closed with {} bytes of a partial frame",
                    self.decoder.buffered()
                )));
            }
            self.decoder.extend(&chunk[..n]);
        }
    }

    /// Sends a request and waits for exactly one reply.
    pub fn call(&mut self, request: &Message) -> ProtocolResult<Message> {
        self.send(request)?;
        self.recv()?.ok_or(ProtocolError::Closed)
    }
}

fn map_io(e: std::io::Error) -> ProtocolError {
    match e.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => ProtocolError::Timeout,
        _ => ProtocolError::Io(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::message;
    use std::collections::VecDeque;
    use std::io::Cursor;

    /// A stream that hands out at most `step` bytes per read and records writes.
    struct Trickle {
        input: VecDeque<u8>,
        step: usize,
        output: Vec<u8>,
        reads: usize,
        block_at: Option<usize>,
    }

    impl Trickle {
        fn new(input: Vec<u8>, step: usize) -> Self {
            Self {
                input: input.into(),
                step,
                output: Vec::new(),
                reads: 0,
                block_at: None,
            }
        }
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.reads += 1;
            if self.block_at == Some(self.reads) {
                return Err(ErrorKind::WouldBlock.into());
            }
            let n = buf.len().min(self.step).min(self.input.len());
            for slot in buf.iter_mut().take(n) {
                *slot = self.input.pop_front().unwrap_or_default();
            }
            Ok(n)
        }
    }

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn frame_for(m: &Message) -> Vec<u8> {
        let payload = LineCodec.encode(m).unwrap();
        FrameFormat::default().encode(&payload).unwrap()
    }

    #[test]
    fn recv_across_one_byte_reads() {
        let m = message([("action", "ping")]);
        let mut channel = FramedChannel::new(Trickle::new(frame_for(&m), 1));
        assert_eq!(channel.recv().unwrap(), Some(m));
        assert_eq!(channel.recv().unwrap(), None);
    }

    #[test]
    fn send_writes_one_frame() {
        let m = message([("status", "ok")]);
        let mut channel = FramedChannel::new(Trickle::new(Vec::new(), 8));
        channel.send(&m).unwrap();
        assert_eq!(channel.get_ref().output, frame_for(&m));
    }

    #[test]
    fn would_block_keeps_partial_frame() {
        let m = message([("action", "lock")]);
        let mut stream = Trickle::new(frame_for(&m), 3);
        stream.block_at = Some(2);
        let mut channel = FramedChannel::new(stream);

        assert!(matches!(channel.recv(), Err(ProtocolError::Timeout)));
        assert!(channel.decoder.buffered() > 0);
        assert_eq!(channel.recv().unwrap(), Some(m));
    }

    #[test]
    fn close_mid_frame_is_corrupt() {
        let m = message([("action", "info")]);
        let mut bytes = frame_for(&m);
        bytes.truncate(bytes.len() - 2);
        let mut channel = FramedChannel::new(Trickle::new(bytes, 64));
        assert!(matches!(
            channel.recv(),
            Err(ProtocolError::CorruptFrame { .. })
        ));
    }

    #[test]
    fn call_round_trips_against_canned_reply() {
        let reply = message([("status", "ok"), ("message", "pong")]);
        let stream = Cursor::new(frame_for(&reply));
        // Separate read and write halves.
        struct Split(Cursor<Vec<u8>>, Vec<u8>);
        impl Read for Split {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                self.0.read(buf)
            }
        }
        impl Write for Split {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.1.write(buf)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let mut channel = FramedChannel::new(Split(stream, Vec::new()));
        let got = channel.call(&message([("action", "ping")])).unwrap();
        assert_eq!(got, reply);
        assert_eq!(channel.get_ref().1, frame_for(&message([("action", "ping")])));
    }
}
