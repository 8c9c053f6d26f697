//! Length-prefixed framing.
//!
//! ```text
//! +----------------------------+---------------------+
//! | length (width bytes, BE)   | payload             |
//! +----------------------------+---------------------+
//! ```
//!
//! The length value counts the prefix itself: `length = width + payload_len`.

use crate::error::{ProtocolError, ProtocolResult};
use bytes::{Buf, BufMut, BytesMut};

/// Default number of bytes in the length prefix.
pub const DEFAULT_PREFIX_WIDTH: usize = 2;

/// Frame layout parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat {
    width: usize,
}

impl FrameFormat {
    /// Creates a frame format with the given prefix width in bytes.
    pub fn new(width: usize) -> ProtocolResult<Self> {
        if !(1..=8).contains(&width) {
            return Err(ProtocolError::InvalidPrefixWidth(width));
        }
        Ok(Self { width })
    }

    /// Returns the prefix width in bytes.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Largest total frame length (prefix included) this format can carry.
    pub fn max_frame_len(&self) -> usize {
        if self.width >= std::mem::size_of::<usize>() {
            usize::MAX
        } else {
            (1usize << (self.width * 8)) - 1
        }
    }

    /// Encodes one frame around `payload`.
    pub fn encode(&self, payload: &[u8]) -> ProtocolResult<Vec<u8>> {
        let total = payload.len() + self.width;
        if total > self.max_frame_len() {
            return Err(ProtocolError::FrameTooLarge {
                len: total,
                max: self.max_frame_len(),
            });
        }
        let mut out = BytesMut::with_capacity(total);
        out.put_uint(total as u64, self.width);
        out.put_slice(payload);
        Ok(out.to_vec())
    }
}

impl Default for FrameFormat {
    fn default() -> Self {
        Self {
            width: DEFAULT_PREFIX_WIDTH,
        }
    }
}

/// Incremental frame decoder.
///
/// Bytes may arrive in arbitrary chunks; complete payloads are returned once
/// both the prefix and every payload byte have been buffered.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    format: FrameFormat,
    buffer: BytesMut,
}

impl FrameDecoder {
    /// Creates a decoder for the given format.
    pub fn new(format: FrameFormat) -> Self {
        Self {
            format,
            buffer: BytesMut::new(),
        }
    }

    /// Appends raw bytes read from the stream.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet returned as a frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Bytes still missing before the next frame can be returned.
    pub fn wanted(&self) -> usize {
        let width = self.format.width;
        if self.buffer.len() < width {
            return width - self.buffer.len();
        }
        let total = self.peek_len();
        total.saturating_sub(self.buffer.len()).max(1)
    }

    /// Pops the next complete payload, if one is buffered.
    pub fn next_frame(&mut self) -> ProtocolResult<Option<Vec<u8>>> {
        let width = self.format.width;
        if self.buffer.len() < width {
            return Ok(None);
        }
        let total = self.peek_len();
        if total < width {
            return Err(ProtocolError::corrupt_frame(format!(
                "length {total} is shorter than the {width}-byte prefix"
            )));
        }
        if self.buffer.len() < total {
            return Ok(None);
        }
        let mut frame = self.buffer.split_to(total);
        frame.advance(width);
        Ok(Some(frame.to_vec()))
    }

    fn peek_len(&self) -> usize {
        let mut prefix = &self.buffer[..self.format.width];
        prefix.get_uint(self.format.width) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn encode_counts_prefix_in_length() {
        let frame = FrameFormat::default().encode(b"abc").unwrap();
        assert_eq!(frame, vec![0x00, 0x05, b'a', b'b', b'c']);
    }

    #[test]
    fn length_is_big_endian_base_256() {
        let payload = vec![b'x'; 300];
        let frame = FrameFormat::default().encode(&payload).unwrap();
        assert_eq!(&frame[..2], &[0x01, 0x2e]);

        let mut decoder = FrameDecoder::new(FrameFormat::default());
        decoder.extend(&frame);
        assert_eq!(decoder.next_frame().unwrap().unwrap().len(), 300);
    }

    #[test]
    fn rejects_oversized_payload() {
        let format = FrameFormat::new(1).unwrap();
        let err = format.encode(&[0u8; 255]).unwrap_err();
        assert!(matches!(err, ProtocolError::FrameTooLarge { max: 255, .. }));
        assert!(format.encode(&[0u8; 254]).is_ok());
    }

    #[test]
    fn rejects_invalid_width() {
        assert!(FrameFormat::new(0).is_err());
        assert!(FrameFormat::new(9).is_err());
        assert_eq!(FrameFormat::new(4).unwrap().width(), 4);
    }

    #[test]
    fn partial_prefix_then_payload() {
        let mut decoder = FrameDecoder::new(FrameFormat::default());
        decoder.extend(&[0x00]);
        assert_eq!(decoder.wanted(), 1);
        assert!(decoder.next_frame().unwrap().is_none());
        decoder.extend(&[0x04, b'h']);
        assert_eq!(decoder.wanted(), 1);
        assert!(decoder.next_frame().unwrap().is_none());
        decoder.extend(&[b'i']);
        assert_eq!(decoder.next_frame().unwrap().unwrap(), b"hi");
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn multiple_frames_in_one_read() {
        let format = FrameFormat::default();
        let mut bytes = format.encode(b"one").unwrap();
        bytes.extend(format.encode(b"").unwrap());
        bytes.extend(format.encode(b"three").unwrap());

        let mut decoder = FrameDecoder::new(format);
        decoder.extend(&bytes);
        assert_eq!(decoder.next_frame().unwrap().unwrap(), b"one");
        assert_eq!(decoder.next_frame().unwrap().unwrap(), b"");
        assert_eq!(decoder.next_frame().unwrap().unwrap(), b"three");
        assert!(decoder.next_frame().unwrap().is_none());
    }

    #[test]
    fn length_smaller_than_prefix_is_corrupt() {
        let mut decoder = FrameDecoder::new(FrameFormat::default());
        decoder.extend(&[0x00, 0x01]);
        let err = decoder.next_frame().unwrap_err();
        assert!(matches!(err, ProtocolError::CorruptFrame { .. }));
    }

    proptest! {
        #[test]
        fn arbitrary_chunking_yields_same_payloads(
            payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..6),
            chunk in 1usize..7,
        ) {
            let format = FrameFormat::default();
            let mut stream = Vec::new();
            for p in &payloads {
                stream.extend(format.encode(p).unwrap());
            }

            let mut decoder = FrameDecoder::new(format);
            let mut out = Vec::new();
            for piece in stream.chunks(chunk) {
                decoder.extend(piece);
                while let Some(frame) = decoder.next_frame().unwrap() {
                    out.push(frame);
                }
            }
            prop_assert_eq!(out, payloads);
        }
    }
}
