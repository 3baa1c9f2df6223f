//! Fixed-size frame codec.
//!
//! # Wire Format
//!
//! Plaintext frame, always [`TOTAL_FRAME_SIZE`] bytes:
//! ```text
//! [2 bytes: data length, big-endian] [data, up to 1024 bytes] [zero padding]
//! ```
//!
//! Sealed frame, always [`SEALED_FRAME_SIZE`] bytes:
//! ```text
//! [16 bytes: Poly1305 tag] [1026 bytes: XSalsa20 ciphertext]
//! ```

use bytes::{Buf, BufMut, BytesMut};

/// Size of the length prefix.
pub const DATA_LEN_SIZE: usize = 2;

/// Maximum payload bytes carried by one frame.
pub const DATA_MAX_SIZE: usize = 1024;

/// Plaintext frame size: 2 + 1024.
pub const TOTAL_FRAME_SIZE: usize = DATA_MAX_SIZE + DATA_LEN_SIZE;

/// Authentication tag overhead added by the frame cipher.
pub const AEAD_TAG_SIZE: usize = 16;

/// Sealed frame size on the wire: 1026 + 16.
pub const SEALED_FRAME_SIZE: usize = TOTAL_FRAME_SIZE + AEAD_TAG_SIZE;

pub type PlainFrame = [u8; TOTAL_FRAME_SIZE];

/// Build one plaintext frame around `chunk`.
///
/// # Panics
/// Panics if `chunk` is longer than [`DATA_MAX_SIZE`]. Callers go through
/// [`to_frames`], which never hands it a longer chunk.
pub(crate) fn encode_frame(chunk: &[u8]) -> PlainFrame {
    assert!(chunk.len() <= DATA_MAX_SIZE, "frame chunk too large");

    let mut frame = [0u8; TOTAL_FRAME_SIZE];
    let mut buf = &mut frame[..];
    buf.put_u16(chunk.len() as u16);
    buf.put_slice(chunk);
    frame
}

/// Split a payload into plaintext frames. An empty payload yields no frames.
pub fn to_frames(payload: &[u8]) -> impl Iterator<Item = PlainFrame> + '_ {
    payload.chunks(DATA_MAX_SIZE).map(encode_frame)
}

/// Extract the data carried by one plaintext frame.
///
/// The length prefix is trusted, capped at [`DATA_MAX_SIZE`]. Padding is ignored.
pub fn decode_frame(frame: &PlainFrame) -> &[u8] {
    let mut buf = &frame[..];
    let len = (buf.get_u16() as usize).min(DATA_MAX_SIZE);
    &buf[..len]
}

/// Accumulates frame data until an expected number of bytes has arrived.
#[derive(Debug)]
pub struct FrameAssembler {
    buf: BytesMut,
    expected: usize,
}

impl FrameAssembler {
    /// The buffer starts at one frame's worth at most and grows as frames
    /// arrive, so `expected` is never trusted as an allocation size.
    pub fn new(expected: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(expected.min(DATA_MAX_SIZE)),
            expected,
        }
    }

    /// Start from bytes already received (left over from an earlier frame).
    pub fn with_prefix(expected: usize, prefix: &[u8]) -> Self {
        let mut buf = BytesMut::with_capacity(expected.min(DATA_MAX_SIZE).max(prefix.len()));
        buf.extend_from_slice(prefix);
        Self { buf, expected }
    }

    pub fn is_complete(&self) -> bool {
        self.buf.len() >= self.expected
    }

    /// Append one frame's data. Returns true once `expected` bytes are held.
    pub fn push(&mut self, frame: &PlainFrame) -> bool {
        self.buf.extend_from_slice(decode_frame(frame));
        self.is_complete()
    }

    /// Everything accumulated, which may run past `expected` by part of a frame.
    pub fn finish(self) -> BytesMut {
        self.buf
    }
}

/// Reassemble frames until `expected` bytes have been collected.
///
/// Frames past the point of completion are not read.
pub fn from_frames<'a, I>(frames: I, expected: usize) -> Vec<u8>
where
    I: IntoIterator<Item = &'a PlainFrame>,
{
    let mut assembler = FrameAssembler::new(expected);
    for frame in frames {
        if assembler.is_complete() {
            break;
        }
        assembler.push(frame);
    }
    assembler.finish().to_vec()
}
