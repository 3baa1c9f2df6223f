//! Encrypted, framed channel over a blocking byte stream.
//!
//! Each direction owns its own nonce. [`ChannelSender`] seals and writes
//! frames; [`ChannelReceiver`] reads, opens and reassembles them. A
//! [`SecureChannel`] holds both halves and can be [`split`](SecureChannel::split)
//! when sending and receiving happen on different threads.
//!
//! # Failure
//!
//! Any error poisons the half that hit it: the channel is closed and further
//! calls return [`ChannelError::Closed`]. On a combined [`SecureChannel`] an
//! error in either direction closes both. A nonce that has been advanced
//! cannot be rewound, so recovery always means a new handshake.

use std::io::{self, Read, Write};
use std::sync::Arc;

use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::auth::{AuthSigMessage, AUTH_SIG_MESSAGE_SIZE};
use crate::error::ChannelError;
use crate::frame::{self, FrameAssembler, PlainFrame, SEALED_FRAME_SIZE};
use crate::kex::SharedSecret;
use crate::nonce::{Nonce, NoncePair};
use crate::provider::CryptoProvider;

/// Sending half: seals frames with the send nonce.
pub struct ChannelSender<W> {
    writer: W,
    nonce: Nonce,
    secret: Arc<SharedSecret>,
    provider: Arc<dyn CryptoProvider>,
    closed: bool,
}

impl<W: Write> ChannelSender<W> {
    /// Send a payload as one or more sealed frames.
    ///
    /// Returns the number of frames written. An empty payload writes nothing
    /// and returns 0; it is not a liveness probe.
    pub fn send(&mut self, payload: &[u8]) -> Result<usize, ChannelError> {
        self.ensure_open()?;

        let mut frames = 0;
        for plain in frame::to_frames(payload) {
            if let Err(e) = self.write_frame(&plain) {
                self.closed = true;
                return Err(e);
            }
            frames += 1;
        }
        Ok(frames)
    }

    fn write_frame(&mut self, plain: &PlainFrame) -> Result<(), ChannelError> {
        let sealed = self
            .provider
            .aead_seal(plain, self.nonce.as_bytes(), self.secret.as_bytes())
            .map_err(|e| ChannelError::SealFailed(e.to_string()))?;

        if sealed.len() != SEALED_FRAME_SIZE {
            return Err(ChannelError::SealFailed(format!(
                "sealed frame is {} bytes, expected {}",
                sealed.len(),
                SEALED_FRAME_SIZE
            )));
        }

        trace!(nonce = %self.nonce, "sealed frame");
        self.nonce.advance();

        self.writer.write_all(&sealed)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Flush the transport and refuse further sends.
    pub fn close(&mut self) -> Result<(), ChannelError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.writer.flush()?;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Nonce the next frame will be sealed with.
    pub fn next_nonce(&self) -> &Nonce {
        &self.nonce
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn ensure_open(&self) -> Result<(), ChannelError> {
        if self.closed {
            Err(ChannelError::Closed)
        } else {
            Ok(())
        }
    }
}

impl<W: Write> Write for ChannelSender<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.ensure_open()?;
        self.writer.flush()
    }
}

/// Receiving half: opens frames with the receive nonce.
pub struct ChannelReceiver<R> {
    reader: R,
    nonce: Nonce,
    secret: Arc<SharedSecret>,
    provider: Arc<dyn CryptoProvider>,
    /// Opened bytes not yet handed to the caller.
    pending: BytesMut,
    closed: bool,
}

impl<R: Read> ChannelReceiver<R> {
    /// Read frames until `expected_size` bytes have been produced.
    ///
    /// Returns exactly `expected_size` bytes. Data past that point in the
    /// last frame is kept for the next call. Nothing is returned on failure.
    pub fn receive(&mut self, expected_size: usize) -> Result<Vec<u8>, ChannelError> {
        self.ensure_open()?;
        let result = self.receive_inner(expected_size);
        if result.is_err() {
            self.closed = true;
            self.pending.clear();
        }
        result
    }

    fn receive_inner(&mut self, expected_size: usize) -> Result<Vec<u8>, ChannelError> {
        let prefix = self.pending.split();
        let mut assembler = FrameAssembler::with_prefix(expected_size, &prefix);

        while !assembler.is_complete() {
            let plain = self.read_frame()?.ok_or(ChannelError::TransportTruncated)?;
            assembler.push(&plain);
        }

        let mut payload = assembler.finish();
        self.pending = payload.split_off(expected_size);
        Ok(payload.to_vec())
    }

    /// Receive and decode the peer's [`AuthSigMessage`].
    pub fn receive_auth_message(&mut self) -> Result<AuthSigMessage, ChannelError> {
        let bytes = self.receive(AUTH_SIG_MESSAGE_SIZE)?;
        AuthSigMessage::decode(&bytes).map_err(|e| {
            self.close();
            e
        })
    }

    /// Read and open one sealed frame.
    ///
    /// `Ok(None)` means the transport ended cleanly on a frame boundary.
    fn read_frame(&mut self) -> Result<Option<PlainFrame>, ChannelError> {
        let mut sealed = [0u8; SEALED_FRAME_SIZE];
        if !read_full_or_eof(&mut self.reader, &mut sealed)? {
            return Ok(None);
        }

        let opened = self
            .provider
            .aead_open(&sealed, self.nonce.as_bytes(), self.secret.as_bytes())
            .map_err(|_| ChannelError::DecryptionFailed)?;
        let plain: PlainFrame = opened
            .as_slice()
            .try_into()
            .map_err(|_| ChannelError::DecryptionFailed)?;

        trace!(nonce = %self.nonce, len = frame::decode_frame(&plain).len(), "opened frame");
        self.nonce.advance();
        Ok(Some(plain))
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.pending.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Nonce the next frame is expected to be sealed with.
    pub fn next_nonce(&self) -> &Nonce {
        &self.nonce
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn ensure_open(&self) -> Result<(), ChannelError> {
        if self.closed {
            Err(ChannelError::Closed)
        } else {
            Ok(())
        }
    }
}

impl<R: Read> Read for ChannelReceiver<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.ensure_open()?;
        if buf.is_empty() {
            return Ok(0);
        }

        while self.pending.is_empty() {
            match self.read_frame() {
                Ok(Some(plain)) => self.pending.extend_from_slice(frame::decode_frame(&plain)),
                Ok(None) => return Ok(0),
                Err(e) => {
                    self.close();
                    return Err(e.into());
                }
            }
        }

        let n = buf.len().min(self.pending.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.advance(n);
        Ok(n)
    }
}

/// Fill `buf` completely. Returns `Ok(false)` if the stream ended before the
/// first byte, and `TransportTruncated` if it ended part way through.
fn read_full_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool, ChannelError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(ChannelError::TransportTruncated),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(true)
}

/// Both directions of one authenticated connection.
pub struct SecureChannel<R, W> {
    sender: ChannelSender<W>,
    receiver: ChannelReceiver<R>,
}

impl<R: Read, W: Write> SecureChannel<R, W> {
    /// Build a channel from the handshake outputs.
    pub fn new(
        reader: R,
        writer: W,
        secret: SharedSecret,
        nonces: NoncePair,
        provider: Arc<dyn CryptoProvider>,
    ) -> Self {
        let secret = Arc::new(secret);
        Self {
            sender: ChannelSender {
                writer,
                nonce: nonces.send,
                secret: Arc::clone(&secret),
                provider: Arc::clone(&provider),
                closed: false,
            },
            receiver: ChannelReceiver {
                reader,
                nonce: nonces.receive,
                secret,
                provider,
                pending: BytesMut::new(),
                closed: false,
            },
        }
    }

    /// Send a payload. See [`ChannelSender::send`].
    pub fn send(&mut self, payload: &[u8]) -> Result<usize, ChannelError> {
        let result = self.sender.send(payload);
        if result.is_err() {
            self.receiver.close();
        }
        result
    }

    /// Receive exactly `expected_size` bytes. See [`ChannelReceiver::receive`].
    pub fn receive(&mut self, expected_size: usize) -> Result<Vec<u8>, ChannelError> {
        let result = self.receiver.receive(expected_size);
        if result.is_err() {
            self.sender.closed = true;
        }
        result
    }

    pub fn receive_auth_message(&mut self) -> Result<AuthSigMessage, ChannelError> {
        let result = self.receiver.receive_auth_message();
        if result.is_err() {
            self.sender.closed = true;
        }
        result
    }

    /// Close both directions. Later sends and receives fail with `Closed`.
    pub fn close(&mut self) -> Result<(), ChannelError> {
        self.receiver.close();
        self.sender.close()
    }

    /// Mark the channel unusable without touching the transport.
    pub(crate) fn poison(&mut self) {
        self.receiver.close();
        self.sender.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed() || self.receiver.is_closed()
    }

    /// Separate the two directions so each can move to its own thread.
    pub fn split(self) -> (ChannelSender<W>, ChannelReceiver<R>) {
        (self.sender, self.receiver)
    }
}

impl<R: Read, W: Write> Write for SecureChannel<R, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sender.flush()
    }
}

impl<R: Read, W: Write> Read for SecureChannel<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let result = self.receiver.read(buf);
        if self.receiver.is_closed() {
            self.sender.closed = true;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{DATA_MAX_SIZE, TOTAL_FRAME_SIZE};
    use crate::nonce::derive_nonces;
    use crate::provider::DefaultProvider;
    use std::io::Cursor;

    const LOW: [u8; 32] = [0x10; 32];
    const HIGH: [u8; 32] = [0x20; 32];
    const KEY: [u8; 32] = [0x42; 32];

    fn provider() -> Arc<dyn CryptoProvider> {
        Arc::new(DefaultProvider)
    }

    /// Channel for the low peer writing into a buffer.
    fn low_side(reader: Vec<u8>) -> SecureChannel<Cursor<Vec<u8>>, Vec<u8>> {
        let nonces = derive_nonces(&DefaultProvider, &LOW, &HIGH);
        SecureChannel::new(
            Cursor::new(reader),
            Vec::new(),
            SharedSecret::from_bytes(KEY),
            nonces,
            provider(),
        )
    }

    /// Channel for the high peer reading `wire`.
    fn high_side(wire: Vec<u8>) -> SecureChannel<Cursor<Vec<u8>>, Vec<u8>> {
        let nonces = derive_nonces(&DefaultProvider, &HIGH, &LOW);
        SecureChannel::new(
            Cursor::new(wire),
            Vec::new(),
            SharedSecret::from_bytes(KEY),
            nonces,
            provider(),
        )
    }

    /// Bytes the low peer puts on the wire for `payloads`.
    fn sealed_by_low(payloads: &[&[u8]]) -> Vec<u8> {
        let (mut sender, _) = low_side(Vec::new()).split();
        for payload in payloads {
            sender.send(payload).unwrap();
        }
        sender.into_inner()
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 256) as u8).collect()
    }

    #[test]
    fn test_send_receive_roundtrip() {
        for len in [1usize, 98, 1024, 1025, 2048, 5000] {
            let data = payload(len);
            let wire = sealed_by_low(&[&data[..]]);
            let frames = (len + DATA_MAX_SIZE - 1) / DATA_MAX_SIZE;
            assert_eq!(wire.len(), frames * SEALED_FRAME_SIZE);

            let mut peer = high_side(wire);
            assert_eq!(peer.receive(len).unwrap(), data);
        }
    }

    #[test]
    fn test_nonce_advances_two_per_frame() {
        let (mut sender, _) = low_side(Vec::new()).split();
        let start = *sender.next_nonce();

        let frames = sender.send(&payload(3 * DATA_MAX_SIZE)).unwrap();
        assert_eq!(frames, 3);

        let mut expected = start;
        for _ in 0..3 {
            expected.advance();
        }
        assert_eq!(sender.next_nonce(), &expected);
    }

    #[test]
    fn test_empty_payload_writes_nothing() {
        let (mut sender, _) = low_side(Vec::new()).split();
        let start = *sender.next_nonce();

        assert_eq!(sender.send(&[]).unwrap(), 0);
        assert_eq!(sender.next_nonce(), &start);
        assert!(sender.into_inner().is_empty());
    }

    #[test]
    fn test_receive_keeps_overflow_for_next_call() {
        let wire = sealed_by_low(&[&b"hello world"[..]]);
        let mut peer = high_side(wire);

        assert_eq!(peer.receive(5).unwrap(), b"hello");
        assert_eq!(peer.receive(6).unwrap(), b" world");
    }

    #[test]
    fn test_wrong_direction_nonce_fails() {
        // The low peer reading its own output uses the wrong nonce.
        let wire = sealed_by_low(&[&b"loopback"[..]]);
        let mut same_side = low_side(wire);
        assert!(matches!(
            same_side.receive(8),
            Err(ChannelError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_tampered_frame_is_rejected() {
        let wire = sealed_by_low(&[&b"integrity matters"[..]]);

        for (byte, bit) in [(0usize, 0u8), (15, 7), (16, 3), (500, 1), (SEALED_FRAME_SIZE - 1, 6)] {
            let mut tampered = wire.clone();
            tampered[byte] ^= 1 << bit;

            let mut peer = high_side(tampered);
            assert!(matches!(
                peer.receive(17),
                Err(ChannelError::DecryptionFailed)
            ));
            assert!(peer.is_closed());
            assert!(matches!(peer.receive(17), Err(ChannelError::Closed)));
            assert!(matches!(peer.send(b"x"), Err(ChannelError::Closed)));
        }
    }

    #[test]
    fn test_truncated_transport() {
        let wire = sealed_by_low(&[&payload(2000)[..]]);

        // Ends mid-frame.
        let mut peer = high_side(wire[..SEALED_FRAME_SIZE + 10].to_vec());
        assert!(matches!(
            peer.receive(2000),
            Err(ChannelError::TransportTruncated)
        ));

        // Ends on a frame boundary before enough data arrived.
        let mut peer = high_side(wire[..SEALED_FRAME_SIZE].to_vec());
        assert!(matches!(
            peer.receive(2000),
            Err(ChannelError::TransportTruncated)
        ));
    }

    #[test]
    fn test_huge_expected_size_on_empty_transport() {
        let mut peer = high_side(Vec::new());
        assert!(matches!(
            peer.receive(usize::MAX),
            Err(ChannelError::TransportTruncated)
        ));

        let mut peer = high_side(Vec::new());
        assert!(matches!(
            peer.receive(1 << 40),
            Err(ChannelError::TransportTruncated)
        ));
    }

    #[test]
    fn test_malformed_auth_message_drops_buffered_bytes() {
        // 98 bytes with a bad key length prefix, plus bytes that land in `pending`.
        let mut bogus = vec![0u8; AUTH_SIG_MESSAGE_SIZE + 22];
        bogus[0] = 31;
        let wire = sealed_by_low(&[&bogus[..]]);

        let (_, mut receiver) = high_side(wire).split();
        assert!(matches!(
            receiver.receive_auth_message(),
            Err(ChannelError::MalformedAuthMessage(_))
        ));
        assert!(receiver.is_closed());
        assert!(receiver.pending.is_empty());
    }

    #[test]
    fn test_frames_stay_in_lockstep_across_sends() {
        let first = payload(1500);
        let second = payload(10);
        let wire = sealed_by_low(&[&first[..], &second[..]]);

        let mut peer = high_side(wire);
        assert_eq!(peer.receive(1500).unwrap(), first);
        assert_eq!(peer.receive(10).unwrap(), second);
    }

    #[test]
    fn test_closed_channel_refuses_io() {
        let mut channel = low_side(Vec::new());
        channel.close().unwrap();
        assert!(channel.is_closed());
        assert!(matches!(channel.send(b"late"), Err(ChannelError::Closed)));
        assert!(matches!(channel.receive(1), Err(ChannelError::Closed)));
    }

    #[test]
    fn test_io_adapters() {
        let data = payload(3000);
        let (mut sender, _) = low_side(Vec::new()).split();
        sender.write_all(&data).unwrap();
        sender.flush().unwrap();
        let wire = sender.into_inner();

        let mut peer = high_side(wire);
        let mut received = Vec::new();
        peer.read_to_end(&mut received).unwrap();
        assert_eq!(received, data);
    }

    #[test]
    fn test_read_reports_truncation() {
        let wire = sealed_by_low(&[&b"abc"[..]]);
        let mut peer = high_side(wire[..100].to_vec());

        let mut buf = [0u8; 16];
        let err = peer.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(peer.is_closed());
    }

    #[test]
    fn test_seal_output_size_is_checked() {
        struct ShortSeal;

        impl CryptoProvider for ShortSeal {
            fn generate_signing_keypair(&self) -> (zeroize::Zeroizing<[u8; 32]>, [u8; 32]) {
                DefaultProvider.generate_signing_keypair()
            }
            fn signing_public_key(&self, private_key: &[u8; 32]) -> [u8; 32] {
                DefaultProvider.signing_public_key(private_key)
            }
            fn sign(&self, private_key: &[u8; 32], message: &[u8]) -> [u8; 64] {
                DefaultProvider.sign(private_key, message)
            }
            fn verify(&self, public_key: &[u8; 32], message: &[u8], signature: &[u8; 64]) -> bool {
                DefaultProvider.verify(public_key, message, signature)
            }
            fn generate_agreement_keypair(&self) -> (zeroize::Zeroizing<[u8; 32]>, [u8; 32]) {
                DefaultProvider.generate_agreement_keypair()
            }
            fn agreement_public_key(&self, private_key: &[u8; 32]) -> [u8; 32] {
                DefaultProvider.agreement_public_key(private_key)
            }
            fn ecdh(
                &self,
                peer_public_key: &[u8],
                local_private_key: &[u8; 32],
            ) -> Result<zeroize::Zeroizing<[u8; 32]>, crate::provider::ProviderError> {
                DefaultProvider.ecdh(peer_public_key, local_private_key)
            }
            fn aead_seal(
                &self,
                plaintext: &[u8],
                _nonce: &[u8; 24],
                _key: &[u8; 32],
            ) -> Result<Vec<u8>, crate::provider::ProviderError> {
                Ok(plaintext.to_vec())
            }
            fn aead_open(
                &self,
                ciphertext: &[u8],
                nonce: &[u8; 24],
                key: &[u8; 32],
            ) -> Result<Vec<u8>, crate::provider::ProviderError> {
                DefaultProvider.aead_open(ciphertext, nonce, key)
            }
            fn hash20(&self, data: &[u8]) -> [u8; 20] {
                DefaultProvider.hash20(data)
            }
            fn hash32(&self, data: &[u8]) -> [u8; 32] {
                DefaultProvider.hash32(data)
            }
        }

        let nonces = derive_nonces(&DefaultProvider, &LOW, &HIGH);
        let mut channel = SecureChannel::new(
            Cursor::new(Vec::new()),
            Vec::new(),
            SharedSecret::from_bytes(KEY),
            nonces,
            Arc::new(ShortSeal),
        );

        assert!(matches!(
            channel.send(&[0u8; TOTAL_FRAME_SIZE]),
            Err(ChannelError::SealFailed(_))
        ));
        assert!(channel.is_closed());
    }
}
