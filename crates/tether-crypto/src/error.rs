//! Error types for the handshake and the secure channel.

use std::io;
use thiserror::Error;

/// Connection errors.
///
/// Every variant is fatal for the connection that produced it. Nonce state
/// cannot be rewound once advanced, so the transport must be closed and a
/// fresh handshake performed.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("key exchange failed: {0}")]
    KeyExchangeFailed(String),

    #[error("peer signature does not verify against the challenge")]
    AuthenticationFailed,

    #[error("malformed auth message: {0}")]
    MalformedAuthMessage(String),

    #[error("frame failed integrity check")]
    DecryptionFailed,

    #[error("transport closed mid-read")]
    TransportTruncated,

    #[error("unexpected peer identity: {0}")]
    UnexpectedPeer(String),

    #[error("seal failed: {0}")]
    SealFailed(String),

    #[error("channel closed")]
    Closed,

    #[error("transport error: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for ChannelError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Self::TransportTruncated,
            _ => Self::Io(err),
        }
    }
}

impl From<ChannelError> for io::Error {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Io(inner) => inner,
            ChannelError::TransportTruncated => {
                io::Error::new(io::ErrorKind::UnexpectedEof, err)
            }
            ChannelError::Closed => io::Error::new(io::ErrorKind::NotConnected, err),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

/// Identity key loading and parsing errors.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid node id encoding: {0}")]
    InvalidEncoding(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eof_maps_to_truncation() {
        let err = ChannelError::from(io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(matches!(err, ChannelError::TransportTruncated));

        let err = ChannelError::from(io::Error::from(io::ErrorKind::ConnectionReset));
        assert!(matches!(err, ChannelError::Io(_)));
    }

    #[test]
    fn test_into_io_error_kinds() {
        let io_err: io::Error = ChannelError::TransportTruncated.into();
        assert_eq!(io_err.kind(), io::ErrorKind::UnexpectedEof);

        let io_err: io::Error = ChannelError::DecryptionFailed.into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);

        let io_err: io::Error = ChannelError::Closed.into();
        assert_eq!(io_err.kind(), io::ErrorKind::NotConnected);
    }
}
