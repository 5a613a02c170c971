//! Error taxonomy for the core, matching spec §7.
//!
//! Each module gets its own leaf error type (the teacher's `pmoaudio`
//! convention is one `AudioError` enum per crate; here the crate is bigger
//! and the spec itself names distinct failure categories, so we split along
//! those lines instead of collapsing everything into one enum).

use thiserror::Error;

/// Codec-init or codec-runtime failure (spec §7 rows 1-2).
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unsupported configuration: {0}")]
    UnsupportedConfig(String),
    #[error("codec allocation failed: {0}")]
    AllocFailed(String),
    #[error("encode failed: {0}")]
    EncodeFailed(String),
    #[error("decode failed: {0}")]
    DecodeFailed(String),
}

/// Transport-level failure: BT I/O, acquire/release RPC (spec §7 rows 3-4).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("bluetooth I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("transport acquire failed: {0}")]
    AcquireFailed(String),
    #[error("transport is not in a state that allows this operation: {0:?}")]
    InvalidState(crate::transport::TransportState),
}

/// Mixer-level failure (spec §4.9).
#[derive(Debug, Error)]
pub enum MixerError {
    #[error("client channel closed")]
    ClientGone,
    #[error("invalid control command: {0:?}")]
    InvalidCommand(String),
}

/// Umbrella error for code that spans more than one of the above, e.g. the
/// transport manager (C10) and the daemon binary.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Mixer(#[from] MixerError),
}
