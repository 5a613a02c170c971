//! C9: optional multi-client mixer sitting between local PCM clients and a
//! transport's codec worker (spec §4.9) — playback fan-in (several writers,
//! one summed stream) and capture fan-out (one stream, several readers).

pub mod bridge;
pub mod capture;
pub mod client;
pub mod playback;

pub use bridge::{attach_capture_fanout, attach_playback_mixer, FanoutWriter, MixerReader};
pub use capture::{CaptureClient, CaptureClientHandle, CaptureFanout, CaptureFrame};
pub use client::{ClientCommand, ClientHandle, ClientSlot, ClientState, DRAIN_TIMEOUT};
pub use playback::{PlaybackClientHandle, PlaybackMixer};
