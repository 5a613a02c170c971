//! C6: a transport's PCM endpoint — audio format, volume/mute, delay
//! reporting, and the control channel a codec worker listens on (spec
//! §4.6).

use std::sync::atomic::{AtomicI32, AtomicU8, Ordering};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::io::ControlSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Endpoint produces PCM for the worker to encode (A2DP source, HFP TX).
    Playback,
    /// Endpoint consumes PCM the worker decoded (A2DP sink, HFP RX).
    Capture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    S16Le,
    S24Le,
    S32Le,
}

impl SampleFormat {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::S16Le => 2,
            SampleFormat::S24Le => 3,
            SampleFormat::S32Le => 4,
        }
    }
}

/// High bit of the volume byte is the mute flag, matching bluealsa's
/// `ba_transport_pcm.volume[].level`/`.soft_mute` packing (spec §4.6).
const MUTE_BIT: u8 = 0x80;
const LEVEL_MASK: u8 = 0x7f;

pub struct VolumeChannel(AtomicU8);

impl VolumeChannel {
    /// Full-scale linear level (spec §4.6): `effective() == MAX_LEVEL` means
    /// pass PCM through unchanged.
    pub const MAX_LEVEL: u8 = LEVEL_MASK;

    pub fn new(level: u8, muted: bool) -> Self {
        VolumeChannel(AtomicU8::new(Self::pack(level, muted)))
    }

    fn pack(level: u8, muted: bool) -> u8 {
        let level = level & LEVEL_MASK;
        if muted {
            level | MUTE_BIT
        } else {
            level
        }
    }

    pub fn level(&self) -> u8 {
        self.0.load(Ordering::Relaxed) & LEVEL_MASK
    }

    pub fn muted(&self) -> bool {
        self.0.load(Ordering::Relaxed) & MUTE_BIT != 0
    }

    pub fn set_level(&self, level: u8) {
        let muted = self.muted();
        self.0.store(Self::pack(level, muted), Ordering::Relaxed);
    }

    pub fn set_muted(&self, muted: bool) {
        let level = self.level();
        self.0.store(Self::pack(level, muted), Ordering::Relaxed);
    }

    /// 0 when muted, else the linear level — what a codec worker applies to
    /// PCM before encoding or after decoding.
    pub fn effective(&self) -> u8 {
        if self.muted() {
            0
        } else {
            self.level()
        }
    }
}

/// Reported delay components, each in deci-milliseconds (spec §4.6, §7).
pub struct DelayReport {
    pub codec_delay: AtomicI32,
    pub processing_delay: AtomicI32,
    pub link_delay: AtomicI32,
}

impl DelayReport {
    pub fn new() -> Self {
        DelayReport {
            codec_delay: AtomicI32::new(0),
            processing_delay: AtomicI32::new(0),
            link_delay: AtomicI32::new(0),
        }
    }

    pub fn total(&self) -> bluealsa_util::DeciMs {
        bluealsa_util::DeciMs(
            self.codec_delay.load(Ordering::Relaxed)
                + self.processing_delay.load(Ordering::Relaxed)
                + self.link_delay.load(Ordering::Relaxed),
        )
    }
}

impl Default for DelayReport {
    fn default() -> Self {
        Self::new()
    }
}

/// One side (playback or capture) of a transport's PCM contract. Two
/// channels on the volume array: index 0 left, index 1 right (mono streams
/// use only index 0).
pub struct Endpoint {
    pub direction: Direction,
    pub format: SampleFormat,
    pub channels: u8,
    pub rate: u32,
    pub volume: [VolumeChannel; 2],
    pub delay: DelayReport,
    pub control_tx: mpsc::Sender<ControlSignal>,
    pub control_rx: tokio::sync::Mutex<mpsc::Receiver<ControlSignal>>,
    /// The local PCM FIFO a direct client reads/writes, or the mixer's
    /// fan-in/fan-out adapter when multi-client support is enabled (spec
    /// §4.6/§4.9). `None` until a client (or the mixer) attaches.
    pub pcm_reader: tokio::sync::Mutex<Option<PcmReader>>,
    pub pcm_writer: tokio::sync::Mutex<Option<PcmWriter>>,
}

impl Endpoint {
    pub fn new(direction: Direction, format: SampleFormat, channels: u8, rate: u32) -> Self {
        let (control_tx, control_rx) = mpsc::channel(16);
        Endpoint {
            direction,
            format,
            channels,
            rate,
            volume: [VolumeChannel::new(127, false), VolumeChannel::new(127, false)],
            delay: DelayReport::new(),
            control_tx,
            control_rx: tokio::sync::Mutex::new(control_rx),
            pcm_reader: tokio::sync::Mutex::new(None),
            pcm_writer: tokio::sync::Mutex::new(None),
        }
    }

    pub async fn attach_reader(&self, reader: PcmReader) {
        *self.pcm_reader.lock().await = Some(reader);
        let _ = self.control_tx.send(ControlSignal::PcmOpen).await;
    }

    pub async fn attach_writer(&self, writer: PcmWriter) {
        *self.pcm_writer.lock().await = Some(writer);
        let _ = self.control_tx.send(ControlSignal::PcmOpen).await;
    }

    pub async fn detach(&self) {
        self.pcm_reader.lock().await.take();
        self.pcm_writer.lock().await.take();
        let _ = self.control_tx.send(ControlSignal::PcmClose).await;
    }

    pub fn frame_bytes(&self) -> usize {
        self.format.bytes_per_sample() * self.channels as usize
    }

    /// Scales decoded PCM in place by this endpoint's per-channel
    /// volume/mute before it reaches the PCM sink (spec §4.6/§4.8: "scale
    /// and write"). Mono streams use only `volume[0]`.
    pub fn apply_volume(&self, pcm: &mut [i16]) {
        let channels = self.channels.max(1) as usize;
        for (i, sample) in pcm.iter_mut().enumerate() {
            let channel = (i % channels).min(1);
            let level = self.volume[channel].effective() as i32;
            *sample = ((*sample as i32 * level) / VolumeChannel::MAX_LEVEL as i32) as i16;
        }
    }
}

/// Boxed PCM source/sink so a worker can read from (or write to) either a
/// direct client FIFO or the multi-client mixer through the same interface.
pub type PcmReader = Box<dyn AsyncRead + Send + Unpin>;
pub type PcmWriter = Box<dyn AsyncWrite + Send + Unpin>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_packs_level_and_mute_bit() {
        let v = VolumeChannel::new(100, false);
        assert_eq!(v.level(), 100);
        assert!(!v.muted());
        assert_eq!(v.effective(), 100);

        v.set_muted(true);
        assert_eq!(v.level(), 100);
        assert!(v.muted());
        assert_eq!(v.effective(), 0);

        v.set_level(50);
        assert_eq!(v.level(), 50);
        assert!(v.muted());
    }

    #[test]
    fn delay_report_sums_components() {
        let d = DelayReport::new();
        d.codec_delay.store(30, Ordering::Relaxed);
        d.processing_delay.store(5, Ordering::Relaxed);
        d.link_delay.store(12, Ordering::Relaxed);
        assert_eq!(d.total(), bluealsa_util::DeciMs(47));
    }

    #[test]
    fn frame_bytes_accounts_for_channels_and_format() {
        let e = Endpoint::new(Direction::Playback, SampleFormat::S24Le, 2, 44100);
        assert_eq!(e.frame_bytes(), 6);
    }

    #[test]
    fn apply_volume_passes_through_at_full_scale() {
        let e = Endpoint::new(Direction::Playback, SampleFormat::S16Le, 2, 44_100);
        let mut pcm = [1000i16, -2000, 3000, -4000];
        e.apply_volume(&mut pcm);
        assert_eq!(pcm, [1000, -2000, 3000, -4000]);
    }

    #[test]
    fn apply_volume_mutes_to_silence() {
        let e = Endpoint::new(Direction::Playback, SampleFormat::S16Le, 1, 16_000);
        e.volume[0].set_muted(true);
        let mut pcm = [1234i16, -5678];
        e.apply_volume(&mut pcm);
        assert_eq!(pcm, [0, 0]);
    }

    #[test]
    fn apply_volume_scales_each_channel_independently() {
        let e = Endpoint::new(Direction::Playback, SampleFormat::S16Le, 2, 44_100);
        e.volume[1].set_level(0);
        let mut pcm = [2000i16, 2000, 2000, 2000];
        e.apply_volume(&mut pcm);
        assert_eq!(pcm, [2000, 0, 2000, 0]);
    }
}
