//! Opus (spec §4.8): the one codec here backed by a real published crate
//! rather than a simplification, grounded on the `opus` crate usage pattern
//! (`opus::Encoder::new`/`opus::Decoder::new`,
//! `other_examples/ef52b0f5_crimpz-Audio-P2P__src-main.rs.rs`).

use super::{Decoder as CoreDecoder, Encoder as CoreEncoder};
use crate::error::CodecError;
use ::opus::{Application, Channels, Decoder as InnerDecoder, Encoder as InnerEncoder};

/// 20 ms frames, Opus's recommended default.
pub const FRAME_MS: u32 = 20;

fn channels_enum(channels: u8) -> Result<Channels, CodecError> {
    match channels {
        1 => Ok(Channels::Mono),
        2 => Ok(Channels::Stereo),
        other => Err(CodecError::UnsupportedConfig(format!("Opus: unsupported channel count {other}"))),
    }
}

fn frame_pcm_frames(rate: u32) -> usize {
    (rate as u64 * FRAME_MS as u64 / 1000) as usize
}

pub struct OpusEncoder {
    inner: InnerEncoder,
    channels: u8,
    rate: u32,
}

impl OpusEncoder {
    pub fn new(channels: u8, rate: u32) -> Result<Self, CodecError> {
        let ch = channels_enum(channels)?;
        let inner = InnerEncoder::new(rate, ch, Application::Audio)
            .map_err(|e| CodecError::AllocFailed(format!("opus encoder init: {e}")))?;
        Ok(OpusEncoder { inner, channels, rate })
    }
}

impl CoreEncoder for OpusEncoder {
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize, CodecError> {
        let n_samples = self.frame_pcm_frames() * self.channels as usize;
        if pcm.len() < n_samples {
            return Err(CodecError::EncodeFailed("short Opus frame".into()));
        }
        self.inner
            .encode(&pcm[..n_samples], out)
            .map_err(|e| CodecError::EncodeFailed(format!("opus encode: {e}")))
    }

    fn frame_pcm_frames(&self) -> usize {
        frame_pcm_frames(self.rate)
    }

    fn max_frame_bytes(&self) -> usize {
        1276 // Opus's own worst-case per-frame size (RFC 6716 §3.2.1)
    }

    fn channels(&self) -> u8 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.rate
    }
}

pub struct OpusDecoder {
    inner: InnerDecoder,
    channels: u8,
    rate: u32,
}

impl OpusDecoder {
    pub fn new(channels: u8, rate: u32) -> Result<Self, CodecError> {
        let ch = channels_enum(channels)?;
        let inner = InnerDecoder::new(rate, ch)
            .map_err(|e| CodecError::AllocFailed(format!("opus decoder init: {e}")))?;
        Ok(OpusDecoder { inner, channels, rate })
    }
}

impl CoreDecoder for OpusDecoder {
    fn decode(&mut self, bitstream: &[u8], pcm_out: &mut [i16]) -> Result<(usize, usize), CodecError> {
        let produced = self
            .inner
            .decode(bitstream, pcm_out, false)
            .map_err(|e| CodecError::DecodeFailed(format!("opus decode: {e}")))?;
        Ok((bitstream.len(), produced * self.channels as usize))
    }

    fn frame_pcm_frames(&self) -> usize {
        frame_pcm_frames(self.rate)
    }

    fn max_frame_bytes(&self) -> usize {
        1276
    }

    fn channels(&self) -> u8 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_channel_count() {
        assert!(OpusEncoder::new(3, 48_000).is_err());
    }

    #[test]
    fn encode_decode_roundtrip_produces_pcm() {
        let mut enc = OpusEncoder::new(1, 48_000).unwrap();
        let mut dec = OpusDecoder::new(1, 48_000).unwrap();

        let n = enc.frame_pcm_frames();
        let pcm: Vec<i16> = (0..n).map(|i| (3000.0 * (i as f32 / 10.0).sin()) as i16).collect();

        let mut bitstream = vec![0u8; enc.max_frame_bytes()];
        let written = enc.encode(&pcm, &mut bitstream).unwrap();
        assert!(written > 0);

        let mut restored = vec![0i16; n];
        let (_, produced) = dec.decode(&bitstream[..written], &mut restored).unwrap();
        assert_eq!(produced, n);
    }
}
