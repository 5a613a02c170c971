//! FastStream (spec §4.8): a proprietary dual-stream A2DP codec — 44.1/48
//! kHz stereo music on the main channel, 16 kHz mono voice on the back
//! channel, both carried over the same BT socket with no RTP framing
//! (`manager`'s [`crate::framing::FrameKind::Packed3`] packs up to three
//! encoded frames per datagram instead). The two channels are two
//! independent [`crate::transport::Endpoint`]s on one [`crate::transport::Transport`]
//! — the same `playback` + `capture` pairing HFP/HSP already use for their
//! own bidirectional audio — so this adapter just needs to accept whichever
//! channel count/rate the endpoint it's attached to asks for, rather than
//! hardcoding the main channel's format.
//!
//! Modeled as a fixed-rate scalar-quantized frame; the real codec's
//! sub-band structure isn't reproduced.

use super::common::{bytes_for_bits, check_input_len, check_output_capacity, dequantize, quantize};
use super::{Decoder, Encoder};
use crate::error::CodecError;

pub const FRAME_PCM_FRAMES: usize = 128;
const BITS_PER_SAMPLE: u32 = 10;
const MAGIC: u8 = 0xF5;

fn check_config(channels: u8, rate: u32) -> Result<(), CodecError> {
    match (channels, rate) {
        (2, 44_100) | (2, 48_000) | (1, 16_000) => Ok(()),
        _ => Err(CodecError::UnsupportedConfig(format!(
            "FastStream: unsupported main/back-channel config {channels}ch @ {rate}Hz"
        ))),
    }
}

pub struct FastStreamEncoder {
    channels: u8,
    rate: u32,
}

impl FastStreamEncoder {
    pub fn new(channels: u8, rate: u32) -> Result<Self, CodecError> {
        check_config(channels, rate)?;
        Ok(FastStreamEncoder { channels, rate })
    }
}

impl Encoder for FastStreamEncoder {
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize, CodecError> {
        let n_samples = FRAME_PCM_FRAMES * self.channels as usize;
        check_input_len(pcm.len(), n_samples)?;
        let payload_len = bytes_for_bits(n_samples * BITS_PER_SAMPLE as usize);
        check_output_capacity(out.len(), 1 + payload_len)?;

        out[0] = MAGIC;
        quantize(&pcm[..n_samples], BITS_PER_SAMPLE, &mut out[1..1 + payload_len]);
        Ok(1 + payload_len)
    }

    fn frame_pcm_frames(&self) -> usize {
        FRAME_PCM_FRAMES
    }

    fn max_frame_bytes(&self) -> usize {
        1 + bytes_for_bits(FRAME_PCM_FRAMES * self.channels as usize * BITS_PER_SAMPLE as usize)
    }

    fn channels(&self) -> u8 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.rate
    }
}

pub struct FastStreamDecoder {
    channels: u8,
    rate: u32,
}

impl FastStreamDecoder {
    pub fn new(channels: u8, rate: u32) -> Result<Self, CodecError> {
        check_config(channels, rate)?;
        Ok(FastStreamDecoder { channels, rate })
    }
}

impl Decoder for FastStreamDecoder {
    fn decode(&mut self, bitstream: &[u8], pcm_out: &mut [i16]) -> Result<(usize, usize), CodecError> {
        if bitstream.is_empty() || bitstream[0] != MAGIC {
            return Err(CodecError::DecodeFailed("missing FastStream frame marker".into()));
        }
        let n_samples = FRAME_PCM_FRAMES * self.channels as usize;
        let payload_len = bytes_for_bits(n_samples * BITS_PER_SAMPLE as usize);
        if bitstream.len() < 1 + payload_len {
            return Err(CodecError::DecodeFailed("truncated FastStream frame".into()));
        }
        if pcm_out.len() < n_samples {
            return Err(CodecError::DecodeFailed("pcm_out too small".into()));
        }
        dequantize(&bitstream[1..1 + payload_len], BITS_PER_SAMPLE, n_samples, pcm_out);
        Ok((1 + payload_len, n_samples))
    }

    fn frame_pcm_frames(&self) -> usize {
        FRAME_PCM_FRAMES
    }

    fn max_frame_bytes(&self) -> usize {
        1 + bytes_for_bits(FRAME_PCM_FRAMES * self.channels as usize * BITS_PER_SAMPLE as usize)
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
    fn rejects_unsupported_config() {
        assert!(FastStreamEncoder::new(2, 16_000).is_err());
        assert!(FastStreamEncoder::new(1, 44_100).is_err());
    }

    #[test]
    fn roundtrip_main_channel() {
        roundtrip(2, 44_100);
    }

    #[test]
    fn roundtrip_back_channel() {
        roundtrip(1, 16_000);
    }

    fn roundtrip(channels: u8, rate: u32) {
        let mut enc = FastStreamEncoder::new(channels, rate).unwrap();
        let mut dec = FastStreamDecoder::new(channels, rate).unwrap();
        let n = enc.frame_pcm_frames() * channels as usize;
        let pcm: Vec<i16> = (0..n).map(|i| ((i * 41) % 5000) as i16 - 2500).collect();
        let mut bitstream = vec![0u8; enc.max_frame_bytes()];
        let written = enc.encode(&pcm, &mut bitstream).unwrap();

        let mut restored = vec![0i16; n];
        let (consumed, produced) = dec.decode(&bitstream[..written], &mut restored).unwrap();
        assert_eq!(consumed, written);
        assert_eq!(produced, n);
    }
}
