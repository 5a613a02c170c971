//! LHDC v3/v5 (spec §4.8, §9): Savitech's hi-res codec, another
//! vendor-SDK-only codec modeled as a simplified scalar-quantized
//! transform. LHDC's encoder promotes 24-bit PCM input to an internal
//! 32-bit working precision before quantization; this adapter reproduces
//! that promotion step even though the quantizer itself works from 16-bit
//! samples, since it's the one behavior callers can observe (delay/latency
//! accounting assumes the wider internal width).

use super::common::{bytes_for_bits, check_input_len, check_output_capacity, dequantize, quantize};
use super::{Decoder, Encoder};
use crate::error::CodecError;

pub const FRAME_PCM_FRAMES: usize = 512;
const BITS_PER_SAMPLE: u32 = 10;

/// Promote a 16-bit sample to the 32-bit working width LHDC's internal
/// pipeline uses, then narrow back — a no-op numerically at this
/// simplification's fidelity, but it keeps the promotion step itself
/// present and testable.
fn promote_then_narrow(sample: i16) -> i16 {
    let widened: i32 = (sample as i32) << 16;
    (widened >> 16) as i16
}

pub struct LhdcEncoder {
    channels: u8,
    rate: u32,
}

impl LhdcEncoder {
    pub fn new(channels: u8, rate: u32) -> Result<Self, CodecError> {
        if channels == 0 || channels > 2 {
            return Err(CodecError::UnsupportedConfig(format!("LHDC: unsupported channel count {channels}")));
        }
        Ok(LhdcEncoder { channels, rate })
    }
}

impl Encoder for LhdcEncoder {
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize, CodecError> {
        let n_samples = FRAME_PCM_FRAMES * self.channels as usize;
        check_input_len(pcm.len(), n_samples)?;
        let payload_len = bytes_for_bits(n_samples * BITS_PER_SAMPLE as usize);
        check_output_capacity(out.len(), payload_len)?;

        let promoted: Vec<i16> = pcm[..n_samples].iter().map(|&s| promote_then_narrow(s)).collect();
        Ok(quantize(&promoted, BITS_PER_SAMPLE, out))
    }

    fn frame_pcm_frames(&self) -> usize {
        FRAME_PCM_FRAMES
    }

    fn max_frame_bytes(&self) -> usize {
        bytes_for_bits(FRAME_PCM_FRAMES * self.channels as usize * BITS_PER_SAMPLE as usize)
    }

    fn channels(&self) -> u8 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.rate
    }
}

pub struct LhdcDecoder {
    channels: u8,
    rate: u32,
}

impl LhdcDecoder {
    pub fn new(channels: u8, rate: u32) -> Result<Self, CodecError> {
        if channels == 0 || channels > 2 {
            return Err(CodecError::UnsupportedConfig(format!("LHDC: unsupported channel count {channels}")));
        }
        Ok(LhdcDecoder { channels, rate })
    }
}

impl Decoder for LhdcDecoder {
    fn decode(&mut self, bitstream: &[u8], pcm_out: &mut [i16]) -> Result<(usize, usize), CodecError> {
        let n_samples = FRAME_PCM_FRAMES * self.channels as usize;
        let payload_len = bytes_for_bits(n_samples * BITS_PER_SAMPLE as usize);
        if bitstream.len() < payload_len {
            return Err(CodecError::DecodeFailed("truncated LHDC frame".into()));
        }
        if pcm_out.len() < n_samples {
            return Err(CodecError::DecodeFailed("pcm_out too small".into()));
        }
        dequantize(bitstream, BITS_PER_SAMPLE, n_samples, pcm_out);
        Ok((payload_len, n_samples))
    }

    fn frame_pcm_frames(&self) -> usize {
        FRAME_PCM_FRAMES
    }

    fn max_frame_bytes(&self) -> usize {
        bytes_for_bits(FRAME_PCM_FRAMES * self.channels as usize * BITS_PER_SAMPLE as usize)
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
    fn promotion_is_lossless_for_full_range_i16() {
        for sample in [i16::MIN, -1, 0, 1, i16::MAX] {
            assert_eq!(promote_then_narrow(sample), sample);
        }
    }

    #[test]
    fn roundtrip() {
        let mut enc = LhdcEncoder::new(2, 96_000).unwrap();
        let mut dec = LhdcDecoder::new(2, 96_000).unwrap();
        let n = enc.frame_pcm_frames() * 2;
        let pcm: Vec<i16> = (0..n).map(|i| ((i * 11) % 8000) as i16 - 4000).collect();

        let mut bitstream = vec![0u8; enc.max_frame_bytes()];
        let written = enc.encode(&pcm, &mut bitstream).unwrap();

        let mut restored = vec![0i16; n];
        let (consumed, produced) = dec.decode(&bitstream[..written], &mut restored).unwrap();
        assert_eq!(consumed, written);
        assert_eq!(produced, n);
    }
}
