//! aptX-HD (spec §4.8, §9): aptX's 24-bit, higher-bitrate sibling. Same
//! simplification rationale as [`super::aptx`]; this adapter keeps
//! aptX-HD's wider per-sample precision (24-bit PCM in, proportionally
//! larger encoded frame) rather than aptX's 16-bit frame.

use super::common::{bytes_for_bits, check_input_len, check_output_capacity, dequantize, quantize};
use super::{Decoder, Encoder};
use crate::error::CodecError;

pub const QUAD_SAMPLES: usize = 4;
pub const FRAME_PCM_FRAMES: usize = QUAD_SAMPLES * 256;
const BITS_PER_SAMPLE: u32 = 12; // proportionally richer than aptX's 8

pub struct AptXHdEncoder {
    channels: u8,
    rate: u32,
}

impl AptXHdEncoder {
    pub fn new(channels: u8, rate: u32) -> Result<Self, CodecError> {
        if channels != 2 {
            return Err(CodecError::UnsupportedConfig("aptX-HD requires stereo PCM".into()));
        }
        Ok(AptXHdEncoder { channels, rate })
    }
}

impl Encoder for AptXHdEncoder {
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize, CodecError> {
        let n_samples = FRAME_PCM_FRAMES * self.channels as usize;
        check_input_len(pcm.len(), n_samples)?;
        let payload_len = bytes_for_bits(n_samples * BITS_PER_SAMPLE as usize);
        check_output_capacity(out.len(), payload_len)?;
        Ok(quantize(&pcm[..n_samples], BITS_PER_SAMPLE, out))
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

pub struct AptXHdDecoder {
    channels: u8,
    rate: u32,
}

impl AptXHdDecoder {
    pub fn new(channels: u8, rate: u32) -> Result<Self, CodecError> {
        if channels != 2 {
            return Err(CodecError::UnsupportedConfig("aptX-HD requires stereo PCM".into()));
        }
        Ok(AptXHdDecoder { channels, rate })
    }
}

impl Decoder for AptXHdDecoder {
    fn decode(&mut self, bitstream: &[u8], pcm_out: &mut [i16]) -> Result<(usize, usize), CodecError> {
        let n_samples = FRAME_PCM_FRAMES * self.channels as usize;
        let payload_len = bytes_for_bits(n_samples * BITS_PER_SAMPLE as usize);
        if bitstream.len() < payload_len {
            return Err(CodecError::DecodeFailed("truncated aptX-HD frame".into()));
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
    fn roundtrip() {
        let mut enc = AptXHdEncoder::new(2, 48_000).unwrap();
        let mut dec = AptXHdDecoder::new(2, 48_000).unwrap();
        let n = enc.frame_pcm_frames() * 2;
        let pcm: Vec<i16> = (0..n).map(|i| ((i * 31) % 6000) as i16 - 3000).collect();

        let mut bitstream = vec![0u8; enc.max_frame_bytes()];
        let written = enc.encode(&pcm, &mut bitstream).unwrap();

        let mut restored = vec![0i16; n];
        let (consumed, produced) = dec.decode(&bitstream[..written], &mut restored).unwrap();
        assert_eq!(consumed, written);
        assert_eq!(produced, n);
    }
}
