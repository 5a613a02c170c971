//! aptX (spec §4.8, §9): Qualcomm's proprietary 4:1 ADPCM-family codec. No
//! Rust implementation exists without the vendor SDK; this adapter is a
//! simplified scalar-quantized stand-in that keeps aptX's fixed 4-sample
//! quad framing (aptX always processes PCM four samples at a time per
//! channel) and its 2x compression target.

use super::common::{bytes_for_bits, check_input_len, check_output_capacity, dequantize, quantize};
use super::{Decoder, Encoder};
use crate::error::CodecError;

pub const QUAD_SAMPLES: usize = 4;
pub const FRAME_PCM_FRAMES: usize = QUAD_SAMPLES * 256; // several quads per call
const BITS_PER_SAMPLE: u32 = 8; // 2x compression from 16-bit PCM

pub struct AptXEncoder {
    channels: u8,
    rate: u32,
}

impl AptXEncoder {
    pub fn new(channels: u8, rate: u32) -> Result<Self, CodecError> {
        if channels != 2 {
            return Err(CodecError::UnsupportedConfig("aptX requires stereo PCM".into()));
        }
        Ok(AptXEncoder { channels, rate })
    }
}

impl Encoder for AptXEncoder {
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

pub struct AptXDecoder {
    channels: u8,
    rate: u32,
}

impl AptXDecoder {
    pub fn new(channels: u8, rate: u32) -> Result<Self, CodecError> {
        if channels != 2 {
            return Err(CodecError::UnsupportedConfig("aptX requires stereo PCM".into()));
        }
        Ok(AptXDecoder { channels, rate })
    }
}

impl Decoder for AptXDecoder {
    fn decode(&mut self, bitstream: &[u8], pcm_out: &mut [i16]) -> Result<(usize, usize), CodecError> {
        let n_samples = FRAME_PCM_FRAMES * self.channels as usize;
        let payload_len = bytes_for_bits(n_samples * BITS_PER_SAMPLE as usize);
        if bitstream.len() < payload_len {
            return Err(CodecError::DecodeFailed("truncated aptX frame".into()));
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
    fn requires_stereo() {
        assert!(AptXEncoder::new(1, 44_100).is_err());
    }

    #[test]
    fn roundtrip() {
        let mut enc = AptXEncoder::new(2, 44_100).unwrap();
        let mut dec = AptXDecoder::new(2, 44_100).unwrap();
        let n = enc.frame_pcm_frames() * 2;
        let pcm: Vec<i16> = (0..n).map(|i| ((i * 23) % 5000) as i16 - 2500).collect();

        let mut bitstream = vec![0u8; enc.max_frame_bytes()];
        let written = enc.encode(&pcm, &mut bitstream).unwrap();

        let mut restored = vec![0i16; n];
        let (consumed, produced) = dec.decode(&bitstream[..written], &mut restored).unwrap();
        assert_eq!(consumed, written);
        assert_eq!(produced, n);
    }
}
