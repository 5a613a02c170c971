//! G.722 (spec §4.8): the wideband HFP codec used by ASHA and some eSCO
//! links. Real G.722 splits the signal into two sub-bands via a QMF pair
//! and ADPCM-codes each independently; here a single-band 4-bit adaptive
//! differential coder stands in for that two-band structure.

use super::{Decoder, Encoder};
use crate::error::CodecError;

pub const FRAME_PCM_FRAMES: usize = 320; // 20 ms at 16 kHz
pub const FRAME_BYTES: usize = FRAME_PCM_FRAMES / 2; // 4 bits/sample, packed 2/byte

const STEP_TABLE: [i32; 16] = [
    7, 8, 9, 10, 11, 12, 13, 14, 16, 17, 19, 21, 23, 25, 28, 31,
];
const INDEX_ADJUST: [i32; 8] = [-1, -1, -1, -1, 2, 4, 6, 8];

struct Adpcm {
    predictor: i32,
    step_index: usize,
}

impl Adpcm {
    fn new() -> Self {
        Adpcm { predictor: 0, step_index: 0 }
    }

    fn encode_sample(&mut self, sample: i16) -> u8 {
        let step = STEP_TABLE[self.step_index];
        let mut diff = sample as i32 - self.predictor;
        let sign = if diff < 0 {
            diff = -diff;
            0x8
        } else {
            0x0
        };

        let mut code = 0u8;
        let mut delta = step;
        let mut vpdiff = step >> 3;
        if diff >= delta {
            code |= 0x4;
            diff -= delta;
            vpdiff += delta;
        }
        delta >>= 1;
        if diff >= delta {
            code |= 0x2;
            diff -= delta;
            vpdiff += delta;
        }
        delta >>= 1;
        if diff >= delta {
            code |= 0x1;
            vpdiff += delta;
        }
        let code = code | sign;

        self.predictor += if sign != 0 { -vpdiff } else { vpdiff };
        self.predictor = self.predictor.clamp(i16::MIN as i32, i16::MAX as i32);
        self.step_index = (self.step_index as i32 + INDEX_ADJUST[(code & 0x7) as usize])
            .clamp(0, STEP_TABLE.len() as i32 - 1) as usize;

        code
    }

    fn decode_sample(&mut self, code: u8) -> i16 {
        let step = STEP_TABLE[self.step_index];
        let sign = code & 0x8;
        let magnitude = code & 0x7;

        let mut vpdiff = step >> 3;
        if magnitude & 0x4 != 0 {
            vpdiff += step;
        }
        if magnitude & 0x2 != 0 {
            vpdiff += step >> 1;
        }
        if magnitude & 0x1 != 0 {
            vpdiff += step >> 2;
        }

        self.predictor += if sign != 0 { -vpdiff } else { vpdiff };
        self.predictor = self.predictor.clamp(i16::MIN as i32, i16::MAX as i32);
        self.step_index = (self.step_index as i32 + INDEX_ADJUST[magnitude as usize])
            .clamp(0, STEP_TABLE.len() as i32 - 1) as usize;

        self.predictor as i16
    }
}

pub struct G722Encoder {
    adpcm: Adpcm,
}

impl G722Encoder {
    pub fn new() -> Self {
        G722Encoder { adpcm: Adpcm::new() }
    }
}

impl Default for G722Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder for G722Encoder {
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize, CodecError> {
        if pcm.len() < FRAME_PCM_FRAMES {
            return Err(CodecError::EncodeFailed("short G.722 frame".into()));
        }
        if out.len() < FRAME_BYTES {
            return Err(CodecError::EncodeFailed("output buffer too small".into()));
        }
        for (idx, pair) in pcm[..FRAME_PCM_FRAMES].chunks(2).enumerate() {
            let hi = self.adpcm.encode_sample(pair[0]);
            let lo = self.adpcm.encode_sample(pair[1]);
            out[idx] = (hi << 4) | lo;
        }
        Ok(FRAME_BYTES)
    }

    fn frame_pcm_frames(&self) -> usize {
        FRAME_PCM_FRAMES
    }

    fn max_frame_bytes(&self) -> usize {
        FRAME_BYTES
    }

    fn channels(&self) -> u8 {
        1
    }

    fn sample_rate(&self) -> u32 {
        16_000
    }
}

pub struct G722Decoder {
    adpcm: Adpcm,
}

impl G722Decoder {
    pub fn new() -> Self {
        G722Decoder { adpcm: Adpcm::new() }
    }
}

impl Default for G722Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for G722Decoder {
    fn decode(&mut self, bitstream: &[u8], pcm_out: &mut [i16]) -> Result<(usize, usize), CodecError> {
        if bitstream.len() < FRAME_BYTES {
            return Err(CodecError::DecodeFailed("short G.722 frame".into()));
        }
        if pcm_out.len() < FRAME_PCM_FRAMES {
            return Err(CodecError::DecodeFailed("pcm_out too small".into()));
        }
        for (i, &byte) in bitstream[..FRAME_BYTES].iter().enumerate() {
            pcm_out[i * 2] = self.adpcm.decode_sample(byte >> 4);
            pcm_out[i * 2 + 1] = self.adpcm.decode_sample(byte & 0xF);
        }
        Ok((FRAME_BYTES, FRAME_PCM_FRAMES))
    }

    fn frame_pcm_frames(&self) -> usize {
        FRAME_PCM_FRAMES
    }

    fn max_frame_bytes(&self) -> usize {
        FRAME_BYTES
    }

    fn channels(&self) -> u8 {
        1
    }

    fn sample_rate(&self) -> u32 {
        16_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adpcm_roundtrip_tracks_shape() {
        let mut enc = G722Encoder::new();
        let mut dec = G722Decoder::new();

        let n = FRAME_PCM_FRAMES * 4;
        let pcm: Vec<i16> = (0..n)
            .map(|i| (6000.0 * (i as f32 / 20.0).sin()) as i16)
            .collect();

        let mut restored = Vec::with_capacity(n);
        for chunk in pcm.chunks(FRAME_PCM_FRAMES) {
            let mut bitstream = [0u8; FRAME_BYTES];
            enc.encode(chunk, &mut bitstream).unwrap();
            let mut out = [0i16; FRAME_PCM_FRAMES];
            dec.decode(&bitstream, &mut out).unwrap();
            restored.extend_from_slice(&out);
        }

        let avg_err: f64 = pcm
            .iter()
            .zip(restored.iter())
            .map(|(a, b)| (*a as f64 - *b as f64).abs())
            .sum::<f64>()
            / n as f64;
        assert!(avg_err < 2500.0, "avg_err={avg_err}");
    }
}
