//! AAC/LATM (spec §4.8): 1024-sample frames, scalar-quantized payload.
//! Carries the "mark bit quirk" some headsets require: certain Sony/Sennheiser
//! receivers expect the RTP marker bit set on every LATM frame rather than
//! only on stream boundaries. Exposed as a per-encoder toggle the transport
//! manager sets from configuration/device quirk detection rather than a
//! hardcoded threshold (spec leaves the activation trigger unspecified —
//! see the design ledger).

use super::common::{bytes_for_bits, check_input_len, check_output_capacity, dequantize, quantize};
use super::{Decoder, Encoder};
use crate::error::CodecError;

pub const FRAME_PCM_FRAMES: usize = 1024;
const BITS_PER_SAMPLE: u32 = 8;
const MAGIC: u8 = 0x56; // LATM AudioMuxElement sync stand-in

pub struct AacEncoder {
    channels: u8,
    rate: u32,
    /// When set, [`Self::mark_every_frame`] reports true unconditionally —
    /// the mark-bit quirk workaround.
    always_mark: bool,
}

impl AacEncoder {
    pub fn new(channels: u8, rate: u32) -> Result<Self, CodecError> {
        if channels == 0 || channels > 2 {
            return Err(CodecError::UnsupportedConfig(format!("AAC: unsupported channel count {channels}")));
        }
        Ok(AacEncoder {
            channels,
            rate,
            always_mark: false,
        })
    }

    pub fn set_mark_bit_quirk(&mut self, enabled: bool) {
        self.always_mark = enabled;
    }

    /// Whether the RTP marker bit should be forced on this frame regardless
    /// of stream-boundary status.
    pub fn mark_every_frame(&self) -> bool {
        self.always_mark
    }
}

impl Encoder for AacEncoder {
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize, CodecError> {
        let n_samples = FRAME_PCM_FRAMES * self.channels as usize;
        check_input_len(pcm.len(), n_samples)?;
        let payload_len = bytes_for_bits(n_samples * BITS_PER_SAMPLE as usize);
        check_output_capacity(out.len(), 1 + payload_len)?;

        out[0] = MAGIC;
        let written = quantize(&pcm[..n_samples], BITS_PER_SAMPLE, &mut out[1..1 + payload_len]);
        Ok(1 + written)
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

pub struct AacDecoder {
    channels: u8,
    rate: u32,
}

impl AacDecoder {
    pub fn new(channels: u8, rate: u32) -> Result<Self, CodecError> {
        if channels == 0 || channels > 2 {
            return Err(CodecError::UnsupportedConfig(format!("AAC: unsupported channel count {channels}")));
        }
        Ok(AacDecoder { channels, rate })
    }
}

impl Decoder for AacDecoder {
    fn decode(&mut self, bitstream: &[u8], pcm_out: &mut [i16]) -> Result<(usize, usize), CodecError> {
        if bitstream.is_empty() || bitstream[0] != MAGIC {
            return Err(CodecError::DecodeFailed("missing LATM sync".into()));
        }
        let n_samples = FRAME_PCM_FRAMES * self.channels as usize;
        let payload_len = bytes_for_bits(n_samples * BITS_PER_SAMPLE as usize);
        if bitstream.len() < 1 + payload_len {
            return Err(CodecError::DecodeFailed("truncated AAC frame".into()));
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
    fn mark_bit_quirk_defaults_off() {
        let enc = AacEncoder::new(2, 44_100).unwrap();
        assert!(!enc.mark_every_frame());
    }

    #[test]
    fn mark_bit_quirk_toggle() {
        let mut enc = AacEncoder::new(2, 44_100).unwrap();
        enc.set_mark_bit_quirk(true);
        assert!(enc.mark_every_frame());
    }

    #[test]
    fn roundtrip() {
        let mut enc = AacEncoder::new(2, 44_100).unwrap();
        let mut dec = AacDecoder::new(2, 44_100).unwrap();
        let n = enc.frame_pcm_frames() * 2;
        let pcm: Vec<i16> = (0..n).map(|i| ((i * 17) % 4000) as i16 - 2000).collect();

        let mut bitstream = vec![0u8; enc.max_frame_bytes()];
        let written = enc.encode(&pcm, &mut bitstream).unwrap();

        let mut restored = vec![0i16; n];
        let (consumed, produced) = dec.decode(&bitstream[..written], &mut restored).unwrap();
        assert_eq!(consumed, written);
        assert_eq!(produced, n);
    }
}
