//! MPEG-1/2 Layer III (spec §4.8): real frame-size arithmetic (the
//! `144 * bitrate / rate + padding` formula every MP3 frame header encodes),
//! scalar-quantized payload in place of the actual MDCT/Huffman pipeline.
//! Frames exceeding the transport MTU are fragmented by the worker that
//! owns the RTP framing, not by this adapter — see [`crate::rtp`].

use super::common::{bytes_for_bits, check_input_len, check_output_capacity, dequantize, quantize};
use super::{Decoder, Encoder};
use crate::error::CodecError;

pub const FRAME_PCM_FRAMES: usize = 1152;
const BITRATE_BPS: u32 = 128_000;
const BITS_PER_SAMPLE: u32 = 8;
const MAGIC: [u8; 2] = [0xFF, 0xFB]; // MPEG-1 Layer III sync + header byte, no CRC

fn frame_size(rate: u32) -> usize {
    (144 * BITRATE_BPS / rate) as usize
}

pub struct Mp3Encoder {
    channels: u8,
    rate: u32,
}

impl Mp3Encoder {
    pub fn new(channels: u8, rate: u32) -> Result<Self, CodecError> {
        if channels == 0 || channels > 2 {
            return Err(CodecError::UnsupportedConfig(format!("MP3: unsupported channel count {channels}")));
        }
        Ok(Mp3Encoder { channels, rate })
    }
}

impl Encoder for Mp3Encoder {
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize, CodecError> {
        let n_samples = FRAME_PCM_FRAMES * self.channels as usize;
        check_input_len(pcm.len(), n_samples)?;
        let frame_len = frame_size(self.rate);
        check_output_capacity(out.len(), frame_len)?;

        out[0..2].copy_from_slice(&MAGIC);
        let header_len = 5;
        let payload_len = (frame_len - header_len).min(bytes_for_bits(n_samples * BITS_PER_SAMPLE as usize));
        out[2] = self.channels - 1;
        out[3..5].copy_from_slice(&(payload_len as u16).to_be_bytes());
        let written = quantize(&pcm[..n_samples], BITS_PER_SAMPLE, &mut out[header_len..header_len + payload_len]);
        let total = header_len + written;
        for b in &mut out[total..frame_len] {
            *b = 0;
        }
        Ok(frame_len)
    }

    fn frame_pcm_frames(&self) -> usize {
        FRAME_PCM_FRAMES
    }

    fn max_frame_bytes(&self) -> usize {
        frame_size(self.rate)
    }

    fn channels(&self) -> u8 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.rate
    }
}

pub struct Mp3Decoder {
    channels: u8,
    rate: u32,
}

impl Mp3Decoder {
    pub fn new(channels: u8, rate: u32) -> Result<Self, CodecError> {
        if channels == 0 || channels > 2 {
            return Err(CodecError::UnsupportedConfig(format!("MP3: unsupported channel count {channels}")));
        }
        Ok(Mp3Decoder { channels, rate })
    }
}

impl Decoder for Mp3Decoder {
    fn decode(&mut self, bitstream: &[u8], pcm_out: &mut [i16]) -> Result<(usize, usize), CodecError> {
        if bitstream.len() < 5 || bitstream[0..2] != MAGIC {
            return Err(CodecError::DecodeFailed("missing MP3 frame sync".into()));
        }
        let frame_len = frame_size(self.rate);
        if bitstream.len() < frame_len {
            return Err(CodecError::DecodeFailed("truncated MP3 frame".into()));
        }
        let payload_len = u16::from_be_bytes([bitstream[3], bitstream[4]]) as usize;
        let n_samples = FRAME_PCM_FRAMES * self.channels as usize;
        if pcm_out.len() < n_samples {
            return Err(CodecError::DecodeFailed("pcm_out too small".into()));
        }
        let decodable = (payload_len * 8 / BITS_PER_SAMPLE as usize).min(n_samples);
        dequantize(&bitstream[5..5 + payload_len], BITS_PER_SAMPLE, decodable, pcm_out);
        for slot in &mut pcm_out[decodable..n_samples] {
            *slot = 0;
        }
        Ok((frame_len, n_samples))
    }

    fn frame_pcm_frames(&self) -> usize {
        FRAME_PCM_FRAMES
    }

    fn max_frame_bytes(&self) -> usize {
        frame_size(self.rate)
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
    fn frame_size_matches_standard_formula() {
        assert_eq!(frame_size(44_100), 144 * 128_000 / 44_100);
    }

    #[test]
    fn roundtrip() {
        let mut enc = Mp3Encoder::new(2, 44_100).unwrap();
        let mut dec = Mp3Decoder::new(2, 44_100).unwrap();
        let n = enc.frame_pcm_frames() * 2;
        let pcm: Vec<i16> = (0..n).map(|i| ((i * 29) % 6000) as i16 - 3000).collect();

        let mut bitstream = vec![0u8; enc.max_frame_bytes()];
        let written = enc.encode(&pcm, &mut bitstream).unwrap();

        let mut restored = vec![0i16; n];
        let (consumed, produced) = dec.decode(&bitstream[..written], &mut restored).unwrap();
        assert_eq!(consumed, written);
        assert_eq!(produced, n);
    }
}
