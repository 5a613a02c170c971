//! LDAC (spec §4.8, §9): Sony's adaptive-bitrate hi-res codec. No
//! Rust-native implementation exists without Sony's SDK; this is a
//! simplified scalar-quantized stand-in, but the adaptive bitrate (ABR)
//! control loop — EQMID stepping down/up in response to the kernel socket
//! backlog, measured in multiples of the write MTU — is real and follows
//! bluealsa's own thresholds: backlog > 6 MTUs drops two steps, > 4 MTUs
//! drops one step, < 2 MTUs climbs one step.

use super::common::{bytes_for_bits, check_input_len, check_output_capacity, dequantize, quantize};
use super::{Decoder, Encoder};
use crate::error::CodecError;

pub const FRAME_PCM_FRAMES: usize = 512;

/// LDAC's three quality modes, highest to lowest bitrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EqMid {
    High,
    Standard,
    Mobile,
}

impl EqMid {
    fn bits_per_sample(self) -> u32 {
        match self {
            EqMid::High => 16,
            EqMid::Standard => 10,
            EqMid::Mobile => 6,
        }
    }

    fn step_down(self) -> EqMid {
        match self {
            EqMid::High => EqMid::Standard,
            EqMid::Standard | EqMid::Mobile => EqMid::Mobile,
        }
    }

    fn step_up(self) -> EqMid {
        match self {
            EqMid::Mobile => EqMid::Standard,
            EqMid::Standard | EqMid::High => EqMid::High,
        }
    }
}

/// Adjusts `EqMid` from the number of write-MTUs currently queued in the
/// kernel socket (spec §4.8's ABR loop; backlog read via
/// [`bluealsa_util::pending_send_bytes`]).
pub fn adjust_eqmid(current: EqMid, backlog_bytes: u32, write_mtu: u16) -> EqMid {
    let mtu = write_mtu.max(1) as u32;
    let backlog_mtus = backlog_bytes / mtu;
    if backlog_mtus > 6 {
        current.step_down().step_down()
    } else if backlog_mtus > 4 {
        current.step_down()
    } else if backlog_mtus < 2 {
        current.step_up()
    } else {
        current
    }
}

pub struct LdacEncoder {
    channels: u8,
    rate: u32,
    eqmid: EqMid,
}

impl LdacEncoder {
    pub fn new(channels: u8, rate: u32) -> Result<Self, CodecError> {
        if channels == 0 || channels > 2 {
            return Err(CodecError::UnsupportedConfig(format!("LDAC: unsupported channel count {channels}")));
        }
        Ok(LdacEncoder { channels, rate, eqmid: EqMid::High })
    }

    pub fn eqmid(&self) -> EqMid {
        self.eqmid
    }

    pub fn set_eqmid(&mut self, eqmid: EqMid) {
        self.eqmid = eqmid;
    }

    /// Reads the socket's pending send backlog and steps EQMID per spec's
    /// ABR thresholds; call once per encoded frame from the worker loop.
    pub fn adapt_to_backlog(&mut self, backlog_bytes: u32, write_mtu: u16) {
        self.eqmid = adjust_eqmid(self.eqmid, backlog_bytes, write_mtu);
    }
}

impl Encoder for LdacEncoder {
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> Result<usize, CodecError> {
        let n_samples = FRAME_PCM_FRAMES * self.channels as usize;
        check_input_len(pcm.len(), n_samples)?;
        let bps = self.eqmid.bits_per_sample();
        let payload_len = bytes_for_bits(n_samples * bps as usize);
        check_output_capacity(out.len(), 1 + payload_len)?;

        out[0] = self.eqmid as u8;
        let written = quantize(&pcm[..n_samples], bps, &mut out[1..1 + payload_len]);
        Ok(1 + written)
    }

    fn frame_pcm_frames(&self) -> usize {
        FRAME_PCM_FRAMES
    }

    fn max_frame_bytes(&self) -> usize {
        1 + bytes_for_bits(FRAME_PCM_FRAMES * self.channels as usize * 16)
    }

    fn channels(&self) -> u8 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.rate
    }

    fn adapt_bitrate(&mut self, backlog_bytes: u32, write_mtu: u16) {
        self.adapt_to_backlog(backlog_bytes, write_mtu);
    }
}

fn eqmid_from_byte(b: u8) -> Option<EqMid> {
    match b {
        0 => Some(EqMid::High),
        1 => Some(EqMid::Standard),
        2 => Some(EqMid::Mobile),
        _ => None,
    }
}

pub struct LdacDecoder {
    channels: u8,
    rate: u32,
}

impl LdacDecoder {
    pub fn new(channels: u8, rate: u32) -> Result<Self, CodecError> {
        if channels == 0 || channels > 2 {
            return Err(CodecError::UnsupportedConfig(format!("LDAC: unsupported channel count {channels}")));
        }
        Ok(LdacDecoder { channels, rate })
    }
}

impl Decoder for LdacDecoder {
    fn decode(&mut self, bitstream: &[u8], pcm_out: &mut [i16]) -> Result<(usize, usize), CodecError> {
        if bitstream.is_empty() {
            return Err(CodecError::DecodeFailed("empty LDAC frame".into()));
        }
        let eqmid = eqmid_from_byte(bitstream[0])
            .ok_or_else(|| CodecError::DecodeFailed("invalid EQMID byte".into()))?;
        let n_samples = FRAME_PCM_FRAMES * self.channels as usize;
        let bps = eqmid.bits_per_sample();
        let payload_len = bytes_for_bits(n_samples * bps as usize);
        if bitstream.len() < 1 + payload_len {
            return Err(CodecError::DecodeFailed("truncated LDAC frame".into()));
        }
        if pcm_out.len() < n_samples {
            return Err(CodecError::DecodeFailed("pcm_out too small".into()));
        }
        dequantize(&bitstream[1..1 + payload_len], bps, n_samples, pcm_out);
        Ok((1 + payload_len, n_samples))
    }

    fn frame_pcm_frames(&self) -> usize {
        FRAME_PCM_FRAMES
    }

    fn max_frame_bytes(&self) -> usize {
        1 + bytes_for_bits(FRAME_PCM_FRAMES * self.channels as usize * 16)
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
    fn large_backlog_drops_two_steps() {
        let next = adjust_eqmid(EqMid::High, 700 * 7, 700);
        assert_eq!(next, EqMid::Mobile);
    }

    #[test]
    fn moderate_backlog_drops_one_step() {
        let next = adjust_eqmid(EqMid::High, 700 * 5, 700);
        assert_eq!(next, EqMid::Standard);
    }

    #[test]
    fn small_backlog_climbs_one_step() {
        let next = adjust_eqmid(EqMid::Mobile, 700, 700);
        assert_eq!(next, EqMid::Standard);
    }

    #[test]
    fn comfortable_backlog_holds_steady() {
        let next = adjust_eqmid(EqMid::Standard, 700 * 3, 700);
        assert_eq!(next, EqMid::Standard);
    }

    #[test]
    fn roundtrip_at_each_quality() {
        for eqmid in [EqMid::High, EqMid::Standard, EqMid::Mobile] {
            let mut enc = LdacEncoder::new(2, 96_000).unwrap();
            enc.set_eqmid(eqmid);
            let mut dec = LdacDecoder::new(2, 96_000).unwrap();
            let n = enc.frame_pcm_frames() * 2;
            let pcm: Vec<i16> = (0..n).map(|i| ((i * 19) % 7000) as i16 - 3500).collect();

            let mut bitstream = vec![0u8; enc.max_frame_bytes()];
            let written = enc.encode(&pcm, &mut bitstream).unwrap();

            let mut restored = vec![0i16; n];
            let (consumed, produced) = dec.decode(&bitstream[..written], &mut restored).unwrap();
            assert_eq!(consumed, written);
            assert_eq!(produced, n);
        }
    }

    #[test]
    fn adapt_bitrate_is_reachable_through_the_encoder_trait_object() {
        // A large backlog should step EQMID all the way down to Mobile,
        // which shrinks the encoded frame relative to the default High
        // quality — observable even through `Box<dyn Encoder>`, where
        // `LdacEncoder`'s own methods are erased.
        let mut high: Box<dyn Encoder> = Box::new(LdacEncoder::new(2, 96_000).unwrap());
        let mut mobile: Box<dyn Encoder> = Box::new(LdacEncoder::new(2, 96_000).unwrap());
        mobile.adapt_bitrate(700 * 7, 700);

        let pcm = vec![0i16; high.frame_pcm_frames() * 2];
        let mut high_out = vec![0u8; high.max_frame_bytes()];
        let mut mobile_out = vec![0u8; mobile.max_frame_bytes()];
        let high_written = high.encode(&pcm, &mut high_out).unwrap();
        let mobile_written = mobile.encode(&pcm, &mut mobile_out).unwrap();
        assert!(mobile_written < high_written);
    }
}
