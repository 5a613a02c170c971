//! Static codec capability table (spec §4.8's "capability registry"):
//! what sample rates/channel counts/features a codec supports, without
//! needing to instantiate one.

use crate::transport::CodecId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecCapability {
    pub codec: CodecId,
    pub sample_rates: &'static [u32],
    pub max_channels: u8,
    /// RTP (A2DP) vs H2 (SCO) framing.
    pub is_sco: bool,
    /// Supports adaptive bitrate reselection in response to link backlog
    /// (spec §4.8, LDAC EQMID / LHDC bitrate ladder).
    pub supports_abr: bool,
}

const fn cap(
    codec: CodecId,
    sample_rates: &'static [u32],
    max_channels: u8,
    is_sco: bool,
    supports_abr: bool,
) -> CodecCapability {
    CodecCapability {
        codec,
        sample_rates,
        max_channels,
        is_sco,
        supports_abr,
    }
}

const RATES_SBC: [u32; 4] = [16_000, 32_000, 44_100, 48_000];
const RATES_16K: [u32; 1] = [16_000];
const RATES_8K: [u32; 1] = [8_000];
const RATES_HIRES: [u32; 3] = [44_100, 48_000, 96_000];
const RATES_AAC: [u32; 6] = [8_000, 16_000, 24_000, 32_000, 44_100, 48_000];
const RATES_OPUS: [u32; 5] = [8_000, 12_000, 16_000, 24_000, 48_000];

const REGISTRY: [CodecCapability; 13] = [
    cap(CodecId::Sbc, &RATES_SBC, 2, false, false),
    cap(CodecId::MSbc, &RATES_16K, 1, true, false),
    cap(CodecId::Lc3Swb, &RATES_16K, 1, true, false),
    cap(CodecId::Cvsd, &RATES_8K, 1, true, false),
    cap(CodecId::Mp3, &RATES_AAC, 2, false, false),
    cap(CodecId::Aac, &RATES_AAC, 2, false, false),
    cap(CodecId::AptX, &RATES_SBC, 2, false, false),
    cap(CodecId::AptXHd, &RATES_HIRES, 2, false, false),
    cap(CodecId::Ldac, &RATES_HIRES, 2, false, true),
    cap(CodecId::Lhdc, &RATES_HIRES, 2, false, true),
    cap(CodecId::FastStream, &RATES_SBC, 2, false, false),
    cap(CodecId::Opus, &RATES_OPUS, 2, false, false),
    cap(CodecId::G722, &RATES_16K, 1, true, false),
];

pub fn codec_capability(codec: CodecId) -> CodecCapability {
    REGISTRY
        .iter()
        .copied()
        .find(|c| c.codec == codec)
        .expect("REGISTRY covers every CodecId variant")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_codec_is_registered() {
        let all = [
            CodecId::Sbc,
            CodecId::MSbc,
            CodecId::Lc3Swb,
            CodecId::Cvsd,
            CodecId::Mp3,
            CodecId::Aac,
            CodecId::AptX,
            CodecId::AptXHd,
            CodecId::Ldac,
            CodecId::Lhdc,
            CodecId::FastStream,
            CodecId::Opus,
            CodecId::G722,
        ];
        for codec in all {
            let capability = codec_capability(codec);
            assert_eq!(capability.codec, codec);
            assert!(!capability.sample_rates.is_empty());
        }
    }

    #[test]
    fn sco_codecs_flagged() {
        assert!(codec_capability(CodecId::MSbc).is_sco);
        assert!(codec_capability(CodecId::Cvsd).is_sco);
        assert!(!codec_capability(CodecId::Sbc).is_sco);
    }

    #[test]
    fn abr_only_on_ldac_and_lhdc() {
        assert!(codec_capability(CodecId::Ldac).supports_abr);
        assert!(codec_capability(CodecId::Lhdc).supports_abr);
        assert!(!codec_capability(CodecId::AptXHd).supports_abr);
    }
}
