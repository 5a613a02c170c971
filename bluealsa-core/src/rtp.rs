//! RTP state (C3): outbound header builder and inbound sequence/timestamp
//! synchroniser with missing-frame accounting (spec §4.3, §6 wire format).
//!
//! Headers are built/parsed as explicit big-endian byte arrays rather than a
//! packed bitfield struct — spec §9 calls this out specifically ("do not
//! expose packed bitfields that depend on host endianness").

use rand::Rng;

pub const RTP_HEADER_LEN: usize = 12;
pub const RTP_VERSION: u8 = 2;
/// Dynamic payload type used by every A2DP codec carried over RTP (spec §6).
pub const RTP_PAYLOAD_TYPE_AUDIO: u8 = 96;

/// A 12-byte RTP header, spec §6: `V=2,P=0,X=0,CC=0,M,PT,seq,ts,ssrc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}

impl RtpHeader {
    pub fn to_bytes(&self) -> [u8; RTP_HEADER_LEN] {
        let mut out = [0u8; RTP_HEADER_LEN];
        out[0] = (RTP_VERSION << 6) & 0xC0; // P=0, X=0, CC=0
        out[1] = ((self.marker as u8) << 7) | (self.payload_type & 0x7F);
        out[2..4].copy_from_slice(&self.sequence_number.to_be_bytes());
        out[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        out[8..12].copy_from_slice(&self.ssrc.to_be_bytes());
        out
    }

    pub fn from_bytes(buf: &[u8]) -> Option<RtpHeader> {
        if buf.len() < RTP_HEADER_LEN {
            return None;
        }
        let version = (buf[0] >> 6) & 0x03;
        if version != RTP_VERSION {
            return None;
        }
        Some(RtpHeader {
            marker: buf[1] & 0x80 != 0,
            payload_type: buf[1] & 0x7F,
            sequence_number: u16::from_be_bytes([buf[2], buf[3]]),
            timestamp: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            ssrc: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
        })
    }
}

/// Outbound RTP state: one per encoder worker.
pub struct RtpOutboundState {
    seq: u16,
    timestamp: u32,
    ssrc: u32,
    /// RTP clock rate, which is not always equal to the PCM sample rate
    /// (spec §9 open question — resolved per-codec by `update`'s caller
    /// passing the correct `pcm_rate`).
    clock_rate: u32,
}

impl RtpOutboundState {
    /// `seq`/`ts` start at RFC 3550 §5.1's recommended random values, not 0
    /// — spec §9 flags both conventions as present upstream and recommends
    /// preferring the randomised start.
    pub fn new(clock_rate: u32, ssrc: u32) -> Self {
        let mut rng = rand::rng();
        RtpOutboundState {
            seq: rng.random(),
            timestamp: rng.random(),
            ssrc,
            clock_rate,
        }
    }

    #[cfg(test)]
    pub fn new_with_seed(clock_rate: u32, ssrc: u32, seq: u16, timestamp: u32) -> Self {
        RtpOutboundState {
            seq,
            timestamp,
            ssrc,
            clock_rate,
        }
    }

    /// Stamps a new header: `seq = ++seq`, `timestamp = current`, `pt = 96`.
    pub fn new_frame(&mut self, marker: bool) -> RtpHeader {
        self.seq = self.seq.wrapping_add(1);
        RtpHeader {
            marker,
            payload_type: RTP_PAYLOAD_TYPE_AUDIO,
            sequence_number: self.seq,
            timestamp: self.timestamp,
            ssrc: self.ssrc,
        }
    }

    /// Advance the timestamp by `n_frames` PCM frames sampled at `pcm_rate`.
    pub fn update(&mut self, n_frames: u32, pcm_rate: u32) {
        let delta = (n_frames as u64 * self.clock_rate as u64) / pcm_rate.max(1) as u64;
        self.timestamp = self.timestamp.wrapping_add(delta as u32);
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn sequence_number(&self) -> u16 {
        self.seq
    }
}

/// Inbound RTP synchroniser: one per decoder worker.
#[derive(Default)]
pub struct RtpInboundState {
    expected_seq: u16,
    timestamp: u32,
    synced: bool,
}

impl RtpInboundState {
    pub fn new() -> Self {
        RtpInboundState::default()
    }

    /// Reset to the unsynced state — called on `PCM_CLOSE` (spec §6).
    pub fn reset(&mut self) {
        self.synced = false;
    }

    pub fn is_synced(&self) -> bool {
        self.synced
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    /// Latch or advance the synchroniser from an inbound header.
    ///
    /// Returns the number of missing frames (0 = in sequence, >0 = gap,
    /// <0 = duplicate/out-of-order — dropped without advancing state).
    pub fn sync_stream(&mut self, header: &RtpHeader) -> i32 {
        if !self.synced {
            self.expected_seq = header.sequence_number.wrapping_add(1);
            self.timestamp = header.timestamp;
            self.synced = true;
            return 0;
        }

        let raw_diff = header.sequence_number.wrapping_sub(self.expected_seq) as i32;
        let missing = if raw_diff > 32_767 {
            raw_diff - 65_536
        } else {
            raw_diff
        };

        if missing < 0 {
            return missing;
        }

        self.expected_seq = header.sequence_number.wrapping_add(1);
        self.timestamp = header.timestamp;
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let header = RtpHeader {
            marker: true,
            payload_type: 96,
            sequence_number: 0xBEEF,
            timestamp: 0xC0FFEE,
            ssrc: 0x1234_5678,
        };
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), RTP_HEADER_LEN);
        let parsed = RtpHeader::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn rtp_roundtrip_no_drops() {
        let mut out = RtpOutboundState::new_with_seed(44_100, 1, 0, 0);
        let mut inb = RtpInboundState::new();
        let frame_counts = [128u32, 128, 256, 64, 512];

        for &frames in &frame_counts {
            let header = out.new_frame(false);
            out.update(frames, 44_100);
            let missing = inb.sync_stream(&header);
            assert_eq!(missing, 0);
        }

        assert_eq!(inb.timestamp(), out.timestamp());
        assert_eq!(out.timestamp(), frame_counts.iter().sum::<u32>());
    }

    #[test]
    fn gap_detected_once_then_resyncs() {
        let mut out = RtpOutboundState::new_with_seed(44_100, 1, 0, 0);
        let mut inb = RtpInboundState::new();

        let h0 = out.new_frame(false);
        out.update(128, 44_100);
        assert_eq!(inb.sync_stream(&h0), 0);

        let _dropped = out.new_frame(false); // packet index g, never delivered
        out.update(128, 44_100);

        let h2 = out.new_frame(false);
        out.update(128, 44_100);
        assert_eq!(inb.sync_stream(&h2), 1);

        let h3 = out.new_frame(false);
        out.update(128, 44_100);
        assert_eq!(inb.sync_stream(&h3), 0);
    }

    #[test]
    fn duplicate_is_dropped_without_advancing() {
        let mut out = RtpOutboundState::new_with_seed(44_100, 1, 0, 0);
        let mut inb = RtpInboundState::new();

        let h0 = out.new_frame(false);
        out.update(128, 44_100);
        assert_eq!(inb.sync_stream(&h0), 0);

        // Redeliver h0 — a duplicate (or badly reordered) packet.
        assert!(inb.sync_stream(&h0) < 0);

        let h1 = out.new_frame(false);
        out.update(128, 44_100);
        assert_eq!(inb.sync_stream(&h1), 0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn roundtrip_property(frame_counts in proptest::collection::vec(1u32..2000, 1..40)) {
            let mut out = RtpOutboundState::new_with_seed(44_100, 7, 0, 0);
            let mut inb = RtpInboundState::new();
            let mut total = 0u64;
            for &frames in &frame_counts {
                let header = out.new_frame(false);
                out.update(frames, 44_100);
                let missing = inb.sync_stream(&header);
                prop_assert_eq!(missing, 0);
                total += frames as u64;
            }
            prop_assert_eq!(out.timestamp() as u64, total & 0xFFFF_FFFF);
        }
    }
}
