use std::fmt;
use std::str::FromStr;

/// A Bluetooth device address, stored in wire order (not reversed like the
/// kernel's `bdaddr_t`).
///
/// Transport identity is `(BdAddr, profile, codec)` per spec §3; this type
/// only covers the address half.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BdAddr([u8; 6]);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BdAddrParseError {
    #[error("expected 6 colon-separated hex octets, got {0}")]
    WrongOctetCount(usize),
    #[error("invalid hex octet {0:?}")]
    InvalidOctet(String),
}

impl BdAddr {
    pub const ZERO: BdAddr = BdAddr([0; 6]);

    pub const fn from_octets(octets: [u8; 6]) -> Self {
        BdAddr(octets)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for BdAddr {
    type Err = BdAddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(BdAddrParseError::WrongOctetCount(parts.len()));
        }
        let mut octets = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            octets[i] = u8::from_str_radix(part, 16)
                .map_err(|_| BdAddrParseError::InvalidOctet(part.to_string()))?;
        }
        Ok(BdAddr(octets))
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let addr: BdAddr = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        assert_eq!(addr.to_string(), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn lowercase_accepted() {
        let addr: BdAddr = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        assert_eq!(addr.octets(), [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);
    }

    #[test]
    fn rejects_wrong_octet_count() {
        assert_eq!(
            "AA:BB".parse::<BdAddr>(),
            Err(BdAddrParseError::WrongOctetCount(2))
        );
    }

    #[test]
    fn rejects_bad_hex() {
        assert!("ZZ:BB:CC:DD:EE:FF".parse::<BdAddr>().is_err());
    }
}
