//! Small, dependency-free helpers shared by `bluealsa-core`, `bluealsa-config`
//! and `bluealsa-daemon`.
//!
//! Nothing in this crate holds state or spawns anything; it exists so the
//! same Bluetooth address formatting, delay-unit, and socket-queue-depth
//! logic isn't duplicated across the other crates.

mod bdaddr;
mod decims;
mod sockopt;

pub use bdaddr::{BdAddr, BdAddrParseError};
pub use decims::DeciMs;
pub use sockopt::pending_send_bytes;
