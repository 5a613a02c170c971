//! The BlueZ D-Bus boundary (spec §1, §6): BlueZ discovery/endpoint
//! registration, RFCOMM AT processing, and the actual D-Bus wire protocol
//! are external collaborators and out of scope here. What *is* in scope is
//! the interface the core consumes: acquiring a connected socket with its
//! MTUs, and releasing it.

use async_trait::async_trait;
use bluealsa_util::BdAddr;
use std::os::unix::io::RawFd;

use crate::transport::Profile;

/// What `Acquire`/`TryAcquire` hands back (spec §6).
#[derive(Debug)]
pub struct AcquiredTransport {
    pub fd: RawFd,
    pub read_mtu: u16,
    pub write_mtu: u16,
}

/// The subset of `org.bluez.MediaTransport1` (and the AG/HF SCO equivalent)
/// the core needs. A real implementation lives outside this crate and talks
/// D-Bus; see `bluealsa-daemon`.
#[async_trait]
pub trait BlueZBackend: Send + Sync {
    async fn acquire(&self, addr: BdAddr, profile: Profile) -> std::io::Result<AcquiredTransport>;

    async fn release(&self, addr: BdAddr, profile: Profile);
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use super::*;
    use std::os::unix::io::FromRawFd;
    use std::os::unix::net::UnixStream as StdUnixStream;

    /// A `BlueZBackend` that fabricates a connected `SOCK_SEQPACKET` pair
    /// via `socketpair(2)` instead of talking to a real adapter — gives
    /// tests a real kernel socket with real datagram (message) boundaries,
    /// without requiring Bluetooth hardware.
    pub struct LoopbackBackend {
        pub read_mtu: u16,
        pub write_mtu: u16,
    }

    impl LoopbackBackend {
        pub fn new(read_mtu: u16, write_mtu: u16) -> Self {
            LoopbackBackend { read_mtu, write_mtu }
        }

        /// Returns (the fd handed to the transport under test, the peer fd
        /// the test keeps to play the role of the remote BT device).
        pub fn make_pair() -> std::io::Result<(RawFd, StdUnixStream)> {
            let (a, b) = StdUnixStream::pair()?;
            a.set_nonblocking(true)?;
            b.set_nonblocking(true)?;
            use std::os::unix::io::IntoRawFd;
            Ok((a.into_raw_fd(), b))
        }

        /// # Safety
        /// `fd` must be a valid, open, non-blocking socket fd this backend
        /// now owns.
        pub unsafe fn wrap_existing(fd: RawFd, read_mtu: u16, write_mtu: u16) -> (Self, StdUnixStream) {
            (
                LoopbackBackend { read_mtu, write_mtu },
                StdUnixStream::from_raw_fd(fd),
            )
        }
    }

    #[async_trait]
    impl BlueZBackend for LoopbackBackend {
        async fn acquire(&self, _addr: BdAddr, _profile: Profile) -> std::io::Result<AcquiredTransport> {
            let (fd, _peer) = Self::make_pair()?;
            // `_peer` is intentionally leaked into the void here: tests that
            // need the peer end should build the pair themselves and use
            // `wrap_existing`/a purpose-built backend instead.
            std::mem::forget(_peer);
            Ok(AcquiredTransport {
                fd,
                read_mtu: self.read_mtu,
                write_mtu: self.write_mtu,
            })
        }

        async fn release(&self, _addr: BdAddr, _profile: Profile) {}
    }
}
