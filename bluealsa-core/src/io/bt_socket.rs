//! Wrapper around the connected, non-blocking `SOCK_SEQPACKET` fd BlueZ's
//! `Acquire`/`TryAcquire` RPC hands back (spec §6). One per transport;
//! spec §4.7/§5: owned by the transport, only `release` may close it,
//! workers merely borrow a reference for their lifetime.
//!
//! Grounded on `bluer`'s and `nxzr_device`'s `AsyncFd`-based socket wrappers
//! (`other_examples/6737ea98_bluez-bluer__bluer-src-l2cap.rs`,
//! `097f0d16_preco21-nxzr-legacy__nxzr_device-src-sock-l2cap.rs`).

use std::io;
use std::os::unix::io::{AsRawFd, RawFd};
use tokio::io::unix::AsyncFd;

pub struct BtSocket {
    fd: AsyncFd<RawFd>,
}

impl BtSocket {
    /// `fd` must already be `O_NONBLOCK` and connected; ownership transfers
    /// to this `BtSocket` (it closes the fd on `Drop`).
    pub fn from_raw_fd(fd: RawFd) -> io::Result<Self> {
        Ok(BtSocket {
            fd: AsyncFd::new(fd)?,
        })
    }

    /// Read one SEQPACKET datagram. Returns `0` on a peer-initiated close.
    pub async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let mut guard = self.fd.readable().await?;
            let result = guard.try_io(|inner| {
                let fd = *inner.get_ref();
                let n = unsafe {
                    libc::recv(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0)
                };
                if n < 0 {
                    Err(io::Error::last_os_error())
                } else {
                    Ok(n as usize)
                }
            });
            match result {
                Ok(res) => return res,
                Err(_would_block) => continue,
            }
        }
    }

    /// Write one SEQPACKET datagram. Callers are responsible for keeping
    /// `buf.len() <= write_mtu`.
    ///
    /// Tries exactly one non-blocking write after the fd reports writable;
    /// on `WouldBlock` this returns the error rather than retrying, so a
    /// full socket (kernel send queue backed up past the transport's 16 KiB
    /// budget, spec §5/§7) surfaces as a dropped packet instead of a worker
    /// that silently stalls waiting for room.
    pub async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.fd.writable().await?;
        let result = guard.try_io(|inner| {
            let fd = *inner.get_ref();
            let n = unsafe { libc::send(fd, buf.as_ptr() as *const libc::c_void, buf.len(), 0) };
            if n < 0 {
                Err(io::Error::last_os_error())
            } else {
                Ok(n as usize)
            }
        });
        match result {
            Ok(res) => res,
            Err(_would_block) => Err(io::Error::from(io::ErrorKind::WouldBlock)),
        }
    }

    /// Bytes still queued by the kernel for transmission — drives the LDAC
    /// ABR loop and general backpressure accounting (spec §4.7/§4.8).
    pub fn pending_send_bytes(&self) -> io::Result<u32> {
        bluealsa_util::pending_send_bytes(self.as_raw_fd())
    }

    /// Reduce `SO_SNDBUF` to roughly `3 * write_mtu`, per spec §4.7's
    /// acquire-time intent: minimise queued audio so a client seek/stop is
    /// responsive.
    pub fn shrink_sndbuf(&self, write_mtu: usize) -> io::Result<()> {
        let target = (3 * write_mtu) as libc::c_int;
        let rc = unsafe {
            libc::setsockopt(
                self.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_SNDBUF,
                &target as *const libc::c_int as *const libc::c_void,
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl AsRawFd for BtSocket {
    fn as_raw_fd(&self) -> RawFd {
        *self.fd.get_ref()
    }
}

impl Drop for BtSocket {
    fn drop(&mut self) {
        let fd = *self.fd.get_ref();
        unsafe {
            libc::close(fd);
        }
    }
}
