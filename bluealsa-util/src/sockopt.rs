use std::io;
use std::os::unix::io::RawFd;

/// Bytes still queued for transmission on `fd`, via the `TIOCOUTQ` ioctl.
///
/// Used by the LDAC ABR loop and by backpressure accounting in general (spec
/// §4.7, §4.8, §5). Mirrors `bluer`'s `Socket::output_buffer` helper.
pub fn pending_send_bytes(fd: RawFd) -> io::Result<u32> {
    let mut value: libc::c_int = 0;
    // SAFETY: `fd` is a valid, open socket owned by the caller for the
    // duration of this call; `TIOCOUTQ` writes a single `c_int`.
    let rc = unsafe { libc::ioctl(fd, libc::TIOCOUTQ, &mut value as *mut libc::c_int) };
    if rc < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(value as u32)
}
