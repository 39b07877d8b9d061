//! Reliable I/O on private files.
//!
//! Thin wrappers over `open`/`write`/`read`/`close` that absorb transient
//! failures: `open` is retried with a fixed backoff, partial transfers are
//! resumed, `EINTR`/`EAGAIN` are retried for free and other errors draw from a
//! small retry budget.

use std::ffi::CString;
use std::io;
use std::os::raw::c_int;
use std::os::unix::io::RawFd;
use std::thread;
use std::time::Duration;

use gio_core::error::{GioError, Result};
use gio_core::handle::OpenFlags;
use log::{debug, warn};

/// Additional `open` attempts after the first failure.
pub const OPEN_RETRIES: u32 = 30;
/// Delay between `open` attempts.
pub const OPEN_RETRY_DELAY: Duration = Duration::from_millis(100);
/// Non-transient errors tolerated by one `write`/`read` call.
pub const XFER_RETRIES: u32 = 10;
/// Permission bits for files created without an explicit mode (user rw).
pub const DEFAULT_MODE: u32 = 0o600;

/// Retry schedule for [`PosixFile::open_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenRetry {
    pub retries: u32,
    pub delay: Duration,
}

impl Default for OpenRetry {
    fn default() -> Self {
        Self {
            retries: OPEN_RETRIES,
            delay: OPEN_RETRY_DELAY,
        }
    }
}

/// Single-shot byte transfer on a descriptor-like object.
///
/// The reliable loops in [`reliable_write`] and [`reliable_read`] are written
/// against this trait.
pub trait RawIo {
    fn raw_write(&mut self, buf: &[u8]) -> io::Result<usize>;
    fn raw_read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Errors retried without consuming budget.
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
    )
}

/// Write all of `buf`, resuming partial writes.
///
/// A zero-byte write is unrecoverable. Returns the number of bytes written,
/// which always equals `buf.len()` on success.
pub fn reliable_write<W: RawIo + ?Sized>(io: &mut W, path: &str, buf: &[u8]) -> Result<usize> {
    let mut n = 0;
    let mut retries = XFER_RETRIES;

    while n < buf.len() {
        match io.raw_write(&buf[n..]) {
            Ok(0) => {
                return Err(GioError::local_io(
                    "write",
                    path,
                    io::Error::new(
                        io::ErrorKind::WriteZero,
                        format!("write of {} bytes returned 0", buf.len() - n),
                    ),
                ));
            }
            Ok(rc) => n += rc,
            Err(e) if is_transient(&e) => continue,
            Err(e) => {
                retries -= 1;
                if retries == 0 {
                    return Err(GioError::local_io("giving up write to", path, e));
                }
                warn!(
                    "Error writing {}: {} bytes at {}: {} (retries left {})",
                    path,
                    buf.len() - n,
                    n,
                    e,
                    retries
                );
            }
        }
    }

    Ok(n)
}

/// Read up to `buf.len()` bytes, resuming partial reads.
///
/// End of file ends the loop early; the short count is returned, not an error.
pub fn reliable_read<R: RawIo + ?Sized>(io: &mut R, path: &str, buf: &mut [u8]) -> Result<usize> {
    let mut n = 0;
    let mut retries = XFER_RETRIES;

    while n < buf.len() {
        match io.raw_read(&mut buf[n..]) {
            Ok(0) => {
                debug!("EOF on {} after {} of {} bytes", path, n, buf.len());
                return Ok(n);
            }
            Ok(rc) => n += rc,
            Err(e) if is_transient(&e) => continue,
            Err(e) => {
                retries -= 1;
                if retries == 0 {
                    return Err(GioError::local_io("giving up read of", path, e));
                }
                warn!(
                    "Error reading {}: {} bytes at {}: {} (retries left {})",
                    path,
                    buf.len() - n,
                    n,
                    e,
                    retries
                );
            }
        }
    }

    Ok(n)
}

/// Call `attempt` until it succeeds or `policy.retries` extra attempts fail.
fn retry_open<T>(
    path: &str,
    policy: OpenRetry,
    mut attempt: impl FnMut() -> io::Result<T>,
) -> Result<T> {
    let mut last = match attempt() {
        Ok(v) => return Ok(v),
        Err(e) => e,
    };
    warn!("Opening file {}: {} (retrying)", path, last);

    for _ in 0..policy.retries {
        thread::sleep(policy.delay);
        match attempt() {
            Ok(v) => return Ok(v),
            Err(e) => last = e,
        }
    }

    Err(GioError::local_io("open", path, last))
}

/// Convert benchmark open flags to libc `O_*` flags.
fn to_libc_flags(flags: OpenFlags) -> c_int {
    let mut oflags: c_int = 0;

    if flags.contains(OpenFlags::RDWR) {
        oflags |= libc::O_RDWR;
    } else if flags.contains(OpenFlags::WRONLY) {
        oflags |= libc::O_WRONLY;
    } else {
        oflags |= libc::O_RDONLY;
    }
    if flags.contains(OpenFlags::CREAT) {
        oflags |= libc::O_CREAT;
    }
    if flags.contains(OpenFlags::TRUNC) {
        oflags |= libc::O_TRUNC;
    }

    oflags
}

fn path_to_cstring(path: &str) -> Result<CString> {
    CString::new(path).map_err(|_| GioError::config(format!("path contains NUL: {path:?}")))
}

/// A private benchmark file opened with POSIX `open`.
#[derive(Debug)]
pub struct PosixFile {
    fd: RawFd,
    path: String,
}

impl PosixFile {
    /// Open `path`, retrying with the default schedule.
    ///
    /// `mode` defaults to [`DEFAULT_MODE`] when `None`.
    pub fn open(path: &str, flags: OpenFlags, mode: Option<u32>) -> Result<Self> {
        Self::open_with(path, flags, mode, OpenRetry::default())
    }

    pub fn open_with(
        path: &str,
        flags: OpenFlags,
        mode: Option<u32>,
        policy: OpenRetry,
    ) -> Result<Self> {
        let cpath = path_to_cstring(path)?;
        let oflags = to_libc_flags(flags);
        let mode = mode.unwrap_or(DEFAULT_MODE) as libc::c_uint;

        let fd = retry_open(path, policy, || {
            let fd = unsafe { libc::open(cpath.as_ptr(), oflags, mode) };
            if fd < 0 {
                Err(io::Error::last_os_error())
            } else {
                Ok(fd)
            }
        })?;

        Ok(Self {
            fd,
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }

    /// See [`reliable_write`].
    pub fn write_all(&mut self, buf: &[u8]) -> Result<usize> {
        let path = self.path.clone();
        reliable_write(self, &path, buf)
    }

    /// See [`reliable_read`].
    pub fn read_full(&mut self, buf: &mut [u8]) -> Result<usize> {
        let path = self.path.clone();
        reliable_read(self, &path, buf)
    }

    /// Move the file offset back to the start.
    pub fn rewind(&mut self) -> Result<()> {
        let rc = unsafe { libc::lseek(self.fd, 0, libc::SEEK_SET) };
        if rc < 0 {
            return Err(GioError::local_io(
                "seek",
                self.path.as_str(),
                io::Error::last_os_error(),
            ));
        }
        Ok(())
    }

    /// Flush and close. Failures are logged and reported as `false`; they
    /// never abort the run.
    pub fn close(mut self) -> bool {
        let fd = std::mem::replace(&mut self.fd, -1);

        if unsafe { libc::fsync(fd) } < 0 {
            warn!("fsync {}: {}", self.path, io::Error::last_os_error());
        }
        if unsafe { libc::close(fd) } != 0 {
            warn!(
                "Closing file descriptor {} for file {}: {}",
                fd,
                self.path,
                io::Error::last_os_error()
            );
            return false;
        }
        true
    }
}

impl RawIo for PosixFile {
    fn raw_write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let rc = unsafe { libc::write(self.fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(rc as usize)
        }
    }

    fn raw_read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let rc = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(rc as usize)
        }
    }
}

impl Drop for PosixFile {
    fn drop(&mut self) {
        if self.fd >= 0 {
            unsafe {
                libc::close(self.fd);
            }
        }
    }
}

/// Unlink a file. A missing file is not an error.
pub fn delete(path: &str) -> Result<()> {
    let cpath = path_to_cstring(path)?;
    let rc = unsafe { libc::unlink(cpath.as_ptr()) };
    if rc < 0 {
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::NotFound {
            return Err(GioError::local_io("unlink", path, err));
        }
    }
    Ok(())
}
