//! Process-level signal plumbing for the status query.
//!
//! Only async-signal-safe work happens inside the handler: an atomic pointer load, the
//! debouncer's compare-and-swap, formatting into a stack buffer, `clock_gettime` and a
//! raw `write(2)` to stdout.

use std::io;
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

use crate::bridge::StatusBoard;
use crate::errors::{ScanError, ScanResult};

static STATUS_BOARD: AtomicPtr<StatusBoard> = AtomicPtr::new(ptr::null_mut());

/// Milliseconds on the monotonic clock, readable from a signal handler
pub fn monotonic_millis() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `ts` is a valid out-pointer; CLOCK_MONOTONIC is always available.
    unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
    (ts.tv_sec as u64) * 1_000 + (ts.tv_nsec as u64) / 1_000_000
}

#[cfg(target_os = "linux")]
unsafe fn errno_location() -> *mut libc::c_int {
    libc::__errno_location()
}

#[cfg(not(target_os = "linux"))]
unsafe fn errno_location() -> *mut libc::c_int {
    libc::__error()
}

extern "C" fn on_status_request(_signum: libc::c_int) {
    // SAFETY: errno is thread-local; it is restored before returning.
    let saved_errno = unsafe { *errno_location() };

    let board = STATUS_BOARD.load(Ordering::Acquire);
    if !board.is_null() {
        // SAFETY: the pointer is published only while a guard holds the owning Arc.
        let board = unsafe { &*board };
        board.request_status(monotonic_millis(), |line| {
            // SAFETY: `line` is a live stack buffer; write(2) is async-signal-safe.
            unsafe {
                libc::write(libc::STDOUT_FILENO, line.as_ptr().cast(), line.len());
            }
        });
    }

    unsafe { *errno_location() = saved_errno };
}

/// Keeps the status-query handler installed on SIGINT.
///
/// While the guard lives, SIGINT prints a debounced status line instead of terminating
/// the process. Dropping it restores the previous disposition.
pub struct StatusSignalGuard {
    board: Arc<StatusBoard>,
    previous: libc::sigaction,
}

impl StatusSignalGuard {
    pub fn install(board: Arc<StatusBoard>) -> ScanResult<Self> {
        let raw = Arc::as_ptr(&board) as *mut StatusBoard;
        STATUS_BOARD
            .compare_exchange(ptr::null_mut(), raw, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ScanError::signal("a status handler is already installed"))?;

        // SAFETY: both sigaction structs are fully initialised before use.
        let previous = unsafe {
            let mut action: libc::sigaction = mem::zeroed();
            action.sa_sigaction = on_status_request as extern "C" fn(libc::c_int) as usize;
            libc::sigemptyset(&mut action.sa_mask);
            action.sa_flags = 0;

            let mut previous: libc::sigaction = mem::zeroed();
            if libc::sigaction(libc::SIGINT, &action, &mut previous) != 0 {
                let err = io::Error::last_os_error();
                STATUS_BOARD.store(ptr::null_mut(), Ordering::Release);
                return Err(ScanError::signal(format!("sigaction(SIGINT): {err}")));
            }
            previous
        };

        Ok(Self { board, previous })
    }

    pub fn board(&self) -> &StatusBoard {
        &self.board
    }
}

impl Drop for StatusSignalGuard {
    fn drop(&mut self) {
        // SAFETY: `previous` came from a successful sigaction call.
        unsafe {
            libc::sigaction(libc::SIGINT, &self.previous, ptr::null_mut());
        }
        STATUS_BOARD.store(ptr::null_mut(), Ordering::Release);
    }
}

/// Blocks SIGINT on the calling thread until dropped.
///
/// Threads spawned while the guard lives inherit the blocked mask, so they never run the
/// status handler, not even before their first instruction. Dropping the guard restores
/// the calling thread's previous mask.
pub struct StatusMaskGuard {
    previous: libc::sigset_t,
}

impl StatusMaskGuard {
    pub fn block() -> io::Result<Self> {
        // SAFETY: both sets are initialised by sigemptyset before being read.
        let (rc, previous) = unsafe {
            let mut set: libc::sigset_t = mem::zeroed();
            libc::sigemptyset(&mut set);
            libc::sigaddset(&mut set, libc::SIGINT);
            let mut previous: libc::sigset_t = mem::zeroed();
            libc::sigemptyset(&mut previous);
            let rc = libc::pthread_sigmask(libc::SIG_BLOCK, &set, &mut previous);
            (rc, previous)
        };
        if rc == 0 {
            Ok(Self { previous })
        } else {
            Err(io::Error::from_raw_os_error(rc))
        }
    }
}

impl Drop for StatusMaskGuard {
    fn drop(&mut self) {
        // SAFETY: `previous` was filled by a successful pthread_sigmask call.
        unsafe {
            libc::pthread_sigmask(libc::SIG_SETMASK, &self.previous, ptr::null_mut());
        }
    }
}

/// True when SIGINT is blocked on the calling thread
#[cfg(test)]
pub(crate) fn status_requests_blocked() -> bool {
    // SAFETY: a null new set only queries the current mask into `current`.
    unsafe {
        let mut current: libc::sigset_t = mem::zeroed();
        libc::sigemptyset(&mut current);
        libc::pthread_sigmask(libc::SIG_BLOCK, ptr::null(), &mut current) == 0
            && libc::sigismember(&current, libc::SIGINT) == 1
    }
}
