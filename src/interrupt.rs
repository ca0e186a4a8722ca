//! Ctrl-C plumbing. One interrupt while a child runs means "stop this
//! invocation, keep going"; an interrupt with no child running means "stop
//! the whole run". The handler only raises a flag; the runner consumes it
//! at its loop boundaries.

use std::process::{Child, Command};
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn on_sigint(_sig: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Install the SIGINT handler. Call once at startup, before the report is
/// read, so an early Ctrl-C cancels the run instead of killing the process.
#[cfg(unix)]
pub fn install() {
    unsafe {
        libc::signal(libc::SIGINT, on_sigint as libc::sighandler_t);
    }
}

#[cfg(not(unix))]
pub fn install() {}

/// Consume a pending interrupt, if any. The swap is what distinguishes
/// "already handled against the current child" from "pressed again at the
/// top level".
pub fn take() -> bool {
    INTERRUPTED.swap(false, Ordering::SeqCst)
}

/// Raise the flag as if Ctrl-C had been pressed. Exists so tests can drive
/// the runner's interrupt path without delivering a real signal.
pub fn raise() {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Keep terminal-delivered SIGINT away from the child so the parent decides
/// its fate. The child resets the disposition for its own children as it
/// sees fit.
#[cfg(unix)]
pub fn shield_child(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    unsafe {
        command.pre_exec(|| {
            libc::signal(libc::SIGINT, libc::SIG_IGN);
            Ok(())
        });
    }
}

#[cfg(not(unix))]
pub fn shield_child(_command: &mut Command) {}

/// Graceful stop: SIGTERM first so the tool can clean up, SIGKILL only if
/// the signal cannot be delivered.
#[cfg(unix)]
pub fn terminate(child: &mut Child) {
    let rc = unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGTERM) };
    if rc != 0 {
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
pub fn terminate(child: &mut Child) {
    let _ = child.kill();
}
