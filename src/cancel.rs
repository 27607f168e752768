//! Cooperative cancellation for a build run.
//!
//! A [`CancelToken`] is a cloneable handle around a shared stop flag. The
//! orchestrator checks it before starting each action and the dispatcher
//! polls it while a build is in flight. [`CancelToken::on_interrupt`] wires
//! the flag to SIGINT and SIGTERM on Unix.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Set from the signal handler; read by every token created with
/// [`CancelToken::on_interrupt`].
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    follows_signals: bool,
}

impl CancelToken {
    /// A token that is only cancelled through [`CancelToken::cancel`].
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that is also cancelled when the process receives SIGINT or
    /// SIGTERM.
    #[cfg(unix)]
    pub fn on_interrupt() -> std::io::Result<Self> {
        use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

        extern "C" fn handle(_: nix::libc::c_int) {
            INTERRUPTED.store(true, Ordering::SeqCst);
        }

        let action = SigAction::new(
            SigHandler::Handler(handle),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        for signal in [Signal::SIGINT, Signal::SIGTERM] {
            // SAFETY: the handler only stores to an atomic, which is
            // async-signal-safe.
            unsafe { sigaction(signal, &action) }.map_err(std::io::Error::from)?;
        }

        Ok(Self {
            flag: Arc::new(AtomicBool::new(false)),
            follows_signals: true,
        })
    }

    #[cfg(not(unix))]
    pub fn on_interrupt() -> std::io::Result<Self> {
        Ok(Self::new())
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
            || (self.follows_signals && INTERRUPTED.load(Ordering::SeqCst))
    }
}
