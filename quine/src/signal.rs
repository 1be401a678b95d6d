//! Signal controller: maps OS signals to runtime state transitions.
//!
//! Runs in its own task and talks to the turn loop through two atomics:
//! the panic-mode flag and the active-process pointer. Terminating
//! signals flush the session outcome and exit directly; SIGINT defers
//! to an active subprocess when there is one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::signal::unix::{SignalKind, signal};

use quine_core::exit;
use quine_core::process::{ActiveProcess, signal_target};
use quine_tape::TerminationMode;

use crate::session::Session;

/// State shared between the signal controller and the turn loop.
#[derive(Debug, Default)]
pub struct SignalFlags {
    panic_mode: AtomicBool,
    /// The subprocess currently executing on the agent's behalf.
    pub active: ActiveProcess,
}

impl SignalFlags {
    /// Fresh flags: no panic, no active process.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether SIGALRM has put the session in panic mode.
    ///
    /// Set once, cleared only by process termination.
    #[must_use]
    pub fn panic(&self) -> bool {
        self.panic_mode.load(Ordering::SeqCst)
    }

    /// Engage panic mode.
    pub fn set_panic(&self) {
        self.panic_mode.store(true, Ordering::SeqCst);
    }
}

/// Subscribe to the runtime's signals and spawn the controller task.
///
/// The task lives until the process does; it is never joined.
pub fn spawn_controller(flags: Arc<SignalFlags>, session: Arc<Session>) {
    tokio::spawn(async move {
        let Ok(mut sigint) = signal(SignalKind::interrupt()) else {
            tracing::warn!("failed to subscribe to SIGINT; signals disabled");
            return;
        };
        let (Ok(mut sigterm), Ok(mut sighup), Ok(mut sigpipe), Ok(mut sigalrm)) = (
            signal(SignalKind::terminate()),
            signal(SignalKind::hangup()),
            signal(SignalKind::pipe()),
            signal(SignalKind::alarm()),
        ) else {
            tracing::warn!("failed to subscribe to signals; signals disabled");
            return;
        };

        loop {
            tokio::select! {
                _ = sigint.recv() => {
                    match flags.active.get() {
                        Some(target) => {
                            // A live subprocess gets to handle the
                            // interrupt itself; the turn continues with
                            // whatever exit code it produces.
                            tracing::info!("forwarding SIGINT to active process");
                            signal_target(target, libc::SIGINT);
                        }
                        None => shutdown(&flags, &session, libc::SIGINT),
                    }
                }
                _ = sigterm.recv() => shutdown(&flags, &session, libc::SIGTERM),
                _ = sighup.recv() => shutdown(&flags, &session, libc::SIGHUP),
                _ = sigpipe.recv() => shutdown(&flags, &session, libc::SIGPIPE),
                _ = sigalrm.recv() => {
                    tracing::warn!("SIGALRM received; engaging panic mode");
                    flags.set_panic();
                }
            }
        }
    });
}

/// Graceful shutdown: kill whatever is running on the agent's behalf,
/// record the outcome, and terminate with the signal's conventional
/// exit code.
fn shutdown(flags: &SignalFlags, session: &Session, sig: i32) -> ! {
    let code = exit::for_signal(sig);
    tracing::info!(signal = sig, code, "terminating on signal");
    if let Some(target) = flags.active.get() {
        signal_target(target, libc::SIGKILL);
    }
    session.finalize(code, TerminationMode::Signal, None);
    std::process::exit(code);
}
