//! Shared session state: the tape behind a mutex, its audit log, and
//! the configuration.
//!
//! The orchestrator owns the session for the whole run; the signal
//! controller holds a second handle so a terminating signal can record
//! the outcome and flush before the process dies.

use std::sync::{Arc, Mutex, MutexGuard};

use quine_core::Config;
use quine_tape::{AuditLog, Message, SessionOutcome, Tape, TapeEntry, TerminationMode};
use quine_tape::tape::TapeMeta;

/// One agent session's shared state.
pub struct Session {
    /// Runtime configuration.
    pub config: Config,
    tape: Mutex<Tape>,
    audit: AuditLog,
}

impl Session {
    /// Create the session, write the audit meta entry, and return a
    /// shared handle.
    pub fn start(config: Config, mission: String) -> Arc<Self> {
        let tape = Tape::new(TapeMeta {
            session_id: config.session_id.clone(),
            parent_session: config.parent_session.clone(),
            depth: config.depth,
            model: config.model.clone(),
            mission,
        });
        let audit = AuditLog::new(config.audit_path());
        audit.record(&tape.meta_entry());
        Arc::new(Self {
            config,
            tape: Mutex::new(tape),
            audit,
        })
    }

    /// Lock the tape. Poisoning is ignored: the tape's invariants are
    /// append-only and survive a panicked appender.
    pub fn tape(&self) -> MutexGuard<'_, Tape> {
        self.tape.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a message to the tape and mirror it to the audit log.
    pub fn append(&self, message: Message) {
        let mut tape = self.tape();
        tape.append(message);
        if let Some(last) = tape.last() {
            self.audit.record(&TapeEntry::for_message(last));
        }
    }

    /// Record the session outcome and write it as the audit file's
    /// final entry.
    pub fn finalize(&self, exit_code: i32, mode: TerminationMode, failure_signal: Option<String>) {
        let mut tape = self.tape();
        let outcome = tape.outcome_now(exit_code, mode, failure_signal);
        tape.set_outcome(outcome.clone());
        self.audit.record(&TapeEntry::Outcome { outcome });
    }

    /// The recorded outcome, if any.
    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.tape().outcome().cloned()
    }
}
