//! The in-memory tape.

use crate::entry::{SessionOutcome, TapeEntry};
use crate::message::{Message, now_ms};

/// Session metadata fixed at tape creation.
#[derive(Debug, Clone)]
pub struct TapeMeta {
    /// Session identifier.
    pub session_id: String,
    /// Creating session's identifier.
    pub parent_session: Option<String>,
    /// Recursion depth.
    pub depth: u32,
    /// Model identifier.
    pub model: String,
    /// Mission string.
    pub mission: String,
}

/// The session's ordered message log plus its counters.
///
/// Owned exclusively by one agent process; the signal controller reaches
/// it through a mutex held only for short appends.
#[derive(Debug)]
pub struct Tape {
    meta: TapeMeta,
    created_ms: u64,
    messages: Vec<Message>,
    tokens_in: u64,
    tokens_out: u64,
    turns: u32,
    outcome: Option<SessionOutcome>,
}

impl Tape {
    /// Create an empty tape for a session.
    #[must_use]
    pub fn new(meta: TapeMeta) -> Self {
        Self {
            meta,
            created_ms: now_ms(),
            messages: Vec::new(),
            tokens_in: 0,
            tokens_out: 0,
            turns: 0,
            outcome: None,
        }
    }

    /// Append a message, stamping its timestamp if unset.
    pub fn append(&mut self, mut message: Message) {
        if message.timestamp_ms == 0 {
            message.timestamp_ms = now_ms();
        }
        self.messages.push(message);
    }

    /// Snapshot of the message log.
    ///
    /// Returns a copy; the internal storage is never handed out mutably
    /// except through [`Tape::last_mut`].
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Mutable handle to the most recent message.
    ///
    /// Exists solely so the turn loop can annotate the last tool-result
    /// with budget hints before the next inference.
    pub fn last_mut(&mut self) -> Option<&mut Message> {
        self.messages.last_mut()
    }

    /// The most recent message.
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Count one shell turn. Called exactly once per dispatched shell call.
    pub fn increment_turn(&mut self) {
        self.turns += 1;
    }

    /// Shell turns consumed so far.
    #[must_use]
    pub fn turns(&self) -> u32 {
        self.turns
    }

    /// Add token usage from one inference.
    pub fn add_usage(&mut self, tokens_in: u64, tokens_out: u64) {
        self.tokens_in += tokens_in;
        self.tokens_out += tokens_out;
    }

    /// Cumulative (input, output) token counts.
    #[must_use]
    pub fn usage(&self) -> (u64, u64) {
        (self.tokens_in, self.tokens_out)
    }

    /// Record the session outcome. A second call overwrites, but the
    /// runtime calls this at most once on any given path.
    pub fn set_outcome(&mut self, outcome: SessionOutcome) {
        self.outcome = Some(outcome);
    }

    /// The recorded outcome, if the session has one.
    #[must_use]
    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    /// Session metadata.
    #[must_use]
    pub fn meta(&self) -> &TapeMeta {
        &self.meta
    }

    /// Milliseconds elapsed since tape creation.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        now_ms().saturating_sub(self.created_ms)
    }

    /// Build an outcome from the tape's counters.
    #[must_use]
    pub fn outcome_now(
        &self,
        exit_code: i32,
        mode: crate::entry::TerminationMode,
        failure_signal: Option<String>,
    ) -> SessionOutcome {
        SessionOutcome {
            exit_code,
            failure_signal,
            duration_ms: self.elapsed_ms(),
            tokens_in: self.tokens_in,
            tokens_out: self.tokens_out,
            turns: self.turns,
            mode,
        }
    }

    /// The audit meta entry for this session.
    #[must_use]
    pub fn meta_entry(&self) -> TapeEntry {
        TapeEntry::Meta {
            session: self.meta.session_id.clone(),
            parent_session: self.meta.parent_session.clone(),
            depth: self.meta.depth,
            model: self.meta.model.clone(),
            mission: self.meta.mission.clone(),
            pid: std::process::id(),
            created_ms: self.created_ms,
        }
    }

    /// The audit outcome entry, if an outcome is recorded.
    #[must_use]
    pub fn outcome_entry(&self) -> Option<TapeEntry> {
        self.outcome.clone().map(|outcome| TapeEntry::Outcome { outcome })
    }
}
