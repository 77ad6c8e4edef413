//! Keystroke state machine.
//!
//! Pure transition logic with no timers or tasks. Each input returns the
//! effects the driver has to carry out. Every keystroke, clear and cancel
//! bumps a sequence number; timer expiries and search completions carry the
//! number they were issued for and are ignored unless it is still current.

use crate::search::NormalizedQuery;
use crate::types::ResultSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// No pending query.
    Idle,
    /// Waiting for input to go quiet.
    Debouncing,
    /// A query has been dispatched and not yet answered.
    Searching,
    /// The latest result set has been handed out.
    Displaying,
}

/// A dispatched query tagged with the sequence number it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTicket {
    pub seq: u64,
    pub query: NormalizedQuery,
}

/// Work the driver performs on the machine's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Start the debounce timer for `seq`, replacing any running timer.
    ArmTimer { seq: u64 },
    /// Run a query.
    Dispatch(QueryTicket),
    /// Show a result set.
    Display { seq: u64, results: ResultSet },
    /// The input is empty; show nothing.
    Cleared,
    /// Pending or in-flight work for `seq` was abandoned.
    Cancelled { seq: u64 },
}

#[derive(Debug, Clone)]
pub struct SessionMachine {
    phase: SessionPhase,
    seq: u64,
    /// Latest typed query, once non-empty.
    query: Option<NormalizedQuery>,
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMachine {
    pub const fn new() -> Self {
        Self {
            phase: SessionPhase::Idle,
            seq: 0,
            query: None,
        }
    }

    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Current sequence number.
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    pub const fn query(&self) -> Option<&NormalizedQuery> {
        self.query.as_ref()
    }

    fn transition(&mut self, to: SessionPhase) {
        tracing::trace!("Session {:?} -> {:?} (seq {})", self.phase, to, self.seq);
        self.phase = to;
    }

    /// The input text changed.
    ///
    /// An empty query clears the session. A query equal to the one already
    /// being searched or displayed changes nothing.
    pub fn keystroke(&mut self, raw: &str) -> Vec<Effect> {
        let query = NormalizedQuery::new(raw);
        if query.is_empty() {
            return self.clear();
        }

        let unchanged = self.query.as_ref() == Some(&query);
        if unchanged && matches!(self.phase, SessionPhase::Searching | SessionPhase::Displaying) {
            return vec![];
        }

        self.seq += 1;
        self.query = Some(query);
        self.transition(SessionPhase::Debouncing);
        vec![Effect::ArmTimer { seq: self.seq }]
    }

    /// The debounce timer for `seq` expired.
    pub fn timer_fired(&mut self, seq: u64) -> Vec<Effect> {
        if self.phase != SessionPhase::Debouncing || seq != self.seq {
            tracing::trace!("Ignoring stale timer {} (current {})", seq, self.seq);
            return vec![];
        }
        self.dispatch()
    }

    fn dispatch(&mut self) -> Vec<Effect> {
        let Some(query) = self.query.clone() else {
            self.transition(SessionPhase::Idle);
            return vec![];
        };
        self.transition(SessionPhase::Searching);
        vec![Effect::Dispatch(QueryTicket { seq: self.seq, query })]
    }

    /// A dispatched search finished.
    ///
    /// The result is applied only if no keystroke, clear or cancel happened
    /// since the query was dispatched.
    pub fn search_completed(&mut self, seq: u64, results: ResultSet) -> Vec<Effect> {
        if self.phase != SessionPhase::Searching || seq != self.seq {
            tracing::trace!("Discarding superseded result {} (current {})", seq, self.seq);
            return vec![];
        }
        self.transition(SessionPhase::Displaying);
        vec![Effect::Display { seq, results }]
    }

    /// The index grew while `seq` was current; search again.
    ///
    /// Only meaningful once the query has been dispatched. A session still
    /// debouncing will search the grown index anyway.
    pub fn refresh(&mut self, seq: u64) -> Vec<Effect> {
        if seq != self.seq || !matches!(self.phase, SessionPhase::Searching | SessionPhase::Displaying) {
            return vec![];
        }
        self.seq += 1;
        self.dispatch()
    }

    /// The input was emptied. Returns to `Idle` from any phase.
    pub fn clear(&mut self) -> Vec<Effect> {
        let mut effects = self.abandon();
        self.query = None;
        effects.push(Effect::Cleared);
        effects
    }

    /// Explicit cancel. Returns to `Idle` from any phase; the next keystroke
    /// searches again even if its text is unchanged.
    pub fn cancel(&mut self) -> Vec<Effect> {
        let effects = self.abandon();
        self.query = None;
        effects
    }

    fn abandon(&mut self) -> Vec<Effect> {
        let pending = matches!(self.phase, SessionPhase::Debouncing | SessionPhase::Searching);
        let abandoned = self.seq;
        if self.phase != SessionPhase::Idle {
            self.seq += 1;
            self.transition(SessionPhase::Idle);
        }
        if pending {
            vec![Effect::Cancelled { seq: abandoned }]
        } else {
            vec![]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};

    fn results(query: &str) -> ResultSet {
        ResultSet::empty(query)
    }

    fn dispatched(effects: &[Effect]) -> QueryTicket {
        let_assert!([Effect::Dispatch(ticket)] = effects);
        ticket.clone()
    }

    #[test]
    fn test_keystrokes_restart_debounce() {
        let mut machine = SessionMachine::new();
        check!(machine.keystroke("l") == [Effect::ArmTimer { seq: 1 }]);
        check!(machine.keystroke("lo") == [Effect::ArmTimer { seq: 2 }]);
        check!(machine.keystroke("loc") == [Effect::ArmTimer { seq: 3 }]);

        // Timers armed for earlier keystrokes are stale
        check!(machine.timer_fired(1).is_empty());
        check!(machine.timer_fired(2).is_empty());
        check!(machine.phase() == SessionPhase::Debouncing);

        let ticket = dispatched(&machine.timer_fired(3));
        check!(ticket.seq == 3);
        check!(ticket.query.as_str() == "loc");
        check!(machine.phase() == SessionPhase::Searching);
    }

    #[test]
    fn test_completion_displays() {
        let mut machine = SessionMachine::new();
        machine.keystroke("lock");
        let ticket = dispatched(&machine.timer_fired(1));

        let effects = machine.search_completed(ticket.seq, results("lock"));
        check!(effects == [Effect::Display { seq: 1, results: results("lock") }]);
        check!(machine.phase() == SessionPhase::Displaying);
    }

    #[test]
    fn test_keystroke_while_searching_discards_result() {
        let mut machine = SessionMachine::new();
        machine.keystroke("lo");
        let stale = dispatched(&machine.timer_fired(1));

        machine.keystroke("lock");
        check!(machine.phase() == SessionPhase::Debouncing);
        check!(machine.search_completed(stale.seq, results("lo")).is_empty());
        check!(machine.phase() == SessionPhase::Debouncing);

        let fresh = dispatched(&machine.timer_fired(2));
        check!(machine.search_completed(fresh.seq, results("lock")).len() == 1);
    }

    #[test]
    fn test_clear_from_any_phase() {
        let mut machine = SessionMachine::new();
        check!(machine.clear() == [Effect::Cleared]);

        machine.keystroke("lo");
        check!(machine.clear() == [Effect::Cancelled { seq: 1 }, Effect::Cleared]);
        check!(machine.phase() == SessionPhase::Idle);
        check!(machine.timer_fired(1).is_empty());

        machine.keystroke("lo");
        let ticket = dispatched(&machine.timer_fired(3));
        check!(machine.keystroke("  ") == [Effect::Cancelled { seq: 3 }, Effect::Cleared]);
        check!(machine.search_completed(ticket.seq, results("lo")).is_empty());
        check!(machine.query().is_none());
    }

    #[test]
    fn test_cancel() {
        let mut machine = SessionMachine::new();
        machine.keystroke("lock");
        let ticket = dispatched(&machine.timer_fired(1));

        check!(machine.cancel() == [Effect::Cancelled { seq: 1 }]);
        check!(machine.phase() == SessionPhase::Idle);
        check!(machine.search_completed(ticket.seq, results("lock")).is_empty());

        // Nothing pending: cancel is a no-op transition
        check!(machine.cancel().is_empty());
        check!(machine.phase() == SessionPhase::Idle);

        // Same text again searches again
        check!(machine.keystroke("lock").len() == 1);
    }

    #[test]
    fn test_unchanged_query_is_ignored() {
        let mut machine = SessionMachine::new();
        machine.keystroke("lock");
        let ticket = dispatched(&machine.timer_fired(1));
        machine.search_completed(ticket.seq, results("lock"));

        check!(machine.keystroke("LOCK ").is_empty());
        check!(machine.phase() == SessionPhase::Displaying);
        check!(machine.seq() == 1);
    }

    #[test]
    fn test_refresh_redispatches_current_query() {
        let mut machine = SessionMachine::new();
        machine.keystroke("lock");
        let ticket = dispatched(&machine.timer_fired(1));
        machine.search_completed(ticket.seq, results("lock"));

        let again = dispatched(&machine.refresh(1));
        check!(again.seq == 2);
        check!(again.query.as_str() == "lock");

        // Refresh for an older sequence number is stale
        check!(machine.refresh(1).is_empty());
        machine.keystroke("lo");
        check!(machine.refresh(3).is_empty());
    }
}
