//! Cosmetic settle timers.
//!
//! Timers only ever clear the selection or the red "incorrect" highlight.
//! They are driven by the host through [`SettleTimers::take_due`] and can be
//! cancelled wholesale on teardown.

use chrono::{DateTime, Duration, Utc};

/// What happens when a timer fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleAction {
    ClearSelection,
    ClearHighlight(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettleTimer {
    pub due: DateTime<Utc>,
    pub action: SettleAction,
}

#[derive(Debug, Clone, Default)]
pub struct SettleTimers {
    pending: Vec<SettleTimer>,
}

impl SettleTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` to fire `delay_ms` after `now`.
    pub fn schedule(&mut self, now: DateTime<Utc>, delay_ms: u64, action: SettleAction) {
        let delay = Duration::milliseconds(i64::try_from(delay_ms).unwrap_or(i64::MAX));
        let due = now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.pending.push(SettleTimer { due, action });
    }

    /// Remove and return all actions due at `now`, earliest first.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<SettleAction> {
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|t| t.due <= now);
        self.pending = pending;
        due.sort_by_key(|t| t.due);
        due.into_iter().map(|t| t.action).collect()
    }

    pub fn has_pending_selection_clear(&self) -> bool {
        self.pending
            .iter()
            .any(|t| t.action == SettleAction::ClearSelection)
    }

    /// Drop pending selection clears, leaving highlight timers in place.
    pub fn cancel_selection_clears(&mut self) {
        self.pending.retain(|t| t.action != SettleAction::ClearSelection);
    }

    /// Remove `ids` from pending highlight clears so a fresh highlight on
    /// them runs its own full delay. Timers left with no ids are dropped.
    pub fn cancel_highlight_for(&mut self, ids: &[String]) {
        for timer in &mut self.pending {
            if let SettleAction::ClearHighlight(covered) = &mut timer.action {
                covered.retain(|id| !ids.contains(id));
            }
        }
        self.pending
            .retain(|t| !matches!(&t.action, SettleAction::ClearHighlight(covered) if covered.is_empty()));
    }

    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
