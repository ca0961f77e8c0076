//! Vocabulary pair-matching game.
//!
//! A [`MatchSession`] owns a shuffled deck of pairs and shows at most
//! `batch_size` unmatched pairs at a time, in two independently shuffled
//! columns. Picking one item from each column counts as an attempt; a wrong
//! pick costs a life. The session ends `Completed` when every pair is matched
//! or `Failed` the moment lives run out.
//!
//! Counters (`attempts`, `lives`, matched flags) change synchronously with
//! the selection that caused them. Clearing the selection and the red
//! highlight is cosmetic and runs on [`SettleTimers`] driven by
//! [`MatchSession::tick`].

pub mod lookup;
pub mod timers;
pub mod validate;

use crate::error::{GameError, Result};
use crate::types::{GameSettings, ManagedPair, PairItem, RawPair};
use chrono::{DateTime, Utc};
use lookup::MatchLookup;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use timers::{SettleAction, SettleTimers};
use uuid::Builder;
use validate::validate_pairs;

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Failed,
}

/// How a finished session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    Completed,
    Failed,
}

/// Final report handed to the host once per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub result: GameResult,
    /// 0..=100; always 0 for a failed session.
    pub score: u8,
    pub elapsed_seconds: u64,
    pub attempts: u32,
}

/// What a single selection did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum SelectionEvent {
    /// Unknown, hidden or matched item, or the session is over.
    Ignored,
    Selected,
    Deselected,
    /// Another item from the same column replaced the selection.
    Switched,
    Matched { completed: bool },
    Mismatched { failed: bool },
}

/// Serializable view of a session for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub source_column: Vec<PairItem>,
    pub target_column: Vec<PairItem>,
    pub selected_id: Option<String>,
    pub incorrect_ids: Vec<String>,
    pub matched_count: usize,
    pub total_pairs: usize,
    pub attempts: u32,
    pub lives_remaining: u32,
}

type CompletionHandler = Box<dyn FnMut(&SessionOutcome)>;

/// One matching game, from start to completion or failure.
pub struct MatchSession {
    settings: GameSettings,
    pairs: Vec<ManagedPair>,
    lookup: MatchLookup,
    /// Item id -> index into `pairs`.
    index: HashMap<String, usize>,
    selected: Option<PairItem>,
    incorrect: HashSet<String>,
    attempts: u32,
    lives: u32,
    status: SessionStatus,
    started_at: DateTime<Utc>,
    source_order: Vec<String>,
    target_order: Vec<String>,
    timers: SettleTimers,
    outcome: Option<SessionOutcome>,
    on_complete: Option<CompletionHandler>,
    reported: bool,
}

impl MatchSession {
    /// Start a session from raw pairs.
    ///
    /// Malformed pairs are dropped with a warning. Fails with
    /// [`GameError::NoValidPairs`] if nothing playable remains.
    pub fn new<R: Rng + ?Sized>(
        raw: &[RawPair],
        settings: GameSettings,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let settings = settings.sanitized();
        let validated = validate_pairs(raw);
        if validated.pairs.is_empty() {
            tracing::warn!(
                received = raw.len(),
                "cannot start matching game without valid pairs"
            );
            return Err(GameError::NoValidPairs {
                dropped: validated.rejected.len(),
            });
        }

        let lookup = MatchLookup::build(&validated.pairs);

        let mut deck = validated.pairs;
        deck.shuffle(rng);

        let pairs: Vec<ManagedPair> = deck
            .into_iter()
            .enumerate()
            .map(|(position, valid)| ManagedPair {
                id: Builder::from_random_bytes(rng.gen()).into_uuid(),
                source: valid.source,
                target: valid.target,
                is_matched: false,
                is_visible: position < settings.batch_size,
            })
            .collect();

        let index = pairs
            .iter()
            .enumerate()
            .flat_map(|(i, p)| [(p.source.id.clone(), i), (p.target.id.clone(), i)])
            .collect();

        let mut source_order: Vec<String> = pairs
            .iter()
            .filter(|p| p.is_visible)
            .map(|p| p.source.id.clone())
            .collect();
        let mut target_order: Vec<String> = pairs
            .iter()
            .filter(|p| p.is_visible)
            .map(|p| p.target.id.clone())
            .collect();
        source_order.shuffle(rng);
        target_order.shuffle(rng);

        tracing::info!(
            pairs = pairs.len(),
            batch_size = settings.batch_size,
            max_lives = settings.max_lives,
            "matching game started"
        );

        Ok(Self {
            lives: settings.max_lives,
            settings,
            pairs,
            lookup,
            index,
            selected: None,
            incorrect: HashSet::new(),
            attempts: 0,
            status: SessionStatus::InProgress,
            started_at: now,
            source_order,
            target_order,
            timers: SettleTimers::new(),
            outcome: None,
            on_complete: None,
            reported: false,
        })
    }

    /// Register the completion callback. It runs exactly once per session,
    /// immediately if the session has already ended.
    pub fn on_complete(&mut self, handler: impl FnMut(&SessionOutcome) + 'static) {
        self.on_complete = Some(Box::new(handler));
        self.report();
    }

    pub fn select_item(&mut self, item: &PairItem, now: DateTime<Utc>) -> SelectionEvent {
        self.select(&item.id, now)
    }

    /// Handle a click on the item with `item_id`.
    pub fn select(&mut self, item_id: &str, now: DateTime<Utc>) -> SelectionEvent {
        if self.status != SessionStatus::InProgress {
            return SelectionEvent::Ignored;
        }
        let Some(item) = self.clickable_item(item_id) else {
            tracing::debug!(item_id, "ignoring selection");
            return SelectionEvent::Ignored;
        };

        // A click during the settle delay completes the settle first.
        if self.timers.has_pending_selection_clear() {
            self.timers.cancel_selection_clears();
            self.selected = None;
        }

        match self.selected.take() {
            None => {
                self.selected = Some(item);
                SelectionEvent::Selected
            }
            Some(prev) if prev.id == item.id => SelectionEvent::Deselected,
            Some(prev) if prev.side() == item.side() => {
                self.selected = Some(item);
                SelectionEvent::Switched
            }
            Some(prev) => {
                self.attempts += 1;
                if self.lookup.matches(&prev.id, &item.id) {
                    self.handle_match(prev, now)
                } else {
                    self.handle_mismatch(prev, item, now)
                }
            }
        }
    }

    fn clickable_item(&self, item_id: &str) -> Option<PairItem> {
        let pair = &self.pairs[*self.index.get(item_id)?];
        if !pair.is_open() {
            return None;
        }
        if pair.source.id == item_id {
            Some(pair.source.clone())
        } else {
            Some(pair.target.clone())
        }
    }

    fn handle_match(&mut self, prev: PairItem, now: DateTime<Utc>) -> SelectionEvent {
        let Some(&matched) = self.index.get(&prev.id) else {
            return SelectionEvent::Ignored;
        };
        self.pairs[matched].is_matched = true;
        self.refill(matched);

        let completed = self.matched_count() == self.pairs.len();
        tracing::debug!(
            attempts = self.attempts,
            matched = self.matched_count(),
            "pair matched"
        );

        if completed {
            self.finish(GameResult::Completed, now);
        } else {
            self.selected = Some(prev);
            self.settle(now, self.settings.match_settle_ms, SettleAction::ClearSelection);
        }
        SelectionEvent::Matched { completed }
    }

    fn handle_mismatch(
        &mut self,
        prev: PairItem,
        item: PairItem,
        now: DateTime<Utc>,
    ) -> SelectionEvent {
        self.lives = self.lives.saturating_sub(1);
        tracing::debug!(
            attempts = self.attempts,
            lives = self.lives,
            "pair mismatched"
        );

        if self.lives == 0 {
            self.finish(GameResult::Failed, now);
            return SelectionEvent::Mismatched { failed: true };
        }

        let ids = vec![prev.id.clone(), item.id];
        self.timers.cancel_highlight_for(&ids);
        self.incorrect.extend(ids.iter().cloned());
        self.selected = Some(prev);
        let delay = self.settings.mismatch_settle_ms;
        self.settle(now, delay, SettleAction::ClearHighlight(ids));
        self.settle(now, delay, SettleAction::ClearSelection);
        SelectionEvent::Mismatched { failed: false }
    }

    /// Take the matched pair off the board, revealing the next hidden pair in
    /// its slots when the window has room.
    fn refill(&mut self, matched: usize) {
        let source_slot = position_of(&self.source_order, &self.pairs[matched].source.id);
        let target_slot = position_of(&self.target_order, &self.pairs[matched].target.id);

        let open = self.pairs.iter().filter(|p| p.is_open()).count();
        let next_hidden = self.pairs.iter().position(|p| !p.is_visible && !p.is_matched);

        match (open < self.settings.batch_size, next_hidden) {
            (true, Some(next)) => {
                self.pairs[next].is_visible = true;
                let source_id = self.pairs[next].source.id.clone();
                let target_id = self.pairs[next].target.id.clone();
                replace_or_push(&mut self.source_order, source_slot, source_id);
                replace_or_push(&mut self.target_order, target_slot, target_id);
            }
            _ => {
                if let Some(slot) = source_slot {
                    self.source_order.remove(slot);
                }
                if let Some(slot) = target_slot {
                    self.target_order.remove(slot);
                }
            }
        }
    }

    fn settle(&mut self, now: DateTime<Utc>, delay_ms: u64, action: SettleAction) {
        if delay_ms == 0 {
            self.apply(action);
        } else {
            self.timers.schedule(now, delay_ms, action);
        }
    }

    fn apply(&mut self, action: SettleAction) {
        match action {
            SettleAction::ClearSelection => self.selected = None,
            SettleAction::ClearHighlight(ids) => {
                for id in ids {
                    self.incorrect.remove(&id);
                }
            }
        }
    }

    fn finish(&mut self, result: GameResult, now: DateTime<Utc>) {
        self.status = match result {
            GameResult::Completed => SessionStatus::Completed,
            GameResult::Failed => SessionStatus::Failed,
        };
        self.timers.cancel_all();
        self.selected = None;
        self.incorrect.clear();

        let score = match result {
            GameResult::Completed => self.settings.score_for(self.attempts),
            GameResult::Failed => 0,
        };
        let elapsed_seconds = u64::try_from((now - self.started_at).num_seconds()).unwrap_or(0);
        let outcome = SessionOutcome {
            result,
            score,
            elapsed_seconds,
            attempts: self.attempts,
        };
        tracing::info!(
            ?result,
            score,
            attempts = self.attempts,
            elapsed_seconds,
            "matching game finished"
        );
        self.outcome = Some(outcome);
        self.report();
    }

    fn report(&mut self) {
        if self.reported {
            return;
        }
        if let (Some(outcome), Some(handler)) = (&self.outcome, self.on_complete.as_mut()) {
            handler(outcome);
            self.reported = true;
        }
    }

    /// Fire settle timers due at `now`. Returns how many fired.
    pub fn tick(&mut self, now: DateTime<Utc>) -> usize {
        let due = self.timers.take_due(now);
        let fired = due.len();
        for action in due {
            self.apply(action);
        }
        fired
    }

    /// Cancel pending timers and clear transient highlights (host unmount).
    pub fn teardown(&mut self) {
        self.timers.cancel_all();
        self.selected = None;
        self.incorrect.clear();
    }

    pub fn validate_match(&self, a: &PairItem, b: &PairItem) -> bool {
        self.lookup.matches(&a.id, &b.id)
    }

    pub fn visible_source_items(&self) -> Vec<&PairItem> {
        self.column(&self.source_order)
    }

    pub fn visible_target_items(&self) -> Vec<&PairItem> {
        self.column(&self.target_order)
    }

    fn column(&self, order: &[String]) -> Vec<&PairItem> {
        order
            .iter()
            .filter_map(|id| {
                let pair = &self.pairs[*self.index.get(id)?];
                Some(if pair.source.id == *id {
                    &pair.source
                } else {
                    &pair.target
                })
            })
            .collect()
    }

    pub fn matched_count(&self) -> usize {
        self.pairs.iter().filter(|p| p.is_matched).count()
    }

    pub fn total_pairs(&self) -> usize {
        self.pairs.len()
    }

    pub fn lives_remaining(&self) -> u32 {
        self.lives
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_complete(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.status == SessionStatus::Failed
    }

    /// The current selection. After a match it still holds the first pick,
    /// now matched, until the settle timer fires; [`Self::snapshot`] hides it.
    pub fn selected(&self) -> Option<&PairItem> {
        self.selected.as_ref()
    }

    fn is_matched_item(&self, item_id: &str) -> bool {
        self.index
            .get(item_id)
            .map_or(false, |&i| self.pairs[i].is_matched)
    }

    pub fn is_highlighted_incorrect(&self, item_id: &str) -> bool {
        self.incorrect.contains(item_id)
    }

    pub fn pairs(&self) -> &[ManagedPair] {
        &self.pairs
    }

    pub fn lookup(&self) -> &MatchLookup {
        &self.lookup
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let mut incorrect_ids: Vec<String> = self.incorrect.iter().cloned().collect();
        incorrect_ids.sort();
        SessionSnapshot {
            status: self.status,
            source_column: self.visible_source_items().into_iter().cloned().collect(),
            target_column: self.visible_target_items().into_iter().cloned().collect(),
            selected_id: self
                .selected
                .as_ref()
                .filter(|item| !self.is_matched_item(&item.id))
                .map(|item| item.id.clone()),
            incorrect_ids,
            matched_count: self.matched_count(),
            total_pairs: self.total_pairs(),
            attempts: self.attempts,
            lives_remaining: self.lives,
        }
    }
}

impl fmt::Debug for MatchSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MatchSession")
            .field("status", &self.status)
            .field("pairs", &self.pairs.len())
            .field("matched", &self.matched_count())
            .field("attempts", &self.attempts)
            .field("lives", &self.lives)
            .field("selected", &self.selected.as_ref().map(|item| &item.id))
            .finish_non_exhaustive()
    }
}

fn position_of(order: &[String], id: &str) -> Option<usize> {
    order.iter().position(|entry| entry == id)
}

fn replace_or_push(order: &mut Vec<String>, slot: Option<usize>, id: String) {
    match slot {
        Some(slot) => order[slot] = id,
        None => order.push(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawItem;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::cell::RefCell;
    use std::rc::Rc;
    use uuid::Uuid;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn raw_pairs(n: usize) -> Vec<RawPair> {
        (0..n)
            .map(|i| {
                RawPair::new(
                    RawItem::new(format!("s{i}"), format!("word {i}")),
                    RawItem::new(format!("t{i}"), format!("từ {i}")),
                )
            })
            .collect()
    }

    fn session(n: usize, settings: GameSettings) -> MatchSession {
        let mut rng = StdRng::seed_from_u64(7);
        MatchSession::new(&raw_pairs(n), settings, &mut rng, t0()).unwrap()
    }

    fn instant_settings() -> GameSettings {
        GameSettings {
            match_settle_ms: 0,
            mismatch_settle_ms: 0,
            ..Default::default()
        }
    }

    fn open_count(session: &MatchSession) -> usize {
        session.pairs().iter().filter(|p| p.is_open()).count()
    }

    /// Any visible source item and a visible target that is not its partner.
    fn wrong_pick(session: &MatchSession) -> (String, String) {
        let source = session.visible_source_items()[0].clone();
        let target = session
            .visible_target_items()
            .into_iter()
            .find(|t| t.id != source.match_id)
            .unwrap()
            .clone();
        (source.id, target.id)
    }

    #[test]
    fn empty_input_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        let result = MatchSession::new(&[], GameSettings::default(), &mut rng, t0());
        assert_eq!(result.unwrap_err(), GameError::NoValidPairs { dropped: 0 });

        let all_bad = vec![RawPair::default(), RawPair::default()];
        let result = MatchSession::new(&all_bad, GameSettings::default(), &mut rng, t0());
        assert_eq!(result.unwrap_err(), GameError::NoValidPairs { dropped: 2 });
    }

    #[test]
    fn malformed_pairs_are_dropped() {
        let mut raw = raw_pairs(3);
        raw.push(RawPair::new(RawItem::new("s9", ""), RawItem::new("t9", "x")));
        let mut rng = StdRng::seed_from_u64(1);
        let session = MatchSession::new(&raw, GameSettings::default(), &mut rng, t0()).unwrap();
        assert_eq!(session.total_pairs(), 3);
    }

    #[test]
    fn initial_window_is_one_batch() {
        let session = session(12, GameSettings::default());
        assert_eq!(session.visible_source_items().len(), 5);
        assert_eq!(session.visible_target_items().len(), 5);
        assert_eq!(open_count(&session), 5);
        assert_eq!(session.lives_remaining(), 5);
        assert_eq!(session.attempts(), 0);
        assert_eq!(session.status(), SessionStatus::InProgress);

        let small = self::session(3, GameSettings::default());
        assert_eq!(small.visible_source_items().len(), 3);
    }

    #[test]
    fn columns_hold_the_same_pairs() {
        let session = session(8, GameSettings::default());
        let mut partners: Vec<String> = session
            .visible_source_items()
            .iter()
            .map(|s| s.match_id.clone())
            .collect();
        let mut targets: Vec<String> = session
            .visible_target_items()
            .iter()
            .map(|t| t.id.clone())
            .collect();
        partners.sort();
        targets.sort();
        assert_eq!(partners, targets);
    }

    #[test]
    fn seeded_sessions_are_reproducible() {
        let a = session(10, GameSettings::default());
        let b = session(10, GameSettings::default());
        assert_eq!(a.snapshot(), b.snapshot());
        let ids_a: Vec<Uuid> = a.pairs().iter().map(|p| p.id).collect();
        let ids_b: Vec<Uuid> = b.pairs().iter().map(|p| p.id).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn lookup_is_bidirectional() {
        let session = session(6, GameSettings::default());
        assert!(session.lookup().is_symmetric());
        for pair in session.pairs() {
            assert!(session.validate_match(&pair.source, &pair.target));
            assert!(session.validate_match(&pair.target, &pair.source));
        }
    }

    #[test]
    fn select_and_deselect() {
        let mut session = session(3, GameSettings::default());
        let item = session.visible_source_items()[0].clone();

        assert_eq!(session.select_item(&item, t0()), SelectionEvent::Selected);
        assert_eq!(session.selected(), Some(&item));
        assert_eq!(session.select_item(&item, t0()), SelectionEvent::Deselected);
        assert!(session.selected().is_none());
        assert_eq!(session.attempts(), 0);
    }

    #[test]
    fn same_side_switch_is_free() {
        let mut session = session(5, GameSettings::default());
        let sources: Vec<PairItem> = session
            .visible_source_items()
            .into_iter()
            .cloned()
            .collect();

        session.select_item(&sources[0], t0());
        for _ in 0..3 {
            assert_eq!(session.select_item(&sources[1], t0()), SelectionEvent::Switched);
            assert_eq!(session.select_item(&sources[0], t0()), SelectionEvent::Switched);
        }
        assert_eq!(session.attempts(), 0);
        assert_eq!(session.lives_remaining(), 5);
        assert_eq!(session.selected().map(|i| i.id.as_str()), Some(sources[0].id.as_str()));
    }

    #[test]
    fn unknown_and_hidden_items_are_ignored() {
        let mut session = session(8, GameSettings::default());
        assert_eq!(session.select("nope", t0()), SelectionEvent::Ignored);

        let hidden = session.pairs().iter().find(|p| !p.is_visible).unwrap();
        let hidden_id = hidden.source.id.clone();
        assert_eq!(session.select(&hidden_id, t0()), SelectionEvent::Ignored);
    }

    #[test]
    fn match_refills_window_in_place() {
        let mut session = session(7, instant_settings());
        let source = session.visible_source_items()[2].clone();
        let source_slot = 2;
        let target_slot = session
            .visible_target_items()
            .iter()
            .position(|t| t.id == source.match_id)
            .unwrap();

        session.select(&source.id, t0());
        let event = session.select(&source.match_id, t0());

        assert_eq!(event, SelectionEvent::Matched { completed: false });
        assert_eq!(session.matched_count(), 1);
        assert_eq!(session.attempts(), 1);
        assert_eq!(open_count(&session), 5);

        let revealed = session.visible_source_items()[source_slot].clone();
        assert_ne!(revealed.id, source.id);
        assert_eq!(session.visible_target_items()[target_slot].id, revealed.match_id);
    }

    #[test]
    fn window_shrinks_when_deck_runs_out() {
        let mut session = session(6, instant_settings());
        for expected_open in [5, 4, 3, 2, 1] {
            let source = session.visible_source_items()[0].clone();
            session.select(&source.id, t0());
            session.select(&source.match_id, t0());
            assert_eq!(open_count(&session), expected_open);
            assert_eq!(session.visible_source_items().len(), expected_open);
            assert_eq!(session.visible_target_items().len(), expected_open);
        }
    }

    #[test]
    fn matched_items_cannot_be_selected() {
        let mut session = session(6, instant_settings());
        let source = session.visible_source_items()[0].clone();
        session.select(&source.id, t0());
        session.select(&source.match_id, t0());
        assert_eq!(session.select(&source.id, t0()), SelectionEvent::Ignored);
        assert_eq!(session.attempts(), 1);
    }

    #[test]
    fn mismatch_costs_a_life_and_highlights() {
        let mut session = session(5, GameSettings::default());
        let (source, target) = wrong_pick(&session);

        session.select(&source, t0());
        let event = session.select(&target, t0());

        assert_eq!(event, SelectionEvent::Mismatched { failed: false });
        assert_eq!(session.lives_remaining(), 4);
        assert_eq!(session.attempts(), 1);
        assert!(session.is_highlighted_incorrect(&source));
        assert!(session.is_highlighted_incorrect(&target));
        assert_eq!(session.pending_timers(), 2);

        // Nothing clears before the delay.
        assert_eq!(session.tick(t0() + Duration::milliseconds(999)), 0);
        assert!(session.is_highlighted_incorrect(&source));

        assert_eq!(session.tick(t0() + Duration::milliseconds(1000)), 2);
        assert!(!session.is_highlighted_incorrect(&source));
        assert!(session.selected().is_none());
        assert_eq!(session.lives_remaining(), 4);
    }

    #[test]
    fn rehighlight_runs_its_own_delay() {
        let mut session = session(5, GameSettings::default());
        let source = session.visible_source_items()[0].clone();
        let wrong: Vec<String> = session
            .visible_target_items()
            .into_iter()
            .filter(|t| t.id != source.match_id)
            .map(|t| t.id.clone())
            .collect();

        session.select(&source.id, t0());
        session.select(&wrong[0], t0());
        let second = t0() + Duration::milliseconds(100);
        session.select(&source.id, second);
        session.select(&wrong[1], second);

        // The first mismatch's timer only clears what it alone highlighted.
        session.tick(t0() + Duration::milliseconds(1000));
        assert!(session.is_highlighted_incorrect(&source.id));
        assert!(session.is_highlighted_incorrect(&wrong[1]));
        assert!(!session.is_highlighted_incorrect(&wrong[0]));

        session.tick(second + Duration::milliseconds(1000));
        assert!(!session.is_highlighted_incorrect(&source.id));
        assert!(!session.is_highlighted_incorrect(&wrong[1]));
        assert_eq!(session.pending_timers(), 0);
    }

    #[test]
    fn selection_of_matched_item_is_hidden_from_snapshot() {
        let mut session = session(6, GameSettings::default());
        let source = session.visible_source_items()[0].clone();
        session.select(&source.id, t0());
        session.select(&source.match_id, t0());

        assert_eq!(session.selected().map(|i| i.id.as_str()), Some(source.id.as_str()));
        assert_eq!(session.snapshot().selected_id, None);

        session.tick(t0() + Duration::seconds(1));
        assert!(session.selected().is_none());
    }

    /// Plays a fixed mix of matches and mismatches, checking the window
    /// after every selection and tick. Returns every snapshot taken.
    fn scripted_play(seed: u64) -> Vec<SessionSnapshot> {
        let settings = GameSettings {
            max_lives: 100,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(seed);
        let mut session = MatchSession::new(&raw_pairs(13), settings, &mut rng, t0()).unwrap();

        let mut snapshots = vec![session.snapshot()];
        let mut now = t0();
        let mut step = 0;
        while !session.is_complete() {
            let (first, second) = if step % 3 == 2 && session.visible_target_items().len() > 1 {
                wrong_pick(&session)
            } else {
                let sources = session.visible_source_items();
                let source = sources[step % sources.len()].clone();
                (source.id, source.match_id)
            };

            for id in [first, second] {
                session.select(&id, now);
                assert_window_bound(&session);
                snapshots.push(session.snapshot());
            }

            // Tick before the settle delay has elapsed, then after.
            now = now + Duration::milliseconds(300);
            session.tick(now);
            assert_window_bound(&session);
            snapshots.push(session.snapshot());
            if step % 2 == 0 {
                now = now + Duration::milliseconds(800);
                session.tick(now);
                assert_window_bound(&session);
                snapshots.push(session.snapshot());
            }
            step += 1;
        }
        assert!(session.attempts() > 13);
        snapshots
    }

    fn assert_window_bound(session: &MatchSession) {
        let unmatched = session.total_pairs() - session.matched_count();
        let expected = unmatched.min(session.settings().batch_size);
        assert_eq!(open_count(session), expected);
        assert_eq!(session.visible_source_items().len(), expected);
        assert_eq!(session.visible_target_items().len(), expected);
    }

    #[test]
    fn same_seed_replays_identically() {
        let first = scripted_play(11);
        let second = scripted_play(11);
        assert_eq!(first.len(), second.len());
        for (step, (a, b)) in first.iter().zip(&second).enumerate() {
            assert_eq!(a, b, "snapshots diverged at step {step}");
        }
    }

    #[test]
    fn click_during_settle_starts_fresh_selection() {
        let mut session = session(5, GameSettings::default());
        let (source, target) = wrong_pick(&session);
        session.select(&source, t0());
        session.select(&target, t0());

        let other = session.visible_target_items()[0].id.clone();
        assert_eq!(
            session.select(&other, t0() + Duration::milliseconds(100)),
            SelectionEvent::Selected
        );
        assert_eq!(session.attempts(), 1);
        // The highlight keeps its own timer.
        assert!(session.is_highlighted_incorrect(&source));
    }

    #[test]
    fn life_exhaustion_fails_immediately() {
        let settings = GameSettings {
            max_lives: 2,
            ..Default::default()
        };
        let mut session = session(5, settings);

        for _ in 0..2 {
            let (source, target) = wrong_pick(&session);
            session.select(&source, t0());
            session.select(&target, t0());
        }

        assert!(session.is_failed());
        assert_eq!(session.lives_remaining(), 0);
        assert_eq!(session.pending_timers(), 0);
        assert!(session.snapshot().incorrect_ids.is_empty());
        let outcome = session.outcome().unwrap();
        assert_eq!(outcome.score, 0);
        assert_eq!(outcome.result, GameResult::Failed);
        assert_eq!(outcome.attempts, 2);

        let item = session.visible_source_items()[0].id.clone();
        assert_eq!(session.select(&item, t0()), SelectionEvent::Ignored);
    }

    #[test]
    fn completion_callback_runs_once() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut session = session(2, instant_settings());
        let sink = Rc::clone(&calls);
        session.on_complete(move |outcome| sink.borrow_mut().push(outcome.clone()));

        let finish = t0() + Duration::seconds(42);
        while !session.is_complete() {
            let source = session.visible_source_items()[0].clone();
            session.select(&source.id, finish);
            session.select(&source.match_id, finish);
        }
        session.tick(finish + Duration::seconds(5));
        session.teardown();

        let calls = calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0],
            SessionOutcome {
                result: GameResult::Completed,
                score: 90,
                elapsed_seconds: 42,
                attempts: 2,
            }
        );
    }

    #[test]
    fn late_callback_still_fires_once() {
        let mut session = session(1, instant_settings());
        let source = session.visible_source_items()[0].clone();
        session.select(&source.id, t0());
        session.select(&source.match_id, t0());
        assert!(session.is_complete());

        let calls = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&calls);
        session.on_complete(move |_| *sink.borrow_mut() += 1);
        let sink = Rc::clone(&calls);
        session.on_complete(move |_| *sink.borrow_mut() += 1);
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn teardown_cancels_timers() {
        let mut session = session(5, GameSettings::default());
        let (source, target) = wrong_pick(&session);
        session.select(&source, t0());
        session.select(&target, t0());
        assert_eq!(session.pending_timers(), 2);

        session.teardown();
        assert_eq!(session.pending_timers(), 0);
        assert!(session.selected().is_none());
        assert!(!session.is_highlighted_incorrect(&source));
        assert_eq!(session.lives_remaining(), 4);
    }

    #[test]
    fn snapshot_serializes() {
        let session = session(2, GameSettings::default());
        let json = serde_json::to_value(session.snapshot()).unwrap();
        assert_eq!(json["status"], "in_progress");
        assert_eq!(json["total_pairs"], 2);
        assert_eq!(json["source_column"].as_array().unwrap().len(), 2);
    }
}
