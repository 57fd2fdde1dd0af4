/// SessionState: the complete state of a running game.
///
/// One session composes the board, match-coordinator bookkeeping, scoring
/// engine, and timer behind explicit construction — no global lookup.
/// The coordinator's shared state is `pending` + `resolution` + `phase`;
/// only the step functions in `sim::step` mutate them, tiles never touch
/// them.

use crate::config::TimingConfig;
use crate::domain::board::Board;
use crate::domain::scoring::Scoring;
use crate::domain::tile::TileState;
use crate::domain::timer::SessionTimer;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Title,
    LevelSelect,
    /// Memorize window: tiles face-up, interaction disabled.
    Preview,
    Playing,
    /// Terminal for the level: every pair found.
    Complete,
    /// Terminal for the level: time limit hit.
    Failed,
    /// All configured levels finished.
    AllClear,
}

/// Stage of the pair resolution in flight.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Stage {
    /// Fixed settle delay before the ids are compared.
    Settle(u32),
    /// Mismatch shown face-up for the level-configured delay.
    MismatchHold(u32),
    /// Waiting for both hide flips to finish.
    Hiding,
}

/// The two tiles locked pending a match outcome. Always exactly a pair —
/// the `tilesInResolution` set is either absent or size two.
#[derive(Clone, Copy, Debug)]
pub struct Resolution {
    pub a: usize,
    pub b: usize,
    pub(crate) stage: Stage,
}

pub struct SessionState {
    pub board: Board,
    pub phase: Phase,
    pub timer: SessionTimer,
    pub scoring: Scoring,
    pub timing: TimingConfig,

    // ── Coordinator state (mutated only by sim::step) ──
    /// Revealed tiles waiting to pair. Drained to a resolution as soon as
    /// two are available and the coordinator is free; while a resolution
    /// is in flight, further reveals queue here.
    pub(crate) pending: Vec<usize>,
    pub(crate) resolution: Option<Resolution>,

    // ── Per-level timing/scoring knobs ──
    pub(crate) mismatch_hold_ticks: u32,
    pub(crate) time_bonus_max: i32,
    pub(crate) preview_remaining: f32,
    pub(crate) preview_hiding: bool,

    // ── Meta ──
    pub current_level: usize,
    pub total_levels: usize,
    pub level_name: String,
    pub tick: u64,

    // ── UI ──
    pub cursor: usize,
    pub select_cursor: usize,
    pub message: String,
    pub message_timer: u32,
    /// Ticks until auto-advance after completion (driven by main).
    pub complete_timer: u32,
}

impl SessionState {
    pub fn new(timing: TimingConfig) -> Self {
        SessionState {
            board: Board::empty(),
            phase: Phase::Title,
            timer: SessionTimer::new(),
            scoring: Scoring::new(),
            timing,
            pending: vec![],
            resolution: None,
            mismatch_hold_ticks: 0,
            time_bonus_max: 0,
            preview_remaining: 0.0,
            preview_hiding: false,
            current_level: 0,
            total_levels: 0,
            level_name: String::new(),
            tick: 0,
            cursor: 0,
            select_cursor: 0,
            message: String::new(),
            message_timer: 0,
            complete_timer: 0,
        }
    }

    /// The single gate every reveal attempt passes. False during preview
    /// and after the session ends; false for tiles locked into the active
    /// resolution; false for stale indices that aren't on this board.
    pub fn can_reveal(&self, idx: usize) -> bool {
        if self.phase != Phase::Playing {
            return false;
        }
        if self.in_resolution(idx) {
            return false;
        }
        match self.board.tile(idx) {
            Some(t) => t.state() == TileState::FaceDown && !t.is_locked(),
            None => false,
        }
    }

    pub fn in_resolution(&self, idx: usize) -> bool {
        self.resolution
            .as_ref()
            .is_some_and(|r| r.a == idx || r.b == idx)
    }

    /// A pair is locked mid-resolution.
    pub fn is_resolving(&self) -> bool {
        self.resolution.is_some()
    }

    /// Discard all in-flight coordinator/preview work. Called on level
    /// load and restart so stale countdowns never touch a replaced board.
    pub(crate) fn clear_run_state(&mut self) {
        self.pending.clear();
        self.resolution = None;
        self.preview_remaining = 0.0;
        self.preview_hiding = false;
        self.complete_timer = 0;
        self.tick = 0;
        self.cursor = 0;
        self.timer.reset();
    }

    pub fn set_message(&mut self, msg: &str, duration: u32) {
        self.message = msg.to_string();
        self.message_timer = duration;
    }

    // ── Cursor movement over the grid (UI) ──

    pub fn move_cursor(&mut self, d_row: i32, d_col: i32) {
        if self.board.is_empty() {
            return;
        }
        let (rows, cols) = (self.board.rows as i32, self.board.cols as i32);
        let (r, c) = self.board.position(self.cursor);
        let nr = (r as i32 + d_row).rem_euclid(rows);
        let nc = (c as i32 + d_col).rem_euclid(cols);
        self.cursor = self.board.index(nr as usize, nc as usize);
    }
}
