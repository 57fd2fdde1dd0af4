/// Level loader.
///
/// ## Sources (priority order):
///   1. `levels.toml` found in a candidate directory
///   2. Built-in embedded levels
///
/// ## `levels.toml` format:
///   ```toml
///   [[level]]
///   name = "Warm-up"
///   rows = 2
///   cols = 4
///   time_limit_secs = 90.0
///   theme = ["A", "B", "C", "D", "E", "F", "G", "H"]
///   ```
///
/// Every level is validated before a board is built: the grid must hold
/// an even, non-zero number of tiles and the theme must not be empty.
/// A level list that fails validation falls back to the embedded set so
/// a bad file can't produce a half-dealt board.

use std::fmt;
use std::path::PathBuf;

use rand::Rng;
use serde::Deserialize;

use crate::config::{candidate_dirs, GameConfig};
use crate::domain::board::Board;
use crate::sim::event::GameEvent;
use crate::sim::session::{Phase, SessionState};

// ══════════════════════════════════════════════════════════════
// Level definitions
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Debug, Deserialize)]
pub struct LevelDef {
    #[serde(default = "default_name")]
    pub name: String,
    pub rows: usize,
    pub cols: usize,
    #[serde(default = "default_true")]
    pub use_preview: bool,
    #[serde(default = "default_preview_secs")]
    pub preview_secs: f32,
    #[serde(default = "default_true")]
    pub use_time_limit: bool,
    #[serde(default = "default_time_limit")]
    pub time_limit_secs: f32,
    #[serde(default = "default_match_bonus")]
    pub match_bonus: i32,
    #[serde(default = "default_mismatch_penalty")]
    pub mismatch_penalty: i32,
    /// Max time bonus is this multiplier times 100.
    #[serde(default = "default_time_bonus_multiplier")]
    pub time_bonus_multiplier: i32,
    #[serde(default = "default_mismatch_hide")]
    pub mismatch_hide_delay_secs: f32,
    #[serde(default = "default_target_score")]
    pub target_score: i32,
    /// One glyph per pair id; cycled if the board needs more pairs.
    #[serde(default = "default_theme")]
    pub theme: Vec<String>,
}

fn default_name() -> String { "Unnamed".into() }
fn default_true() -> bool { true }
fn default_preview_secs() -> f32 { 2.0 }
fn default_time_limit() -> f32 { 180.0 }
fn default_match_bonus() -> i32 { 100 }
fn default_mismatch_penalty() -> i32 { 10 }
fn default_time_bonus_multiplier() -> i32 { 10 }
fn default_mismatch_hide() -> f32 { 0.6 }
fn default_target_score() -> i32 { 1000 }
fn default_theme() -> Vec<String> {
    ["♠", "♥", "♦", "♣", "★", "☀", "☾", "♪", "⚑", "☘", "⚙", "♞"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Deserialize, Debug, Default)]
struct LevelsFile {
    #[serde(default, rename = "level")]
    levels: Vec<LevelDef>,
}

impl LevelDef {
    pub fn validate(&self) -> Result<(), LevelError> {
        let tiles = self.rows * self.cols;
        if tiles == 0 || tiles % 2 != 0 {
            return Err(LevelError::OddTileCount {
                rows: self.rows,
                cols: self.cols,
            });
        }
        if self.theme.is_empty() {
            return Err(LevelError::EmptyTheme);
        }
        Ok(())
    }

    /// Display glyph for a pair id, cycling the theme if needed.
    pub fn glyph(&self, pair_id: u8) -> &str {
        &self.theme[pair_id as usize % self.theme.len()]
    }
}

// ══════════════════════════════════════════════════════════════
// Errors
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LevelError {
    /// The grid can't be tiled with pairs.
    OddTileCount { rows: usize, cols: usize },
    EmptyTheme,
    NoSuchLevel(usize),
}

impl fmt::Display for LevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelError::OddTileCount { rows, cols } => write!(
                f,
                "{rows}x{cols} grid has an odd tile count; pairs need an even board"
            ),
            LevelError::EmptyTheme => write!(f, "level theme has no glyphs"),
            LevelError::NoSuchLevel(n) => write!(f, "no level number {n}"),
        }
    }
}

impl std::error::Error for LevelError {}

// ══════════════════════════════════════════════════════════════
// Loading into a session
// ══════════════════════════════════════════════════════════════

/// Deal a level into the session. Validates first so a bad definition
/// leaves the previous state untouched.
pub fn load_level(
    s: &mut SessionState,
    level_idx: usize,
    levels: &[LevelDef],
    rng: &mut impl Rng,
) -> Result<Vec<GameEvent>, LevelError> {
    let def = levels.get(level_idx).ok_or(LevelError::NoSuchLevel(level_idx + 1))?;
    def.validate()?;

    let board = Board::generate(def.rows, def.cols, rng).ok_or(LevelError::OddTileCount {
        rows: def.rows,
        cols: def.cols,
    })?;

    s.clear_run_state();
    s.board = board;
    s.current_level = level_idx;
    s.total_levels = levels.len();
    s.level_name = def.name.clone();

    s.scoring.reset();
    s.scoring.set_level_scoring(def.match_bonus, def.mismatch_penalty);
    s.scoring.set_target_score(def.target_score);
    s.time_bonus_max = def.time_bonus_multiplier.max(0) * 100;
    s.mismatch_hold_ticks = s.timing.secs_to_ticks(def.mismatch_hide_delay_secs);

    let mut events = vec![];
    if def.use_preview && def.preview_secs > 0.0 {
        s.phase = Phase::Preview;
        s.preview_remaining = def.preview_secs;
        for t in s.board.tiles_mut() {
            t.flip_instant(true);
            t.set_locked(true);
        }
        s.timer.start_preview(def.time_limit_secs, def.use_time_limit);
        events.push(GameEvent::PreviewStarted);
    } else {
        s.phase = Phase::Playing;
        s.timer.start_running(def.time_limit_secs, def.use_time_limit);
    }
    Ok(events)
}

pub fn has_next(s: &SessionState) -> bool {
    s.current_level + 1 < s.total_levels
}

// ══════════════════════════════════════════════════════════════
// Level list
// ══════════════════════════════════════════════════════════════

/// Load the level list, falling back to the embedded set when the file
/// is missing, unreadable, or contains an invalid level.
pub fn load_levels(config: &GameConfig) -> Vec<LevelDef> {
    for dir in candidate_dirs() {
        let path: PathBuf = dir.join(&config.levels_file);
        if !path.exists() {
            continue;
        }
        match std::fs::read_to_string(&path) {
            Ok(text) => match toml::from_str::<LevelsFile>(&text) {
                Ok(file) if !file.levels.is_empty() => {
                    if let Some(bad) = file.levels.iter().find_map(|l| l.validate().err()) {
                        eprintln!("Warning: {}: {bad}", path.display());
                        eprintln!("Using built-in levels.");
                        return embedded_levels();
                    }
                    return file.levels;
                }
                Ok(_) => {
                    eprintln!("Warning: {} defines no levels", path.display());
                }
                Err(e) => {
                    eprintln!("Warning: {} parse error: {e}", path.display());
                }
            },
            Err(e) => {
                eprintln!("Warning: could not read {}: {e}", path.display());
            }
        }
    }
    embedded_levels()
}

fn embedded_levels() -> Vec<LevelDef> {
    vec![
        make_embedded("First Steps", 2, 4, 90.0, 3.0, 1.0, 400),
        make_embedded("Sixteen Up", 4, 4, 150.0, 2.5, 0.8, 1000),
        make_embedded("Wide Field", 4, 6, 210.0, 2.0, 0.7, 1800),
        make_embedded("Full Deck", 6, 6, 300.0, 2.0, 0.6, 3000),
        make_embedded("No Mercy", 6, 8, 360.0, 1.5, 0.5, 4500),
    ]
}

fn make_embedded(
    name: &str,
    rows: usize,
    cols: usize,
    time_limit_secs: f32,
    preview_secs: f32,
    mismatch_hide_delay_secs: f32,
    target_score: i32,
) -> LevelDef {
    LevelDef {
        name: name.into(),
        rows,
        cols,
        use_preview: true,
        preview_secs,
        use_time_limit: true,
        time_limit_secs,
        match_bonus: default_match_bonus(),
        mismatch_penalty: default_mismatch_penalty(),
        time_bonus_multiplier: default_time_bonus_multiplier(),
        mismatch_hide_delay_secs,
        target_score,
        theme: default_theme(),
    }
}
