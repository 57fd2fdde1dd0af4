/// Entry point and game loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::time::{Duration, Instant};

use crossterm::event::KeyCode;
use rand::rngs::StdRng;
use rand::SeedableRng;

use config::GameConfig;
use sim::event::GameEvent;
use sim::level::{self, LevelDef};
use sim::save::{self, Progress};
use sim::session::{Phase, SessionState};
use sim::step::{step, StepInput};
use ui::input::InputState;
use ui::renderer::Renderer;
use ui::sound::SoundEngine;

const FRAME_SLEEP: Duration = Duration::from_millis(5);

fn main() {
    let config = GameConfig::load();
    let levels = level::load_levels(&config);
    let mut progress = save::load_progress().unwrap_or_default();

    let mut session = SessionState::new(config.timing);
    session.total_levels = levels.len();

    let mut rng = StdRng::from_entropy();
    let mut renderer = Renderer::new();

    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let sound = SoundEngine::new();

    let result = game_loop(
        &mut session,
        &levels,
        &mut progress,
        &mut renderer,
        sound.as_ref(),
        &mut rng,
    );

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }

    if let Err(e) = result {
        eprintln!("Game error: {e}");
    }

    println!();
    println!("Thanks for playing Pairdown!");
    println!("Final Score: {}", session.scoring.score());
}

fn game_loop(
    s: &mut SessionState,
    levels: &[LevelDef],
    progress: &mut Progress,
    renderer: &mut Renderer,
    sound: Option<&SoundEngine>,
    rng: &mut StdRng,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut kb = InputState::new();
    let mut last_tick = Instant::now();
    let tick_rate = Duration::from_millis(s.timing.tick_rate_ms);

    // One reveal attempt buffered between ticks so a fast key press
    // between two ticks isn't lost. The buffer only survives frames that
    // stay on the same Playing screen; see carry_reveal_buffer.
    let mut pending_reveal: Option<usize> = None;

    loop {
        kb.drain_events();

        if kb.ctrl_c_pressed() {
            break;
        }
        let phase_before = s.phase;
        if handle_meta(s, levels, progress, sound, &kb, rng) {
            break;
        }

        if s.phase == Phase::Playing && phase_before == Phase::Playing {
            apply_cursor_movement(s, &kb);
        }
        pending_reveal = carry_reveal_buffer(
            pending_reveal,
            s.phase,
            phase_before,
            s.cursor,
            kb.any_pressed(KEYS_CONFIRM),
            kb.any_pressed(KEYS_RESTART),
        );

        if last_tick.elapsed() >= tick_rate {
            match s.phase {
                Phase::Preview | Phase::Playing | Phase::Failed => {
                    let input = StepInput {
                        reveal: pending_reveal.take(),
                    };
                    let events = step(s, input);
                    process_events(s, progress, sound, &events);
                }
                Phase::Complete => {
                    tick_complete(s, levels, rng);
                }
                Phase::Title | Phase::LevelSelect | Phase::AllClear => {
                    s.tick = s.tick.wrapping_add(1);
                    if s.message_timer > 0 {
                        s.message_timer -= 1;
                        if s.message_timer == 0 {
                            s.message.clear();
                        }
                    }
                }
            }

            last_tick = Instant::now();
        }

        renderer.render(s, levels, progress)?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

/// Route simulation events to sound and to the progress file. The level
/// result is committed the moment the outcome event fires, not when the
/// player leaves the screen, so a killed terminal can't lose it.
fn process_events(
    s: &mut SessionState,
    progress: &mut Progress,
    sound: Option<&SoundEngine>,
    events: &[GameEvent],
) {
    for event in events {
        match event {
            GameEvent::TileRevealStarted { .. } => {
                if let Some(sfx) = sound {
                    sfx.play_flip();
                }
            }
            GameEvent::MatchFound => {
                if let Some(sfx) = sound {
                    sfx.play_match_combo(s.scoring.multiplier());
                }
            }
            GameEvent::Mismatch => {
                if let Some(sfx) = sound {
                    sfx.play_mismatch();
                }
            }
            GameEvent::LevelComplete { .. } => {
                if let Some(sfx) = sound {
                    sfx.play_clear();
                }
                commit_result(s, progress, true);
            }
            GameEvent::TimerExpired => {
                if let Some(sfx) = sound {
                    sfx.play_fail();
                }
                commit_result(s, progress, false);
            }
            _ => {}
        }
    }
}

fn commit_result(s: &mut SessionState, progress: &mut Progress, completed: bool) {
    let level_number = s.current_level + 1;
    let score = s.scoring.score();
    match save::record_level_result(level_number, score, completed) {
        Ok(updated) => *progress = updated,
        Err(_) => {
            // Disk write failed; keep the in-memory merge so the unlock
            // still applies this run.
            progress.merge_level_result(level_number, score, completed);
            s.set_message("Could not save progress", 60);
        }
    }
}

/// Auto-advance countdown on the level-clear screen.
fn tick_complete(s: &mut SessionState, levels: &[LevelDef], rng: &mut StdRng) {
    s.tick = s.tick.wrapping_add(1);
    if s.complete_timer > 0 {
        s.complete_timer -= 1;
        if s.complete_timer == 0 {
            advance_level(s, levels, rng);
        }
    }
}

fn advance_level(s: &mut SessionState, levels: &[LevelDef], rng: &mut StdRng) {
    if level::has_next(s) {
        start_level(s, s.current_level + 1, levels, rng);
    } else {
        s.phase = Phase::AllClear;
    }
}

fn start_level(s: &mut SessionState, idx: usize, levels: &[LevelDef], rng: &mut StdRng) {
    match level::load_level(s, idx, levels, rng) {
        Ok(_) => {
            s.message.clear();
            s.message_timer = 0;
        }
        Err(e) => {
            s.phase = Phase::Title;
            s.set_message(&format!("Could not start level: {e}"), 80);
        }
    }
}

fn return_to_title(s: &mut SessionState) {
    s.clear_run_state();
    s.board = domain::board::Board::empty();
    s.phase = Phase::Title;
}

// ── Key Constants ──

const KEYS_LEFT: &[KeyCode] = &[KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('A')];
const KEYS_RIGHT: &[KeyCode] = &[KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('D')];
const KEYS_UP: &[KeyCode] = &[KeyCode::Up, KeyCode::Char('w'), KeyCode::Char('W')];
const KEYS_DOWN: &[KeyCode] = &[KeyCode::Down, KeyCode::Char('s'), KeyCode::Char('S')];
const KEYS_RESTART: &[KeyCode] = &[KeyCode::Char('r'), KeyCode::Char('R')];
const KEYS_CONFIRM: &[KeyCode] = &[KeyCode::Enter, KeyCode::Char(' ')];
const KEYS_SELECT: &[KeyCode] = &[KeyCode::Char('l'), KeyCode::Char('L')];

/// Decide what survives in the between-tick reveal buffer this frame.
/// A restart or any screen transition replaces the board, so a reveal
/// buffered for the old board must never reach the new one — even when
/// the key that caused the transition doubles as the flip key.
fn carry_reveal_buffer(
    prev: Option<usize>,
    phase: Phase,
    phase_before: Phase,
    cursor: usize,
    flip_pressed: bool,
    restart_pressed: bool,
) -> Option<usize> {
    if phase != Phase::Playing || phase != phase_before || restart_pressed {
        return None;
    }
    if flip_pressed {
        Some(cursor)
    } else {
        prev
    }
}

fn apply_cursor_movement(s: &mut SessionState, kb: &InputState) {
    if kb.any_pressed(KEYS_UP) {
        s.move_cursor(-1, 0);
    } else if kb.any_pressed(KEYS_DOWN) {
        s.move_cursor(1, 0);
    } else if kb.any_pressed(KEYS_LEFT) {
        s.move_cursor(0, -1);
    } else if kb.any_pressed(KEYS_RIGHT) {
        s.move_cursor(0, 1);
    }
}

fn handle_meta(
    s: &mut SessionState,
    levels: &[LevelDef],
    progress: &mut Progress,
    _sound: Option<&SoundEngine>,
    kb: &InputState,
    rng: &mut StdRng,
) -> bool {
    let confirm = kb.any_pressed(KEYS_CONFIRM);
    let esc = kb.any_pressed(&[KeyCode::Esc]);

    match s.phase {
        // ── Title Screen ──
        Phase::Title => {
            if confirm {
                start_level(s, 0, levels, rng);
            } else if kb.any_pressed(&[KeyCode::Char('c'), KeyCode::Char('C')]) {
                if progress.highest_unlocked > 1 {
                    let idx = progress
                        .current_level
                        .clamp(1, progress.highest_unlocked.min(levels.len()))
                        - 1;
                    start_level(s, idx, levels, rng);
                } else {
                    s.set_message("No progress yet", 40);
                }
            } else if kb.any_pressed(KEYS_SELECT) {
                s.phase = Phase::LevelSelect;
                s.select_cursor = (progress.current_level.max(1) - 1).min(levels.len().saturating_sub(1));
            } else if kb.any_pressed(&[KeyCode::Char('x'), KeyCode::Char('X')]) {
                if save::has_progress() {
                    save::delete_progress();
                    *progress = Progress::default();
                    s.set_message("Progress reset", 40);
                } else {
                    s.set_message("No saved progress", 40);
                }
            } else if kb.any_pressed(&[KeyCode::Char('q'), KeyCode::Char('Q')]) || esc {
                return true;
            }
        }

        // ── Level Select ──
        Phase::LevelSelect => {
            let total = levels.len();
            if total == 0 {
                return_to_title(s);
                return false;
            }

            if kb.any_pressed(&[KeyCode::Up]) {
                s.select_cursor = s.select_cursor.saturating_sub(1);
            } else if kb.any_pressed(&[KeyCode::Down]) {
                s.select_cursor = (s.select_cursor + 1).min(total - 1);
            } else if confirm {
                let level_number = s.select_cursor + 1;
                if progress.is_unlocked(level_number) {
                    start_level(s, s.select_cursor, levels, rng);
                } else {
                    s.set_message("Locked: clear the previous level first", 40);
                }
            } else if esc {
                return_to_title(s);
            }
        }

        // ── Preview: only ESC out ──
        Phase::Preview => {
            if esc {
                return_to_title(s);
            }
        }

        // ── Playing ──
        Phase::Playing => {
            if esc {
                // Abandoning still records the score for the stats line.
                commit_result(s, progress, false);
                return_to_title(s);
            } else if kb.any_pressed(KEYS_RESTART) {
                start_level(s, s.current_level, levels, rng);
            } else if kb.any_pressed(KEYS_SELECT) {
                commit_result(s, progress, false);
                s.phase = Phase::LevelSelect;
                s.select_cursor = s.current_level;
            }
        }

        // ── Level Complete (auto-advance; ENTER skips the wait) ──
        Phase::Complete => {
            if confirm {
                advance_level(s, levels, rng);
            } else if esc {
                return_to_title(s);
            }
        }

        // ── Time Up ──
        Phase::Failed => {
            if confirm || kb.any_pressed(KEYS_RESTART) {
                start_level(s, s.current_level, levels, rng);
            } else if esc {
                return_to_title(s);
            }
        }

        // ── All Clear ──
        Phase::AllClear => {
            if confirm || esc {
                return_to_title(s);
            }
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reveal_buffer_carries_across_quiet_playing_frames() {
        let kept = carry_reveal_buffer(Some(3), Phase::Playing, Phase::Playing, 5, false, false);
        assert_eq!(kept, Some(3));
        let set = carry_reveal_buffer(None, Phase::Playing, Phase::Playing, 5, true, false);
        assert_eq!(set, Some(5));
    }

    #[test]
    fn restart_discards_buffered_reveal() {
        // Flip then R inside one tick window: the freshly dealt board
        // must not receive the stale reveal on its first tick.
        let b = carry_reveal_buffer(Some(3), Phase::Playing, Phase::Playing, 5, true, true);
        assert_eq!(b, None);
    }

    #[test]
    fn screen_change_discards_buffered_reveal() {
        let left = carry_reveal_buffer(Some(3), Phase::Title, Phase::Playing, 0, false, false);
        assert_eq!(left, None);
        // ENTER skipping the clear screen is also the flip key; entering
        // the next level must not turn it into a flip of tile 0.
        let entered = carry_reveal_buffer(None, Phase::Playing, Phase::Complete, 0, true, false);
        assert_eq!(entered, None);
    }
}
