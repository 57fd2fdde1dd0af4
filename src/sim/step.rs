/// The step function: advances the session by one tick.
///
/// Processing order:
///   1. Timer tick + expiry check (expiry preempts same-tick reveals)
///   2. Preview countdown
///   3. Reveal input admission (can_reveal gate)
///   4. Tile flip countdowns; completed up-flips feed the coordinator
///   5. Preview exit (all tiles back face-down)
///   6. Resolution stage tick (settle → compare → mismatch hold → hiding)
///   7. Pair formation from the pending queue
///
/// Invariants enforced here: the resolution set is always exactly a pair
/// of distinct tiles; only one resolution is in flight; a resolution
/// already running when the timer expires ticks to completion so tiles
/// never stay locked, but nothing new starts after failure.

use crate::domain::tile::FlipDone;
use super::event::GameEvent;
use super::session::{Phase, Resolution, SessionState, Stage};

/// Player intent for one tick: at most one reveal attempt.
#[derive(Clone, Copy, Debug, Default)]
pub struct StepInput {
    pub reveal: Option<usize>,
}

impl StepInput {
    pub fn none() -> Self {
        StepInput { reveal: None }
    }

    pub fn reveal(idx: usize) -> Self {
        StepInput { reveal: Some(idx) }
    }
}

pub fn step(s: &mut SessionState, input: StepInput) -> Vec<GameEvent> {
    if !matches!(s.phase, Phase::Preview | Phase::Playing | Phase::Failed) {
        return vec![];
    }

    let mut events: Vec<GameEvent> = Vec::new();
    s.tick += 1;
    let dt = s.timing.dt_secs();

    if s.message_timer > 0 {
        s.message_timer -= 1;
        if s.message_timer == 0 {
            s.message.clear();
        }
    }

    resolve_timer(s, dt, &mut events);
    resolve_preview_countdown(s, dt, &mut events);
    resolve_reveal_input(s, input, &mut events);
    let revealed = resolve_tile_flips(s, &mut events);
    admit_revealed(s, &revealed);
    resolve_preview_exit(s, &mut events);
    resolve_resolution(s, &mut events);
    form_pair(s);

    events
}

// ══════════════════════════════════════════════════════════════
// Timer
// ══════════════════════════════════════════════════════════════

fn resolve_timer(s: &mut SessionState, dt: f32, events: &mut Vec<GameEvent>) {
    if s.phase != Phase::Playing {
        return;
    }
    if s.timer.tick(dt) {
        s.phase = Phase::Failed;
        for t in s.board.tiles_mut() {
            t.set_locked(true);
        }
        events.push(GameEvent::TimerExpired);
        s.set_message("Time's up!", 0);
    } else if let Some(remaining) = s.timer.remaining() {
        events.push(GameEvent::TimerTick { remaining_secs: remaining });
    }
}

// ══════════════════════════════════════════════════════════════
// Preview
// ══════════════════════════════════════════════════════════════

fn resolve_preview_countdown(s: &mut SessionState, dt: f32, events: &mut Vec<GameEvent>) {
    if s.phase != Phase::Preview || s.preview_hiding {
        return;
    }
    s.preview_remaining -= dt;
    if s.preview_remaining > 0.0 {
        return;
    }
    // Memorize window over: flip everything back, animated.
    s.preview_hiding = true;
    let flip_ticks = s.timing.flip_ticks;
    for idx in 0..s.board.len() {
        if let Some(t) = s.board.tile_mut(idx) {
            if t.hide(flip_ticks) {
                events.push(GameEvent::TileHideStarted { idx });
            }
        }
    }
}

fn resolve_preview_exit(s: &mut SessionState, events: &mut Vec<GameEvent>) {
    if s.phase != Phase::Preview || !s.preview_hiding {
        return;
    }
    if !s.board.tiles().all(|t| t.is_face_down()) {
        return;
    }
    s.preview_hiding = false;
    s.phase = Phase::Playing;
    for t in s.board.tiles_mut() {
        t.set_locked(false);
    }
    s.timer.resume();
    events.push(GameEvent::PreviewEnded);
}

// ══════════════════════════════════════════════════════════════
// Reveals → coordinator
// ══════════════════════════════════════════════════════════════

fn resolve_reveal_input(s: &mut SessionState, input: StepInput, events: &mut Vec<GameEvent>) {
    let Some(idx) = input.reveal else { return };
    // Invalid attempts are expected (input racing animations) — no-op.
    if !s.can_reveal(idx) {
        return;
    }
    let flip_ticks = s.timing.flip_ticks;
    if let Some(t) = s.board.tile_mut(idx) {
        if t.reveal(flip_ticks) {
            events.push(GameEvent::TileRevealStarted { idx });
        }
    }
}

fn resolve_tile_flips(s: &mut SessionState, events: &mut Vec<GameEvent>) -> Vec<usize> {
    let mut revealed = vec![];
    for idx in 0..s.board.len() {
        if let Some(done) = s.board.tile_mut(idx).and_then(|t| t.tick()) {
            events.push(GameEvent::FlipCompleted { idx });
            if done == FlipDone::Revealed {
                revealed.push(idx);
            }
        }
    }
    revealed
}

fn admit_revealed(s: &mut SessionState, revealed: &[usize]) {
    // Reveals completing after expiry (or during preview) are dropped.
    if s.phase != Phase::Playing {
        return;
    }
    for &idx in revealed {
        on_revealed(s, idx);
    }
}

/// A tile finished flipping face-up. Idempotent: a tile already waiting
/// or already locked into the resolution never re-enters, so racing
/// notifications can't build a self-pair or double-count.
pub(crate) fn on_revealed(s: &mut SessionState, idx: usize) {
    let Some(tile) = s.board.tile(idx) else {
        return; // stale reference: not on the active board
    };
    if !tile.is_face_up() {
        return;
    }
    if s.in_resolution(idx) || s.pending.contains(&idx) {
        return;
    }
    s.pending.push(idx);
}

// ══════════════════════════════════════════════════════════════
// Resolution protocol
// ══════════════════════════════════════════════════════════════

fn resolve_resolution(s: &mut SessionState, events: &mut Vec<GameEvent>) {
    let Some(mut res) = s.resolution.take() else { return };

    match res.stage {
        Stage::Settle(ref mut n) => {
            *n -= 1;
            if *n > 0 {
                s.resolution = Some(res);
                return;
            }
            let id_a = s.board.tile(res.a).map(|t| t.pair_id);
            let id_b = s.board.tile(res.b).map(|t| t.pair_id);
            if id_a.is_some() && id_a == id_b {
                resolve_match(s, res, events);
            } else {
                resolve_mismatch_score(s, events);
                res.stage = Stage::MismatchHold(s.mismatch_hold_ticks.max(1));
                s.resolution = Some(res);
            }
        }
        Stage::MismatchHold(ref mut n) => {
            *n -= 1;
            if *n > 0 {
                s.resolution = Some(res);
                return;
            }
            let flip_ticks = s.timing.flip_ticks;
            for idx in [res.a, res.b] {
                if let Some(t) = s.board.tile_mut(idx) {
                    // Still face-up? A concurrent set_matched would make
                    // hide a no-op anyway, but don't even try.
                    if t.is_face_up() && t.hide(flip_ticks) {
                        events.push(GameEvent::TileHideStarted { idx });
                    }
                }
            }
            res.stage = Stage::Hiding;
            s.resolution = Some(res);
        }
        Stage::Hiding => {
            let settled = [res.a, res.b].iter().all(|&idx| {
                s.board
                    .tile(idx)
                    .map_or(true, |t| t.is_face_down() || t.is_matched())
            });
            if !settled {
                s.resolution = Some(res);
                return;
            }
            for idx in [res.a, res.b] {
                if let Some(t) = s.board.tile_mut(idx) {
                    t.set_locked(false);
                }
            }
            // Resolution cleared; a queued pair may form this same tick.
        }
    }
}

fn resolve_match(s: &mut SessionState, res: Resolution, events: &mut Vec<GameEvent>) {
    for idx in [res.a, res.b] {
        if let Some(t) = s.board.tile_mut(idx) {
            t.set_matched();
            events.push(GameEvent::TileMatched { idx });
        }
    }
    s.scoring.add_score(true);
    events.push(GameEvent::MatchFound);
    events.push(GameEvent::ComboChanged {
        combo: s.scoring.combo(),
        multiplier: s.scoring.multiplier(),
    });
    events.push(GameEvent::ScoreChanged { score: s.scoring.score() });

    // A match landing after expiry still scores (the resolution runs to
    // completion) but can't win a failed session.
    if s.phase == Phase::Playing && s.board.all_matched() {
        complete_level(s, events);
    }
}

fn resolve_mismatch_score(s: &mut SessionState, events: &mut Vec<GameEvent>) {
    s.scoring.add_score(false);
    events.push(GameEvent::Mismatch);
    events.push(GameEvent::ComboChanged {
        combo: s.scoring.combo(),
        multiplier: s.scoring.multiplier(),
    });
    events.push(GameEvent::ScoreChanged { score: s.scoring.score() });
}

fn complete_level(s: &mut SessionState, events: &mut Vec<GameEvent>) {
    s.phase = Phase::Complete;
    s.timer.stop();
    let elapsed = s.timer.elapsed();
    let bonus = s.scoring.add_time_bonus(elapsed, s.time_bonus_max);
    events.push(GameEvent::ScoreChanged { score: s.scoring.score() });
    events.push(GameEvent::LevelComplete { elapsed_secs: elapsed });
    s.complete_timer = s.timing.complete_pause_ticks;
    s.set_message(&format!("Level clear! Time bonus +{bonus}"), 0);
}

fn form_pair(s: &mut SessionState) {
    // Nothing new starts once the session has ended.
    if s.phase != Phase::Playing {
        return;
    }
    if s.resolution.is_some() || s.pending.len() < 2 {
        return;
    }
    let a = s.pending.remove(0);
    let b = s.pending.remove(0);
    debug_assert_ne!(a, b);
    for idx in [a, b] {
        if let Some(t) = s.board.tile_mut(idx) {
            t.set_locked(true);
        }
    }
    s.resolution = Some(Resolution {
        a,
        b,
        stage: Stage::Settle(s.timing.settle_ticks.max(1)),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimingConfig;
    use crate::domain::board::Board;
    use crate::domain::tile::TileState;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    // 1 second per tick, 1-tick flips: a reveal lands face-up in the same
    // step that issued it, which keeps timelines short.
    fn timing() -> TimingConfig {
        TimingConfig {
            tick_rate_ms: 1000,
            flip_ticks: 1,
            settle_ticks: 1,
            complete_pause_ticks: 4,
        }
    }

    fn session(rows: usize, cols: usize) -> SessionState {
        let mut s = SessionState::new(timing());
        let mut rng = StdRng::seed_from_u64(7);
        s.board = Board::generate(rows, cols, &mut rng).unwrap();
        s.phase = Phase::Playing;
        s.timer.start_running(0.0, false);
        s.scoring.set_level_scoring(100, 10);
        s.mismatch_hold_ticks = 2;
        s.time_bonus_max = 500;
        s
    }

    /// Indices of the two tiles sharing pair id `id`.
    fn pair_indices(s: &SessionState, id: u8) -> (usize, usize) {
        let mut found = vec![];
        for idx in 0..s.board.len() {
            if s.board.tile(idx).unwrap().pair_id == id {
                found.push(idx);
            }
        }
        assert_eq!(found.len(), 2);
        (found[0], found[1])
    }

    /// Two tiles with differing ids.
    fn mismatch_indices(s: &SessionState) -> (usize, usize) {
        let (a, _) = pair_indices(s, 0);
        let (b, _) = pair_indices(s, 1);
        (a, b)
    }

    fn run_until_idle(s: &mut SessionState, max_ticks: usize) -> Vec<GameEvent> {
        let mut all = vec![];
        for _ in 0..max_ticks {
            all.extend(step(s, StepInput::none()));
            if s.resolution.is_none() && s.pending.is_empty() {
                break;
            }
        }
        all
    }

    #[test]
    fn matching_pair_scores_and_stays_matched() {
        let mut s = session(4, 4);
        let (a, b) = pair_indices(&s, 3);

        let ev = step(&mut s, StepInput::reveal(a));
        assert!(ev.contains(&GameEvent::TileRevealStarted { idx: a }));
        step(&mut s, StepInput::reveal(b));
        assert!(s.is_resolving());

        let ev = step(&mut s, StepInput::none());
        assert!(ev.contains(&GameEvent::MatchFound));
        assert!(ev.contains(&GameEvent::ScoreChanged { score: 100 }));
        assert!(s.board.tile(a).unwrap().is_matched());
        assert!(s.board.tile(b).unwrap().is_matched());
        assert!(!s.is_resolving());
        assert_eq!(s.scoring.combo(), 1);
    }

    #[test]
    fn mismatch_flips_back_resets_combo_and_floors_score() {
        let mut s = session(4, 4);

        // First bank a match so there's score and combo to lose.
        let (a, b) = pair_indices(&s, 3);
        step(&mut s, StepInput::reveal(a));
        step(&mut s, StepInput::reveal(b));
        step(&mut s, StepInput::none());
        assert_eq!(s.scoring.score(), 100);

        let (x, y) = mismatch_indices(&s);
        step(&mut s, StepInput::reveal(x));
        step(&mut s, StepInput::reveal(y));
        let all = run_until_idle(&mut s, 20);

        assert!(all.contains(&GameEvent::Mismatch));
        assert!(all.contains(&GameEvent::ScoreChanged { score: 90 }));
        assert_eq!(s.scoring.combo(), 0);
        assert!(s.board.tile(x).unwrap().is_face_down());
        assert!(s.board.tile(y).unwrap().is_face_down());
        assert!(!s.board.tile(x).unwrap().is_locked());
        assert!(!s.board.tile(y).unwrap().is_locked());
    }

    #[test]
    fn combo_scales_over_consecutive_matches() {
        let mut s = session(4, 4);
        let mut scores = vec![];
        for id in 0..3u8 {
            let (a, b) = pair_indices(&s, id);
            step(&mut s, StepInput::reveal(a));
            step(&mut s, StepInput::reveal(b));
            step(&mut s, StepInput::none());
            scores.push(s.scoring.score());
        }
        assert_eq!(scores, vec![100, 300, 600]); // +100, +200, +300
    }

    #[test]
    fn resolution_set_is_always_a_locked_pair() {
        let mut s = session(4, 4);
        let (x, y) = mismatch_indices(&s);
        step(&mut s, StepInput::reveal(x));
        assert!(!s.is_resolving());
        step(&mut s, StepInput::reveal(y));

        let res = s.resolution.unwrap();
        assert_ne!(res.a, res.b);
        assert!(s.in_resolution(x) && s.in_resolution(y));
        assert!(s.board.tile(x).unwrap().is_locked());
        assert!(s.board.tile(y).unwrap().is_locked());
    }

    #[test]
    fn third_reveal_queues_instead_of_joining_active_resolution() {
        let mut s = session(4, 4);
        let (x, y) = mismatch_indices(&s);
        step(&mut s, StepInput::reveal(x));
        step(&mut s, StepInput::reveal(y));
        let res_before = (s.resolution.unwrap().a, s.resolution.unwrap().b);

        // Mid-resolution, reveal a third tile.
        let (z, _) = pair_indices(&s, 2);
        step(&mut s, StepInput::reveal(z));
        assert!(s.board.tile(z).unwrap().is_face_up());
        assert!(!s.in_resolution(z));
        let res_after = s.resolution.map(|r| (r.a, r.b));
        // Still only the original pair (or already advanced past settle,
        // but never grown).
        if let Some(r) = res_after {
            assert_eq!(r, res_before);
        }
        assert!(s.pending.contains(&z));
    }

    #[test]
    fn on_revealed_is_idempotent() {
        let mut s = session(4, 4);
        let (a, _) = pair_indices(&s, 0);
        step(&mut s, StepInput::reveal(a));
        assert_eq!(s.pending, vec![a]);
        // A duplicate notification must not build a self-pair.
        on_revealed(&mut s, a);
        on_revealed(&mut s, a);
        assert_eq!(s.pending, vec![a]);
        form_pair(&mut s);
        assert!(!s.is_resolving());

        // Same mid-settle: duplicates never grow the resolution set or
        // score a second time.
        s.pending.clear();
        let (x, y) = pair_indices(&s, 1);
        step(&mut s, StepInput::reveal(x));
        step(&mut s, StepInput::reveal(y));
        assert!(s.is_resolving());
        let score_before = s.scoring.score();
        on_revealed(&mut s, x);
        on_revealed(&mut s, y);
        let res = s.resolution.unwrap();
        assert_eq!((res.a, res.b), (x, y));
        assert!(s.pending.is_empty());
        assert_eq!(s.scoring.score(), score_before);
    }

    #[test]
    fn stale_tile_index_is_rejected() {
        let mut s = session(2, 2);
        assert!(!s.can_reveal(99));
        on_revealed(&mut s, 99);
        assert!(s.pending.is_empty());
        let ev = step(&mut s, StepInput::reveal(99));
        assert!(ev.iter().all(|e| !matches!(e, GameEvent::TileRevealStarted { .. })));
    }

    #[test]
    fn expiry_preempts_same_tick_reveal() {
        let mut s = session(4, 4);
        s.timer.start_running(3.0, true);
        step(&mut s, StepInput::none());
        step(&mut s, StepInput::none());
        // Third tick crosses the limit; the reveal arriving the same tick
        // must lose.
        let (a, _) = pair_indices(&s, 0);
        let ev = step(&mut s, StepInput::reveal(a));
        assert!(ev.contains(&GameEvent::TimerExpired));
        assert_eq!(s.phase, Phase::Failed);
        assert_eq!(s.board.tile(a).unwrap().state(), TileState::FaceDown);
    }

    #[test]
    fn in_flight_resolution_completes_after_expiry() {
        let mut s = session(4, 4);
        s.timer.start_running(3.0, true);
        let (x, y) = mismatch_indices(&s);
        step(&mut s, StepInput::reveal(x)); // t=1
        step(&mut s, StepInput::reveal(y)); // t=2, resolution forms
        step(&mut s, StepInput::none()); // t=3: expiry; settle also ticks
        assert_eq!(s.phase, Phase::Failed);

        // The mismatch still resolves: tiles flip back and unlock.
        for _ in 0..10 {
            step(&mut s, StepInput::none());
        }
        assert!(!s.is_resolving());
        assert!(s.board.tile(x).unwrap().is_face_down());
        assert!(s.board.tile(y).unwrap().is_face_down());

        // But nothing new is accepted.
        let (a, _) = pair_indices(&s, 2);
        assert!(!s.can_reveal(a));
    }

    #[test]
    fn match_after_expiry_scores_but_cannot_complete() {
        let mut s = session(2, 2);
        s.timer.start_running(3.0, true);
        // Match pair 0 cleanly first.
        let (a, b) = pair_indices(&s, 0);
        step(&mut s, StepInput::reveal(a)); // t=1
        step(&mut s, StepInput::reveal(b)); // t=2
        // t=3: settle resolves the match AND the timer expires. Expiry is
        // checked first, so the match lands in a failed session.
        let ev = step(&mut s, StepInput::none());
        assert!(ev.contains(&GameEvent::TimerExpired));
        assert!(ev.contains(&GameEvent::MatchFound));
        assert_eq!(s.phase, Phase::Failed);
        assert_eq!(s.scoring.score(), 100);
        assert!(!ev.contains(&GameEvent::LevelComplete { elapsed_secs: 3.0 }));
    }

    #[test]
    fn queued_pair_never_starts_after_expiry() {
        let mut s = session(4, 4);
        s.timer.start_running(5.0, true);
        let (x, y) = mismatch_indices(&s);
        step(&mut s, StepInput::reveal(x)); // t=1
        step(&mut s, StepInput::reveal(y)); // t=2: resolution A forms
        // Queue a second pair behind A during its mismatch hold.
        let (p, q) = pair_indices(&s, 2);
        step(&mut s, StepInput::reveal(p)); // t=3
        step(&mut s, StepInput::reveal(q)); // t=4
        assert_eq!(s.pending.len(), 2);
        step(&mut s, StepInput::none()); // t=5: timer expires mid-hold

        assert_eq!(s.phase, Phase::Failed);
        for _ in 0..10 {
            step(&mut s, StepInput::none());
        }
        // A drained, B never started, no score beyond the mismatch.
        assert!(!s.is_resolving());
        assert!(!s.board.tile(p).unwrap().is_matched());
        assert_eq!(s.scoring.score(), 0);
    }

    #[test]
    fn level_complete_fires_exactly_once_across_back_to_back_resolutions() {
        let mut s = session(2, 2);
        let (a, b) = pair_indices(&s, 0);
        let (c, d) = pair_indices(&s, 1);

        let mut all = vec![];
        all.extend(step(&mut s, StepInput::reveal(a)));
        all.extend(step(&mut s, StepInput::reveal(b)));
        all.extend(step(&mut s, StepInput::reveal(c)));
        all.extend(step(&mut s, StepInput::reveal(d)));
        for _ in 0..10 {
            all.extend(step(&mut s, StepInput::none()));
        }

        let completions = all
            .iter()
            .filter(|e| matches!(e, GameEvent::LevelComplete { .. }))
            .count();
        assert_eq!(completions, 1);
        assert_eq!(s.phase, Phase::Complete);
        // 100 + 200 combo + 500 time bonus (well under a minute).
        assert_eq!(s.scoring.score(), 800);
    }

    #[test]
    fn preview_blocks_reveals_then_opens_play() {
        let mut s = session(2, 2);
        s.phase = Phase::Preview;
        s.preview_remaining = 2.0;
        s.timer.start_preview(60.0, true);
        for t in s.board.tiles_mut() {
            t.flip_instant(true);
            t.set_locked(true);
        }

        assert!(!s.can_reveal(0));
        let ev = step(&mut s, StepInput::reveal(0));
        assert!(ev.iter().all(|e| !matches!(e, GameEvent::TileRevealStarted { .. })));
        assert_eq!(s.phase, Phase::Preview);

        // Second tick exhausts the window and starts the flip-back. With
        // 1-tick flips the hide completes in the same step it was issued,
        // same as the reveal path, so play opens on this tick too.
        let ev = step(&mut s, StepInput::none());
        assert!(ev.contains(&GameEvent::TileHideStarted { idx: 0 }));
        assert!(ev.contains(&GameEvent::PreviewEnded));
        assert_eq!(s.phase, Phase::Playing);
        assert!(s.board.tiles().all(|t| t.is_face_down() && !t.is_locked()));
        assert!(s.can_reveal(0));
        // Timer only starts accruing now.
        assert_eq!(s.timer.elapsed(), 0.0);
    }

    #[test]
    fn terminal_phases_ignore_step() {
        let mut s = session(2, 2);
        s.phase = Phase::Complete;
        assert!(step(&mut s, StepInput::reveal(0)).is_empty());
        s.phase = Phase::Title;
        assert!(step(&mut s, StepInput::reveal(0)).is_empty());
    }
}
