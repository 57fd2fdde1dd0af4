/// Scoring engine: score, combo multiplier, mismatch penalty, time bonus,
/// and per-level target progress.
///
/// Consecutive matches grow the combo; the multiplier equals the running
/// combo, so match contributions scale 1x, 2x, 3x... A mismatch resets
/// the combo and deducts the penalty, flooring the score at zero.

pub const DEFAULT_MATCH_BONUS: i32 = 100;
pub const DEFAULT_MISMATCH_PENALTY: i32 = 10;

#[derive(Clone, Debug)]
pub struct Scoring {
    score: i32,
    combo: u32,
    multiplier: u32,
    match_bonus: i32,
    mismatch_penalty: i32,
    target_score: i32,
}

impl Scoring {
    pub fn new() -> Self {
        Scoring {
            score: 0,
            combo: 0,
            multiplier: 1,
            match_bonus: DEFAULT_MATCH_BONUS,
            mismatch_penalty: DEFAULT_MISMATCH_PENALTY,
            target_score: 0,
        }
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    pub fn target_score(&self) -> i32 {
        self.target_score
    }

    /// Per-level overrides. Must be applied before the level's first
    /// `add_score` call.
    pub fn set_level_scoring(&mut self, match_bonus: i32, mismatch_penalty: i32) {
        self.match_bonus = match_bonus;
        self.mismatch_penalty = mismatch_penalty;
    }

    pub fn set_target_score(&mut self, target: i32) {
        self.target_score = target;
    }

    /// Apply a resolved pair. Returns the score delta (signed, after the
    /// zero floor) so callers can surface it in messages.
    pub fn add_score(&mut self, matched: bool) -> i32 {
        let before = self.score;
        if matched {
            self.combo += 1;
            self.multiplier = self.combo;
            self.score += self.match_bonus * self.multiplier as i32;
        } else {
            self.combo = 0;
            self.multiplier = 1;
            self.score = (self.score - self.mismatch_penalty).max(0);
        }
        self.score - before
    }

    /// Completion bonus: `round(max_bonus / max(1, elapsed/60))`. A level
    /// finished in one minute or less earns the full bonus; slower runs
    /// earn proportionally less. Invoked exactly once per completion,
    /// never on failure.
    pub fn add_time_bonus(&mut self, elapsed_secs: f32, max_bonus: i32) -> i32 {
        let bonus = (max_bonus as f32 / (elapsed_secs / 60.0).max(1.0)).round() as i32;
        self.score += bonus;
        bonus
    }

    pub fn has_reached_target(&self) -> bool {
        self.score >= self.target_score
    }

    /// Progress toward the target score, clamped to 0..=1.
    pub fn progress(&self) -> f32 {
        if self.target_score <= 0 {
            return 0.0;
        }
        (self.score as f32 / self.target_score as f32).clamp(0.0, 1.0)
    }

    pub fn reset(&mut self) {
        self.score = 0;
        self.combo = 0;
        self.multiplier = 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combo_scales_match_contributions() {
        let mut s = Scoring::new();
        s.set_level_scoring(100, 10);
        assert_eq!(s.add_score(true), 100);
        assert_eq!(s.add_score(true), 200);
        assert_eq!(s.add_score(true), 300);
        assert_eq!(s.score(), 600);
        assert_eq!(s.combo(), 3);
        assert_eq!(s.multiplier(), 3);
    }

    #[test]
    fn mismatch_resets_combo_and_deducts() {
        let mut s = Scoring::new();
        s.set_level_scoring(100, 10);
        s.add_score(true);
        assert_eq!(s.add_score(false), -10);
        assert_eq!(s.combo(), 0);
        assert_eq!(s.multiplier(), 1);
        assert_eq!(s.score(), 90);
        // Combo restarts at 1x after a break
        assert_eq!(s.add_score(true), 100);
    }

    #[test]
    fn score_floors_at_zero() {
        let mut s = Scoring::new();
        s.set_level_scoring(100, 25);
        s.add_score(false);
        assert_eq!(s.score(), 0);
        s.add_score(false);
        assert_eq!(s.score(), 0);
    }

    #[test]
    fn time_bonus_curve() {
        let mut s = Scoring::new();
        assert_eq!(s.add_time_bonus(60.0, 500), 500);
        assert_eq!(s.add_time_bonus(120.0, 500), 250);
        // Denominator floor: sub-minute runs still cap at max_bonus
        assert_eq!(s.add_time_bonus(0.5, 500), 500);
        assert_eq!(s.score(), 1250);
    }

    #[test]
    fn target_progress_clamps() {
        let mut s = Scoring::new();
        s.set_target_score(200);
        assert!(!s.has_reached_target());
        assert_eq!(s.progress(), 0.0);
        s.set_level_scoring(100, 10);
        s.add_score(true);
        assert_eq!(s.progress(), 0.5);
        s.add_score(true);
        assert!(s.has_reached_target());
        assert_eq!(s.progress(), 1.0);
    }

    #[test]
    fn reset_clears_score_but_keeps_level_scoring() {
        let mut s = Scoring::new();
        s.set_level_scoring(50, 5);
        s.add_score(true);
        s.reset();
        assert_eq!(s.score(), 0);
        assert_eq!(s.combo(), 0);
        assert_eq!(s.multiplier(), 1);
        assert_eq!(s.add_score(true), 50);
    }
}
