/// Events emitted during a session step, in the order the underlying
/// state changed. The presentation and audio layers consume these;
/// the core never waits on them.

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    TileRevealStarted { idx: usize },
    TileHideStarted { idx: usize },
    /// A flip countdown finished (face-up or face-down). Exactly one per
    /// completed flip.
    FlipCompleted { idx: usize },
    TileMatched { idx: usize },
    MatchFound,
    Mismatch,
    ScoreChanged { score: i32 },
    ComboChanged { combo: u32, multiplier: u32 },
    TimerTick { remaining_secs: f32 },
    PreviewStarted,
    PreviewEnded,
    LevelComplete { elapsed_secs: f32 },
    TimerExpired,
}
