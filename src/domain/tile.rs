/// Per-tile flip state machine.
///
/// Lifecycle: FaceDown → Flipping → FaceUp → (Flipping) → FaceDown on a
/// mismatch, or FaceUp → Matched on a match. Matched is terminal.
/// Flips are tick countdowns; the session step drives `tick()` and reacts
/// to the completed transition it reports.

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TileState {
    FaceDown,
    Flipping,
    FaceUp,
    Matched,
}

/// Which face a flip in progress is turning toward.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum FlipTarget {
    Up,
    Down,
}

/// Reported by `tick()` when a flip countdown just finished.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum FlipDone {
    Revealed,
    Hidden,
}

#[derive(Clone, Debug)]
pub struct Tile {
    pub pair_id: u8,
    state: TileState,
    locked: bool,
    flip: Option<(FlipTarget, u32)>,
}

impl Tile {
    pub fn new(pair_id: u8) -> Self {
        Tile {
            pair_id,
            state: TileState::FaceDown,
            locked: false,
            flip: None,
        }
    }

    pub fn state(&self) -> TileState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_matched(&self) -> bool {
        self.state == TileState::Matched
    }

    pub fn is_face_down(&self) -> bool {
        self.state == TileState::FaceDown
    }

    pub fn is_face_up(&self) -> bool {
        self.state == TileState::FaceUp
    }

    /// While locked, `reveal()` rejects even from FaceDown.
    pub fn set_locked(&mut self, locked: bool) {
        if self.state != TileState::Matched {
            self.locked = locked;
        }
    }

    /// Begin flipping face-up. Valid only from FaceDown when unlocked.
    /// Returns whether the flip was accepted.
    pub fn reveal(&mut self, flip_ticks: u32) -> bool {
        if self.state != TileState::FaceDown || self.locked {
            return false;
        }
        self.state = TileState::Flipping;
        self.flip = Some((FlipTarget::Up, flip_ticks.max(1)));
        true
    }

    /// Begin flipping face-down. Valid only from FaceUp; a no-op once Matched.
    pub fn hide(&mut self, flip_ticks: u32) -> bool {
        if self.state != TileState::FaceUp {
            return false;
        }
        self.state = TileState::Flipping;
        self.flip = Some((FlipTarget::Down, flip_ticks.max(1)));
        true
    }

    /// Force the terminal Matched state from any non-terminal state.
    /// Cancels any flip in progress and clears the lock; the tile never
    /// accepts `reveal()` or `hide()` again.
    pub fn set_matched(&mut self) {
        self.state = TileState::Matched;
        self.locked = false;
        self.flip = None;
    }

    /// Snap to a face with no animation (preview phase). Cancels any flip.
    /// No-op once Matched.
    pub fn flip_instant(&mut self, face_up: bool) {
        if self.state == TileState::Matched {
            return;
        }
        self.flip = None;
        self.state = if face_up { TileState::FaceUp } else { TileState::FaceDown };
    }

    /// Advance the flip countdown by one tick. Reports the transition that
    /// just completed, if any. At most one flip is ever in progress.
    pub fn tick(&mut self) -> Option<FlipDone> {
        let (target, remaining) = self.flip.as_mut()?;
        *remaining -= 1;
        if *remaining > 0 {
            return None;
        }
        let done = match target {
            FlipTarget::Up => {
                self.state = TileState::FaceUp;
                FlipDone::Revealed
            }
            FlipTarget::Down => {
                self.state = TileState::FaceDown;
                FlipDone::Hidden
            }
        };
        self.flip = None;
        Some(done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reveal_flips_up_after_countdown() {
        let mut t = Tile::new(3);
        assert!(t.reveal(2));
        assert_eq!(t.state(), TileState::Flipping);
        assert_eq!(t.tick(), None);
        assert_eq!(t.tick(), Some(FlipDone::Revealed));
        assert_eq!(t.state(), TileState::FaceUp);
        assert_eq!(t.tick(), None);
    }

    #[test]
    fn reveal_rejected_when_locked_or_not_face_down() {
        let mut t = Tile::new(0);
        t.set_locked(true);
        assert!(!t.reveal(1));
        t.set_locked(false);
        assert!(t.reveal(1));
        // Mid-flip: not FaceDown anymore
        assert!(!t.reveal(1));
        t.tick();
        // FaceUp
        assert!(!t.reveal(1));
    }

    #[test]
    fn hide_path_returns_to_face_down() {
        let mut t = Tile::new(1);
        t.reveal(1);
        t.tick();
        assert!(t.hide(2));
        assert_eq!(t.tick(), None);
        assert_eq!(t.tick(), Some(FlipDone::Hidden));
        assert!(t.is_face_down());
    }

    #[test]
    fn matched_is_terminal() {
        let mut t = Tile::new(7);
        t.reveal(1);
        t.tick();
        t.set_locked(true);
        t.set_matched();
        assert!(t.is_matched());
        assert!(!t.is_locked());
        assert!(!t.reveal(1));
        assert!(!t.hide(1));
        t.flip_instant(false);
        assert!(t.is_matched());
        t.set_locked(true);
        assert!(!t.is_locked());
        assert_eq!(t.tick(), None);
    }

    #[test]
    fn set_matched_cancels_flip_in_progress() {
        let mut t = Tile::new(2);
        t.reveal(5);
        t.set_matched();
        assert_eq!(t.tick(), None);
        assert!(t.is_matched());
    }

    #[test]
    fn flip_instant_cancels_and_snaps() {
        let mut t = Tile::new(4);
        t.reveal(10);
        t.flip_instant(true);
        assert!(t.is_face_up());
        assert_eq!(t.tick(), None);
        t.flip_instant(false);
        assert!(t.is_face_down());
    }

    #[test]
    fn zero_tick_flip_is_clamped_to_one() {
        let mut t = Tile::new(0);
        assert!(t.reveal(0));
        assert_eq!(t.tick(), Some(FlipDone::Revealed));
    }
}
