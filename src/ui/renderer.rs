/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// This eliminates flicker caused by full-screen redraws.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::tile::TileState;
use crate::sim::level::LevelDef;
use crate::sim::save::Progress;
use crate::sim::session::{Phase, SessionState};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit dark background for all "empty" terminal cells, so the
    /// inter-row gap pixels on VTE terminals match the cell color.
    const BASE_BG: Color = Color::Rgb { r: 18, g: 20, b: 32 };

    const BLANK: Cell = Cell {
        ch: ' ',
        fg: Color::White,
        bg: Cell::BASE_BG,
    };

    /// Sentinel cell used to invalidate the back buffer.
    /// Different from any real cell, so every position will be diff'd.
    const INVALID: Cell = Cell {
        ch: '?',
        fg: Color::Magenta,
        bg: Color::Magenta,
    };

    /// Normalize bg: Color::Reset → BASE_BG so that every cell gets an
    /// explicit background color (never terminal-default).
    #[inline]
    fn norm_bg(bg: Color) -> Color {
        match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        }
    }

    fn new(ch: char, fg: Color, bg: Color) -> Self {
        Cell {
            ch,
            fg,
            bg: Self::norm_bg(bg),
        }
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer {
            width: w,
            height: h,
            cells: vec![Cell::BLANK; w * h],
        }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    /// Write a string at (x, y) with given colors. Each char occupies 1 column.
    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        let mut cx = x;
        for ch in s.chars() {
            if cx >= self.width {
                break;
            }
            self.set(cx, y, Cell::new(ch, fg, bg));
            cx += 1;
        }
    }

    fn fill_row(&mut self, y: usize, x0: usize, x1: usize, bg: Color) {
        for x in x0..x1.min(self.width) {
            self.set(x, y, Cell::new(' ', Color::White, bg));
        }
    }
}

// ── Renderer ──

/// Terminal footprint of one tile: 5 columns x 3 rows plus a 1-cell gap.
const TILE_W: usize = 5;
const TILE_H: usize = 3;
const TILE_GAP_X: usize = 1;
const TILE_GAP_Y: usize = 0;

/// Vertical offsets
const HUD_ROW: usize = 1;
const GRID_ROW: usize = 3;

// Palette
const GOLD: Color = Color::Rgb { r: 255, g: 200, b: 50 };
const GREEN: Color = Color::Rgb { r: 80, g: 255, b: 80 };
const RED: Color = Color::Rgb { r: 255, g: 80, b: 80 };
const CYAN: Color = Color::Rgb { r: 100, g: 200, b: 255 };
const DIM: Color = Color::DarkGrey;
const CARD_BACK: Color = Color::Rgb { r: 40, g: 45, b: 80 };
const CARD_FACE: Color = Color::Rgb { r: 200, g: 200, b: 210 };
const CARD_MATCHED: Color = Color::Rgb { r: 30, g: 55, b: 35 };
const CURSOR_BG: Color = Color::Rgb { r: 90, g: 70, b: 20 };

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_phase: Option<Phase>,
}

impl Renderer {
    pub fn new() -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_phase: None,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        // Force full repaint on first frame: back ≠ front for every cell.
        self.back.cells.fill(Cell::INVALID);

        Ok(())
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        execute!(
            self.writer,
            ResetColor,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    pub fn render(
        &mut self,
        s: &SessionState,
        levels: &[LevelDef],
        progress: &Progress,
    ) -> io::Result<()> {
        // Detect terminal resize
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            // Force full repaint after resize.
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
        }

        // Detect phase change → clear for clean transition
        let phase_changed = self.last_phase != Some(s.phase);
        if phase_changed {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_phase = Some(s.phase);
        }

        // Build front buffer
        self.front.clear();

        match s.phase {
            Phase::Title => self.compose_title(s, progress),
            Phase::LevelSelect => self.compose_level_select(s, levels, progress),
            Phase::Preview | Phase::Playing => self.compose_game(s, levels),
            Phase::Complete => self.compose_level_clear(s, levels),
            Phase::Failed => self.compose_failed(s, levels),
            Phase::AllClear => self.compose_all_clear(s),
        }

        // Diff and emit
        self.flush_diff()?;

        // Swap: current front becomes next back
        std::mem::swap(&mut self.front, &mut self.back);

        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut need_move = true;
        let mut last_x: usize = 0;
        let mut last_y: usize = 0;

        // Set explicit base colors at start of frame. Not ResetColor: that
        // reverts to the terminal's native default, which may differ from
        // BASE_BG and cause line artifacts.
        queue!(
            self.writer,
            SetForegroundColor(Color::White),
            SetBackgroundColor(Cell::BASE_BG),
        )?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    need_move = true;
                    continue;
                }

                // Position cursor if needed
                if need_move || x != last_x + 1 || y != last_y {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                    need_move = false;
                }

                // Set colors only if changed
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }

                let mut buf = [0u8; 4];
                queue!(self.writer, Print(cell.ch.encode_utf8(&mut buf) as &str))?;
                last_x = x;
                last_y = y;
            }
        }

        self.writer.flush()
    }

    // ── Compose: build front buffer content ──

    fn compose_game(&mut self, s: &SessionState, levels: &[LevelDef]) {
        self.compose_hud(s);
        self.compose_board(s, levels, GRID_ROW);

        // Help + message footer
        let grid_h = s.board.rows * (TILE_H + TILE_GAP_Y);
        let help_row = GRID_ROW + grid_h + 1;
        self.front.put_str(
            2,
            help_row,
            "←→↑↓ Move   ENTER/SPACE Flip   R Restart   L Levels   ESC Title",
            DIM,
            Color::Reset,
        );

        if s.phase == Phase::Preview {
            let blink = (s.tick / 5) % 2 == 0;
            if blink {
                self.front.put_str(2, help_row + 2, "◈ Memorize the board!", GOLD, Color::Reset);
            }
        }

        if !s.message.is_empty() {
            let msg = format!(" ◈ {} ", s.message);
            let row = help_row + 2;
            self.front.fill_row(row, 0, msg.chars().count() + 2, Color::Rgb { r: 60, g: 55, b: 20 });
            self.front.put_str(1, row, &msg, GOLD, Color::Rgb { r: 60, g: 55, b: 20 });
        }
    }

    fn compose_hud(&mut self, s: &SessionState) {
        let name = format!(
            "Level {}/{}  {}",
            s.current_level + 1,
            s.total_levels,
            s.level_name
        );
        self.front.put_str(2, HUD_ROW, &name, GOLD, Color::Reset);

        let score = format!("Score {:>6}", s.scoring.score());
        self.front.put_str(2, HUD_ROW + 1, &score, Color::White, Color::Reset);

        if s.scoring.combo() > 1 {
            let combo = format!("Combo x{}", s.scoring.multiplier());
            self.front.put_str(17, HUD_ROW + 1, &combo, GREEN, Color::Reset);
        }

        // Timer, colored red in the last 10 seconds.
        let clock = s.timer.formatted();
        let urgent = s.timer.remaining().is_some_and(|r| r < 10.0);
        let clock_fg = if urgent { RED } else { CYAN };
        let cx = self.front.width.saturating_sub(clock.len() + 2);
        self.front.put_str(cx, HUD_ROW, &clock, clock_fg, Color::Reset);

        // Target progress bar: 20 cells.
        let target = s.scoring.target_score();
        if target > 0 {
            let filled = (s.scoring.progress() * 20.0) as usize;
            let bar: String = (0..20).map(|i| if i < filled { '■' } else { '·' }).collect();
            let label = format!("Target {:>5}  {}", target, bar);
            let bx = self.front.width.saturating_sub(label.chars().count() + 2);
            self.front.put_str(bx, HUD_ROW + 1, &label, DIM, Color::Reset);
        }
    }

    fn compose_board(&mut self, s: &SessionState, levels: &[LevelDef], top: usize) {
        let def = levels.get(s.current_level);
        let show_cursor = s.phase == Phase::Playing;

        for idx in 0..s.board.len() {
            let Some(tile) = s.board.tile(idx) else { continue };
            let (row, col) = s.board.position(idx);
            let x0 = 2 + col * (TILE_W + TILE_GAP_X);
            let y0 = top + row * (TILE_H + TILE_GAP_Y);

            let is_cursor = show_cursor && idx == s.cursor;
            let mid_flip = tile.state() == TileState::Flipping;

            let (bg, fg, glyph) = if tile.is_matched() {
                let g = def.map(|d| d.glyph(tile.pair_id)).unwrap_or(" ");
                (CARD_MATCHED, DIM, g.chars().next().unwrap_or(' '))
            } else if tile.is_face_up() {
                let g = def.map(|d| d.glyph(tile.pair_id)).unwrap_or("?");
                (CARD_FACE, Color::Black, g.chars().next().unwrap_or('?'))
            } else if mid_flip {
                (CARD_BACK, Color::White, '▞')
            } else {
                (CARD_BACK, Color::White, '▒')
            };

            let bg = if is_cursor { CURSOR_BG } else { bg };

            for dy in 0..TILE_H {
                self.front.fill_row(y0 + dy, x0, x0 + TILE_W, bg);
            }
            self.front.set(x0 + TILE_W / 2, y0 + TILE_H / 2, Cell::new(glyph, fg, bg));

            if is_cursor {
                self.front.set(x0, y0 + TILE_H / 2, Cell::new('▸', GOLD, bg));
                self.front.set(x0 + TILE_W - 1, y0 + TILE_H / 2, Cell::new('◂', GOLD, bg));
            }
        }
    }

    fn compose_title(&mut self, s: &SessionState, progress: &Progress) {
        let title = [
            r"  ___       _        _",
            r" | _ \ __ _(_) _ _  | |  ___  _ __ __ ___ _",
            r" |  _// _` | || '_| / _|/ _ \| V  V / ' \ |",
            r" |_|  \__,_|_||_|   \__|\___/ \_/\_/|_||_|_|",
        ];
        for (i, line) in title.iter().enumerate() {
            self.front.put_str(2, 2 + i, line, GOLD, Color::Reset);
        }

        let tagline = "━━━ a tile-matching memory game ━━━";
        self.front.put_str(8, 7, tagline, Color::Rgb { r: 180, g: 140, b: 50 }, Color::Reset);

        let menu_base = 10;
        self.front.put_str(8, menu_base, "ENTER   New Game", GREEN, Color::Reset);
        if progress.highest_unlocked > 1 {
            let cont = format!("  C     Continue  (level {})", progress.current_level);
            self.front.put_str(8, menu_base + 1, &cont, GOLD, Color::Reset);
        } else {
            self.front.put_str(8, menu_base + 1, "  C     Continue  (no progress)", DIM, Color::Reset);
        }
        self.front.put_str(8, menu_base + 2, "  L     Level Select", Color::White, Color::Reset);
        self.front.put_str(8, menu_base + 3, "  X     Reset Progress", Color::White, Color::Reset);
        self.front.put_str(8, menu_base + 4, "  Q     Quit", Color::White, Color::Reset);

        let help = [
            "Controls",
            "  ←→↑↓ / WASD   Move cursor",
            "  ENTER/SPACE   Flip tile",
            "  R             Restart level",
            "  ESC           Back to title (saves progress)",
        ];
        for (i, line) in help.iter().enumerate() {
            let color = if i == 0 { GOLD } else { Color::White };
            self.front.put_str(8, menu_base + 6 + i, line, color, Color::Reset);
        }

        if !s.message.is_empty() {
            let msg_row = self.front.height.saturating_sub(1);
            let msg = format!(" ◈ {} ", s.message);
            self.front.fill_row(msg_row, 0, self.front.width, Color::Rgb { r: 200, g: 180, b: 50 });
            self.front.put_str(0, msg_row, &msg, Color::Black, Color::Rgb { r: 200, g: 180, b: 50 });
        }
    }

    fn compose_level_select(&mut self, s: &SessionState, levels: &[LevelDef], progress: &Progress) {
        self.front.put_str(2, 1, "╔═══════════════════════════════════════════╗", GOLD, Color::Reset);
        self.front.put_str(2, 2, "║              LEVEL  SELECT                ║", GOLD, Color::Reset);
        self.front.put_str(2, 3, "╚═══════════════════════════════════════════╝", GOLD, Color::Reset);

        let list_top = 5;
        let cursor_bg = Color::Rgb { r: 30, g: 60, b: 30 };

        for (idx, def) in levels.iter().enumerate() {
            let row = list_top + idx;
            if row + 3 >= self.front.height {
                break;
            }
            let level_number = idx + 1;
            let unlocked = progress.is_unlocked(level_number);
            let is_selected = idx == s.select_cursor;

            let best = progress
                .record(level_number)
                .map(|r| format!("best {:>6}{}", r.best_score, if r.completed { " ✓" } else { "" }))
                .unwrap_or_default();
            let size = format!("{}x{}", def.rows, def.cols);
            let line = if unlocked {
                format!("{:>3}. {:<16} {:<6} {}", level_number, def.name, size, best)
            } else {
                format!("{:>3}. {:<16} {:<6} ✗ locked", level_number, def.name, size)
            };

            if is_selected {
                let blink = (s.tick / 5) % 2 == 0;
                let arrow = if blink { "▸" } else { " " };
                self.front.fill_row(row, 0, 50.min(self.front.width), cursor_bg);
                self.front.put_str(2, row, arrow, GREEN, cursor_bg);
                let fg = if unlocked { GREEN } else { DIM };
                self.front.put_str(4, row, &line, fg, cursor_bg);
            } else {
                let fg = if unlocked { Color::White } else { DIM };
                self.front.put_str(4, row, &line, fg, Color::Reset);
            }
        }

        let footer = list_top + levels.len() + 2;
        self.front.put_str(2, footer, "  ENTER: Start   ↑↓: Select   ESC: Back", DIM, Color::Reset);
        if !s.message.is_empty() {
            let msg = format!("  ◈ {}", s.message);
            self.front.put_str(2, footer + 1, &msg, GOLD, Color::Reset);
        }
    }

    fn compose_level_clear(&mut self, s: &SessionState, levels: &[LevelDef]) {
        self.compose_hud(s);
        self.compose_board(s, levels, GRID_ROW);

        let grid_h = s.board.rows * (TILE_H + TILE_GAP_Y);
        let row = GRID_ROW + grid_h + 1;
        let box_art = [
            "╔══════════════════════════════╗",
            "║      ★  LEVEL  CLEAR!  ★     ║",
            "╚══════════════════════════════╝",
        ];
        for (i, l) in box_art.iter().enumerate() {
            self.front.put_str(4, row + i, l, GOLD, Color::Reset);
        }
        let score = format!("◈ Score: {}   Time: {}", s.scoring.score(), fmt_secs(s.timer.elapsed()));
        self.front.put_str(6, row + 4, &score, Color::White, Color::Reset);
        let target = if s.scoring.has_reached_target() {
            "◈ Target reached!"
        } else {
            "◈ Target missed (level still clear)"
        };
        self.front.put_str(6, row + 5, target, GREEN, Color::Reset);

        let secs = (s.complete_timer as u64 * s.timing.tick_rate_ms).div_ceil(1000);
        let advance = format!("▸ Next level in {}s  (ENTER to skip)", secs);
        self.front.put_str(6, row + 7, &advance, CYAN, Color::Reset);
    }

    fn compose_failed(&mut self, s: &SessionState, levels: &[LevelDef]) {
        self.compose_hud(s);
        self.compose_board(s, levels, GRID_ROW);

        let grid_h = s.board.rows * (TILE_H + TILE_GAP_Y);
        let row = GRID_ROW + grid_h + 1;
        let box_art = [
            "╔══════════════════════════════╗",
            "║      ✕  TIME  IS  UP  ✕      ║",
            "╚══════════════════════════════╝",
        ];
        for (i, l) in box_art.iter().enumerate() {
            self.front.put_str(4, row + i, l, RED, Color::Reset);
        }
        let score = format!("◈ Score: {}", s.scoring.score());
        self.front.put_str(6, row + 4, &score, Color::White, Color::Reset);
        self.front.put_str(6, row + 6, "▸ R / ENTER: Retry", GREEN, Color::Reset);
        self.front.put_str(6, row + 7, "▸ ESC:       Back to Title", DIM, Color::Reset);
    }

    fn compose_all_clear(&mut self, s: &SessionState) {
        let box_art = [
            "╔══════════════════════════════════════════╗",
            "║   ★  EVERY  PAIR  FOUND!  ALL  CLEAR! ★  ║",
            "╚══════════════════════════════════════════╝",
        ];
        for (i, l) in box_art.iter().enumerate() {
            self.front.put_str(4, 4 + i, l, GOLD, Color::Reset);
        }
        let score = format!("◈ Final Score: {}", s.scoring.score());
        let levels = format!("◈ All {} levels cleared!", s.total_levels);
        self.front.put_str(6, 9, &score, Color::White, Color::Reset);
        self.front.put_str(6, 10, &levels, GREEN, Color::Reset);
        self.front.put_str(6, 12, "▸ ENTER / ESC: Back to Title", GREEN, Color::Reset);
    }
}

fn fmt_secs(secs: f32) -> String {
    let total = secs.max(0.0) as u32;
    format!("{:02}:{:02}", total / 60, total % 60)
}
