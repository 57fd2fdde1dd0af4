/// Save and load player progress.
///
/// One file, `progress.dat`, holds the whole career: last level played,
/// last score, the highest unlocked level, and a per-level record line.
/// Writes always go read-merge-write so finishing level 3 never clobbers
/// the best score stored for level 7.
///
/// ## File format:
///   Key-value lines.
///   ```
///   current_level=3
///   score=1250
///   highest_unlocked=4
///   level=3,1250,1
///   level=1,400,1
///   ```
///   A `level=` line is `number,best_score,completed`.

use std::path::PathBuf;

// ══════════════════════════════════════════════════════════════
// Public types
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Progress {
    /// 1-based number of the level last played.
    pub current_level: usize,
    /// Score at the time of the last write.
    pub score: i32,
    /// 1-based; levels up to and including this are playable.
    pub highest_unlocked: usize,
    pub levels: Vec<LevelRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelRecord {
    pub level_number: usize,
    pub best_score: i32,
    pub completed: bool,
}

impl Default for Progress {
    fn default() -> Self {
        Progress {
            current_level: 1,
            score: 0,
            highest_unlocked: 1,
            levels: vec![],
        }
    }
}

impl Progress {
    pub fn record(&self, level_number: usize) -> Option<&LevelRecord> {
        self.levels.iter().find(|r| r.level_number == level_number)
    }

    pub fn is_unlocked(&self, level_number: usize) -> bool {
        level_number <= self.highest_unlocked
    }

    /// Merge a finished level into this progress. Raises the unlock
    /// ceiling and the per-level best; never lowers either. Records for
    /// other levels are untouched.
    pub fn merge_level_result(&mut self, level_number: usize, score: i32, completed: bool) {
        self.current_level = level_number;
        self.score = score;

        if completed {
            self.highest_unlocked = self.highest_unlocked.max(level_number + 1);
        }

        match self.levels.iter_mut().find(|r| r.level_number == level_number) {
            Some(rec) => {
                rec.best_score = rec.best_score.max(score);
                rec.completed = rec.completed || completed;
            }
            None => {
                self.levels.push(LevelRecord {
                    level_number,
                    best_score: score,
                    completed,
                });
            }
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Paths
// ══════════════════════════════════════════════════════════════

const PROGRESS_FILE: &str = "progress.dat";

fn save_dir() -> PathBuf {
    // 1. Try exe directory (works for local/portable installs)
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            // Check if writable (system installs like /usr/games/ won't be)
            let test_path = parent.join(".write_test_pairdown");
            if std::fs::write(&test_path, "").is_ok() {
                let _ = std::fs::remove_file(&test_path);
                return parent.to_path_buf();
            }
        }
    }

    // 2. XDG data home (~/.local/share/pairdown) for system installs
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/pairdown");
        if std::fs::create_dir_all(&xdg).is_ok() {
            return xdg;
        }
    }

    // 3. Fallback to CWD
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

fn progress_path() -> PathBuf {
    save_dir().join(PROGRESS_FILE)
}

// ══════════════════════════════════════════════════════════════
// Operations
// ══════════════════════════════════════════════════════════════

pub fn load_progress() -> Option<Progress> {
    let candidates = [progress_path(), PathBuf::from(PROGRESS_FILE)];
    for path in &candidates {
        if let Ok(content) = std::fs::read_to_string(path) {
            return parse_progress(&content);
        }
    }
    None
}

pub fn save_progress(progress: &Progress) -> Result<(), String> {
    let path = progress_path();
    std::fs::write(&path, serialize(progress)).map_err(|e| format!("Save failed: {}", e))
}

/// Read-merge-write a finished (or abandoned) level result.
pub fn record_level_result(
    level_number: usize,
    score: i32,
    completed: bool,
) -> Result<Progress, String> {
    let mut progress = load_progress().unwrap_or_default();
    progress.merge_level_result(level_number, score, completed);
    save_progress(&progress)?;
    Ok(progress)
}

pub fn has_progress() -> bool {
    let candidates = [progress_path(), PathBuf::from(PROGRESS_FILE)];
    candidates.iter().any(|p| p.exists())
}

pub fn delete_progress() {
    let _ = std::fs::remove_file(progress_path());
    let _ = std::fs::remove_file(PROGRESS_FILE);
}

// ══════════════════════════════════════════════════════════════
// Serialization
// ══════════════════════════════════════════════════════════════

fn serialize(p: &Progress) -> String {
    let mut out = String::with_capacity(256);
    out.push_str(&format!("current_level={}\n", p.current_level));
    out.push_str(&format!("score={}\n", p.score));
    out.push_str(&format!("highest_unlocked={}\n", p.highest_unlocked));
    for rec in &p.levels {
        out.push_str(&format!(
            "level={},{},{}\n",
            rec.level_number,
            rec.best_score,
            if rec.completed { 1 } else { 0 }
        ));
    }
    out
}

fn parse_progress(content: &str) -> Option<Progress> {
    let mut current_level = None;
    let mut score = None;
    let mut highest_unlocked = None;
    let mut levels: Vec<LevelRecord> = vec![];

    for line in content.lines() {
        let line = line.trim();
        if let Some(val) = line.strip_prefix("current_level=") {
            current_level = val.parse().ok();
        } else if let Some(val) = line.strip_prefix("score=") {
            score = val.parse().ok();
        } else if let Some(val) = line.strip_prefix("highest_unlocked=") {
            highest_unlocked = val.parse().ok();
        } else if let Some(val) = line.strip_prefix("level=") {
            if let Some(rec) = parse_record(val) {
                // Last line wins on duplicates.
                levels.retain(|r| r.level_number != rec.level_number);
                levels.push(rec);
            }
        }
    }

    Some(Progress {
        current_level: current_level?,
        score: score?,
        highest_unlocked: highest_unlocked?,
        levels,
    })
}

fn parse_record(val: &str) -> Option<LevelRecord> {
    let p: Vec<&str> = val.split(',').collect();
    if p.len() < 3 {
        return None;
    }
    Some(LevelRecord {
        level_number: p[0].trim().parse().ok()?,
        best_score: p[1].trim().parse().ok()?,
        completed: p[2].trim() == "1",
    })
}
