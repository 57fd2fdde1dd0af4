/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.

use serde::Deserialize;
use std::path::PathBuf;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub timing: TimingConfig,
    pub levels_file: String,
}

/// Fixed-step timing knobs shared by the whole simulation.
#[derive(Clone, Copy, Debug)]
pub struct TimingConfig {
    pub tick_rate_ms: u64,
    /// Ticks a flip animation takes (reveal and hide alike).
    pub flip_ticks: u32,
    /// Ticks a freshly formed pair sits locked before comparison.
    pub settle_ticks: u32,
    /// Ticks the level-clear screen shows before auto-advance.
    pub complete_pause_ticks: u32,
}

impl TimingConfig {
    pub fn dt_secs(&self) -> f32 {
        self.tick_rate_ms as f32 / 1000.0
    }

    /// Convert a duration in seconds to ticks, at least one.
    pub fn secs_to_ticks(&self, secs: f32) -> u32 {
        let ticks = (secs * 1000.0 / self.tick_rate_ms as f32).round() as u32;
        ticks.max(1)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            tick_rate_ms: default_tick_rate(),
            flip_ticks: default_flip_ticks(),
            settle_ticks: default_settle_ticks(),
            complete_pause_ticks: default_complete_pause(),
        }
    }
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    timing: TomlTiming,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlTiming {
    #[serde(default = "default_tick_rate")]
    tick_rate_ms: u64,
    #[serde(default = "default_flip_ticks")]
    flip_ticks: u32,
    #[serde(default = "default_settle_ticks")]
    settle_ticks: u32,
    #[serde(default = "default_complete_pause")]
    complete_pause_ticks: u32,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels_file")]
    levels_file: String,
}

// ── Defaults ──

fn default_tick_rate() -> u64 { 50 }
fn default_flip_ticks() -> u32 { 4 }      // 200ms flip at 50ms tick
fn default_settle_ticks() -> u32 { 6 }    // 300ms settle before comparison
fn default_complete_pause() -> u32 { 60 } // 3s result screen
fn default_levels_file() -> String { "levels.toml".into() }

impl Default for TomlTiming {
    fn default() -> Self {
        TomlTiming {
            tick_rate_ms: default_tick_rate(),
            flip_ticks: default_flip_ticks(),
            settle_ticks: default_settle_ticks(),
            complete_pause_ticks: default_complete_pause(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            levels_file: default_levels_file(),
        }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);

        GameConfig {
            timing: TimingConfig {
                tick_rate_ms: toml_cfg.timing.tick_rate_ms.max(1),
                flip_ticks: toml_cfg.timing.flip_ticks.max(1),
                settle_ticks: toml_cfg.timing.settle_ticks.max(1),
                complete_pause_ticks: toml_cfg.timing.complete_pause_ticks,
            },
            levels_file: toml_cfg.general.levels_file,
        }
    }
}

/// Candidate directories to search: exe dir + CWD + system paths (deduplicated).
pub fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        // Resolve symlinks so a /usr/bin shim still finds data relative
        // to the real binary.
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    // 3. XDG data home (~/.local/share/pairdown)
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/pairdown");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    // 4. System data directory (/usr/share/pairdown)
    let sys = PathBuf::from("/usr/share/pairdown");
    if sys.is_dir() && !dirs.iter().any(|d| d == &sys) {
        dirs.push(sys);
    }

    // 5. Fallback
    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        eprintln!("Warning: config.toml parse error: {e}");
                        eprintln!("Using default settings.");
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    eprintln!("Warning: could not read {}: {e}", path.display());
                }
            }
        }
    }
    TomlConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_toml_empty() {
        let cfg: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.timing.tick_rate_ms, 50);
        assert_eq!(cfg.timing.flip_ticks, 4);
        assert_eq!(cfg.general.levels_file, "levels.toml");
    }

    #[test]
    fn partial_toml_fills_missing_keys() {
        let cfg: TomlConfig = toml::from_str("[timing]\ntick_rate_ms = 25\n").unwrap();
        assert_eq!(cfg.timing.tick_rate_ms, 25);
        assert_eq!(cfg.timing.settle_ticks, 6);
    }

    #[test]
    fn secs_to_ticks_rounds_and_floors_at_one() {
        let t = TimingConfig::default();
        assert_eq!(t.secs_to_ticks(0.6), 12);
        assert_eq!(t.secs_to_ticks(0.0), 1);
        assert_eq!(t.secs_to_ticks(0.024), 1);
    }
}
