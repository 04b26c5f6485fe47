use crate::kernels::fire::FLAME_RAMP;
use crate::kernels::life::{CellStyle, RuleSet};
use crate::kernels::rain::{Alphabet, Theme};
use crate::kernels::video::Ramp;
use crate::kernels::KernelKind;
use crate::surface::GlyphMetrics;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Settings {
    pub(crate) fps_cap: u32,
    pub(crate) start_mode: KernelKind,
    /// Fixed RNG seed; `None` seeds from entropy.
    pub(crate) seed: Option<u64>,
    pub(crate) hud: bool,
    pub(crate) video: VideoConfig,
    pub(crate) rain: RainConfig,
    pub(crate) life: LifeConfig,
    pub(crate) fire: FireConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fps_cap: 60,
            start_mode: KernelKind::Video,
            seed: None,
            hud: true,
            video: VideoConfig::default(),
            rain: RainConfig::default(),
            life: LifeConfig::default(),
            fire: FireConfig::default(),
        }
    }
}

/// Luminance mapper knobs. All but `glyph` apply on the next tick.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct VideoConfig {
    /// GIF, still image or directory of stills. `None` plays the test pattern.
    pub(crate) source: Option<PathBuf>,
    pub(crate) ramp: Ramp,
    /// Adjusted brightness below this renders blank.
    pub(crate) dark_threshold: u8,
    pub(crate) contrast: f32,
    pub(crate) invert: bool,
    pub(crate) color: bool,
    pub(crate) reverse: bool,
    /// Glyph width over line height; rows are oversampled by its inverse.
    pub(crate) char_aspect: f32,
    pub(crate) glyph: Option<GlyphMetrics>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            source: None,
            ramp: Ramp::Classic,
            dark_threshold: 30,
            contrast: 1.0,
            invert: false,
            color: false,
            reverse: false,
            char_aspect: 0.5,
            glyph: None,
        }
    }
}

impl VideoConfig {
    pub(crate) const CONTRAST_RANGE: (f32, f32) = (0.1, 5.0);

    pub(crate) fn set_contrast(&mut self, contrast: f32) {
        let (lo, hi) = Self::CONTRAST_RANGE;
        self.contrast = contrast.clamp(lo, hi);
    }

    pub(crate) fn nudge_threshold(&mut self, delta: i16) {
        self.dark_threshold = (self.dark_threshold as i16 + delta).clamp(0, 255) as u8;
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct RainConfig {
    pub(crate) alphabet: Alphabet,
    pub(crate) theme: Theme,
    pub(crate) shaded: bool,
    pub(crate) glyph: Option<GlyphMetrics>,
}

impl Default for RainConfig {
    fn default() -> Self {
        Self {
            alphabet: Alphabet::Ascii,
            theme: Theme::Green,
            shaded: false,
            glyph: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct LifeConfig {
    pub(crate) rules: RuleSet,
    pub(crate) interval_ms: u64,
    /// Probability that a cell starts alive on reseed.
    pub(crate) density: f32,
    pub(crate) style: CellStyle,
    pub(crate) trails: bool,
    pub(crate) glyph: Option<GlyphMetrics>,
}

impl Default for LifeConfig {
    fn default() -> Self {
        Self {
            rules: RuleSet::CONWAY,
            interval_ms: 100,
            density: 0.1,
            style: CellStyle::Square,
            trails: false,
            glyph: None,
        }
    }
}

impl LifeConfig {
    pub(crate) const INTERVAL_RANGE_MS: (u64, u64) = (20, 500);
    pub(crate) const DENSITY_RANGE: (f32, f32) = (0.01, 0.5);

    pub(crate) fn set_interval_ms(&mut self, ms: u64) {
        let (lo, hi) = Self::INTERVAL_RANGE_MS;
        self.interval_ms = ms.clamp(lo, hi);
    }

    pub(crate) fn set_density(&mut self, density: f32) {
        let (lo, hi) = Self::DENSITY_RANGE;
        self.density = density.clamp(lo, hi);
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct FireConfig {
    /// Inclusive lateral drift range, in columns, for each upward step.
    pub(crate) drift_min: i32,
    pub(crate) drift_max: i32,
    /// Probability that a step loses one intensity level.
    pub(crate) decay_chance: f64,
    /// The buffer advances on every n-th rendered frame.
    pub(crate) update_every: u32,
    pub(crate) palette: bool,
    pub(crate) ramp: String,
    pub(crate) glyph: Option<GlyphMetrics>,
}

impl Default for FireConfig {
    fn default() -> Self {
        Self {
            drift_min: -1,
            drift_max: 2,
            decay_chance: 0.55,
            update_every: 8,
            palette: false,
            ramp: FLAME_RAMP.to_string(),
            glyph: None,
        }
    }
}

impl FireConfig {
    pub(crate) fn set_drift(&mut self, min: i32, max: i32) {
        self.drift_min = min.min(max);
        self.drift_max = max.max(min);
    }

    pub(crate) fn set_decay_chance(&mut self, p: f64) {
        self.decay_chance = p.clamp(0.0, 1.0);
    }

    pub(crate) fn set_update_every(&mut self, frames: u32) {
        self.update_every = frames.clamp(1, 60);
    }
}

pub(crate) struct Paths {
    pub(crate) settings_path: PathBuf,
    pub(crate) log_path: PathBuf,
}

pub(crate) fn project_paths() -> Result<Paths> {
    let proj = ProjectDirs::from("com", "glyphscape", "Glyphscape")
        .context("could not resolve project directories")?;
    let dir = proj.data_local_dir().to_path_buf();
    fs::create_dir_all(&dir).ok();
    Ok(Paths {
        settings_path: dir.join("settings.json"),
        log_path: dir.join("glyphscape.log"),
    })
}

pub(crate) fn load_settings(path: &Path) -> Settings {
    match fs::read_to_string(path) {
        Ok(s) => match serde_json::from_str::<Settings>(&s) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("ignoring unreadable settings {}: {e}", path.display());
                Settings::default()
            }
        },
        Err(_) => Settings::default(),
    }
}

pub(crate) fn save_settings_atomic(path: &Path, s: &Settings) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let data = serde_json::to_vec_pretty(s)?;
    fs::write(&tmp, data).with_context(|| format!("writing {}", tmp.display()))?;
    atomic_rename(&tmp, path)?;
    Ok(())
}

pub(crate) fn atomic_rename(from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        let _ = fs::remove_file(to);
    }
    fs::rename(from, to).with_context(|| format!("replacing {}", to.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_settings_fill_defaults() {
        let s: Settings =
            serde_json::from_str(r#"{"fps_cap": 30, "life": {"rules": {"birth": [3, 6], "survival": [2, 3]}}}"#)
                .unwrap();
        assert_eq!(s.fps_cap, 30);
        assert_eq!(s.life.rules.to_string(), "B36/S23");
        assert_eq!(s.life.interval_ms, 100);
        assert_eq!(s.life.style, CellStyle::Square);
        assert_eq!(s.video.dark_threshold, 30);
        assert_eq!(s.fire.update_every, 8);
    }

    #[test]
    fn settings_round_trip_through_file() {
        let dir = std::env::temp_dir().join(format!("glyphscape-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.json");

        let mut s = Settings::default();
        s.video.invert = true;
        s.rain.theme = Theme::Amber;
        save_settings_atomic(&path, &s).unwrap();

        let loaded = load_settings(&path);
        assert!(loaded.video.invert);
        assert_eq!(loaded.rain.theme, Theme::Amber);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn setters_clamp() {
        let mut life = LifeConfig::default();
        life.set_interval_ms(5);
        assert_eq!(life.interval_ms, 20);
        life.set_density(0.9);
        assert_eq!(life.density, 0.5);

        let mut video = VideoConfig::default();
        video.nudge_threshold(-100);
        assert_eq!(video.dark_threshold, 0);
        video.set_contrast(100.0);
        assert_eq!(video.contrast, 5.0);

        let mut fire = FireConfig::default();
        fire.set_drift(3, -2);
        assert_eq!((fire.drift_min, fire.drift_max), (-2, 3));
        fire.set_update_every(0);
        assert_eq!(fire.update_every, 1);
    }
}
