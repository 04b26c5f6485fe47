//! Cellular fire: heat seeded along the bottom edge climbs one row per update,
//! drifting sideways and cooling at random.

use super::{FrameClock, Kernel, KernelKind};
use crate::config::{FireConfig, Settings};
use crate::render::{GlyphFrame, Rgb};
use crate::surface::{GlyphMetrics, GridSize, Placement, ResizePolicy, JITTER_TOLERANCE_PX};
use crossterm::event::KeyCode;
use log::debug;
use rand::{rngs::StdRng, Rng};

/// Sparse to dense; the leading blanks keep cool air invisible.
pub(crate) const FLAME_RAMP: &str = "            ..:,/\\|+*#@WM&";

const HEAT_STOPS: [(f32, Rgb); 5] = [
    (0.0, Rgb::new(0, 0, 0)),
    (0.35, Rgb::new(180, 20, 0)),
    (0.6, Rgb::new(255, 110, 0)),
    (0.85, Rgb::new(255, 210, 60)),
    (1.0, Rgb::new(255, 255, 220)),
];

fn heat_color(t: f32) -> Rgb {
    let t = t.clamp(0.0, 1.0);
    for pair in HEAT_STOPS.windows(2) {
        let ((t0, c0), (t1, c1)) = (pair[0], pair[1]);
        if t <= t1 {
            return c0.lerp(c1, (t - t0) / (t1 - t0));
        }
    }
    HEAT_STOPS[HEAT_STOPS.len() - 1].1
}

fn ramp_glyphs(ramp: &str) -> Vec<char> {
    let glyphs: Vec<char> = ramp.chars().take(u8::MAX as usize + 1).collect();
    if glyphs.len() < 2 {
        return FLAME_RAMP.chars().collect();
    }
    glyphs
}

pub(crate) struct FireKernel {
    cfg: FireConfig,
    rng: StdRng,
    ramp: Vec<char>,
    grid: GridSize,
    heat: Vec<u8>,
    frames: u64,
}

impl FireKernel {
    pub(crate) fn new(mut cfg: FireConfig, rng: StdRng) -> Self {
        cfg.set_drift(cfg.drift_min, cfg.drift_max);
        cfg.set_decay_chance(cfg.decay_chance);
        cfg.set_update_every(cfg.update_every);
        let ramp = ramp_glyphs(&cfg.ramp);
        Self {
            cfg,
            rng,
            ramp,
            grid: GridSize::default(),
            heat: Vec::new(),
            frames: 0,
        }
    }

    fn top(&self) -> u8 {
        (self.ramp.len() - 1) as u8
    }

    fn ignite(&mut self) {
        self.heat.clear();
        self.heat.resize(self.grid.area(), 0);
        self.frames = 0;
        if self.grid.is_empty() {
            return;
        }
        let bottom = self.grid.rows - 1;
        let top = self.top();
        for col in 0..self.grid.cols {
            let i = self.grid.index(col, bottom);
            self.heat[i] = top;
        }
    }

    /// Re-rolls the bottom row: mostly near full heat, sometimes a cold gap.
    fn seed_bottom(&mut self) {
        let top = self.top();
        let bottom = self.grid.rows - 1;
        for col in 0..self.grid.cols {
            let value = if self.rng.gen_bool(0.5) {
                top.saturating_sub(self.rng.gen_range(0..3))
            } else if self.rng.gen_bool(0.6) {
                top.saturating_sub(self.rng.gen_range(0..6))
            } else {
                self.rng.gen_range(0..10u8).min(top)
            };
            let i = self.grid.index(col, bottom);
            self.heat[i] = value;
        }
    }

    /// Copies heat from `(col, row)` one row up with drift and decay.
    /// Destinations outside the grid are dropped.
    fn spread(&mut self, col: usize, row: usize) {
        let grid = self.grid;
        let drift = self.rng.gen_range(self.cfg.drift_min..=self.cfg.drift_max);
        let decay = u8::from(self.rng.gen_bool(self.cfg.decay_chance));
        let (dst_col, dst_row) = (col as i64 + drift as i64, row as i64 - 1);
        if !grid.contains(dst_col, dst_row) {
            return;
        }
        let src = self.heat[grid.index(col, row)];
        self.heat[grid.index(dst_col as usize, dst_row as usize)] = src.saturating_sub(decay);
    }

    fn step(&mut self) {
        self.seed_bottom();
        for col in 0..self.grid.cols {
            for row in 1..self.grid.rows {
                self.spread(col, row);
            }
        }
    }

    fn adjust_decay(&mut self, delta: f64) {
        self.cfg.set_decay_chance(self.cfg.decay_chance + delta);
        debug!("fire decay chance {:.2}", self.cfg.decay_chance);
    }
}

impl Kernel for FireKernel {
    fn kind(&self) -> KernelKind {
        KernelKind::Fire
    }

    fn resize_policy(&self) -> ResizePolicy {
        ResizePolicy::Tolerance(JITTER_TOLERANCE_PX)
    }

    fn glyph(&self) -> Option<GlyphMetrics> {
        self.cfg.glyph
    }

    fn set_glyph(&mut self, glyph: Option<GlyphMetrics>) {
        self.cfg.glyph = glyph;
    }

    fn reinit(&mut self, placement: Placement) {
        self.grid = placement.grid;
        self.ignite();
    }

    fn tick(&mut self, _clock: FrameClock) {
        if self.grid.is_empty() {
            return;
        }
        self.frames += 1;
        if self.frames % self.cfg.update_every as u64 == 0 {
            self.step();
        }
    }

    fn render(&self, frame: &mut GlyphFrame) {
        let grid = self.grid;
        let top = self.top() as f32;
        for row in 0..grid.rows {
            for col in 0..grid.cols {
                let heat = self.heat[grid.index(col, row)];
                let ch = self.ramp.get(heat as usize).copied().unwrap_or(' ');
                if ch == ' ' {
                    continue;
                }
                let color = self.cfg.palette.then(|| heat_color(heat as f32 / top));
                frame.set(col, row, ch, color);
            }
        }
    }

    fn key(&mut self, key: KeyCode) -> bool {
        match key {
            KeyCode::Char('p') => self.cfg.palette = !self.cfg.palette,
            KeyCode::Char('[') => self.adjust_decay(-0.05),
            KeyCode::Char(']') => self.adjust_decay(0.05),
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.cfg.set_update_every(self.cfg.update_every.saturating_sub(1))
            }
            KeyCode::Char('-') => self.cfg.set_update_every(self.cfg.update_every + 1),
            KeyCode::Char('r') => self.ignite(),
            _ => return false,
        }
        true
    }

    fn status(&self) -> String {
        format!(
            "decay {:.2}  drift {}..{}  every {}f{}  [p]alette [/] decay +/- speed [r]eignite",
            self.cfg.decay_chance,
            self.cfg.drift_min,
            self.cfg.drift_max,
            self.cfg.update_every,
            if self.cfg.palette { "  heat" } else { "" },
        )
    }

    fn export(&self, settings: &mut Settings) {
        settings.fire = self.cfg.clone();
    }
}
