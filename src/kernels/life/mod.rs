//! Life-like cellular automaton with pointer painting and editable rules.

mod grid;
mod paint;
mod rules;

pub(crate) use grid::{LifeCell, LifeGrid};
pub(crate) use rules::{active_preset, parse_rule, RuleSet};

use super::{FrameClock, Kernel, KernelKind, PointerEvent};
use crate::config::{LifeConfig, Settings};
use crate::render::{GlyphFrame, INK};
use crate::surface::{Anchor, GlyphMetrics, Placement, ResizePolicy};
use crossterm::event::KeyCode;
use log::info;
use paint::Brush;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SOLID: char = '█';
const INTERVAL_STEP_MS: u64 = 10;
const DENSITY_STEP: f32 = 0.02;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum CellStyle {
    /// Solid block per live cell.
    Square,
    /// Each live cell shows its own glyph.
    Ascii,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Birth,
    Survival,
}

pub(crate) struct LifeKernel {
    cfg: LifeConfig,
    rng: StdRng,
    placement: Option<Placement>,
    grid: LifeGrid,
    brush: Brush,
    last_update: Duration,
    generation: u64,
    armed: Option<Side>,
}

impl LifeKernel {
    pub(crate) fn new(mut cfg: LifeConfig, rng: StdRng) -> Self {
        cfg.set_interval_ms(cfg.interval_ms);
        cfg.set_density(cfg.density);
        Self {
            cfg,
            rng,
            placement: None,
            grid: LifeGrid::default(),
            brush: Brush::default(),
            last_update: Duration::ZERO,
            generation: 0,
            armed: None,
        }
    }

    /// New random generation on the current grid.
    fn new_game(&mut self) {
        self.grid = LifeGrid::seeded(self.grid.size(), self.cfg.density, &mut self.rng);
        self.generation = 0;
    }

    /// Canonical rules plus a fresh generation.
    fn reset(&mut self) {
        self.cfg.rules = RuleSet::CONWAY;
        info!("life rules reset to {}", self.cfg.rules);
        self.new_game();
    }

    fn set_rules(&mut self, rules: RuleSet) {
        self.cfg.rules = rules;
        match active_preset(&rules) {
            Some(p) => info!("life rules {} ({})", rules, p.name),
            None => info!("life rules {}", rules),
        }
    }

    fn paint(&mut self, cell: (usize, usize)) {
        for (col, row) in self.brush.stroke_to(cell) {
            self.grid.set_alive(col, row, &mut self.rng);
        }
    }

    fn cell_at(&self, x: f32, y: f32) -> Option<(usize, usize)> {
        self.placement.and_then(|p| p.cell_at(x, y))
    }

    fn glyph_for(&self, cell: &LifeCell) -> char {
        match self.cfg.style {
            CellStyle::Square => SOLID,
            CellStyle::Ascii => cell.ch,
        }
    }

    fn nudge_density(&mut self, delta: f32) {
        self.cfg.set_density(self.cfg.density + delta);
        self.new_game();
    }
}

impl Kernel for LifeKernel {
    fn kind(&self) -> KernelKind {
        KernelKind::Life
    }

    fn resize_policy(&self) -> ResizePolicy {
        ResizePolicy::Exact
    }

    fn anchor(&self) -> Anchor {
        Anchor::Top
    }

    fn glyph(&self) -> Option<GlyphMetrics> {
        self.cfg.glyph
    }

    fn set_glyph(&mut self, glyph: Option<GlyphMetrics>) {
        self.cfg.glyph = glyph;
    }

    fn reinit(&mut self, placement: Placement) {
        self.placement = Some(placement);
        self.grid = LifeGrid::seeded(placement.grid, self.cfg.density, &mut self.rng);
        self.brush = Brush::default();
        self.last_update = Duration::ZERO;
        self.generation = 0;
    }

    fn tick(&mut self, clock: FrameClock) {
        if self.grid.size().is_empty() {
            return;
        }
        let interval = Duration::from_millis(self.cfg.interval_ms);
        if clock.now.saturating_sub(self.last_update) < interval {
            return;
        }
        self.last_update = clock.now;
        if self.brush.is_down() {
            return;
        }
        self.grid.step(&self.cfg.rules, &mut self.rng);
        self.generation += 1;
    }

    fn render(&self, frame: &mut GlyphFrame) {
        let size = self.grid.size();
        let hover = self.brush.hover();
        for row in 0..size.rows {
            for col in 0..size.cols {
                let Some(cell) = self.grid.cell(col, row) else {
                    continue;
                };
                let ch = self.glyph_for(cell);
                if cell.alive {
                    frame.set(col, row, ch, None);
                } else if hover == Some((col, row)) {
                    frame.set(col, row, ch, Some(INK.scale(0.5)));
                } else if self.cfg.trails && cell.previous {
                    frame.set(col, row, ch, Some(INK.scale(0.3)));
                }
            }
        }
    }

    fn pointer(&mut self, event: PointerEvent) {
        match event {
            PointerEvent::Down { x, y } => {
                self.brush.press();
                let cell = self.cell_at(x, y);
                self.brush.set_hover(cell);
                if let Some(cell) = cell {
                    self.paint(cell);
                }
            }
            PointerEvent::Move { x, y } => {
                let cell = self.cell_at(x, y);
                self.brush.set_hover(cell);
                if let (true, Some(cell)) = (self.brush.is_down(), cell) {
                    self.paint(cell);
                }
            }
            PointerEvent::Up => self.brush.release(),
            PointerEvent::Leave => self.brush.leave(),
        }
    }

    fn key(&mut self, key: KeyCode) -> bool {
        if let Some(side) = self.armed {
            self.armed = None;
            if let KeyCode::Char(c @ '0'..='8') = key {
                let n = c as u8 - b'0';
                let mut rules = self.cfg.rules;
                match side {
                    Side::Birth => rules.birth.toggle(n),
                    Side::Survival => rules.survival.toggle(n),
                }
                self.set_rules(rules);
                return true;
            }
            if key == KeyCode::Esc {
                return true;
            }
        }
        match key {
            KeyCode::Char('b') => self.armed = Some(Side::Birth),
            KeyCode::Char('s') => self.armed = Some(Side::Survival),
            KeyCode::Char('p') => self.set_rules(rules::next_preset(&self.cfg.rules).rules),
            KeyCode::Char('r') => self.reset(),
            KeyCode::Char('n') => self.new_game(),
            KeyCode::Char('+') | KeyCode::Char('=') => self
                .cfg
                .set_interval_ms(self.cfg.interval_ms.saturating_sub(INTERVAL_STEP_MS)),
            KeyCode::Char('-') => self.cfg.set_interval_ms(self.cfg.interval_ms + INTERVAL_STEP_MS),
            KeyCode::Char(']') => self.nudge_density(DENSITY_STEP),
            KeyCode::Char('[') => self.nudge_density(-DENSITY_STEP),
            KeyCode::Char('v') => {
                self.cfg.style = match self.cfg.style {
                    CellStyle::Square => CellStyle::Ascii,
                    CellStyle::Ascii => CellStyle::Square,
                }
            }
            KeyCode::Char('t') => self.cfg.trails = !self.cfg.trails,
            _ => return false,
        }
        true
    }

    fn status(&self) -> String {
        let preset = active_preset(&self.cfg.rules).map_or("custom", |p| p.name);
        let armed = match self.armed {
            Some(Side::Birth) => "  birth? 0-8",
            Some(Side::Survival) => "  survival? 0-8",
            None => "",
        };
        format!(
            "{} {}  gen {}  pop {}  {}ms  density {:.2}{}{}  [p]reset [r]eset [n]ew [b]/[s]+digit",
            self.cfg.rules,
            preset,
            self.generation,
            self.grid.population(),
            self.cfg.interval_ms,
            self.cfg.density,
            if self.brush.is_down() { "  painting" } else { "" },
            armed,
        )
    }

    fn export(&self, settings: &mut Settings) {
        settings.life = self.cfg.clone();
    }
}
