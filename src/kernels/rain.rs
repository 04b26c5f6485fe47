//! Digital rain: one falling stream per column over a fading brightness field.

use super::{FrameClock, Kernel, KernelKind};
use crate::config::{RainConfig, Settings};
use crate::render::{GlyphFrame, Rgb};
use crate::surface::{GlyphMetrics, GridSize, Placement, ResizePolicy, JITTER_TOLERANCE_PX};
use crossterm::event::KeyCode;
use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};
use std::ops::Range;

pub(crate) const FADE_PER_TICK: f32 = 0.015;
pub(crate) const FLICKER_CHANCE: f64 = 0.05;
/// Only cells brighter than this flicker.
const FLICKER_FLOOR: f32 = 0.5;
/// Cells brighter than this show their own glyph; dimmer ones use the ramp.
const HEAD_THRESHOLD: f32 = 0.8;
/// Rows a stream may fall past the bottom edge before it respawns.
pub(crate) const RESPAWN_MARGIN: f32 = 20.0;
const RESPAWN_OFFSET: Range<f32> = -10.0..0.0;
const SPEED: Range<f32> = 0.05..0.2;
const GAMMA: f32 = 1.6;

const DENSITY_RAMP: [char; 10] = [' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];
pub(crate) const ASCII_SYMBOLS: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789$+-*/=%\"'#&_(),.;:?!\\|{}<>[]^~";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Alphabet {
    Ascii,
    /// Half-width katakana, so each symbol stays one cell wide.
    Katakana,
}

impl Alphabet {
    fn next(self) -> Alphabet {
        match self {
            Alphabet::Ascii => Alphabet::Katakana,
            Alphabet::Katakana => Alphabet::Ascii,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Alphabet::Ascii => "ascii",
            Alphabet::Katakana => "katakana",
        }
    }

    pub(crate) fn pick(self, rng: &mut StdRng) -> char {
        match self {
            Alphabet::Ascii => {
                let bytes = ASCII_SYMBOLS.as_bytes();
                bytes[rng.gen_range(0..bytes.len())] as char
            }
            Alphabet::Katakana => {
                let code = rng.gen_range(0xFF66u32..=0xFF9Du32);
                char::from_u32(code).unwrap_or('?')
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Theme {
    Green,
    Purple,
    Amber,
    Ice,
}

impl Theme {
    fn next(self) -> Theme {
        match self {
            Theme::Green => Theme::Purple,
            Theme::Purple => Theme::Amber,
            Theme::Amber => Theme::Ice,
            Theme::Ice => Theme::Green,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Theme::Green => "green",
            Theme::Purple => "purple",
            Theme::Amber => "amber",
            Theme::Ice => "ice",
        }
    }

    fn head(self) -> Rgb {
        match self {
            Theme::Green => Rgb::new(200, 255, 200),
            Theme::Purple => Rgb::new(245, 205, 255),
            Theme::Amber => Rgb::new(255, 235, 180),
            Theme::Ice => Rgb::new(200, 245, 255),
        }
    }

    /// Trail colour for a brightness in `[0, 1]`.
    fn tail(self, value: f32) -> Rgb {
        let fade = value.clamp(0.0, 1.0).powf(GAMMA);
        let i = (220.0 * fade + 28.0) as u8;
        match self {
            Theme::Green => Rgb::new(0, i, 0),
            Theme::Purple => Rgb::new((i as f32 * 0.65) as u8, 0, i),
            Theme::Amber => Rgb::new(i, (i as f32 * 0.70) as u8, 0),
            Theme::Ice => Rgb::new(0, (i as f32 * 0.85) as u8, i),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct RainCell {
    pub(crate) value: f32,
    pub(crate) ch: char,
}

impl Default for RainCell {
    fn default() -> Self {
        Self { value: 0.0, ch: ' ' }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Stream {
    pub(crate) column: usize,
    /// Head row; fractional and may sit above or below the grid.
    pub(crate) y: f32,
    pub(crate) speed: f32,
}

impl Stream {
    fn spawn(column: usize, rows: usize, rng: &mut StdRng) -> Self {
        Self {
            column,
            y: -rng.gen::<f32>() * rows as f32,
            speed: rng.gen_range(SPEED),
        }
    }

    fn respawn(&mut self, rng: &mut StdRng) {
        self.y = rng.gen_range(RESPAWN_OFFSET);
        self.speed = rng.gen_range(SPEED);
    }
}

fn trail_glyph(value: f32) -> char {
    let last = DENSITY_RAMP.len() - 1;
    let idx = ((value / HEAD_THRESHOLD) * last as f32).floor().max(0.0) as usize;
    DENSITY_RAMP[idx.min(last)]
}

pub(crate) struct RainKernel {
    cfg: RainConfig,
    rng: StdRng,
    grid: GridSize,
    cells: Vec<RainCell>,
    streams: Vec<Stream>,
}

impl RainKernel {
    pub(crate) fn new(cfg: RainConfig, rng: StdRng) -> Self {
        Self {
            cfg,
            rng,
            grid: GridSize::default(),
            cells: Vec::new(),
            streams: Vec::new(),
        }
    }

    fn reseed(&mut self) {
        let rows = self.grid.rows;
        self.cells.clear();
        self.cells.resize(self.grid.area(), RainCell::default());
        self.streams = (0..self.grid.cols)
            .map(|column| Stream::spawn(column, rows, &mut self.rng))
            .collect();
    }

    fn age(&mut self) {
        let alphabet = self.cfg.alphabet;
        for cell in self.cells.iter_mut() {
            if cell.value <= 0.0 {
                continue;
            }
            cell.value -= FADE_PER_TICK;
            if cell.value <= 0.0 {
                *cell = RainCell::default();
            } else if cell.value > FLICKER_FLOOR && self.rng.gen_bool(FLICKER_CHANCE) {
                cell.ch = alphabet.pick(&mut self.rng);
            }
        }
    }

    fn advance(&mut self) {
        let grid = self.grid;
        let alphabet = self.cfg.alphabet;
        for stream in self.streams.iter_mut() {
            stream.y += stream.speed;
            let row = stream.y.floor() as i64;
            if grid.contains(stream.column as i64, row) {
                let i = grid.index(stream.column, row as usize);
                self.cells[i] = RainCell {
                    value: 1.0,
                    ch: alphabet.pick(&mut self.rng),
                };
            }
            if stream.y > grid.rows as f32 + RESPAWN_MARGIN {
                stream.respawn(&mut self.rng);
            }
        }
    }
}

impl Kernel for RainKernel {
    fn kind(&self) -> KernelKind {
        KernelKind::Rain
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
        self.reseed();
    }

    fn tick(&mut self, _clock: FrameClock) {
        if self.grid.is_empty() {
            return;
        }
        self.age();
        self.advance();
    }

    fn render(&self, frame: &mut GlyphFrame) {
        let grid = self.grid;
        for row in 0..grid.rows {
            for col in 0..grid.cols {
                let cell = self.cells[grid.index(col, row)];
                if cell.value <= 0.0 {
                    continue;
                }
                let head = cell.value > HEAD_THRESHOLD;
                let ch = if head { cell.ch } else { trail_glyph(cell.value) };
                if ch == ' ' {
                    continue;
                }
                let color = self.cfg.shaded.then(|| {
                    if head {
                        self.cfg.theme.head()
                    } else {
                        self.cfg.theme.tail(cell.value / HEAD_THRESHOLD)
                    }
                });
                frame.set(col, row, ch, color);
            }
        }
    }

    fn key(&mut self, key: KeyCode) -> bool {
        match key {
            KeyCode::Char('a') => self.cfg.alphabet = self.cfg.alphabet.next(),
            KeyCode::Char('c') => self.cfg.theme = self.cfg.theme.next(),
            KeyCode::Char('g') => self.cfg.shaded = !self.cfg.shaded,
            KeyCode::Char('r') => self.reseed(),
            _ => return false,
        }
        true
    }

    fn status(&self) -> String {
        format!(
            "{} streams  {}  {}{}  [a]lphabet [c]olour [g]lyph shading [r]eseed",
            self.streams.len(),
            self.cfg.alphabet.name(),
            self.cfg.theme.name(),
            if self.cfg.shaded { " shaded" } else { "" },
        )
    }

    fn export(&self, settings: &mut Settings) {
        settings.rain = self.cfg.clone();
    }
}
