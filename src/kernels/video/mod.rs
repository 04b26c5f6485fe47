//! Luminance mapper: cover-crops the current source frame, samples it once per
//! cell and maps perceived brightness onto a glyph ramp.

mod source;

pub(crate) use source::{DecodedSource, PatternSource, Readiness, VideoSource};

use super::{FrameClock, Kernel, KernelKind};
use crate::config::{Settings, VideoConfig};
use crate::render::{GlyphFrame, Rgb};
use crate::surface::{GlyphMetrics, GridSize, Placement, ResizePolicy, JITTER_TOLERANCE_PX};
use crossterm::event::KeyCode;
use image::RgbaImage;
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub(crate) const PLACEHOLDER: &str = "Loading...";
const THRESHOLD_STEP: i16 = 5;
const CONTRAST_STEP: f32 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Ramp {
    Classic,
    Standard,
    Blocks,
    Binary,
    Braille,
}

impl Ramp {
    const ALL: [Ramp; 5] = [Ramp::Classic, Ramp::Standard, Ramp::Blocks, Ramp::Binary, Ramp::Braille];

    /// Glyphs ordered sparse to dense; the first is always blank.
    pub(crate) fn glyphs(self) -> &'static str {
        match self {
            Ramp::Classic => " .`'^,:;l!i><~+_-?]0[}{1|/*#•—%x⁰⁴⁷—⁺⁻⁼₀₁₃₊$&☐‡°®",
            Ramp::Standard => " .:-=+*#%@",
            Ramp::Blocks => " ░▒▓█",
            Ramp::Binary => " 01",
            Ramp::Braille => " ⠁⠃⠇⡇⣇⣧⣷⣿",
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Ramp::Classic => "classic",
            Ramp::Standard => "standard",
            Ramp::Blocks => "blocks",
            Ramp::Binary => "binary",
            Ramp::Braille => "braille",
        }
    }

    fn next(self) -> Ramp {
        let i = Self::ALL.iter().position(|r| *r == self).unwrap_or(0);
        Self::ALL[(i + 1) % Self::ALL.len()]
    }
}

/// Rec. 601 luma on the 0..=255 scale.
pub(crate) fn perceived_brightness(r: u8, g: u8, b: u8) -> f32 {
    (299 * r as u32 + 587 * g as u32 + 114 * b as u32) as f32 / 1000.0
}

/// Brightness adjustment and quantisation, in application order.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ToneMap {
    pub(crate) invert: bool,
    pub(crate) contrast: f32,
    pub(crate) threshold: u8,
}

impl ToneMap {
    pub(crate) fn from_config(cfg: &VideoConfig) -> Self {
        Self {
            invert: cfg.invert,
            contrast: cfg.contrast,
            threshold: cfg.dark_threshold,
        }
    }

    pub(crate) fn adjust(&self, brightness: f32) -> f32 {
        let b = if self.invert { 255.0 - brightness } else { brightness };
        ((b - 128.0) * self.contrast + 128.0).clamp(0.0, 255.0)
    }

    /// Ramp index for `brightness`, or `None` when it falls below the
    /// threshold.
    pub(crate) fn level(&self, brightness: f32, ramp_len: usize) -> Option<usize> {
        if ramp_len == 0 {
            return None;
        }
        let b = self.adjust(brightness);
        let t = self.threshold as f32;
        if b < t {
            return None;
        }
        let norm = if t >= 255.0 { 1.0 } else { (b - t) / (255.0 - t) };
        let last = ramp_len - 1;
        Some(((norm * last as f32).floor() as usize).min(last))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Crop {
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) w: f32,
    pub(crate) h: f32,
}

/// Centre crop of `src` with the aspect ratio of `dst`, keeping the full
/// extent of the tighter dimension. Every dimension is floored at 1.
pub(crate) fn cover_crop(src: (u32, u32), dst: (usize, usize)) -> Crop {
    let (sw, sh) = (src.0.max(1) as f32, src.1.max(1) as f32);
    let dst_aspect = dst.0.max(1) as f32 / dst.1.max(1) as f32;
    if sw / sh > dst_aspect {
        let w = (sh * dst_aspect).max(1.0);
        Crop {
            x: (sw - w) / 2.0,
            y: 0.0,
            w,
            h: sh,
        }
    } else {
        let h = (sw / dst_aspect).max(1.0);
        Crop {
            x: 0.0,
            y: (sh - h) / 2.0,
            w: sw,
            h,
        }
    }
}

pub(crate) fn sample_rows(rows: usize, char_aspect: f32) -> usize {
    ((rows as f32 / char_aspect.max(0.05)).ceil() as usize).max(1)
}

// 2x2 average over the sample footprint; transparent reads as black
fn supersample(img: &RgbaImage, u: f32, v: f32, du: f32, dv: f32) -> [u8; 3] {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return [0; 3];
    }
    let mut acc = [0u32; 3];
    for (ox, oy) in [(-0.25, -0.25), (0.25, -0.25), (-0.25, 0.25), (0.25, 0.25)] {
        let x = ((u + ox * du).max(0.0) as u32).min(w - 1);
        let y = ((v + oy * dv).max(0.0) as u32).min(h - 1);
        let p = img.get_pixel(x, y).0;
        for (a, c) in acc.iter_mut().zip(p) {
            *a += c as u32 * p[3] as u32 / 255;
        }
    }
    acc.map(|c| (c / 4) as u8)
}

pub(crate) fn sample_frame(img: &RgbaImage, grid: GridSize, char_aspect: f32, out: &mut Vec<[u8; 3]>) {
    out.clear();
    if grid.is_empty() {
        return;
    }
    let sample_w = grid.cols;
    let sample_h = sample_rows(grid.rows, char_aspect);
    let crop = cover_crop(img.dimensions(), (sample_w, sample_h));
    let (du, dv) = (crop.w / sample_w as f32, crop.h / sample_h as f32);
    out.reserve(grid.area());
    for row in 0..grid.rows {
        let sy = row * sample_h / grid.rows;
        let v = crop.y + (sy as f32 + 0.5) * dv;
        for col in 0..grid.cols {
            let u = crop.x + (col as f32 + 0.5) * du;
            out.push(supersample(img, u, v, du, dv));
        }
    }
}

pub(crate) fn open_source(cfg: &VideoConfig) -> Box<dyn VideoSource> {
    match &cfg.source {
        Some(path) => Box::new(DecodedSource::spawn(path.clone())),
        None => Box::new(PatternSource::new()),
    }
}

pub(crate) struct VideoKernel {
    cfg: VideoConfig,
    source: Box<dyn VideoSource>,
    ramp: Vec<char>,
    grid: GridSize,
    samples: Vec<[u8; 3]>,
    sampled: bool,
    readiness: Readiness,
    position: Duration,
}

impl VideoKernel {
    pub(crate) fn new(mut cfg: VideoConfig, source: Box<dyn VideoSource>) -> Self {
        cfg.set_contrast(cfg.contrast);
        Self {
            ramp: cfg.ramp.glyphs().chars().collect(),
            cfg,
            source,
            grid: GridSize::default(),
            samples: Vec::new(),
            sampled: false,
            readiness: Readiness::Pending,
            position: Duration::ZERO,
        }
    }

    fn set_ramp(&mut self, ramp: Ramp) {
        self.cfg.ramp = ramp;
        self.ramp = ramp.glyphs().chars().collect();
        debug!("video ramp {}", ramp.name());
    }

    /// Moves the playhead by `dt`, backwards in reverse mode, wrapping at
    /// both ends of the loop.
    fn advance(&mut self, dt: Duration) {
        let total = self.source.duration().as_secs_f64();
        if total <= 0.0 {
            self.position = Duration::ZERO;
            return;
        }
        let step = if self.cfg.reverse { -dt.as_secs_f64() } else { dt.as_secs_f64() };
        let pos = (self.position.as_secs_f64() + step).rem_euclid(total);
        self.position = Duration::from_secs_f64(pos);
    }
}

impl Kernel for VideoKernel {
    fn kind(&self) -> KernelKind {
        KernelKind::Video
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
        self.samples.clear();
        self.sampled = false;
    }

    fn tick(&mut self, clock: FrameClock) {
        self.readiness = self.source.poll();
        if self.grid.is_empty() || self.readiness != Readiness::Ready {
            return;
        }
        self.advance(clock.dt);
        let Some(img) = self.source.frame_at(self.position) else {
            return;
        };
        sample_frame(img, self.grid, self.cfg.char_aspect, &mut self.samples);
        self.sampled = true;
    }

    fn render(&self, frame: &mut GlyphFrame) {
        if !self.sampled {
            return;
        }
        let tone = ToneMap::from_config(&self.cfg);
        let cols = self.grid.cols.max(1);
        for (i, &[r, g, b]) in self.samples.iter().enumerate() {
            let Some(level) = tone.level(perceived_brightness(r, g, b), self.ramp.len()) else {
                continue;
            };
            let ch = self.ramp[level];
            if ch == ' ' {
                continue;
            }
            let color = self.cfg.color.then_some(Rgb::new(r, g, b));
            frame.set(i % cols, i / cols, ch, color);
        }
    }

    fn placeholder(&self) -> Option<String> {
        match &self.readiness {
            Readiness::Failed(msg) => Some(format!("video unavailable: {msg}")),
            _ if !self.sampled => Some(PLACEHOLDER.to_string()),
            _ => None,
        }
    }

    fn key(&mut self, key: KeyCode) -> bool {
        match key {
            KeyCode::Char('m') => self.set_ramp(self.cfg.ramp.next()),
            KeyCode::Char(',') => self.cfg.nudge_threshold(-THRESHOLD_STEP),
            KeyCode::Char('.') => self.cfg.nudge_threshold(THRESHOLD_STEP),
            KeyCode::Char('[') => self.cfg.set_contrast(self.cfg.contrast - CONTRAST_STEP),
            KeyCode::Char(']') => self.cfg.set_contrast(self.cfg.contrast + CONTRAST_STEP),
            KeyCode::Char('i') => self.cfg.invert = !self.cfg.invert,
            KeyCode::Char('c') => self.cfg.color = !self.cfg.color,
            KeyCode::Char('r') => self.cfg.reverse = !self.cfg.reverse,
            _ => return false,
        }
        true
    }

    fn status(&self) -> String {
        let flags: String = [
            (self.cfg.invert, " invert"),
            (self.cfg.color, " color"),
            (self.cfg.reverse, " reverse"),
        ]
        .iter()
        .filter(|(on, _)| *on)
        .map(|(_, name)| *name)
        .collect();
        format!(
            "{}  {}  thr {}  contrast {:.1}{}  [m]ap ,/. thr [/] contrast [i]nv [c]olor [r]ev",
            self.source.describe(),
            self.cfg.ramp.name(),
            self.cfg.dark_threshold,
            self.cfg.contrast,
            flags,
        )
    }

    fn export(&self, settings: &mut Settings) {
        settings.video = self.cfg.clone();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{Anchor, SurfaceSize};
    use image::Rgba;

    struct Still {
        image: RgbaImage,
        ready: bool,
        length: Duration,
    }

    impl VideoSource for Still {
        fn poll(&mut self) -> Readiness {
            if self.ready {
                Readiness::Ready
            } else {
                Readiness::Pending
            }
        }

        fn duration(&self) -> Duration {
            self.length
        }

        fn frame_at(&mut self, _t: Duration) -> Option<&RgbaImage> {
            self.ready.then_some(&self.image)
        }

        fn describe(&self) -> String {
            "still".to_string()
        }
    }

    // left half black, right half white
    fn split_image() -> RgbaImage {
        RgbaImage::from_fn(40, 40, |x, _| {
            if x < 20 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        })
    }

    fn kernel(cfg: VideoConfig, ready: bool, cols: usize, rows: usize) -> VideoKernel {
        let source = Still {
            image: split_image(),
            ready,
            length: Duration::from_secs(1),
        };
        let mut k = VideoKernel::new(cfg, Box::new(source));
        k.reinit(Placement {
            grid: GridSize::new(cols, rows),
            glyph: GlyphMetrics::new(8.0, 16.0),
            anchor: Anchor::Bottom,
            surface: SurfaceSize::default(),
        });
        k
    }

    fn tone(invert: bool, contrast: f32, threshold: u8) -> ToneMap {
        ToneMap {
            invert,
            contrast,
            threshold,
        }
    }

    #[test]
    fn brightness_weights_sum_to_full_scale() {
        assert_eq!(perceived_brightness(255, 255, 255), 255.0);
        assert_eq!(perceived_brightness(0, 0, 0), 0.0);
        assert!(perceived_brightness(0, 255, 0) > perceived_brightness(255, 0, 0));
    }

    #[test]
    fn below_threshold_is_blank_and_full_scale_is_densest() {
        let t = tone(false, 1.0, 30);
        let len = Ramp::Classic.glyphs().chars().count();
        assert_eq!(t.level(29.9, len), None);
        assert_eq!(t.level(30.0, len), Some(0));
        assert_eq!(t.level(255.0, len), Some(len - 1));
        for ramp in Ramp::ALL {
            let glyphs: Vec<char> = ramp.glyphs().chars().collect();
            assert_eq!(glyphs[0], ' ');
            let last = t.level(255.0, glyphs.len()).unwrap();
            assert_eq!(last, glyphs.len() - 1, "{}", ramp.name());
        }
    }

    #[test]
    fn invert_and_contrast_apply_before_threshold() {
        assert_eq!(tone(true, 1.0, 30).level(255.0, 10), None);
        assert_eq!(tone(true, 1.0, 30).level(0.0, 10), Some(9));
        let flat = tone(false, 0.1, 30);
        assert!((flat.adjust(255.0) - 140.7).abs() < 0.01);
        let hard = tone(false, 5.0, 0);
        assert_eq!(hard.adjust(200.0), 255.0);
        assert_eq!(hard.adjust(50.0), 0.0);
    }

    #[test]
    fn cover_crop_trims_the_longer_side() {
        let wide = cover_crop((200, 100), (10, 10));
        assert_eq!(wide, Crop { x: 50.0, y: 0.0, w: 100.0, h: 100.0 });
        let tall = cover_crop((100, 300), (20, 10));
        assert_eq!(tall, Crop { x: 0.0, y: 125.0, w: 100.0, h: 50.0 });
    }

    #[test]
    fn degenerate_crop_keeps_unit_size() {
        let c = cover_crop((0, 0), (0, 0));
        assert!(c.w >= 1.0 && c.h >= 1.0);
        let sliver = cover_crop((1, 1000), (1000, 1));
        assert!(sliver.h >= 1.0 && sliver.w >= 1.0);
    }

    #[test]
    fn sample_rows_oversample_by_aspect() {
        assert_eq!(sample_rows(5, 0.5), 10);
        assert_eq!(sample_rows(7, 0.6), 12);
        assert_eq!(sample_rows(0, 0.5), 1);
    }

    #[test]
    fn waits_for_source_and_shows_placeholder() {
        let mut k = kernel(VideoConfig::default(), false, 8, 4);
        k.tick(FrameClock::default());
        assert_eq!(k.placeholder().as_deref(), Some(PLACEHOLDER));
        let mut frame = GlyphFrame::new(k.grid);
        k.render(&mut frame);
        assert_eq!(frame.to_text(), "        \n        \n        \n        ");
    }

    #[test]
    fn maps_dark_to_blank_and_white_to_densest() {
        let mut k = kernel(VideoConfig::default(), true, 8, 4);
        k.tick(FrameClock::default());
        assert_eq!(k.placeholder(), None);
        let mut frame = GlyphFrame::new(k.grid);
        k.render(&mut frame);
        let line = "    ®®®®";
        assert_eq!(frame.to_text(), [line; 4].join("\n"));
        assert_eq!(frame.color(7, 0), None);

        k.key(KeyCode::Char('c'));
        k.key(KeyCode::Char('i'));
        frame.reset(k.grid);
        k.render(&mut frame);
        assert_eq!(frame.glyph(0, 0), '®');
        assert_eq!(frame.glyph(7, 0), ' ');
        assert_eq!(frame.color(0, 0), Some(Rgb::new(0, 0, 0)));
    }

    #[test]
    fn ramp_switch_needs_no_resample() {
        let mut k = kernel(VideoConfig::default(), true, 4, 2);
        k.tick(FrameClock::default());
        k.key(KeyCode::Char('m'));
        assert_eq!(k.cfg.ramp, Ramp::Standard);
        let mut frame = GlyphFrame::new(k.grid);
        k.render(&mut frame);
        assert_eq!(frame.to_text(), "  @@\n  @@");
    }

    #[test]
    fn reverse_playback_wraps_to_the_end() {
        let mut k = kernel(VideoConfig::default(), true, 4, 2);
        let step = FrameClock {
            dt: Duration::from_millis(250),
            ..FrameClock::default()
        };
        k.tick(step);
        assert_eq!(k.position, Duration::from_millis(250));
        k.key(KeyCode::Char('r'));
        k.tick(step);
        k.tick(step);
        assert_eq!(k.position, Duration::from_millis(750));
    }

    #[test]
    fn threshold_keys_clamp() {
        let mut k = kernel(VideoConfig::default(), true, 4, 2);
        for _ in 0..20 {
            k.key(KeyCode::Char(','));
        }
        assert_eq!(k.cfg.dark_threshold, 0);
        for _ in 0..100 {
            k.key(KeyCode::Char(']'));
        }
        assert_eq!(k.cfg.contrast, VideoConfig::CONTRAST_RANGE.1);
    }
}
