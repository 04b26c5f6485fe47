//! Simulation kernels and the lifecycle that mounts one of them at a time.

pub(crate) mod fire;
pub(crate) mod life;
pub(crate) mod rain;
pub(crate) mod video;

use crate::config::Settings;
use crate::render::GlyphFrame;
use crate::surface::{Anchor, GlyphMetrics, GridSize, Placement, ResizePolicy, SurfaceSizer, Viewport};
use crossterm::event::KeyCode;
use log::{debug, info};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub(crate) const ZOOM_STEP: f32 = 1.25;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub(crate) enum KernelKind {
    Video,
    Rain,
    Life,
    Fire,
}

impl KernelKind {
    pub(crate) const ALL: [KernelKind; 4] = [
        KernelKind::Video,
        KernelKind::Rain,
        KernelKind::Life,
        KernelKind::Fire,
    ];

    pub(crate) fn name(self) -> &'static str {
        match self {
            KernelKind::Video => "video",
            KernelKind::Rain => "rain",
            KernelKind::Life => "life",
            KernelKind::Fire => "fire",
        }
    }

    pub(crate) fn cycle(self, step: i32) -> Self {
        let n = Self::ALL.len() as i32;
        let i = Self::ALL.iter().position(|k| *k == self).unwrap_or(0) as i32;
        Self::ALL[(i + step).rem_euclid(n) as usize]
    }

    fn salt(self) -> u64 {
        match self {
            KernelKind::Video => 0x9e37_79b9,
            KernelKind::Rain => 0x85eb_ca6b,
            KernelKind::Life => 0xc2b2_ae35,
            KernelKind::Fire => 0x27d4_eb2f,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct FrameClock {
    pub(crate) now: Duration,
    pub(crate) dt: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum PointerEvent {
    Down { x: f32, y: f32 },
    Move { x: f32, y: f32 },
    Up,
    Leave,
}

pub(crate) trait Kernel {
    fn kind(&self) -> KernelKind;

    fn resize_policy(&self) -> ResizePolicy;

    fn anchor(&self) -> Anchor {
        Anchor::Bottom
    }

    /// Configured glyph metric; `None` means one terminal cell.
    fn glyph(&self) -> Option<GlyphMetrics>;

    fn set_glyph(&mut self, glyph: Option<GlyphMetrics>);

    /// Discards all simulation state and rebuilds it for `placement.grid`.
    fn reinit(&mut self, placement: Placement);

    /// Advances one frame. An empty grid makes this a no-op.
    fn tick(&mut self, clock: FrameClock);

    fn render(&self, frame: &mut GlyphFrame);

    /// Text shown in place of output while the kernel has nothing to sample.
    fn placeholder(&self) -> Option<String> {
        None
    }

    fn pointer(&mut self, _event: PointerEvent) {}

    /// Returns true when the key was consumed.
    fn key(&mut self, _key: KeyCode) -> bool {
        false
    }

    fn status(&self) -> String;

    fn export(&self, settings: &mut Settings);
}

#[derive(Clone, Copy, Debug)]
struct RunState {
    started: Duration,
    last: Duration,
    frames: u64,
}

/// A kernel plus its frame subscription. Frames only advance between
/// `start` and `stop`; reinitialisation always goes through a stop.
pub(crate) struct Animation {
    kernel: Box<dyn Kernel>,
    sizer: SurfaceSizer,
    frame: GlyphFrame,
    run: Option<RunState>,
}

impl Animation {
    pub(crate) fn new(kernel: Box<dyn Kernel>) -> Self {
        let sizer = SurfaceSizer::new(kernel.resize_policy(), kernel.glyph());
        Self {
            kernel,
            sizer,
            frame: GlyphFrame::new(GridSize::default()),
            run: None,
        }
    }

    pub(crate) fn kind(&self) -> KernelKind {
        self.kernel.kind()
    }

    pub(crate) fn is_running(&self) -> bool {
        self.run.is_some()
    }

    pub(crate) fn grid(&self) -> GridSize {
        self.sizer.grid()
    }

    pub(crate) fn start(&mut self, now: Duration) {
        if self.run.is_none() {
            debug!("{} loop started", self.kind().name());
            self.run = Some(RunState {
                started: now,
                last: now,
                frames: 0,
            });
        }
    }

    pub(crate) fn stop(&mut self) {
        if let Some(run) = self.run.take() {
            debug!("{} loop released after {} frames", self.kind().name(), run.frames);
        }
    }

    /// Feeds a size notification; an accepted change rebuilds the kernel.
    pub(crate) fn resize(&mut self, viewport: Viewport, now: Duration) {
        if let Some(grid) = self.sizer.observe(viewport) {
            self.restart(grid, now);
        }
    }

    fn restart(&mut self, grid: GridSize, now: Duration) {
        let was_running = self.is_running();
        self.stop();
        self.kernel.reinit(self.sizer.placement(self.kernel.anchor()));
        self.frame.reset(grid);
        info!("{} grid {}x{}", self.kind().name(), grid.cols, grid.rows);
        if was_running {
            self.start(now);
        }
    }

    pub(crate) fn frame(&mut self, now: Duration) -> &GlyphFrame {
        if let Some(run) = self.run.as_mut() {
            let clock = FrameClock {
                now: now.saturating_sub(run.started),
                dt: now.saturating_sub(run.last),
            };
            run.last = now;
            run.frames += 1;
            self.kernel.tick(clock);
            self.frame.reset(self.sizer.grid());
            self.kernel.render(&mut self.frame);
        }
        &self.frame
    }

    pub(crate) fn placement(&self) -> Placement {
        self.sizer.placement(self.kernel.anchor())
    }

    pub(crate) fn placeholder(&self) -> Option<String> {
        self.kernel.placeholder()
    }

    pub(crate) fn status(&self) -> String {
        self.kernel.status()
    }

    pub(crate) fn pointer(&mut self, event: PointerEvent) {
        self.kernel.pointer(event);
    }

    pub(crate) fn key(&mut self, key: KeyCode, now: Duration) -> bool {
        let consumed = self.kernel.key(key);
        self.sync_glyph(now);
        consumed
    }

    pub(crate) fn zoom(&mut self, factor: f32, now: Duration) {
        let cell = self.sizer.cell();
        let next = self.sizer.effective_glyph().scaled(factor);
        let glyph = if next.width <= cell.width * 1.01 && next.height <= cell.height * 1.01 {
            None
        } else {
            Some(next.at_least(cell))
        };
        self.kernel.set_glyph(glyph);
        self.sync_glyph(now);
    }

    fn sync_glyph(&mut self, now: Duration) {
        let glyph = self.kernel.glyph();
        if glyph != self.sizer.configured_glyph() {
            if let Some(grid) = self.sizer.set_glyph(glyph) {
                self.restart(grid, now);
            }
        }
    }

    pub(crate) fn export(&self, settings: &mut Settings) {
        self.kernel.export(settings);
    }
}

pub(crate) fn build_kernel(kind: KernelKind, settings: &Settings) -> Box<dyn Kernel> {
    let rng = match settings.seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ kind.salt()),
        None => StdRng::from_entropy(),
    };
    match kind {
        KernelKind::Video => Box::new(video::VideoKernel::new(
            settings.video.clone(),
            video::open_source(&settings.video),
        )),
        KernelKind::Rain => Box::new(rain::RainKernel::new(settings.rain.clone(), rng)),
        KernelKind::Life => Box::new(life::LifeKernel::new(settings.life.clone(), rng)),
        KernelKind::Fire => Box::new(fire::FireKernel::new(settings.fire.clone(), rng)),
    }
}

pub(crate) struct Stage {
    active: Animation,
}

impl Stage {
    pub(crate) fn mount(kind: KernelKind, settings: &Settings, viewport: Viewport, now: Duration) -> Self {
        Self {
            active: Self::activate(kind, settings, viewport, now),
        }
    }

    fn activate(kind: KernelKind, settings: &Settings, viewport: Viewport, now: Duration) -> Animation {
        let mut anim = Animation::new(build_kernel(kind, settings));
        anim.resize(viewport, now);
        anim.start(now);
        info!("mounted {}", kind.name());
        anim
    }

    pub(crate) fn switch(&mut self, kind: KernelKind, settings: &mut Settings, viewport: Viewport, now: Duration) {
        if kind == self.active.kind() {
            return;
        }
        self.active.stop();
        self.active.export(settings);
        self.active = Self::activate(kind, settings, viewport, now);
    }

    pub(crate) fn active(&mut self) -> &mut Animation {
        &mut self.active
    }

    pub(crate) fn kind(&self) -> KernelKind {
        self.active.kind()
    }

    pub(crate) fn export(&self, settings: &mut Settings) {
        self.active.export(settings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn seeded() -> Settings {
        Settings {
            seed: Some(7),
            ..Settings::default()
        }
    }

    #[test]
    fn cycle_wraps_both_ways() {
        assert_eq!(KernelKind::Video.cycle(1), KernelKind::Rain);
        assert_eq!(KernelKind::Video.cycle(-1), KernelKind::Fire);
        assert_eq!(KernelKind::Fire.cycle(1), KernelKind::Video);
    }

    #[test]
    fn stopped_animation_does_not_advance() {
        let settings = seeded();
        let mut anim = Animation::new(build_kernel(KernelKind::Rain, &settings));
        anim.resize(Viewport::from_terminal(20, 10, 0, 0), Duration::ZERO);
        assert!(!anim.is_running());
        let before = anim.frame(Duration::from_millis(16)).to_text();
        for i in 0..200 {
            anim.frame(Duration::from_millis(16 * i));
        }
        assert_eq!(anim.frame(Duration::from_secs(10)).to_text(), before);
    }

    #[test]
    fn every_kernel_fills_its_grid() {
        let settings = seeded();
        let viewport = Viewport::from_terminal(12, 6, 0, 0);
        for kind in KernelKind::ALL {
            let mut stage = Stage::mount(kind, &settings, viewport, Duration::ZERO);
            let anim = stage.active();
            assert!(anim.is_running());
            let grid = anim.grid();
            assert_eq!(grid, GridSize::new(12, 7), "{}", kind.name());
            let text = anim.frame(Duration::from_millis(16)).to_text();
            assert_eq!(text.matches('\n').count(), grid.rows - 1, "{}", kind.name());
            assert!(text.lines().all(|l| l.chars().count() == grid.cols));
        }
    }

    #[test]
    fn switching_exports_config_and_remounts() {
        init_logs();
        let mut settings = seeded();
        let viewport = Viewport::from_terminal(12, 6, 0, 0);
        let mut stage = Stage::mount(KernelKind::Life, &settings, viewport, Duration::ZERO);
        assert!(stage.active().key(KeyCode::Char('p'), Duration::ZERO));
        stage.switch(KernelKind::Fire, &mut settings, viewport, Duration::ZERO);
        assert_eq!(stage.kind(), KernelKind::Fire);
        assert_ne!(settings.life.rules, crate::kernels::life::RuleSet::CONWAY);
    }

    #[test]
    fn zoom_rebuilds_grid_and_returns_to_cell_size() {
        init_logs();
        let settings = seeded();
        let viewport = Viewport::from_terminal(40, 20, 0, 0);
        let mut stage = Stage::mount(KernelKind::Fire, &settings, viewport, Duration::ZERO);
        let anim = stage.active();
        assert_eq!(anim.grid(), GridSize::new(40, 21));
        anim.zoom(2.0, Duration::ZERO);
        assert_eq!(anim.grid(), GridSize::new(20, 11));
        assert!(anim.is_running());
        anim.zoom(0.5, Duration::ZERO);
        assert_eq!(anim.grid(), GridSize::new(40, 21));
    }
}
