use crate::config::{save_settings_atomic, Settings};
use crate::input::{collect_input_nonblocking, map_global_key, Action, InputEvent};
use crate::kernels::{video, KernelKind, Stage};
use crate::render::{draw_text, paint_frame, paint_placeholder, Terminal};
use crate::surface::Viewport;
use anyhow::Context;
use crossterm::event::KeyModifiers;
use crossterm::style::Color;
use log::{debug, info};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Simulated time per headless frame.
const SNAPSHOT_FRAME: Duration = Duration::from_millis(16);
const SNAPSHOT_DECODE_WAIT: Duration = Duration::from_secs(10);

pub(crate) struct App {
    settings: Settings,
    save_to: Option<PathBuf>,
    term: Terminal,
    stage: Stage,
    epoch: Instant,
    should_quit: bool,
}

impl App {
    fn init(settings: Settings, save_to: Option<PathBuf>) -> anyhow::Result<Self> {
        let term = Terminal::begin().context("setting up the terminal")?;
        let stage = Stage::mount(settings.start_mode, &settings, term.viewport, Duration::ZERO);
        Ok(Self {
            settings,
            save_to,
            term,
            stage,
            epoch: Instant::now(),
            should_quit: false,
        })
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let result = self.run_loop();
        self.term.end()?;
        result?;

        self.stage.export(&mut self.settings);
        self.settings.start_mode = self.stage.kind();
        if let Some(path) = &self.save_to {
            save_settings_atomic(path, &self.settings)?;
            debug!("settings saved to {}", path.display());
        }
        Ok(())
    }

    fn run_loop(&mut self) -> anyhow::Result<()> {
        let fps = self.settings.fps_cap.clamp(10, 240);
        let frame_dt = Duration::from_secs_f32(1.0 / fps as f32);

        while !self.should_quit {
            let frame_start = Instant::now();

            // one size per frame
            if self.term.resize_if_needed()? {
                debug!("terminal now {}x{}", self.term.viewport.cols, self.term.viewport.rows);
            }
            let now = self.epoch.elapsed();
            self.stage.active().resize(self.term.viewport, now);

            for ev in collect_input_nonblocking(frame_dt, &self.term.viewport)? {
                self.handle(ev, now);
                if self.should_quit {
                    break;
                }
            }

            self.render_frame(now)?;

            spin_sleep(frame_dt, frame_start);
        }
        Ok(())
    }

    fn handle(&mut self, ev: InputEvent, now: Duration) {
        match ev {
            InputEvent::Pointer(p) => self.stage.active().pointer(p),
            InputEvent::Key { key, mods } => {
                if !mods.contains(KeyModifiers::CONTROL) && self.stage.active().key(key, now) {
                    return;
                }
                if let Some(action) = map_global_key(key, mods) {
                    self.apply(action, now);
                }
            }
        }
    }

    fn apply(&mut self, action: Action, now: Duration) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::Cycle(step) => self.switch(self.stage.kind().cycle(step), now),
            Action::Select(kind) => self.switch(kind, now),
            Action::ToggleHud => self.settings.hud = !self.settings.hud,
            Action::Zoom(factor) => self.stage.active().zoom(factor, now),
        }
    }

    fn switch(&mut self, kind: KernelKind, now: Duration) {
        if kind != self.stage.kind() {
            info!("mode {} -> {}", self.stage.kind().name(), kind.name());
            self.stage.switch(kind, &mut self.settings, self.term.viewport, now);
        }
    }

    fn render_frame(&mut self, now: Duration) -> anyhow::Result<()> {
        let viewport = self.term.viewport;
        self.term.cur.clear();

        let anim = self.stage.active();
        let placement = anim.placement();
        let placeholder = anim.placeholder();
        let frame = anim.frame(now);
        match placeholder {
            Some(text) => paint_placeholder(&mut self.term.cur, &text),
            None => paint_frame(&mut self.term.cur, &viewport, frame, &placement),
        }

        if self.settings.hud {
            let line = hud_line(self.stage.kind(), &self.stage.active().status());
            draw_text(&mut self.term.cur, 0, 0, &line, Color::White);
        }

        self.term.present()?;
        Ok(())
    }
}

fn hud_line(kind: KernelKind, status: &str) -> String {
    format!(" {} | {} | Tab mode  < > zoom  h hud  q quit ", kind.name(), status)
}

pub(crate) fn run(settings: Settings, save_to: Option<PathBuf>) -> anyhow::Result<()> {
    let mut app = App::init(settings, save_to)?;
    app.run()?;
    Ok(())
}

/// Headless run size, parsed from `COLSxROWS[:FRAMES]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct SnapshotPlan {
    pub(crate) cols: u16,
    pub(crate) rows: u16,
    pub(crate) frames: u32,
}

impl FromStr for SnapshotPlan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || format!("expected COLSxROWS[:FRAMES], got {s:?}");
        let (size, frames) = match s.split_once(':') {
            Some((size, frames)) => (size, frames.parse().map_err(|_| bad())?),
            None => (s, 60),
        };
        let (cols, rows) = size.split_once(&['x', 'X'][..]).ok_or_else(bad)?;
        Ok(Self {
            cols: cols.trim().parse().map_err(|_| bad())?,
            rows: rows.trim().parse().map_err(|_| bad())?,
            frames,
        })
    }
}

/// Runs `kind` without a terminal and returns its last frame as text.
pub(crate) fn snapshot(kind: KernelKind, plan: SnapshotPlan, settings: &Settings) -> String {
    let viewport = Viewport::from_terminal(plan.cols, plan.rows, 0, 0);
    let mut stage = Stage::mount(kind, settings, viewport, Duration::ZERO);
    let anim = stage.active();

    if kind == KernelKind::Video {
        let deadline = Instant::now() + SNAPSHOT_DECODE_WAIT;
        while anim.placeholder().as_deref() == Some(video::PLACEHOLDER) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
            anim.frame(Duration::ZERO);
        }
        if let Some(text) = anim.placeholder() {
            if text != video::PLACEHOLDER {
                return text;
            }
        }
    }

    let mut text = String::new();
    for i in 1..=plan.frames.max(1) {
        text = anim.frame(SNAPSHOT_FRAME * i).to_text();
    }
    text
}

/* -----------------------------
   Frame pacing helper
------------------------------ */

fn spin_sleep(target: Duration, now: Instant) {
    let end = now + target;
    loop {
        let t = Instant::now();
        if t >= end {
            break;
        }
        let left = end - t;
        if left > Duration::from_millis(2) {
            std::thread::sleep(Duration::from_millis(1));
        } else {
            std::hint::spin_loop();
        }
    }
}
