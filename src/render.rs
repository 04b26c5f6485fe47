use crate::surface::{GridSize, Placement, Viewport};
use crossterm::{
    cursor,
    event::{DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture},
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use std::io::{self, Write};

pub(crate) const INK: Rgb = Rgb::new(136, 136, 136);
const BACKGROUND: Color = Color::Black;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Rgb {
    pub(crate) r: u8,
    pub(crate) g: u8,
    pub(crate) b: u8,
}

impl Rgb {
    pub(crate) const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub(crate) fn lerp(self, other: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Rgb::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }

    pub(crate) fn scale(self, s: f32) -> Rgb {
        let s = s.clamp(0.0, 1.0);
        let f = |c: u8| (c as f32 * s).round() as u8;
        Rgb::new(f(self.r), f(self.g), f(self.b))
    }

    pub(crate) fn to_color(self) -> Color {
        Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

/// One kernel's output for a frame: a glyph per cell plus an optional colour.
#[derive(Clone, Debug, Default)]
pub(crate) struct GlyphFrame {
    grid: GridSize,
    glyphs: Vec<char>,
    colors: Vec<Option<Rgb>>,
}

impl GlyphFrame {
    pub(crate) fn new(grid: GridSize) -> Self {
        let mut frame = Self::default();
        frame.reset(grid);
        frame
    }

    pub(crate) fn reset(&mut self, grid: GridSize) {
        self.grid = grid;
        self.glyphs.clear();
        self.glyphs.resize(grid.area(), ' ');
        self.colors.clear();
        self.colors.resize(grid.area(), None);
    }

    pub(crate) fn grid(&self) -> GridSize {
        self.grid
    }

    pub(crate) fn set(&mut self, col: usize, row: usize, ch: char, color: Option<Rgb>) {
        if col < self.grid.cols && row < self.grid.rows {
            let i = self.grid.index(col, row);
            self.glyphs[i] = ch;
            self.colors[i] = color;
        }
    }

    pub(crate) fn glyph(&self, col: usize, row: usize) -> char {
        if col < self.grid.cols && row < self.grid.rows {
            self.glyphs[self.grid.index(col, row)]
        } else {
            ' '
        }
    }

    pub(crate) fn color(&self, col: usize, row: usize) -> Option<Rgb> {
        if col < self.grid.cols && row < self.grid.rows {
            self.colors[self.grid.index(col, row)]
        } else {
            None
        }
    }

    /// Rows joined by `'\n'`, so a grid of `rows` rows has `rows - 1` separators.
    pub(crate) fn to_text(&self) -> String {
        if self.grid.is_empty() {
            return String::new();
        }
        let mut out = String::with_capacity(self.grid.area() + self.grid.rows);
        for (row, line) in self.glyphs.chunks(self.grid.cols).enumerate() {
            if row > 0 {
                out.push('\n');
            }
            out.extend(line.iter());
        }
        out
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cell {
    pub(crate) ch: char,
    pub(crate) fg: Color,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: INK.to_color(),
        }
    }
}

pub(crate) struct CellBuffer {
    pub(crate) w: u16,
    pub(crate) h: u16,
    pub(crate) cells: Vec<Cell>,
}

impl CellBuffer {
    pub(crate) fn new(w: u16, h: u16) -> Self {
        Self {
            w,
            h,
            cells: vec![Cell::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn set(&mut self, x: u16, y: u16, c: Cell) {
        if x < self.w && y < self.h {
            let i = self.idx(x, y);
            self.cells[i] = c;
        }
    }
    pub(crate) fn clear(&mut self) {
        self.cells.fill(Cell::default());
    }
}

pub(crate) fn paint_frame(buf: &mut CellBuffer, viewport: &Viewport, frame: &GlyphFrame, placement: &Placement) {
    let grid = frame.grid();
    for row in 0..grid.rows {
        for col in 0..grid.cols {
            let ch = frame.glyph(col, row);
            if ch == ' ' {
                continue;
            }
            let (px, py) = placement.cell_center(col, row);
            let Some((x, y)) = viewport.cell_at(px, py) else {
                continue;
            };
            let fg = frame.color(col, row).unwrap_or(INK).to_color();
            buf.set(x, y, Cell { ch, fg });
        }
    }
}

/// Draws a loading message at the bottom-left, where bottom-anchored output starts.
pub(crate) fn paint_placeholder(buf: &mut CellBuffer, text: &str) {
    let y = buf.h.saturating_sub(1);
    draw_text(buf, 0, y, text, INK.to_color());
}

pub(crate) fn draw_text(buf: &mut CellBuffer, x: u16, y: u16, s: &str, fg: Color) {
    let mut xx = x;
    for ch in s.chars() {
        if xx >= buf.w {
            break;
        }
        buf.set(xx, y, Cell { ch, fg });
        xx += 1;
    }
}

pub(crate) struct Terminal {
    pub(crate) out: io::Stdout,
    pub(crate) viewport: Viewport,
    pub(crate) prev: CellBuffer,
    pub(crate) cur: CellBuffer,
    full_redraw: bool,
}

impl Terminal {
    pub(crate) fn begin() -> anyhow::Result<Self> {
        let mut out = io::stdout();
        execute!(
            out,
            EnterAlternateScreen,
            EnableMouseCapture,
            EnableFocusChange,
            cursor::Hide,
            DisableLineWrap,
            SetBackgroundColor(BACKGROUND),
            terminal::Clear(ClearType::All)
        )?;
        terminal::enable_raw_mode()?;

        let viewport = measure()?;
        log::info!(
            "terminal {}x{} cells, cell {:.1}x{:.1}px",
            viewport.cols,
            viewport.rows,
            viewport.cell.width,
            viewport.cell.height
        );

        Ok(Self {
            out,
            viewport,
            prev: CellBuffer::new(viewport.cols, viewport.rows),
            cur: CellBuffer::new(viewport.cols, viewport.rows),
            full_redraw: true,
        })
    }

    pub(crate) fn end(&mut self) -> anyhow::Result<()> {
        queue!(
            self.out,
            BeginSynchronizedUpdate,
            ResetColor,
            Clear(ClearType::All),
            cursor::Show,
            EnableLineWrap,
            EndSynchronizedUpdate,
            DisableFocusChange,
            DisableMouseCapture,
            LeaveAlternateScreen
        )?;
        self.out.flush()?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    // once per frame, so the whole frame sees one size
    pub(crate) fn resize_if_needed(&mut self) -> anyhow::Result<bool> {
        let viewport = measure()?;
        if viewport == self.viewport {
            return Ok(false);
        }
        self.viewport = viewport;
        self.prev = CellBuffer::new(viewport.cols, viewport.rows);
        self.cur = CellBuffer::new(viewport.cols, viewport.rows);
        self.full_redraw = true;
        queue!(self.out, SetBackgroundColor(BACKGROUND), Clear(ClearType::All))?;
        Ok(true)
    }

    pub(crate) fn present(&mut self) -> anyhow::Result<()> {
        queue!(self.out, BeginSynchronizedUpdate, SetBackgroundColor(BACKGROUND))?;

        let mut last_fg = None;

        for y in 0..self.viewport.rows {
            for x in 0..self.viewport.cols {
                let i = self.cur.idx(x, y);
                let c = self.cur.cells[i];
                if !self.full_redraw && c == self.prev.cells[i] {
                    continue;
                }

                queue!(self.out, cursor::MoveTo(x, y))?;

                if last_fg != Some(c.fg) {
                    queue!(self.out, SetForegroundColor(c.fg))?;
                    last_fg = Some(c.fg);
                }

                queue!(self.out, Print(c.ch))?;
            }
        }

        queue!(self.out, ResetColor, EndSynchronizedUpdate)?;
        self.out.flush()?;
        self.prev.cells.copy_from_slice(&self.cur.cells);
        self.full_redraw = false;
        Ok(())
    }
}

fn measure() -> io::Result<Viewport> {
    let (cols, rows) = terminal::size()?;
    // Pixel size is optional; many terminals answer with zeros.
    let (px_w, px_h) = terminal::window_size()
        .map(|ws| (ws.width, ws.height))
        .unwrap_or((0, 0));
    Ok(Viewport::from_terminal(cols, rows, px_w, px_h))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{Anchor, GlyphMetrics, SurfaceSizer, ResizePolicy};

    #[test]
    fn text_has_rows_minus_one_separators() {
        let mut frame = GlyphFrame::new(GridSize::new(4, 3));
        frame.set(0, 0, '#', None);
        frame.set(3, 2, '@', None);
        let text = frame.to_text();
        assert_eq!(text.matches('\n').count(), 2);
        assert_eq!(text, "#   \n    \n   @");
    }

    #[test]
    fn empty_frame_has_no_text() {
        assert_eq!(GlyphFrame::new(GridSize::default()).to_text(), "");
    }

    #[test]
    fn out_of_bounds_writes_are_dropped() {
        let mut frame = GlyphFrame::new(GridSize::new(2, 2));
        frame.set(5, 0, 'x', None);
        frame.set(0, 5, 'x', None);
        assert_eq!(frame.to_text(), "  \n  ");
        assert_eq!(frame.glyph(9, 9), ' ');
    }

    #[test]
    fn reset_blanks_and_resizes() {
        let mut frame = GlyphFrame::new(GridSize::new(2, 2));
        frame.set(1, 1, 'x', Some(Rgb::new(1, 2, 3)));
        frame.reset(GridSize::new(3, 1));
        assert_eq!(frame.to_text(), "   ");
        assert_eq!(frame.color(1, 0), None);
    }

    #[test]
    fn bottom_anchored_frame_drops_overflow_row() {
        let viewport = Viewport::from_terminal(3, 2, 0, 0);
        let mut sizer = SurfaceSizer::new(ResizePolicy::Exact, None::<GlyphMetrics>);
        let grid = sizer.observe(viewport).unwrap();
        assert_eq!(grid, GridSize::new(3, 3));

        let mut frame = GlyphFrame::new(grid);
        frame.set(0, 0, 'a', None);
        frame.set(1, 1, 'b', None);
        frame.set(2, 2, 'c', Some(Rgb::new(255, 0, 0)));

        let mut buf = CellBuffer::new(3, 2);
        paint_frame(&mut buf, &viewport, &frame, &sizer.placement(Anchor::Bottom));
        let chars: String = buf.cells.iter().map(|c| c.ch).collect();
        assert_eq!(chars, " b   c");
        assert_eq!(buf.cells[5].fg, Color::Rgb { r: 255, g: 0, b: 0 });
    }

    #[test]
    fn rgb_scale_and_lerp() {
        let c = Rgb::new(200, 100, 0);
        assert_eq!(c.scale(0.5), Rgb::new(100, 50, 0));
        assert_eq!(c.lerp(Rgb::new(0, 0, 0), 1.0), Rgb::new(0, 0, 0));
        assert_eq!(c.lerp(Rgb::new(0, 0, 0), 0.0), c);
    }
}
