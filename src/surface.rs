//! Grid resolution derived from the display surface and a glyph metric.
//!
//! The surface is the terminal viewport measured in pixels. When the terminal
//! does not report its pixel size, cells are assumed to be `NOMINAL_CELL`.

use serde::{Deserialize, Serialize};

/// Cell size assumed when the terminal reports no pixel dimensions.
pub(crate) const NOMINAL_CELL: GlyphMetrics = GlyphMetrics::new(8.0, 16.0);

pub(crate) const JITTER_TOLERANCE_PX: f32 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct GlyphMetrics {
    pub(crate) width: f32,
    pub(crate) height: f32,
}

impl GlyphMetrics {
    pub(crate) const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub(crate) fn at_least(self, floor: GlyphMetrics) -> Self {
        Self {
            width: self.width.max(floor.width).max(1.0),
            height: self.height.max(floor.height).max(1.0),
        }
    }

    pub(crate) fn scaled(self, factor: f32) -> Self {
        Self {
            width: self.width * factor,
            height: self.height * factor,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub(crate) struct GridSize {
    pub(crate) cols: usize,
    pub(crate) rows: usize,
}

impl GridSize {
    pub(crate) const fn new(cols: usize, rows: usize) -> Self {
        Self { cols, rows }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.cols == 0 || self.rows == 0
    }

    pub(crate) fn area(&self) -> usize {
        self.cols * self.rows
    }

    #[inline]
    pub(crate) fn index(&self, col: usize, row: usize) -> usize {
        row * self.cols + col
    }

    #[inline]
    pub(crate) fn contains(&self, col: i64, row: i64) -> bool {
        col >= 0 && row >= 0 && (col as usize) < self.cols && (row as usize) < self.rows
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Viewport {
    pub(crate) cols: u16,
    pub(crate) rows: u16,
    pub(crate) cell: GlyphMetrics,
}

impl Viewport {
    pub(crate) fn from_terminal(cols: u16, rows: u16, px_width: u16, px_height: u16) -> Self {
        let cell = if cols > 0 && rows > 0 && px_width > 0 && px_height > 0 {
            GlyphMetrics::new(
                px_width as f32 / cols as f32,
                px_height as f32 / rows as f32,
            )
        } else {
            NOMINAL_CELL
        };
        Self { cols, rows, cell }
    }

    pub(crate) fn surface(&self) -> SurfaceSize {
        SurfaceSize {
            width: self.cols as f32 * self.cell.width,
            height: self.rows as f32 * self.cell.height,
        }
    }

    pub(crate) fn cell_center(&self, col: u16, row: u16) -> (f32, f32) {
        (
            (col as f32 + 0.5) * self.cell.width,
            (row as f32 + 0.5) * self.cell.height,
        )
    }

    pub(crate) fn cell_at(&self, x: f32, y: f32) -> Option<(u16, u16)> {
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let col = (x / self.cell.width).floor() as u32;
        let row = (y / self.cell.height).floor() as u32;
        if col < self.cols as u32 && row < self.rows as u32 {
            Some((col as u16, row as u16))
        } else {
            None
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct SurfaceSize {
    pub(crate) width: f32,
    pub(crate) height: f32,
}

// cols = floor(w / gw), rows = ceil(h / gh) + 1. The extra row lets
// bottom-anchored output overflow the top edge.
pub(crate) fn derive_grid(surface: SurfaceSize, glyph: GlyphMetrics) -> GridSize {
    if surface.width <= 0.0 || surface.height <= 0.0 || glyph.width <= 0.0 || glyph.height <= 0.0
    {
        return GridSize::default();
    }
    let cols = (surface.width / glyph.width).floor() as usize;
    if cols == 0 {
        return GridSize::default();
    }
    let rows = (surface.height / glyph.height).ceil() as usize + 1;
    GridSize::new(cols, rows)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum ResizePolicy {
    Exact,
    // pixels of slack around the last accepted size
    Tolerance(f32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Anchor {
    Top,
    Bottom,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Placement {
    pub(crate) grid: GridSize,
    pub(crate) glyph: GlyphMetrics,
    pub(crate) anchor: Anchor,
    pub(crate) surface: SurfaceSize,
}

impl Placement {
    fn offset_y(&self) -> f32 {
        match self.anchor {
            Anchor::Top => 0.0,
            Anchor::Bottom => self.surface.height - self.grid.rows as f32 * self.glyph.height,
        }
    }

    pub(crate) fn cell_center(&self, col: usize, row: usize) -> (f32, f32) {
        (
            (col as f32 + 0.5) * self.glyph.width,
            self.offset_y() + (row as f32 + 0.5) * self.glyph.height,
        )
    }

    pub(crate) fn cell_at(&self, x: f32, y: f32) -> Option<(usize, usize)> {
        let col = (x / self.glyph.width).floor() as i64;
        let row = ((y - self.offset_y()) / self.glyph.height).floor() as i64;
        if self.grid.contains(col, row) {
            Some((col as usize, row as usize))
        } else {
            None
        }
    }
}

#[derive(Debug)]
pub(crate) struct SurfaceSizer {
    policy: ResizePolicy,
    glyph: Option<GlyphMetrics>,
    accepted: Option<Viewport>,
    grid: GridSize,
}

impl SurfaceSizer {
    pub(crate) fn new(policy: ResizePolicy, glyph: Option<GlyphMetrics>) -> Self {
        Self {
            policy,
            glyph,
            accepted: None,
            grid: GridSize::default(),
        }
    }

    pub(crate) fn grid(&self) -> GridSize {
        self.grid
    }

    pub(crate) fn configured_glyph(&self) -> Option<GlyphMetrics> {
        self.glyph
    }

    pub(crate) fn cell(&self) -> GlyphMetrics {
        self.accepted.map_or(NOMINAL_CELL, |v| v.cell)
    }

    pub(crate) fn effective_glyph(&self) -> GlyphMetrics {
        let cell = self.cell();
        self.glyph.map_or(cell, |g| g.at_least(cell))
    }

    pub(crate) fn placement(&self, anchor: Anchor) -> Placement {
        Placement {
            grid: self.grid,
            glyph: self.effective_glyph(),
            anchor,
            surface: self.accepted.map(|v| v.surface()).unwrap_or_default(),
        }
    }

    /// Feeds a size notification. Returns the new grid when the owning kernel
    /// has to reinitialise; the first notification always does.
    pub(crate) fn observe(&mut self, viewport: Viewport) -> Option<GridSize> {
        if let (ResizePolicy::Tolerance(tol), Some(prev)) = (self.policy, self.accepted) {
            let (a, b) = (viewport.surface(), prev.surface());
            if (a.width - b.width).abs() <= tol && (a.height - b.height).abs() <= tol {
                return None;
            }
        }
        let first = self.accepted.is_none();
        self.accepted = Some(viewport);
        self.rederive(first)
    }

    pub(crate) fn set_glyph(&mut self, glyph: Option<GlyphMetrics>) -> Option<GridSize> {
        self.glyph = glyph;
        if self.accepted.is_none() {
            return None;
        }
        self.rederive(false)
    }

    fn rederive(&mut self, force: bool) -> Option<GridSize> {
        let viewport = self.accepted?;
        let grid = derive_grid(viewport.surface(), self.effective_glyph());
        if !force && grid == self.grid {
            return None;
        }
        self.grid = grid;
        Some(grid)
    }
}
