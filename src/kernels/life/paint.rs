//! Pointer strokes: connects successive pointer cells with Bresenham lines so
//! fast drags paint a continuous path.

/// Integer Bresenham walk from one cell to another, both ends included.
#[derive(Clone, Debug)]
pub(crate) struct Line {
    x: i64,
    y: i64,
    x1: i64,
    y1: i64,
    dx: i64,
    dy: i64,
    sx: i64,
    sy: i64,
    err: i64,
    done: bool,
}

pub(crate) fn line(from: (i64, i64), to: (i64, i64)) -> Line {
    let dx = (to.0 - from.0).abs();
    let dy = (to.1 - from.1).abs();
    Line {
        x: from.0,
        y: from.1,
        x1: to.0,
        y1: to.1,
        dx,
        dy,
        sx: if from.0 < to.0 { 1 } else { -1 },
        sy: if from.1 < to.1 { 1 } else { -1 },
        err: dx - dy,
        done: false,
    }
}

impl Iterator for Line {
    type Item = (i64, i64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let point = (self.x, self.y);
        if self.x == self.x1 && self.y == self.y1 {
            self.done = true;
            return Some(point);
        }
        let e2 = 2 * self.err;
        if e2 > -self.dy {
            self.err -= self.dy;
            self.x += self.sx;
        }
        if e2 < self.dx {
            self.err += self.dx;
            self.y += self.sy;
        }
        Some(point)
    }
}

/// Pointer state for one surface: button, last painted cell and hover.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Brush {
    down: bool,
    last: Option<(usize, usize)>,
    hover: Option<(usize, usize)>,
}

impl Brush {
    pub(crate) fn is_down(&self) -> bool {
        self.down
    }

    pub(crate) fn hover(&self) -> Option<(usize, usize)> {
        self.hover
    }

    pub(crate) fn set_hover(&mut self, cell: Option<(usize, usize)>) {
        self.hover = cell;
    }

    /// Starts a new stroke.
    pub(crate) fn press(&mut self) {
        self.down = true;
        self.last = None;
    }

    pub(crate) fn release(&mut self) {
        self.down = false;
        self.last = None;
    }

    /// Pointer left the surface: hover and stroke continuity are lost, the
    /// button state is kept.
    pub(crate) fn leave(&mut self) {
        self.hover = None;
        self.last = None;
    }

    /// Cells to paint when the stroke reaches `cell`.
    pub(crate) fn stroke_to(&mut self, cell: (usize, usize)) -> Line {
        let from = self.last.unwrap_or(cell);
        self.last = Some(cell);
        line(
            (from.0 as i64, from.1 as i64),
            (cell.0 as i64, cell.1 as i64),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_point_line() {
        assert_eq!(line((3, 4), (3, 4)).collect::<Vec<_>>(), vec![(3, 4)]);
    }

    #[test]
    fn lines_are_eight_connected_with_both_ends() {
        let cases = [((0, 0), (7, 3)), ((5, 5), (-2, 9)), ((0, 0), (0, -6)), ((2, 1), (-3, -4))];
        for (from, to) in cases {
            let pts: Vec<_> = line(from, to).collect();
            assert_eq!(pts.first(), Some(&from));
            assert_eq!(pts.last(), Some(&to));
            let expected = (to.0 - from.0).abs().max((to.1 - from.1).abs()) as usize + 1;
            assert_eq!(pts.len(), expected);
            for w in pts.windows(2) {
                let (a, b) = (w[0], w[1]);
                assert!((a.0 - b.0).abs() <= 1 && (a.1 - b.1).abs() <= 1);
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn strokes_continue_from_last_cell() {
        let mut brush = Brush::default();
        brush.press();
        assert_eq!(brush.stroke_to((2, 2)).count(), 1);
        let pts: Vec<_> = brush.stroke_to((6, 2)).collect();
        assert_eq!(pts, vec![(2, 2), (3, 2), (4, 2), (5, 2), (6, 2)]);
        brush.release();
        assert!(!brush.is_down());
        assert_eq!(brush.stroke_to((0, 0)).count(), 1);
    }

    #[test]
    fn leaving_breaks_the_stroke() {
        let mut brush = Brush::default();
        brush.press();
        brush.set_hover(Some((1, 1)));
        brush.stroke_to((1, 1));
        brush.leave();
        assert!(brush.is_down());
        assert_eq!(brush.hover(), None);
        assert_eq!(brush.stroke_to((5, 5)).count(), 1);
    }
}
