use super::rules::RuleSet;
use crate::surface::GridSize;
use rand::{rngs::StdRng, Rng};

pub(crate) const CELL_GLYPHS: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789$+-*/=%\"'#&_(),.;:?!\\|{}<>[]^~@";

/// Chance that a surviving cell swaps its glyph on each generation.
const REROLL_CHANCE: f64 = 0.1;

pub(crate) fn random_glyph(rng: &mut StdRng) -> char {
    let bytes = CELL_GLYPHS.as_bytes();
    bytes[rng.gen_range(0..bytes.len())] as char
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct LifeCell {
    pub(crate) alive: bool,
    /// State computed by `prepare`, committed by `apply`.
    pub(crate) next: bool,
    /// State before the last `apply`.
    pub(crate) previous: bool,
    pub(crate) ch: char,
}

/// Row-major cell arena; edges are dead, there is no wraparound.
#[derive(Clone, Debug, Default)]
pub(crate) struct LifeGrid {
    size: GridSize,
    cells: Vec<LifeCell>,
}

impl LifeGrid {
    pub(crate) fn seeded(size: GridSize, density: f32, rng: &mut StdRng) -> Self {
        let p = density.clamp(0.0, 1.0) as f64;
        let cells = (0..size.area())
            .map(|_| {
                let alive = rng.gen_bool(p);
                LifeCell {
                    alive,
                    next: alive,
                    previous: alive,
                    ch: random_glyph(rng),
                }
            })
            .collect();
        Self { size, cells }
    }

    pub(crate) fn size(&self) -> GridSize {
        self.size
    }

    pub(crate) fn cell(&self, col: usize, row: usize) -> Option<&LifeCell> {
        if col < self.size.cols && row < self.size.rows {
            self.cells.get(self.size.index(col, row))
        } else {
            None
        }
    }

    pub(crate) fn is_alive(&self, col: i64, row: i64) -> bool {
        self.size.contains(col, row) && self.cells[self.size.index(col as usize, row as usize)].alive
    }

    pub(crate) fn population(&self) -> usize {
        self.cells.iter().filter(|c| c.alive).count()
    }

    pub(crate) fn neighbors(&self, col: usize, row: usize) -> u8 {
        let (c, r) = (col as i64, row as i64);
        let mut n = 0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                if (dx, dy) != (0, 0) && self.is_alive(c + dx, r + dy) {
                    n += 1;
                }
            }
        }
        n
    }

    /// Computes every cell's next state from the current generation only.
    pub(crate) fn prepare(&mut self, rules: &RuleSet) {
        for row in 0..self.size.rows {
            for col in 0..self.size.cols {
                let n = self.neighbors(col, row);
                let i = self.size.index(col, row);
                self.cells[i].next = rules.next_state(self.cells[i].alive, n);
            }
        }
    }

    /// Commits the prepared generation. Births always get a fresh glyph.
    pub(crate) fn apply(&mut self, rng: &mut StdRng) {
        for cell in self.cells.iter_mut() {
            let born = cell.next && !cell.alive;
            cell.previous = cell.alive;
            cell.alive = cell.next;
            if born || (cell.alive && rng.gen_bool(REROLL_CHANCE)) {
                cell.ch = random_glyph(rng);
            }
        }
    }

    pub(crate) fn step(&mut self, rules: &RuleSet, rng: &mut StdRng) {
        self.prepare(rules);
        self.apply(rng);
    }

    /// Forces a cell alive for both phases. Returns false off grid.
    pub(crate) fn set_alive(&mut self, col: i64, row: i64, rng: &mut StdRng) -> bool {
        if !self.size.contains(col, row) {
            return false;
        }
        let cell = &mut self.cells[self.size.index(col as usize, row as usize)];
        cell.alive = true;
        cell.next = true;
        cell.ch = random_glyph(rng);
        true
    }

    #[cfg(test)]
    pub(crate) fn from_pattern(rows: &[&str]) -> Self {
        let size = GridSize::new(rows.first().map_or(0, |r| r.len()), rows.len());
        let cells = rows
            .iter()
            .flat_map(|r| r.chars())
            .map(|c| {
                let alive = c == '#';
                LifeCell {
                    alive,
                    next: alive,
                    previous: alive,
                    ch: '·',
                }
            })
            .collect();
        Self { size, cells }
    }

    #[cfg(test)]
    pub(crate) fn pattern(&self) -> Vec<String> {
        self.cells
            .chunks(self.size.cols.max(1))
            .map(|row| row.iter().map(|c| if c.alive { '#' } else { '.' }).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(1)
    }

    #[test]
    fn neighbor_counts_stay_in_bounds() {
        let grid = LifeGrid::from_pattern(&["###", "###", "###"]);
        assert_eq!(grid.neighbors(0, 0), 3);
        assert_eq!(grid.neighbors(1, 0), 5);
        assert_eq!(grid.neighbors(1, 1), 8);
        assert_eq!(grid.neighbors(2, 2), 3);

        let lone = LifeGrid::from_pattern(&["#"]);
        assert_eq!(lone.neighbors(0, 0), 0);
    }

    #[test]
    fn lone_cell_dies() {
        let mut grid = LifeGrid::from_pattern(&["...", ".#.", "..."]);
        grid.step(&RuleSet::CONWAY, &mut rng());
        assert_eq!(grid.population(), 0);
        assert!(grid.cell(1, 1).unwrap().previous);
    }

    #[test]
    fn block_is_a_still_life() {
        let start = ["......", "..##..", "..##..", "......"];
        let mut grid = LifeGrid::from_pattern(&start);
        let mut rng = rng();
        for _ in 0..50 {
            grid.step(&RuleSet::CONWAY, &mut rng);
            assert_eq!(grid.pattern(), start);
        }
    }

    #[test]
    fn prepare_reads_a_frozen_generation() {
        let mut grid = LifeGrid::from_pattern(&["#.#", "...", "#.."]);
        grid.prepare(&RuleSet::CONWAY);
        assert!(grid.cell(1, 1).unwrap().next);
        assert!(!grid.cell(1, 1).unwrap().alive);
        grid.apply(&mut rng());
        assert_eq!(grid.pattern(), ["...", ".#.", "..."]);
    }

    #[test]
    fn births_get_new_glyphs() {
        let mut grid = LifeGrid::from_pattern(&["#.#", "...", "#.."]);
        grid.step(&RuleSet::CONWAY, &mut rng());
        let born = grid.cell(1, 1).unwrap();
        assert!(born.alive);
        assert_ne!(born.ch, '·');
        assert!(CELL_GLYPHS.contains(born.ch));
    }

    #[test]
    fn set_alive_ignores_out_of_bounds() {
        let mut grid = LifeGrid::from_pattern(&["..", ".."]);
        let mut rng = rng();
        assert!(!grid.set_alive(-1, 0, &mut rng));
        assert!(!grid.set_alive(0, 2, &mut rng));
        assert!(grid.set_alive(1, 0, &mut rng));
        assert_eq!(grid.pattern(), [".#", ".."]);
        assert!(grid.cell(1, 0).unwrap().next);
    }

    #[test]
    fn seeded_tick_repeats() {
        let run = || {
            let mut rng = StdRng::seed_from_u64(42);
            let mut grid = LifeGrid::seeded(GridSize::new(20, 10), 0.3, &mut rng);
            grid.step(&RuleSet::CONWAY, &mut rng);
            grid.cells.iter().map(|c| (c.alive, c.ch)).collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn seeded_density_is_roughly_honoured() {
        let grid = LifeGrid::seeded(GridSize::new(100, 100), 0.25, &mut rng());
        let pop = grid.population();
        assert!((2_000..3_000).contains(&pop), "{pop}");
    }
}
