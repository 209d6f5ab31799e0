//! Minimum-cost assignment via the Hungarian (Kuhn-Munkres) algorithm.
//!
//! Operates directly on rectangular matrices: with more rows than columns at
//! most `ncols` rows are matched, otherwise every row is. Callers express
//! forbidden pairings with a large sentinel cost and filter the result; the
//! solver itself has no special case for them.

use log::error;
use nalgebra::DMatrix;

use crate::{Error, Result};

/// Zero test on reduced costs. Reductions subtract exact minima, so true
/// zeros stay within one ulp of 0.
const ZERO_EPS: f64 = f64::EPSILON;

/// Outcome of one assignment solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// For each row, the matched column, or `None` when the row is unmatched.
    /// Each column appears at most once.
    pub row_to_col: Vec<Option<usize>>,
    /// Sum of the input costs over all matched cells.
    pub total_cost: f64,
}

impl Assignment {
    /// Iterate matched `(row, col)` pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.row_to_col
            .iter()
            .enumerate()
            .filter_map(|(row, col)| col.map(|c| (row, c)))
    }
}

/// Hungarian solver with working storage that persists across calls, so a
/// caller solving one matrix per frame does not reallocate per frame.
#[derive(Debug, Default)]
pub struct HungarianSolver {
    cost: Vec<f64>,
    starred: Vec<bool>,
    primed: Vec<bool>,
    covered_rows: Vec<bool>,
    covered_cols: Vec<bool>,
}

impl HungarianSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Solve the minimum-cost assignment for a nonnegative cost matrix.
    ///
    /// Returns [`Error::NegativeCost`] if any entry is negative; negative
    /// entries violate the input contract and would make the reductions
    /// meaningless.
    pub fn solve(&mut self, costs: &DMatrix<f64>) -> Result<Assignment> {
        let (nrows, ncols) = costs.shape();

        for row in 0..nrows {
            for col in 0..ncols {
                if costs[(row, col)] < 0.0 {
                    error!(
                        "cost matrix entry ({}, {}) is negative: {}",
                        row,
                        col,
                        costs[(row, col)]
                    );
                    return Err(Error::NegativeCost { row, col });
                }
            }
        }

        if nrows == 0 || ncols == 0 {
            return Ok(Assignment {
                row_to_col: vec![None; nrows],
                total_cost: 0.0,
            });
        }

        self.reset(costs);
        self.reduce(nrows, ncols);
        self.star_initial(nrows, ncols);
        self.cover_and_adjust(nrows, ncols);

        let mut row_to_col = vec![None; nrows];
        let mut total_cost = 0.0;
        for row in 0..nrows {
            for col in 0..ncols {
                if self.starred[row * ncols + col] {
                    row_to_col[row] = Some(col);
                    total_cost += costs[(row, col)];
                    break;
                }
            }
        }

        Ok(Assignment {
            row_to_col,
            total_cost,
        })
    }

    fn reset(&mut self, costs: &DMatrix<f64>) {
        let (nrows, ncols) = costs.shape();
        let cells = nrows * ncols;

        self.cost.clear();
        for row in 0..nrows {
            for col in 0..ncols {
                self.cost.push(costs[(row, col)]);
            }
        }

        self.starred.clear();
        self.starred.resize(cells, false);
        self.primed.clear();
        self.primed.resize(cells, false);
        self.covered_rows.clear();
        self.covered_rows.resize(nrows, false);
        self.covered_cols.clear();
        self.covered_cols.resize(ncols, false);
    }

    /// Initial reduction: subtract row minima when rows are the scarce side,
    /// column minima otherwise.
    fn reduce(&mut self, nrows: usize, ncols: usize) {
        if nrows <= ncols {
            for row in 0..nrows {
                let offset = row * ncols;
                let min = self.cost[offset..offset + ncols]
                    .iter()
                    .cloned()
                    .fold(f64::INFINITY, f64::min);
                for cell in &mut self.cost[offset..offset + ncols] {
                    *cell -= min;
                }
            }
        } else {
            for col in 0..ncols {
                let min = (0..nrows)
                    .map(|row| self.cost[row * ncols + col])
                    .fold(f64::INFINITY, f64::min);
                for row in 0..nrows {
                    self.cost[row * ncols + col] -= min;
                }
            }
        }
    }

    /// Star an independent set of zeros: at most one per row and column.
    fn star_initial(&mut self, nrows: usize, ncols: usize) {
        for row in 0..nrows {
            for col in 0..ncols {
                if self.cost[row * ncols + col].abs() < ZERO_EPS
                    && !self.covered_rows[row]
                    && !self.covered_cols[col]
                {
                    self.starred[row * ncols + col] = true;
                    self.covered_rows[row] = true;
                    self.covered_cols[col] = true;
                    break;
                }
            }
        }
        self.covered_rows.fill(false);
        self.covered_cols.fill(false);
    }

    /// Main loop: cover starred columns, then prime uncovered zeros until an
    /// augmenting path grows the star set, adjusting the reduced costs when
    /// no uncovered zero is left.
    fn cover_and_adjust(&mut self, nrows: usize, ncols: usize) {
        let min_dim = nrows.min(ncols);

        loop {
            for col in 0..ncols {
                self.covered_cols[col] =
                    (0..nrows).any(|row| self.starred[row * ncols + col]);
            }
            let covered = self.covered_cols.iter().filter(|&&c| c).count();
            if covered == min_dim {
                return;
            }

            loop {
                if let Some((row, col)) = self.find_uncovered_zero(nrows, ncols) {
                    self.primed[row * ncols + col] = true;
                    match (0..ncols).find(|&c| self.starred[row * ncols + c]) {
                        Some(star_col) => {
                            self.covered_rows[row] = true;
                            self.covered_cols[star_col] = false;
                        }
                        None => {
                            self.augment(row, col, nrows, ncols);
                            self.primed.fill(false);
                            self.covered_rows.fill(false);
                            self.covered_cols.fill(false);
                            break;
                        }
                    }
                } else {
                    self.adjust(nrows, ncols);
                }
            }
        }
    }

    fn find_uncovered_zero(&self, nrows: usize, ncols: usize) -> Option<(usize, usize)> {
        for row in 0..nrows {
            if self.covered_rows[row] {
                continue;
            }
            for col in 0..ncols {
                if !self.covered_cols[col] && self.cost[row * ncols + col].abs() < ZERO_EPS {
                    return Some((row, col));
                }
            }
        }
        None
    }

    /// Flip the alternating star/prime path rooted at an uncovered primed
    /// zero with no star in its row; grows the matching by one.
    fn augment(&mut self, start_row: usize, start_col: usize, nrows: usize, ncols: usize) {
        let mut row = start_row;
        let mut col = start_col;

        loop {
            let starred_row = (0..nrows).find(|&r| self.starred[r * ncols + col]);
            self.starred[row * ncols + col] = true;

            let Some(next_row) = starred_row else {
                return;
            };
            self.starred[next_row * ncols + col] = false;

            // Every covered row holds exactly one primed zero.
            let Some(next_col) = (0..ncols).find(|&c| self.primed[next_row * ncols + c]) else {
                return;
            };
            row = next_row;
            col = next_col;
        }
    }

    /// No uncovered zero left: shift the smallest uncovered value out of the
    /// uncovered cells, creating at least one new zero.
    fn adjust(&mut self, nrows: usize, ncols: usize) {
        let mut min = f64::INFINITY;
        for row in 0..nrows {
            if self.covered_rows[row] {
                continue;
            }
            for col in 0..ncols {
                if !self.covered_cols[col] {
                    min = min.min(self.cost[row * ncols + col]);
                }
            }
        }

        for row in 0..nrows {
            if self.covered_rows[row] {
                for col in 0..ncols {
                    self.cost[row * ncols + col] += min;
                }
            }
        }
        for col in 0..ncols {
            if !self.covered_cols[col] {
                for row in 0..nrows {
                    self.cost[row * ncols + col] -= min;
                }
            }
        }
    }
}
