//! Linear relaxation of a search node, solved with a bounded-variable primal
//! simplex on a dense tableau.
//!
//! Every row `lo <= a·x <= hi` gets a slack column `s = a·x` carrying the row
//! bounds, so the tableau starts from the all-slack basis. Phase one drives
//! basic variables into their bounds by minimizing the total violation; phase
//! two optimizes a single column.

const PIVOT_TOL: f64 = 1e-9;
const FEAS_TOL: f64 = 1e-7;
const OPT_TOL: f64 = 1e-9;
/// Total bound violation above which phase one gives up.
const INFEASIBLE_TOL: f64 = 1e-5;
/// Degenerate pivots in a row before switching to Bland's rule.
const DEGENERATE_RUN: usize = 50;
const STEP_EPS: f64 = 1e-12;

#[derive(Debug, Clone)]
struct Row {
    terms: Vec<(usize, f64)>,
    lo: f64,
    hi: f64,
}

/// Column bounds plus rows. Missing row sides are infinite.
#[derive(Debug, Clone, Default)]
pub(crate) struct Relaxation {
    lower: Vec<f64>,
    upper: Vec<f64>,
    rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LpResult {
    Optimal { objective: f64, values: Vec<f64> },
    Infeasible,
    /// Iteration cap or numerical trouble: no bound to use.
    Failed,
}

impl Relaxation {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        Self {
            lower,
            upper,
            rows: Vec::new(),
        }
    }

    /// Adds `lo <= sum(a * x) <= hi`, normalized so the largest coefficient is 1.
    pub fn add_row(&mut self, terms: Vec<(usize, f64)>, lo: f64, hi: f64) {
        let norm = terms.iter().fold(0.0_f64, |m, (_, a)| m.max(a.abs()));
        if norm == 0.0 {
            return;
        }
        self.rows.push(Row {
            terms: terms.into_iter().map(|(j, a)| (j, a / norm)).collect(),
            lo: lo / norm,
            hi: hi / norm,
        });
    }

    /// Optimizes column `column` over the relaxation.
    pub fn solve(&self, column: usize, maximize: bool) -> LpResult {
        if self.lower.iter().zip(&self.upper).any(|(l, u)| l > u) {
            return LpResult::Infeasible;
        }
        let mut t = Tableau::new(self);
        let mut iterations = 50 * t.width + 1_000;
        if t.run(Phase::Feasibility, &mut iterations) != Stop::Done {
            return LpResult::Failed;
        }
        t.refresh();
        if t.violation() > INFEASIBLE_TOL {
            return LpResult::Infeasible;
        }
        let cost = if maximize { -1.0 } else { 1.0 };
        if t.run(Phase::Optimize { column, cost }, &mut iterations) != Stop::Done {
            return LpResult::Failed;
        }
        t.refresh();
        if t.violation() > INFEASIBLE_TOL {
            return LpResult::Failed;
        }
        LpResult::Optimal {
            objective: t.value[column],
            values: t.value[..self.lower.len()].to_vec(),
        }
    }
}

#[derive(Clone, Copy)]
enum Phase {
    Feasibility,
    /// Minimize `cost * x[column]`.
    Optimize { column: usize, cost: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Done,
    Unbounded,
    IterationLimit,
}

/// `a` holds `B⁻¹ [A | -I]` row-major; basic values satisfy
/// `x_B[r] = -sum(a[r][j] * x_j)` over nonbasic `j`.
struct Tableau {
    m: usize,
    width: usize,
    a: Vec<f64>,
    basis: Vec<usize>,
    row_of: Vec<Option<usize>>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    value: Vec<f64>,
    at_upper: Vec<bool>,
}

impl Tableau {
    fn new(lp: &Relaxation) -> Self {
        let n = lp.lower.len();
        let m = lp.rows.len();
        let width = n + m;
        let mut a = vec![0.0; m * width];
        for (r, row) in lp.rows.iter().enumerate() {
            for &(j, c) in &row.terms {
                a[r * width + j] -= c;
            }
            a[r * width + n + r] = 1.0;
        }
        let mut lower = lp.lower.clone();
        lower.extend(lp.rows.iter().map(|r| r.lo));
        let mut upper = lp.upper.clone();
        upper.extend(lp.rows.iter().map(|r| r.hi));
        let mut value = vec![0.0; width];
        value[..n].copy_from_slice(&lp.lower);
        let mut row_of = vec![None; width];
        for r in 0..m {
            row_of[n + r] = Some(r);
        }
        let mut t = Self {
            m,
            width,
            a,
            basis: (n..width).collect(),
            row_of,
            lower,
            upper,
            value,
            at_upper: vec![false; width],
        };
        t.refresh();
        t
    }

    fn row(&self, r: usize) -> &[f64] {
        &self.a[r * self.width..(r + 1) * self.width]
    }

    /// Recomputes basic values from the nonbasic ones.
    fn refresh(&mut self) {
        for r in 0..self.m {
            let mut v = 0.0;
            for (j, &x) in self.row(r).iter().enumerate() {
                if x != 0.0 && self.row_of[j].is_none() {
                    v -= x * self.value[j];
                }
            }
            let b = self.basis[r];
            self.value[b] = v;
        }
    }

    fn violation(&self) -> f64 {
        self.basis
            .iter()
            .map(|&b| {
                let v = self.value[b];
                (self.lower[b] - v).max(0.0) + (v - self.upper[b]).max(0.0)
            })
            .sum()
    }

    fn run(&mut self, phase: Phase, iterations: &mut usize) -> Stop {
        let mut d = vec![0.0; self.width];
        let mut degenerate = 0;
        loop {
            if *iterations == 0 {
                return Stop::IterationLimit;
            }
            *iterations -= 1;
            if !self.reduced_costs(phase, &mut d) {
                return Stop::Done;
            }
            let bland = degenerate >= DEGENERATE_RUN;
            let Some((q, dir)) = self.entering(&d, bland) else {
                return Stop::Done;
            };
            let Some((step, leave)) = self.ratio(q, dir, matches!(phase, Phase::Feasibility), bland) else {
                return Stop::Unbounded;
            };
            if step <= STEP_EPS {
                degenerate += 1;
            } else {
                degenerate = 0;
            }
            self.apply(q, dir, step, leave);
        }
    }

    /// Fills `d` with reduced costs. `false` when phase one has nothing left
    /// to fix.
    fn reduced_costs(&self, phase: Phase, d: &mut [f64]) -> bool {
        d.iter_mut().for_each(|x| *x = 0.0);
        match phase {
            Phase::Feasibility => {
                let mut any = false;
                for r in 0..self.m {
                    let b = self.basis[r];
                    let v = self.value[b];
                    let w = if v < self.lower[b] - FEAS_TOL {
                        1.0
                    } else if v > self.upper[b] + FEAS_TOL {
                        -1.0
                    } else {
                        continue;
                    };
                    any = true;
                    for (j, &x) in self.row(r).iter().enumerate() {
                        if x != 0.0 {
                            d[j] += w * x;
                        }
                    }
                }
                any
            }
            Phase::Optimize { column, cost } => {
                match self.row_of[column] {
                    Some(r) => {
                        for (j, &x) in self.row(r).iter().enumerate() {
                            d[j] = -cost * x;
                        }
                    }
                    None => d[column] = cost,
                }
                true
            }
        }
    }

    /// Improving nonbasic column and its direction: largest reduced cost, or
    /// the lowest index under Bland's rule.
    fn entering(&self, d: &[f64], bland: bool) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        let mut best_score = 0.0;
        for j in 0..self.width {
            if self.row_of[j].is_some() || self.upper[j] - self.lower[j] <= FEAS_TOL {
                continue;
            }
            let dir = if !self.at_upper[j] && d[j] < -OPT_TOL {
                1.0
            } else if self.at_upper[j] && d[j] > OPT_TOL {
                -1.0
            } else {
                continue;
            };
            if bland {
                return Some((j, dir));
            }
            if d[j].abs() > best_score {
                best_score = d[j].abs();
                best = Some((j, dir));
            }
        }
        best
    }

    /// Step length and the leaving row (with the bound it leaves at), or
    /// `None` as leaving row for a bound flip of the entering column.
    fn ratio(&self, q: usize, dir: f64, phase_one: bool, bland: bool) -> Option<(f64, Option<(usize, bool)>)> {
        let mut step = self.upper[q] - self.lower[q];
        let mut leave: Option<(usize, bool)> = None;
        let mut leave_pivot = 0.0_f64;
        for r in 0..self.m {
            let alpha = self.a[r * self.width + q];
            if alpha.abs() <= PIVOT_TOL {
                continue;
            }
            let rate = -alpha * dir;
            let b = self.basis[r];
            let (v, l, u) = (self.value[b], self.lower[b], self.upper[b]);
            // in phase one an infeasible basic stops where it becomes feasible
            let (limit, to_upper) = if phase_one && v < l - FEAS_TOL {
                if rate > 0.0 {
                    ((l - v) / rate, false)
                } else {
                    continue;
                }
            } else if phase_one && v > u + FEAS_TOL {
                if rate < 0.0 {
                    ((u - v) / rate, true)
                } else {
                    continue;
                }
            } else if rate > 0.0 {
                if u.is_infinite() {
                    continue;
                }
                ((u - v) / rate, true)
            } else {
                if l.is_infinite() {
                    continue;
                }
                ((l - v) / rate, false)
            };
            let limit = limit.max(0.0);
            let take = if limit < step - STEP_EPS {
                true
            } else if limit <= step + STEP_EPS {
                match leave {
                    Some((lr, _)) if bland => b < self.basis[lr],
                    Some(_) => alpha.abs() > leave_pivot,
                    None => false,
                }
            } else {
                false
            };
            if take {
                step = limit;
                leave = Some((r, to_upper));
                leave_pivot = alpha.abs();
            }
        }
        if step.is_infinite() {
            return None;
        }
        Some((step, leave))
    }

    fn apply(&mut self, q: usize, dir: f64, step: f64, leave: Option<(usize, bool)>) {
        if step > 0.0 {
            for r in 0..self.m {
                let alpha = self.a[r * self.width + q];
                if alpha != 0.0 {
                    let b = self.basis[r];
                    self.value[b] -= alpha * dir * step;
                }
            }
            self.value[q] += dir * step;
        }
        match leave {
            None => {
                self.at_upper[q] = dir > 0.0;
                self.value[q] = if self.at_upper[q] { self.upper[q] } else { self.lower[q] };
            }
            Some((r, to_upper)) => {
                let b = self.basis[r];
                self.value[b] = if to_upper { self.upper[b] } else { self.lower[b] };
                self.at_upper[b] = to_upper;
                self.pivot(r, q);
            }
        }
    }

    fn pivot(&mut self, r: usize, q: usize) {
        let w = self.width;
        let inv = 1.0 / self.a[r * w + q];
        let mut pivot_row = Vec::new();
        for j in 0..w {
            let x = self.a[r * w + j];
            if x != 0.0 {
                let y = if j == q { 1.0 } else { x * inv };
                self.a[r * w + j] = y;
                pivot_row.push((j, y));
            }
        }
        for i in 0..self.m {
            if i == r {
                continue;
            }
            let f = self.a[i * w + q];
            if f == 0.0 {
                continue;
            }
            for &(j, y) in &pivot_row {
                let x = self.a[i * w + j] - f * y;
                self.a[i * w + j] = if x.abs() < 1e-12 { 0.0 } else { x };
            }
            self.a[i * w + q] = 0.0;
        }
        let leaving = self.basis[r];
        self.row_of[leaving] = None;
        self.basis[r] = q;
        self.row_of[q] = Some(r);
    }
}
