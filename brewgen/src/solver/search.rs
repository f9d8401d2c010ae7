//! Propagation and depth-first search over a [`CpModel`].
//!
//! Every linear constraint is propagated to bounds consistency. Enumeration
//! splits `x = lo | x >= lo + 1`, so each complete assignment is reached
//! exactly once. Optimization first looks for any solution, then runs branch
//! and bound where every node is bounded by the linear relaxation of its
//! domains and branches on the most fractional variable.

use crate::solver::linear::{Sense, VarId};
use crate::solver::model::CpModel;
use crate::solver::relax::{LpResult, Relaxation};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

type Dom = Vec<(i64, i64)>;

/// Nodes between two clock checks.
const CLOCK_INTERVAL: u64 = 64;
/// Node limit for the first-solution dive before branch and bound.
const FIRST_SOLUTION_NODES: u64 = 20_000;
/// Distance from an integer still counted as integral.
const INTEGRAL_TOL: f64 = 1e-6;

/// Shared flag an outside caller flips to abort a running search.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Wall-clock limit plus optional cancellation.
#[derive(Debug, Clone, Default)]
pub struct Budget {
    pub time_limit: Option<Duration>,
    pub cancel: Option<CancelToken>,
}

impl Budget {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn with_time_limit(limit: Duration) -> Self {
        Self {
            time_limit: Some(limit),
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjSense {
    Minimize,
    Maximize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    /// Optimum proven (or, without objective, a solution found).
    Optimal,
    /// A solution found, optimality not proven before the budget ran out.
    Feasible,
    /// Search space exhausted without a solution.
    Infeasible,
    /// Budget ran out before anything was found.
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    Deadline,
    Cancelled,
    /// The solution callback asked to stop.
    Limit,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub nodes: u64,
    pub solutions: u64,
    pub elapsed: Duration,
}

/// A complete assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    values: Vec<i64>,
}

impl Solution {
    pub fn value(&self, v: VarId) -> i64 {
        self.values[v.0]
    }

    pub fn is_true(&self, v: VarId) -> bool {
        self.values[v.0] != 0
    }

    pub fn values(&self) -> &[i64] {
        &self.values
    }
}

#[derive(Debug, Clone)]
pub struct SolveResult {
    pub status: SolveStatus,
    pub solution: Option<Solution>,
    pub stats: SearchStats,
}

#[derive(Debug, Clone)]
pub struct EnumerateResult {
    /// The whole search space was explored.
    pub exhausted: bool,
    pub stopped: Option<StopReason>,
    pub stats: SearchStats,
}

/// What the solution callback wants next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Stop,
}

struct Compiled {
    terms: Vec<(usize, i128)>,
    lo: Option<i128>,
    hi: Option<i128>,
    enforce: Option<(usize, bool)>,
}

impl Compiled {
    fn holds(&self, values: &[i64]) -> bool {
        if let Some((lit, positive)) = self.enforce {
            if (values[lit] != 0) != positive {
                return true;
            }
        }
        let s: i128 = self.terms.iter().map(|&(v, a)| a * values[v] as i128).sum();
        self.lo.map_or(true, |lo| s >= lo) && self.hi.map_or(true, |hi| s <= hi)
    }

    fn activity(&self, dom: &Dom) -> (i128, i128) {
        let mut min_s = 0i128;
        let mut max_s = 0i128;
        for &(v, a) in &self.terms {
            let (lb, ub) = (dom[v].0 as i128, dom[v].1 as i128);
            if a > 0 {
                min_s += a * lb;
                max_s += a * ub;
            } else {
                min_s += a * ub;
                max_s += a * lb;
            }
        }
        (min_s, max_s)
    }
}

struct Node {
    dom: Dom,
    changed: Option<usize>,
}

struct Clock {
    start: Instant,
    deadline: Option<Instant>,
    cancel: Option<CancelToken>,
}

impl Clock {
    fn start(budget: &Budget) -> Self {
        let start = Instant::now();
        Self {
            start,
            deadline: budget.time_limit.map(|d| start + d),
            cancel: budget.cancel.clone(),
        }
    }

    fn expired(&self) -> Option<StopReason> {
        if self.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
            return Some(StopReason::Cancelled);
        }
        match self.deadline {
            Some(d) if Instant::now() >= d => Some(StopReason::Deadline),
            _ => None,
        }
    }
}

struct Run {
    exhausted: bool,
    stopped: Option<StopReason>,
    stats: SearchStats,
}

/// Search engine bound to one model. Cheap to build; holds no search state
/// between calls, so the same solver can run several objectives.
pub struct Solver<'m> {
    model: &'m CpModel,
    compiled: Vec<Compiled>,
    occurs: Vec<Vec<usize>>,
}

impl<'m> Solver<'m> {
    pub fn new(model: &'m CpModel) -> Self {
        let mut occurs = vec![Vec::new(); model.vars.len()];
        let compiled = model
            .constraints
            .iter()
            .enumerate()
            .map(|(ci, c)| {
                let (lo, hi) = c.var_bounds();
                let terms: Vec<(usize, i128)> = c
                    .expr
                    .terms()
                    .filter(|(_, a)| *a != 0)
                    .map(|(v, a)| (v.0, a as i128))
                    .collect();
                for &(v, _) in &terms {
                    occurs[v].push(ci);
                }
                let enforce = c.enforce.map(|l| (l.var.0, l.positive));
                if let Some((v, _)) = enforce {
                    occurs[v].push(ci);
                }
                debug_assert!(c.sense != Sense::Eq || lo == hi);
                Compiled {
                    terms,
                    lo,
                    hi,
                    enforce,
                }
            })
            .collect();
        Self {
            model,
            compiled,
            occurs,
        }
    }

    /// Finds any solution.
    pub fn solve(&self, budget: &Budget) -> SolveResult {
        let clock = Clock::start(budget);
        let mut found = None;
        let run = self.run(&clock, None, |s| {
            found = Some(s.clone());
            Control::Stop
        });
        let status = match (&found, run.exhausted) {
            (Some(_), _) => SolveStatus::Optimal,
            (None, true) => SolveStatus::Infeasible,
            (None, false) => SolveStatus::Unknown,
        };
        debug!(model = %self.model.name, ?status, nodes = run.stats.nodes, "solve");
        SolveResult {
            status,
            solution: found,
            stats: run.stats,
        }
    }

    /// Maximizes or minimizes a single variable.
    ///
    /// A bounded value-by-value dive supplies the first incumbent; branch and
    /// bound then proves or improves it.
    pub fn optimize(&self, objective: VarId, sense: ObjSense, budget: &Budget) -> SolveResult {
        let clock = Clock::start(budget);
        let mut best: Option<Solution> = None;
        let dive = self.run(&clock, Some(FIRST_SOLUTION_NODES), |s| {
            best = Some(s.clone());
            Control::Stop
        });
        let mut stats = dive.stats;
        let exhausted = if dive.exhausted && best.is_none() {
            true
        } else if matches!(dive.stopped, Some(StopReason::Deadline | StopReason::Cancelled)) {
            false
        } else {
            let bb = self.branch_and_bound(objective, sense, &clock, &mut best);
            stats.nodes += bb.stats.nodes;
            stats.solutions += bb.stats.solutions;
            bb.exhausted
        };
        stats.elapsed = clock.start.elapsed();
        let status = match (&best, exhausted) {
            (Some(_), true) => SolveStatus::Optimal,
            (Some(_), false) => SolveStatus::Feasible,
            (None, true) => SolveStatus::Infeasible,
            (None, false) => SolveStatus::Unknown,
        };
        debug!(
            model = %self.model.name,
            objective = %self.model.var(objective).name,
            ?sense,
            ?status,
            nodes = stats.nodes,
            "optimize"
        );
        SolveResult {
            status,
            solution: best,
            stats,
        }
    }

    /// Reports every solution to `on_solution` until the space is exhausted,
    /// the budget expires or the callback returns [`Control::Stop`].
    pub fn enumerate<F>(&self, budget: &Budget, on_solution: F) -> EnumerateResult
    where
        F: FnMut(&Solution) -> Control,
    {
        let clock = Clock::start(budget);
        let run = self.run(&clock, None, on_solution);
        debug!(
            model = %self.model.name,
            exhausted = run.exhausted,
            stopped = ?run.stopped,
            solutions = run.stats.solutions,
            nodes = run.stats.nodes,
            "enumerate"
        );
        EnumerateResult {
            exhausted: run.exhausted,
            stopped: run.stopped,
            stats: run.stats,
        }
    }

    fn branch_order(&self) -> Vec<usize> {
        let mut seen = vec![false; self.model.vars.len()];
        let mut order = Vec::with_capacity(self.model.vars.len());
        let preferred = self.model.decision_vars.iter().map(|v| v.0);
        for v in preferred.chain(0..self.model.vars.len()) {
            if !seen[v] {
                seen[v] = true;
                order.push(v);
            }
        }
        order
    }

    /// Root domains after propagation, `None` when the model is inconsistent.
    fn root(&self) -> Option<Dom> {
        let mut root: Dom = self.model.vars.iter().map(|v| (v.lo, v.hi)).collect();
        if root.iter().any(|(lo, hi)| lo > hi) || !self.propagate(&mut root, 0..self.compiled.len()) {
            return None;
        }
        Some(root)
    }

    /// Depth-first search splitting `x = lo | x >= lo + 1`. Without a
    /// `StopReason`, an unexhausted run hit `node_limit`.
    fn run<F>(&self, clock: &Clock, node_limit: Option<u64>, mut on_solution: F) -> Run
    where
        F: FnMut(&Solution) -> Control,
    {
        let mut stats = SearchStats::default();
        let order = self.branch_order();
        let stop = |stats: &mut SearchStats, exhausted: bool, stopped: Option<StopReason>| {
            stats.elapsed = clock.start.elapsed();
            Run {
                exhausted,
                stopped,
                stats: std::mem::take(stats),
            }
        };

        let Some(root) = self.root() else {
            return stop(&mut stats, true, None);
        };
        let mut stack = vec![Node {
            dom: root,
            changed: None,
        }];
        while let Some(mut node) = stack.pop() {
            if stats.nodes % CLOCK_INTERVAL == 0 {
                if let Some(reason) = clock.expired() {
                    return stop(&mut stats, false, Some(reason));
                }
            }
            if node_limit.is_some_and(|n| stats.nodes >= n) {
                return stop(&mut stats, false, None);
            }
            stats.nodes += 1;

            if let Some(v) = node.changed {
                if !self.propagate(&mut node.dom, self.occurs[v].iter().copied()) {
                    continue;
                }
            }

            let Some(v) = order.iter().copied().find(|&v| node.dom[v].0 < node.dom[v].1) else {
                stats.solutions += 1;
                let sol = Solution {
                    values: node.dom.iter().map(|d| d.0).collect(),
                };
                if on_solution(&sol) == Control::Stop {
                    return stop(&mut stats, false, Some(StopReason::Limit));
                }
                continue;
            };

            let (lo, hi) = node.dom[v];
            let mut other = node.dom.clone();
            other[v] = (lo + 1, hi);
            stack.push(Node {
                dom: other,
                changed: Some(v),
            });
            node.dom[v] = (lo, lo);
            stack.push(Node {
                dom: node.dom,
                changed: Some(v),
            });
        }
        stop(&mut stats, true, None)
    }

    /// Branch and bound on `objective`, improving `best` in place.
    fn branch_and_bound(&self, objective: VarId, sense: ObjSense, clock: &Clock, best: &mut Option<Solution>) -> Run {
        let mut stats = SearchStats::default();
        let order = self.branch_order();
        let maximize = sense == ObjSense::Maximize;
        let obj = objective.0;
        let mut lp_solves = 0u64;

        let Some(root) = self.root() else {
            return Run {
                exhausted: true,
                stopped: None,
                stats,
            };
        };
        let mut stack = vec![Node {
            dom: root,
            changed: None,
        }];
        while let Some(mut node) = stack.pop() {
            // relaxations dominate node cost, so the clock is read every node
            if let Some(reason) = clock.expired() {
                debug!(nodes = stats.nodes, lp_solves, "branch and bound interrupted");
                return Run {
                    exhausted: false,
                    stopped: Some(reason),
                    stats,
                };
            }
            stats.nodes += 1;

            let incumbent = best.as_ref().map(|s| s.value(objective));
            let mut seeds: Vec<usize> = Vec::new();
            if let Some(v) = node.changed {
                seeds.extend_from_slice(&self.occurs[v]);
            }
            if let Some(b) = incumbent {
                let d = &mut node.dom[obj];
                if maximize {
                    d.0 = d.0.max(b + 1);
                } else {
                    d.1 = d.1.min(b - 1);
                }
                if d.0 > d.1 {
                    continue;
                }
                seeds.extend_from_slice(&self.occurs[obj]);
            }
            if !seeds.is_empty() && !self.propagate(&mut node.dom, seeds) {
                continue;
            }

            if node.dom.iter().all(|d| d.0 == d.1) {
                stats.solutions += 1;
                *best = Some(Solution {
                    values: node.dom.iter().map(|d| d.0).collect(),
                });
                continue;
            }

            lp_solves += 1;
            let (lp, columns) = self.relaxation(&node.dom, obj);
            let (z, x) = match lp.solve(0, maximize) {
                LpResult::Infeasible => continue,
                LpResult::Failed => {
                    let Some(v) = order.iter().copied().find(|&v| node.dom[v].0 < node.dom[v].1) else {
                        continue;
                    };
                    let (lo, hi) = node.dom[v];
                    let mid = lo + (hi - lo) / 2;
                    push_split(&mut stack, node.dom, v, (lo, mid), (mid + 1, hi));
                    continue;
                }
                LpResult::Optimal { objective: z, values } => (z, values),
            };
            if let Some(b) = incumbent {
                let tol = 1e-7 * z.abs().max(1.0) + 1e-4;
                let hopeless = if maximize { z < (b + 1) as f64 - tol } else { z > (b - 1) as f64 + tol };
                if hopeless {
                    continue;
                }
            }

            let mut lp_value = vec![None; node.dom.len()];
            for (c, &v) in columns.iter().enumerate() {
                lp_value[v] = Some(x[c]);
            }
            let improves = |best: &Option<Solution>, value: i64| {
                best.as_ref().map_or(true, |s| {
                    if maximize {
                        value > s.value(objective)
                    } else {
                        value < s.value(objective)
                    }
                })
            };

            let decisions: Vec<usize> = self.model.decision_vars.iter().map(|v| v.0).collect();
            if let Some((v, value)) = self.fractional(&node.dom, &lp_value, &decisions) {
                push_rounded_split(&mut stack, node.dom, v, value);
                continue;
            }
            // integral decisions usually determine everything else
            if let Some(values) = self.complete(&node.dom, &lp_value) {
                if improves(best, values[obj]) {
                    stats.solutions += 1;
                    *best = Some(Solution { values });
                }
            }
            let reached = best.as_ref().is_some_and(|s| {
                let value = s.value(objective) as f64;
                if maximize {
                    value >= (z + 1e-6).floor()
                } else {
                    value <= (z - 1e-6).ceil()
                }
            });
            if reached {
                continue;
            }
            if let Some((v, value)) = self.fractional(&node.dom, &lp_value, &order) {
                push_rounded_split(&mut stack, node.dom, v, value);
                continue;
            }

            let values: Vec<i64> = node
                .dom
                .iter()
                .zip(&lp_value)
                .map(|(&(lo, hi), x)| match x {
                    Some(x) => (x.round() as i64).clamp(lo, hi),
                    None => lo,
                })
                .collect();
            if !improves(best, values[obj]) {
                continue;
            }
            if self.compiled.iter().all(|c| c.holds(&values)) {
                stats.solutions += 1;
                *best = Some(Solution { values });
                continue;
            }
            // a conditional left out of the relaxation is violated:
            // decide its literal, inactive side first
            let open = self.compiled.iter().find_map(|c| {
                let (lit, positive) = c.enforce?;
                (node.dom[lit].0 < node.dom[lit].1 && !c.holds(&values)).then_some((lit, positive))
            });
            if let Some((lit, positive)) = open {
                let (inactive, active) = if positive { ((0, 0), (1, 1)) } else { ((1, 1), (0, 0)) };
                push_split(&mut stack, node.dom, lit, inactive, active);
                continue;
            }
            let Some(v) = order.iter().copied().find(|&v| node.dom[v].0 < node.dom[v].1) else {
                continue;
            };
            let (lo, hi) = node.dom[v];
            let mid = lo + (hi - lo) / 2;
            push_split(&mut stack, node.dom, v, (lo, mid), (mid + 1, hi));
        }
        debug!(nodes = stats.nodes, lp_solves, "branch and bound exhausted");
        Run {
            exhausted: true,
            stopped: None,
            stats,
        }
    }

    /// Linear relaxation of the constraints that still matter under `dom`.
    /// Column 0 is `objective`; the returned vector maps columns to variables.
    ///
    /// Conditionals with an undecided literal are left out, as are rows that
    /// hold for every point of the box or have at most one open variable
    /// (propagation already enforces those).
    fn relaxation(&self, dom: &Dom, objective: usize) -> (Relaxation, Vec<usize>) {
        let mut column_of: Vec<Option<usize>> = vec![None; dom.len()];
        let mut columns = vec![objective];
        column_of[objective] = Some(0);
        let mut rows = Vec::new();
        for c in &self.compiled {
            if let Some((lit, positive)) = c.enforce {
                let (l, h) = dom[lit];
                if l < h || (l == 1) != positive {
                    continue;
                }
            }
            let (min_s, max_s) = c.activity(dom);
            if c.lo.map_or(true, |lo| min_s >= lo) && c.hi.map_or(true, |hi| max_s <= hi) {
                continue;
            }
            let mut fixed = 0i128;
            let mut terms = Vec::new();
            for &(v, a) in &c.terms {
                let (lo, hi) = dom[v];
                if lo == hi {
                    fixed += a * lo as i128;
                } else {
                    terms.push((v, a));
                }
            }
            if terms.len() <= 1 {
                continue;
            }
            let terms: Vec<(usize, f64)> = terms
                .into_iter()
                .map(|(v, a)| {
                    let col = *column_of[v].get_or_insert_with(|| {
                        columns.push(v);
                        columns.len() - 1
                    });
                    (col, a as f64)
                })
                .collect();
            let lo = c.lo.map_or(f64::NEG_INFINITY, |lo| (lo - fixed) as f64);
            let hi = c.hi.map_or(f64::INFINITY, |hi| (hi - fixed) as f64);
            rows.push((terms, lo, hi));
        }
        let lower = columns.iter().map(|&v| dom[v].0 as f64).collect();
        let upper = columns.iter().map(|&v| dom[v].1 as f64).collect();
        let mut lp = Relaxation::new(lower, upper);
        for (terms, lo, hi) in rows {
            lp.add_row(terms, lo, hi);
        }
        (lp, columns)
    }

    /// Open variable whose relaxed value is furthest from an integer, two-valued
    /// domains first.
    fn fractional(&self, dom: &Dom, lp_value: &[Option<f64>], order: &[usize]) -> Option<(usize, f64)> {
        let mut pick = None;
        let mut best_score = 0.0;
        for &v in order {
            let (lo, hi) = dom[v];
            let Some(x) = lp_value[v] else {
                continue;
            };
            if lo == hi {
                continue;
            }
            let dist = (x - x.round()).abs();
            if dist <= INTEGRAL_TOL {
                continue;
            }
            let score = if hi - lo == 1 { dist + 1.0 } else { dist };
            if score > best_score {
                best_score = score;
                pick = Some((v, x));
            }
        }
        pick
    }

    /// Fixes the decision variables to their rounded relaxed values and
    /// propagates. A full assignment comes back only if nothing conflicts.
    fn complete(&self, dom: &Dom, lp_value: &[Option<f64>]) -> Option<Vec<i64>> {
        let mut dom = dom.clone();
        for v in self.model.decision_vars.iter().map(|v| v.0) {
            let (lo, hi) = dom[v];
            let x = lp_value[v].map_or(lo, |x| (x.round() as i64).clamp(lo, hi));
            dom[v] = (x, x);
        }
        if !self.propagate(&mut dom, 0..self.compiled.len()) || dom.iter().any(|d| d.0 < d.1) {
            return None;
        }
        Some(dom.into_iter().map(|d| d.0).collect())
    }

    /// Runs the seeded constraints to a fix point. `false` on conflict.
    fn propagate<I: IntoIterator<Item = usize>>(&self, dom: &mut Dom, seeds: I) -> bool {
        let mut queued = vec![false; self.compiled.len()];
        let mut queue = VecDeque::new();
        for c in seeds {
            if !queued[c] {
                queued[c] = true;
                queue.push_back(c);
            }
        }
        let mut changed = Vec::new();
        while let Some(c) = queue.pop_front() {
            queued[c] = false;
            changed.clear();
            if !self.propagate_one(c, dom, &mut changed) {
                return false;
            }
            for &v in &changed {
                for &c2 in &self.occurs[v] {
                    if !queued[c2] {
                        queued[c2] = true;
                        queue.push_back(c2);
                    }
                }
            }
        }
        true
    }

    fn propagate_one(&self, ci: usize, dom: &mut Dom, changed: &mut Vec<usize>) -> bool {
        let c = &self.compiled[ci];
        let (min_s, max_s) = c.activity(dom);
        let violated = c.lo.is_some_and(|lo| max_s < lo) || c.hi.is_some_and(|hi| min_s > hi);

        if let Some((lit, positive)) = c.enforce {
            let (l, h) = dom[lit];
            if l == h {
                if (l == 1) != positive {
                    return true;
                }
            } else {
                // literal still open: it can only be pushed towards "inactive"
                if violated {
                    let inactive = if positive { 0 } else { 1 };
                    dom[lit] = (inactive, inactive);
                    changed.push(lit);
                }
                return true;
            }
        }
        if violated {
            return false;
        }

        for &(v, a) in &c.terms {
            let (lb, ub) = (dom[v].0 as i128, dom[v].1 as i128);
            let (min_c, max_c) = if a > 0 { (a * lb, a * ub) } else { (a * ub, a * lb) };
            let (mut new_lb, mut new_ub) = (lb, ub);
            if let Some(hi) = c.hi {
                let slack = hi - (min_s - min_c);
                if a > 0 {
                    new_ub = new_ub.min(floor_div(slack, a));
                } else {
                    new_lb = new_lb.max(ceil_div(slack, a));
                }
            }
            if let Some(lo) = c.lo {
                let need = lo - (max_s - max_c);
                if a > 0 {
                    new_lb = new_lb.max(ceil_div(need, a));
                } else {
                    new_ub = new_ub.min(floor_div(need, a));
                }
            }
            if new_lb > new_ub {
                return false;
            }
            if new_lb != lb || new_ub != ub {
                dom[v] = (new_lb as i64, new_ub as i64);
                changed.push(v);
            }
        }
        true
    }
}

/// Pushes both halves of a split on `v`, `first` explored first.
fn push_split(stack: &mut Vec<Node>, dom: Dom, v: usize, first: (i64, i64), second: (i64, i64)) {
    let mut other = dom.clone();
    other[v] = second;
    stack.push(Node {
        dom: other,
        changed: Some(v),
    });
    let mut dom = dom;
    dom[v] = first;
    stack.push(Node { dom, changed: Some(v) });
}

/// Splits `v` around its fractional relaxed value, nearer side first.
fn push_rounded_split(stack: &mut Vec<Node>, dom: Dom, v: usize, value: f64) {
    let (lo, hi) = dom[v];
    let down = (value.floor() as i64).clamp(lo, hi - 1);
    let (lower, upper) = ((lo, down), (down + 1, hi));
    if value - value.floor() >= 0.5 {
        push_split(stack, dom, v, upper, lower);
    } else {
        push_split(stack, dom, v, lower, upper);
    }
}

fn floor_div(a: i128, b: i128) -> i128 {
    let q = a / b;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

fn ceil_div(a: i128, b: i128) -> i128 {
    -floor_div(-a, b)
}
