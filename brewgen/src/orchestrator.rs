//! Solve modes: feasibility test, bill enumeration, descriptor ranges.
//!
//! Each call builds its own model from request data, runs the solver under
//! the configured budget and turns raw assignments into domain values.
//! Running out of budget is reported as [`Outcome::Partial`], never as an
//! empty complete answer.

use crate::bill::{GrainBill, HopBill};
use crate::config::BrewgenConfig;
use crate::error::Result;
use crate::formulation::{GrainFormulation, GrainProblem, HopFormulation, HopProblem};
use crate::ingredients::{aroma_keywords, sensory_keywords};
use crate::profile::{BeerProfile, EquipmentProfile, HopTarget, SensoryRange};
use crate::scaling::{Scale, SENSORY};
use crate::solver::{
    Budget, CancelToken, Control, CpModel, ObjSense, Solution, SolveStatus, Solver, StopReason,
    VarId,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Result of a mode that may run out of budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome<T> {
    /// The search space was covered.
    Complete(T),
    /// The budget, a cancellation or a solution cap cut the search short.
    /// The value is whatever was found until then, possibly nothing.
    Partial(T),
    /// The model has no solution at all.
    Infeasible,
}

impl<T> Outcome<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Complete(v) | Outcome::Partial(v) => Some(v),
            Outcome::Infeasible => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Outcome::Complete(v) | Outcome::Partial(v) => Some(v),
            Outcome::Infeasible => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Outcome::Complete(_))
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Complete(v) => Outcome::Complete(f(v)),
            Outcome::Partial(v) => Outcome::Partial(f(v)),
            Outcome::Infeasible => Outcome::Infeasible,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Feasibility {
    Satisfiable,
    Unsatisfiable,
    /// The budget ran out first.
    Unknown,
}

/// Entry point for all solve modes.
#[derive(Debug, Clone, Default)]
pub struct Formulator {
    config: BrewgenConfig,
    cancel: Option<CancelToken>,
}

impl Formulator {
    pub fn new(config: BrewgenConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    /// Every solve started afterwards stops once `token` is cancelled.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &BrewgenConfig {
        &self.config
    }

    /// Is there any bill at all for these fermentables and categories?
    pub fn test_model(&self, problem: &GrainProblem<'_>) -> Result<Feasibility> {
        let g = GrainFormulation::build(problem, &[])?;
        Ok(self.feasibility(&g.model))
    }

    /// Enumerates grain bills, then drops those whose rounded color is outside
    /// the beer's range.
    pub fn grain_bills(
        &self,
        problem: &GrainProblem<'_>,
        beer: &BeerProfile,
        equipment: &EquipmentProfile,
    ) -> Result<Outcome<Vec<GrainBill>>> {
        beer.validate()?;
        equipment.validate()?;
        let g = GrainFormulation::build(problem, &[])?;
        let mut rejected = 0usize;
        let outcome = self.enumerate(&g.model, |s| {
            let bill = g.bill(s)?;
            if beer.accepts_color(bill.srm(beer, equipment)) {
                Ok(Some(bill))
            } else {
                rejected += 1;
                Ok(None)
            }
        })?;
        info!(
            bills = outcome.value().map_or(0, Vec::len),
            rejected_by_color = rejected,
            complete = outcome.is_complete(),
            "grain bills"
        );
        Ok(outcome)
    }

    /// Min/max of each descriptor over all valid bills.
    ///
    /// `descriptors` defaults to every keyword of the fermentables. Each bound
    /// comes from its own optimization, so the ranges are marginal: the
    /// minimum of one descriptor and the maximum of another are not promised
    /// to hold for the same bill.
    pub fn sensory_ranges(
        &self,
        problem: &GrainProblem<'_>,
        descriptors: Option<&[String]>,
    ) -> Result<Outcome<Vec<SensoryRange>>> {
        let names = match descriptors {
            Some(d) => d.to_vec(),
            None => sensory_keywords(problem.fermentables),
        };
        let base = GrainFormulation::build(problem, &[])?;
        // one model per descriptor keeps each relaxation small
        let targets = names
            .iter()
            .map(|n| {
                let g = GrainFormulation::build(problem, std::slice::from_ref(n))?;
                Ok(g.descriptor(n).map(|var| RangeTarget {
                    name: n.clone(),
                    model: g.model,
                    var,
                    scale: SENSORY,
                }))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self.ranges(&base.model, targets.into_iter().flatten()))
    }

    pub fn hop_feasibility(&self, problem: &HopProblem<'_>) -> Result<Feasibility> {
        let recipe = self.hop_recipe(problem.recipe);
        let f = HopFormulation::build(&HopProblem { recipe: &recipe, ..*problem }, &[])?;
        Ok(self.feasibility(&f.model))
    }

    pub fn hop_bills(&self, problem: &HopProblem<'_>) -> Result<Outcome<Vec<HopBill>>> {
        let recipe = self.hop_recipe(problem.recipe);
        let f = HopFormulation::build(&HopProblem { recipe: &recipe, ..*problem }, &[])?;
        let outcome = self.enumerate(&f.model, |s| Ok(Some(f.bill(s))))?;
        info!(
            bills = outcome.value().map_or(0, Vec::len),
            complete = outcome.is_complete(),
            "hop bills"
        );
        Ok(outcome)
    }

    /// Min/max recipe flavor per descriptor; same marginal caveat as
    /// [`Formulator::sensory_ranges`]. Defaults to every aroma keyword of the hops.
    pub fn flavor_ranges(
        &self,
        problem: &HopProblem<'_>,
        descriptors: Option<&[String]>,
    ) -> Result<Outcome<Vec<SensoryRange>>> {
        let names = match descriptors {
            Some(d) => d.to_vec(),
            None => aroma_keywords(problem.hops),
        };
        let recipe = self.hop_recipe(problem.recipe);
        let problem = HopProblem { recipe: &recipe, ..*problem };
        let base = HopFormulation::build(&problem, &[])?;
        let targets = names
            .iter()
            .map(|n| {
                let f = HopFormulation::build(&problem, std::slice::from_ref(n))?;
                Ok(f.recipe_flavor_var(n).map(|var| RangeTarget {
                    name: n.clone(),
                    model: f.model,
                    var,
                    scale: f.flavor_scale,
                }))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self.ranges(&base.model, targets.into_iter().flatten()))
    }

    fn hop_recipe(&self, recipe: &HopTarget) -> HopTarget {
        let mut recipe = recipe.clone();
        if recipe.max_unique.is_none() {
            recipe.max_unique = Some(self.config.defaults.max_unique_hops);
        }
        recipe
    }

    fn feasibility(&self, model: &CpModel) -> Feasibility {
        let r = Solver::new(model).solve(&self.config.feasibility_budget(self.cancel.as_ref()));
        let f = match r.status {
            SolveStatus::Optimal | SolveStatus::Feasible => Feasibility::Satisfiable,
            SolveStatus::Infeasible => Feasibility::Unsatisfiable,
            SolveStatus::Unknown => Feasibility::Unknown,
        };
        info!(model = model.name(), feasibility = ?f, nodes = r.stats.nodes, "feasibility test");
        f
    }

    /// Runs enumeration, keeping what `accept` maps to `Some`.
    fn enumerate<T, F>(&self, model: &CpModel, mut accept: F) -> Result<Outcome<Vec<T>>>
    where
        F: FnMut(&Solution) -> Result<Option<T>>,
    {
        let budget = self.config.enumeration_budget(self.cancel.as_ref());
        let cap = self.config.solver.max_solutions;
        let mut found = Vec::new();
        let mut failure = None;
        // the cap only cuts the search once a bill beyond it turns up
        let mut overflow = false;
        let r = Solver::new(model).enumerate(&budget, |s| match accept(s) {
            Ok(Some(item)) => {
                if cap.is_some_and(|c| found.len() >= c) {
                    overflow = true;
                    Control::Stop
                } else {
                    found.push(item);
                    Control::Continue
                }
            }
            Ok(None) => Control::Continue,
            Err(e) => {
                failure = Some(e);
                Control::Stop
            }
        });
        if let Some(e) = failure {
            return Err(e);
        }
        match r.stopped {
            Some(StopReason::Deadline) | Some(StopReason::Cancelled) => warn!(
                model = model.name(),
                reason = ?r.stopped,
                solutions = r.stats.solutions,
                "enumeration cut short"
            ),
            _ => debug!(
                model = model.name(),
                solutions = r.stats.solutions,
                capped = overflow,
                "enumeration finished"
            ),
        }
        Ok(if r.exhausted {
            if r.stats.solutions == 0 {
                Outcome::Infeasible
            } else {
                Outcome::Complete(found)
            }
        } else {
            Outcome::Partial(found)
        })
    }

    /// Maximizes then minimizes every target. `base` is the model without
    /// descriptor aggregates, checked once up front. Descriptors whose bound
    /// could not be established in budget are left out of a partial answer.
    fn ranges<I>(&self, base: &CpModel, targets: I) -> Outcome<Vec<SensoryRange>>
    where
        I: IntoIterator<Item = RangeTarget>,
    {
        let mut complete = match self.feasibility(base) {
            Feasibility::Unsatisfiable => return Outcome::Infeasible,
            Feasibility::Unknown => false,
            Feasibility::Satisfiable => true,
        };
        let mut out = Vec::new();
        for t in targets {
            let solver = Solver::new(&t.model);
            let bound = |sense| {
                let budget: Budget = self.config.optimization_budget(self.cancel.as_ref());
                let r = solver.optimize(t.var, sense, &budget);
                debug!(descriptor = %t.name, ?sense, status = ?r.status, nodes = r.stats.nodes, "descriptor bound");
                (r.status, r.solution.map(|s| t.scale.decode(s.value(t.var))))
            };
            let (max_status, max) = bound(ObjSense::Maximize);
            if max_status == SolveStatus::Infeasible {
                info!(model = t.model.name(), "descriptor ranges: model infeasible");
                return Outcome::Infeasible;
            }
            let (min_status, min) = bound(ObjSense::Minimize);
            complete &= max_status == SolveStatus::Optimal && min_status == SolveStatus::Optimal;
            match (min, max) {
                (Some(min), Some(max)) => out.push(SensoryRange::new(t.name.clone(), min, max)),
                _ => warn!(descriptor = %t.name, "no bound found within budget"),
            }
        }
        info!(model = base.name(), descriptors = out.len(), complete, "descriptor ranges");
        if complete {
            Outcome::Complete(out)
        } else {
            Outcome::Partial(out)
        }
    }
}

/// One descriptor to bound, in its own model.
struct RangeTarget {
    name: String,
    model: CpModel,
    var: VarId,
    scale: Scale,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bill::{HopAddition, TimingBucket};
    use crate::ingredients::{Category, Fermentable, Hop, HopUsage};
    use crate::profile::{Bounds, BucketTarget};

    fn example() -> (Vec<Fermentable>, Vec<Category>) {
        let base = Fermentable::new("Base", "", "base", 1.037, 2.0).with_slug("base");
        let crystal = Fermentable::new("Crystal", "", "crystal", 1.032, 40.0)
            .with_slug("crystal")
            .with_usage(0.0, 25.0)
            .unwrap();
        (
            vec![base, crystal],
            vec![Category::new("base", 75.0, 100.0), Category::new("crystal", 0.0, 25.0)],
        )
    }

    fn wide_beer() -> BeerProfile {
        BeerProfile::new(1.050, 0.0, 100.0).unwrap()
    }

    fn equipment() -> EquipmentProfile {
        EquipmentProfile::new(75.0, 5.5).unwrap()
    }

    #[test]
    fn test_example_scenario() {
        let (f, c) = example();
        let problem = GrainProblem { fermentables: &f, categories: &c, max_unique: 2, sensory: &[] };
        let brew = Formulator::default();
        assert_eq!(brew.test_model(&problem).unwrap(), Feasibility::Satisfiable);

        let bills = brew.grain_bills(&problem, &wide_beer(), &equipment()).unwrap();
        assert!(bills.is_complete());
        let bills = bills.into_value().unwrap();
        assert_eq!(bills.len(), 26);
        assert!(bills.iter().any(|b| {
            let base = b.percent_of("base").unwrap();
            let crystal = b.percent_of("crystal").unwrap();
            (75.0..=100.0).contains(&base) && (0.0..=25.0).contains(&crystal) && base + crystal == 100.0
        }));
        for b in &bills {
            assert_eq!(b.total_percent(), 100.0);
            assert!(b.unique_count() <= 2);
            for (f, p) in b.used() {
                assert!(p >= f.min_percent && p <= f.max_percent);
            }
        }
    }

    #[test]
    fn test_infeasible_is_typed() {
        let (f, _) = example();
        let c = vec![Category::new("base", 0.0, 50.0), Category::new("crystal", 0.0, 25.0)];
        let problem = GrainProblem { fermentables: &f, categories: &c, max_unique: 2, sensory: &[] };
        let brew = Formulator::default();
        assert_eq!(brew.test_model(&problem).unwrap(), Feasibility::Unsatisfiable);
        assert_eq!(
            brew.grain_bills(&problem, &wide_beer(), &equipment()).unwrap(),
            Outcome::Infeasible
        );
        assert_eq!(brew.sensory_ranges(&problem, None).unwrap(), Outcome::Infeasible);
    }

    #[test]
    fn test_color_filter() {
        let (f, c) = example();
        let problem = GrainProblem { fermentables: &f, categories: &c, max_unique: 2, sensory: &[] };
        let beer = BeerProfile::new(1.050, 3.0, 6.0).unwrap();
        let bills = Formulator::default()
            .grain_bills(&problem, &beer, &equipment())
            .unwrap()
            .into_value()
            .unwrap();
        assert!(!bills.is_empty());
        assert!(bills.len() < 26);
        for b in &bills {
            assert!(beer.accepts_color(b.srm(&beer, &equipment())));
        }
    }

    #[test]
    fn test_solution_cap_is_partial() {
        let (f, c) = example();
        let problem = GrainProblem { fermentables: &f, categories: &c, max_unique: 2, sensory: &[] };
        let mut config = BrewgenConfig::default();
        config.solver.max_solutions = Some(5);
        let out = Formulator::new(config)
            .grain_bills(&problem, &wide_beer(), &equipment())
            .unwrap();
        assert!(matches!(&out, Outcome::Partial(b) if b.len() == 5));
    }

    #[test]
    fn test_cap_equal_to_solution_count_is_complete() {
        let (f, c) = example();
        let problem = GrainProblem { fermentables: &f, categories: &c, max_unique: 2, sensory: &[] };
        let mut config = BrewgenConfig::default();
        config.solver.max_solutions = Some(26);
        let out = Formulator::new(config)
            .grain_bills(&problem, &wide_beer(), &equipment())
            .unwrap();
        assert!(matches!(&out, Outcome::Complete(b) if b.len() == 26));
    }

    #[test]
    fn test_cancelled_enumeration_is_partial() {
        let (f, c) = example();
        let problem = GrainProblem { fermentables: &f, categories: &c, max_unique: 2, sensory: &[] };
        let token = CancelToken::new();
        token.cancel();
        let brew = Formulator::default().with_cancel(token);
        assert_eq!(
            brew.grain_bills(&problem, &wide_beer(), &equipment()).unwrap(),
            Outcome::Partial(vec![])
        );
        assert_eq!(brew.test_model(&problem).unwrap(), Feasibility::Unknown);
    }

    #[test]
    fn test_identical_fermentables_give_degenerate_range() {
        let f: Vec<Fermentable> = (0..3)
            .map(|i| {
                Fermentable::new(format!("Malt {i}"), "", "base", 1.037, 3.0)
                    .with_sensory("bready", 2.5)
            })
            .collect();
        let c = vec![Category::new("base", 0.0, 100.0)];
        let problem = GrainProblem { fermentables: &f, categories: &c, max_unique: 3, sensory: &[] };
        let ranges = Formulator::default().sensory_ranges(&problem, None).unwrap();
        assert_eq!(ranges, Outcome::Complete(vec![SensoryRange::new("bready", 2.5, 2.5)]));
    }

    #[test]
    fn test_either_or_split_spans_both_intensities() {
        let f = vec![
            Fermentable::new("Low", "", "a", 1.037, 3.0).with_slug("low").with_sensory("sweet", 1.0),
            Fermentable::new("High", "", "b", 1.037, 3.0).with_slug("high").with_sensory("sweet", 3.0),
        ];
        let c = vec![Category::new("a", 0.0, 100.0), Category::new("b", 0.0, 100.0)];
        let problem = GrainProblem { fermentables: &f, categories: &c, max_unique: 1, sensory: &[] };
        let ranges = Formulator::default().sensory_ranges(&problem, None).unwrap();
        assert_eq!(ranges, Outcome::Complete(vec![SensoryRange::new("sweet", 1.0, 3.0)]));
    }

    #[test]
    fn test_hop_modes() {
        let hops = vec![
            Hop::new("Magnum", 14.0, 2.0),
            Hop::new("Citra", 12.0, 2.5).with_aroma("citrus", 4.0),
        ];
        let buckets = vec![
            BucketTarget { bucket: TimingBucket::boil(60.0), target: Default::default() },
            BucketTarget { bucket: TimingBucket::dry_hop(), target: Default::default() },
        ];
        let recipe = HopTarget { mass: Some(Bounds::new(2.0, 2.0)), ..Default::default() };
        let problem = HopProblem {
            hops: &hops,
            buckets: &buckets,
            recipe: &recipe,
            original_sg: 1.050,
            volume_liters: 20.0,
        };
        let brew = Formulator::default();
        assert_eq!(brew.hop_feasibility(&problem).unwrap(), Feasibility::Satisfiable);

        let bills = brew.hop_bills(&problem).unwrap();
        assert!(bills.is_complete());
        for b in bills.value().unwrap() {
            assert_eq!(b.amount(), 2.0);
        }

        let ranges = brew.flavor_ranges(&problem, None).unwrap().into_value().unwrap();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].name, "citrus");
        assert_eq!(ranges[0].min, 0.0);
        // 2 g of Citra dry hopped: 1.25 * 2.5 * 4 / 20 per gram
        assert!((ranges[0].max - 1.25).abs() < 1e-9);
    }

    const DESCRIPTORS: [&str; 5] = ["bready", "caramel", "roasty", "sweet", "nutty"];

    /// Six capped fermentables in each of four categories, five descriptors.
    fn wide_catalog() -> (Vec<Fermentable>, Vec<Category>) {
        let groups = [("base", 100.0), ("crystal", 15.0), ("roast", 5.0), ("adjunct", 20.0)];
        let mut f = Vec::new();
        for (g, (category, cap)) in groups.iter().enumerate() {
            for i in 0..6 {
                let k = g * 6 + i;
                let mut malt = Fermentable::new(format!("{category} {i}"), "", *category, 1.030 + 0.001 * i as f64, 2.0 + 10.0 * g as f64)
                    .with_slug(format!("{category}-{i}"))
                    .with_usage(0.0, *cap)
                    .unwrap();
                for (d, name) in DESCRIPTORS.iter().enumerate() {
                    malt = malt.with_sensory(*name, ((k * 7 + d * 3) % 11) as f64 * 0.5);
                }
                f.push(malt);
            }
        }
        let c = vec![
            Category::new("base", 60.0, 100.0),
            Category::new("crystal", 0.0, 20.0),
            Category::new("roast", 0.0, 10.0),
            Category::new("adjunct", 0.0, 25.0),
        ];
        (f, c)
    }

    fn patient() -> Formulator {
        let mut config = BrewgenConfig::default();
        config.solver.optimization_budget_ms = 600_000;
        Formulator::new(config)
    }

    #[test]
    fn test_sensory_ranges_on_wide_catalog() {
        let (f, c) = wide_catalog();
        assert_eq!(f.len(), 24);
        let problem = GrainProblem { fermentables: &f, categories: &c, max_unique: 4, sensory: &[] };
        let names: Vec<String> = DESCRIPTORS.iter().map(|d| d.to_string()).collect();

        // one malt per category, within every cap
        let mut percents = vec![0.0; f.len()];
        percents[0] = 70.0;
        percents[6] = 10.0;
        percents[12] = 5.0;
        percents[18] = 15.0;
        let known = GrainBill::new(f.clone(), percents).unwrap().sensory_profile_over(&names);

        let ranges = match patient().sensory_ranges(&problem, Some(&names)).unwrap() {
            Outcome::Complete(r) => r,
            other => panic!("expected complete ranges, got {other:?}"),
        };
        assert_eq!(ranges.len(), DESCRIPTORS.len());
        for (r, name) in ranges.iter().zip(DESCRIPTORS) {
            assert_eq!(r.name, name);
            let value = known[name];
            assert!(r.max >= value - SENSORY.resolution(), "{name}: max {} below {value}", r.max);
            assert!(r.min <= value + SENSORY.resolution(), "{name}: min {} above {value}", r.min);
        }
    }

    #[test]
    fn test_flavor_ranges_over_standard_buckets() {
        let hops = vec![
            Hop::new("Magnum", 14.0, 2.0).with_aroma("herbal", 1.0),
            Hop::new("Citra", 12.0, 2.5).with_aroma("citrus", 4.0).with_aroma("tropical", 3.0),
            Hop::new("Cascade", 6.0, 1.2).with_aroma("citrus", 3.0).with_aroma("floral", 2.0),
            Hop::new("Saaz", 3.5, 0.6).with_aroma("herbal", 3.0).with_aroma("spicy", 2.0),
        ];
        let buckets: Vec<BucketTarget> = TimingBucket::standard()
            .into_iter()
            .map(|bucket| BucketTarget { bucket, target: Default::default() })
            .collect();
        let recipe = HopTarget {
            mass: Some(Bounds::new(50.0, 120.0)),
            ibu: Some(Bounds::new(30.0, 45.0)),
            ..Default::default()
        };
        let problem = HopProblem {
            hops: &hops,
            buckets: &buckets,
            recipe: &recipe,
            original_sg: 1.050,
            volume_liters: 20.0,
        };

        // 20 g Magnum at 60 minutes, 20 g Cascade in the whirlpool, 40 g Citra dry
        let known = HopBill::new(vec![
            HopAddition::new(hops[0].clone(), 60.0, HopUsage::Boil, 20.0),
            HopAddition::new(hops[2].clone(), 0.0, HopUsage::Whirlpool, 20.0),
            HopAddition::new(hops[1].clone(), 0.0, HopUsage::DryHop, 40.0),
        ]);
        assert!((30.0..=45.0).contains(&known.ibu(1.050, 20.0)));
        let known = known.flavor(20.0);

        let ranges = match patient().flavor_ranges(&problem, None).unwrap() {
            Outcome::Complete(r) => r,
            other => panic!("expected complete ranges, got {other:?}"),
        };
        let names: Vec<&str> = ranges.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["citrus", "floral", "herbal", "spicy", "tropical"]);
        for r in &ranges {
            let value = known.get(&r.name).copied().unwrap_or(0.0);
            assert!(r.max >= value - 1e-3, "{}: max {} below {value}", r.name, r.max);
            assert!(r.min <= value + 1e-3, "{}: min {} above {value}", r.name, r.min);
        }
        // Magnum alone can bitter without any Citra
        let tropical = ranges.iter().find(|r| r.name == "tropical").unwrap();
        assert_eq!(tropical.min, 0.0);
    }
}
