use crate::bill::GrainBill;
use crate::error::{BrewError, Result};
use crate::ingredients::{Category, Fermentable};
use crate::profile::{validate_categories, validate_sensory, SensoryRange};
use crate::scaling::{ensure_fits, COLOR, GRAVITY, PERCENT, SENSORY};
use crate::solver::{CpModel, LinearExpr, Solution, VarId};
use tracing::debug;

/// Inputs of a grain model.
#[derive(Debug, Clone, Copy)]
pub struct GrainProblem<'a> {
    pub fermentables: &'a [Fermentable],
    pub categories: &'a [Category],
    pub max_unique: u32,
    /// Descriptor targets; empty for none.
    pub sensory: &'a [SensoryRange],
}

#[derive(Debug, Clone)]
pub struct CategoryVars {
    pub name: String,
    pub usage: VarId,
    /// Present only when the category caps its distinct fermentables.
    pub count: Option<VarId>,
}

/// A built grain model plus handles to its variables.
///
/// Descriptor aggregates are stored in sensory scale and carry the floor of
/// `sum(intensity * percent) / 100`.
#[derive(Debug, Clone)]
pub struct GrainFormulation {
    pub model: CpModel,
    pub percent: Vec<VarId>,
    pub used: Vec<VarId>,
    pub categories: Vec<CategoryVars>,
    descriptors: Vec<(String, VarId)>,
    fermentables: Vec<Fermentable>,
}

impl GrainFormulation {
    /// Builds the model. `descriptors` asks for aggregate variables on top of
    /// those the sensory targets already create.
    pub fn build(problem: &GrainProblem<'_>, descriptors: &[String]) -> Result<Self> {
        validate_categories(problem.fermentables, problem.categories)?;
        validate_sensory("sensory target", problem.sensory)?;

        for f in problem.fermentables {
            COLOR.encode(f.color)?;
            GRAVITY.encode(f.ppg())?;
        }

        let fermentables = problem.fermentables.to_vec();
        let mut model = CpModel::new("grain_bill");

        let percent: Vec<VarId> = fermentables
            .iter()
            .map(|f| model.new_int_var(0, 100, format!("pct[{}]", f.slug)))
            .collect();
        let used: Vec<VarId> = fermentables
            .iter()
            .map(|f| model.new_bool_var(format!("used[{}]", f.slug)))
            .collect();

        model.add_eq("grain_total", LinearExpr::sum(percent.iter().copied()), 100);

        for (i, f) in fermentables.iter().enumerate() {
            let (p, u) = (percent[i], used[i]);
            let lo = PERCENT.encode(f.min_percent)?;
            let hi = PERCENT.encode(f.max_percent)?;
            model
                .add_eq(format!("off[{}]", f.slug), LinearExpr::from_var(p, 1), 0)
                .only_enforce_if(u.not());
            model
                .add_ge(format!("on[{}]", f.slug), LinearExpr::from_var(p, 1), 1)
                .only_enforce_if(u.lit());
            model
                .add_ge(format!("min[{}]", f.slug), LinearExpr::from_var(p, 1), lo)
                .only_enforce_if(u.lit());
            model
                .add_le(format!("max[{}]", f.slug), LinearExpr::from_var(p, 1), hi)
                .only_enforce_if(u.lit());
            // unconditional copies of the above for the linear relaxation
            model.add_le(
                format!("usage_link_hi[{}]", f.slug),
                LinearExpr::weighted([(p, 1), (u, -hi)]),
                0,
            );
            model.add_ge(
                format!("usage_link_lo[{}]", f.slug),
                LinearExpr::weighted([(p, 1), (u, -lo.max(1))]),
                0,
            );
        }
        model.add_le(
            "unique_total",
            LinearExpr::sum(used.iter().copied()),
            i64::from(problem.max_unique),
        );

        let mut categories = Vec::with_capacity(problem.categories.len());
        for c in problem.categories {
            let members: Vec<usize> = (0..fermentables.len())
                .filter(|&i| fermentables[i].category == c.name)
                .collect();
            let usage = model.new_int_var(0, 100, format!("category[{}]", c.name));
            let def = LinearExpr::from_var(usage, 1).sub(LinearExpr::sum(members.iter().map(|&i| percent[i])));
            model.add_eq(format!("category_def[{}]", c.name), def, 0);
            model.add_range(
                &format!("category_bounds[{}]", c.name),
                LinearExpr::from_var(usage, 1),
                PERCENT.encode(c.min_percent)?,
                PERCENT.encode(c.max_percent)?,
            );

            let count = match c.max_unique {
                Some(cap) => {
                    let count = model.new_int_var(0, members.len() as i64, format!("count[{}]", c.name));
                    let def = LinearExpr::from_var(count, 1).sub(LinearExpr::sum(members.iter().map(|&i| used[i])));
                    model.add_eq(format!("count_def[{}]", c.name), def, 0);
                    model.add_le(format!("count_cap[{}]", c.name), LinearExpr::from_var(count, 1), i64::from(cap));
                    Some(count)
                }
                None => None,
            };
            categories.push(CategoryVars {
                name: c.name.clone(),
                usage,
                count,
            });
        }
        if !categories.is_empty() {
            model.add_eq(
                "category_total",
                LinearExpr::sum(categories.iter().map(|c| c.usage)),
                100,
            );
        }

        let mut formulation = Self {
            model,
            percent,
            used,
            categories,
            descriptors: Vec::new(),
            fermentables,
        };
        for t in problem.sensory {
            let agg = formulation.descriptor_var(&t.name)?;
            formulation.model.add_range(
                &format!("sensory_target[{}]", t.name),
                LinearExpr::from_var(agg, 1),
                SENSORY.encode(t.min)?,
                SENSORY.encode(t.max)?,
            );
        }
        for d in descriptors {
            formulation.descriptor_var(d)?;
        }

        formulation.model.add_decision_strategy(&formulation.percent);
        debug!(
            fermentables = formulation.fermentables.len(),
            categories = formulation.categories.len(),
            descriptors = formulation.descriptors.len(),
            vars = formulation.model.num_vars(),
            constraints = formulation.model.num_constraints(),
            "grain model built"
        );
        Ok(formulation)
    }

    /// Aggregate variable of a descriptor, created on first use.
    fn descriptor_var(&mut self, name: &str) -> Result<VarId> {
        if let Some(v) = self.descriptor(name) {
            return Ok(v);
        }
        let intensities = self
            .fermentables
            .iter()
            .map(|f| {
                let i = f.intensity(name);
                if i < 0.0 {
                    return Err(BrewError::InvalidProfile(format!(
                        "fermentable `{}` has negative `{name}` intensity {i}",
                        f.slug
                    )));
                }
                SENSORY.encode(i)
            })
            .collect::<Result<Vec<i64>>>()?;
        let hi = intensities.iter().copied().max().unwrap_or(0);
        // percentages sum to 100, so the weighted sum is bounded by the largest intensity
        ensure_fits(&format!("sensory sum of `{name}`"), i128::from(hi) * 100 + 99)?;

        let agg = self.model.new_int_var(0, hi, format!("sensory[{name}]"));
        let mut expr = LinearExpr::weighted(self.percent.iter().copied().zip(intensities.iter().copied()));
        expr.add_term(agg, -100);
        self.model.add_range(&format!("sensory_def[{name}]"), expr, 0, 99);
        self.descriptors.push((name.to_string(), agg));
        Ok(agg)
    }

    pub fn descriptor(&self, name: &str) -> Option<VarId> {
        self.descriptors
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = (&str, VarId)> {
        self.descriptors.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn fermentables(&self) -> &[Fermentable] {
        &self.fermentables
    }

    /// Reads the percentage vector of a solution back into a bill.
    pub fn bill(&self, solution: &Solution) -> Result<GrainBill> {
        let percents = self
            .percent
            .iter()
            .map(|v| PERCENT.decode(solution.value(*v)))
            .collect();
        GrainBill::new(self.fermentables.clone(), percents)
    }

    /// Decoded value of a descriptor aggregate.
    pub fn descriptor_value(&self, solution: &Solution, name: &str) -> Result<f64> {
        let v = self
            .descriptor(name)
            .ok_or_else(|| BrewError::InvalidProfile(format!("descriptor `{name}` is not in the model")))?;
        Ok(SENSORY.decode(solution.value(v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{Budget, Control, ObjSense, SolveStatus, Solver};

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

    #[test]
    fn test_model_shape() {
        let (f, c) = example();
        let problem = GrainProblem { fermentables: &f, categories: &c, max_unique: 2, sensory: &[] };
        let g = GrainFormulation::build(&problem, &[]).unwrap();
        // 2 pct + 2 used + 2 category usage
        assert_eq!(g.model.num_vars(), 6);
        assert!(g.model.constraints().iter().any(|c| c.name == "grain_total"));
        assert!(g.model.constraints().iter().any(|c| c.name == "category_total"));
        assert!(g.categories.iter().all(|c| c.count.is_none()));
    }

    #[test]
    fn test_every_bill_respects_bounds() {
        let (f, c) = example();
        let problem = GrainProblem { fermentables: &f, categories: &c, max_unique: 2, sensory: &[] };
        let g = GrainFormulation::build(&problem, &[]).unwrap();
        let mut bills = Vec::new();
        let r = Solver::new(&g.model).enumerate(&Budget::unlimited(), |s| {
            bills.push(g.bill(s).unwrap());
            Control::Continue
        });
        assert!(r.exhausted);
        // crystal 0..=25
        assert_eq!(bills.len(), 26);
        for b in &bills {
            assert_eq!(b.total_percent(), 100.0);
            assert!(b.unique_count() <= 2);
            let base = b.category_percent("base");
            assert!((75.0..=100.0).contains(&base));
        }
    }

    #[test]
    fn test_min_usage_applies_only_when_used() {
        let base = Fermentable::new("Base", "", "base", 1.037, 2.0).with_slug("base");
        let other = Fermentable::new("Munich", "", "base", 1.035, 9.0)
            .with_slug("munich")
            .with_usage(30.0, 50.0)
            .unwrap();
        let f = vec![base, other];
        let c = vec![Category::new("base", 0.0, 100.0)];
        let problem = GrainProblem { fermentables: &f, categories: &c, max_unique: 2, sensory: &[] };
        let g = GrainFormulation::build(&problem, &[]).unwrap();
        let mut munich = Vec::new();
        Solver::new(&g.model).enumerate(&Budget::unlimited(), |s| {
            munich.push(s.value(g.percent[1]));
            Control::Continue
        });
        munich.sort();
        assert_eq!(munich[0], 0);
        assert!(munich[1..].iter().all(|p| (30..=50).contains(p)));
        assert_eq!(munich.len(), 1 + 21);
    }

    #[test]
    fn test_category_unique_cap() {
        let f: Vec<Fermentable> = ["a", "b", "c"]
            .iter()
            .map(|s| Fermentable::new(*s, "", "base", 1.037, 2.0).with_slug(*s))
            .collect();
        let c = vec![Category::new("base", 0.0, 100.0).with_max_unique(1)];
        let problem = GrainProblem { fermentables: &f, categories: &c, max_unique: 3, sensory: &[] };
        let g = GrainFormulation::build(&problem, &[]).unwrap();
        let mut n = 0;
        Solver::new(&g.model).enumerate(&Budget::unlimited(), |s| {
            assert_eq!(g.bill(s).unwrap().unique_count(), 1);
            n += 1;
            Control::Continue
        });
        assert_eq!(n, 3);
    }

    #[test]
    fn test_sensory_target_restricts_bills() {
        let (f, c) = example();
        let f: Vec<Fermentable> = vec![
            f[0].clone().with_sensory("caramel", 0.0),
            f[1].clone().with_sensory("caramel", 4.0),
        ];
        // caramel = 4 * crystal% / 100 in [0.4, 0.6] -> crystal 10..=15
        let targets = vec![SensoryRange::new("caramel", 0.4, 0.6)];
        let problem = GrainProblem { fermentables: &f, categories: &c, max_unique: 2, sensory: &targets };
        let g = GrainFormulation::build(&problem, &[]).unwrap();
        let mut crystal = Vec::new();
        Solver::new(&g.model).enumerate(&Budget::unlimited(), |s| {
            crystal.push(s.value(g.percent[1]));
            assert!((0.4..=0.6).contains(&g.descriptor_value(s, "caramel").unwrap()));
            Control::Continue
        });
        crystal.sort();
        assert_eq!(crystal, (10..=15).collect::<Vec<i64>>());
    }

    #[test]
    fn test_descriptor_extremes() {
        let (f, c) = example();
        let f: Vec<Fermentable> = vec![
            f[0].clone().with_sensory("sweet", 1.0),
            f[1].clone().with_sensory("sweet", 3.0),
        ];
        let problem = GrainProblem { fermentables: &f, categories: &c, max_unique: 2, sensory: &[] };
        let g = GrainFormulation::build(&problem, &["sweet".to_string()]).unwrap();
        let agg = g.descriptor("sweet").unwrap();
        let solver = Solver::new(&g.model);
        let max = solver.optimize(agg, ObjSense::Maximize, &Budget::unlimited());
        let min = solver.optimize(agg, ObjSense::Minimize, &Budget::unlimited());
        assert_eq!(max.status, SolveStatus::Optimal);
        assert_eq!(g.descriptor_value(max.solution.as_ref().unwrap(), "sweet").unwrap(), 1.5);
        assert_eq!(g.descriptor_value(min.solution.as_ref().unwrap(), "sweet").unwrap(), 1.0);
    }

    #[test]
    fn test_malformed_inputs_rejected_before_solving() {
        let (f, _) = example();
        let only_base = vec![Category::new("base", 0.0, 100.0)];
        let problem = GrainProblem { fermentables: &f, categories: &only_base, max_unique: 2, sensory: &[] };
        assert!(matches!(
            GrainFormulation::build(&problem, &[]),
            Err(BrewError::UnknownCategory { .. })
        ));

        let (f, c) = example();
        let huge = vec![f[0].clone().with_sensory("x", 5000.0), f[1].clone()];
        let problem = GrainProblem { fermentables: &huge, categories: &c, max_unique: 2, sensory: &[] };
        assert!(matches!(
            GrainFormulation::build(&problem, &["x".to_string()]),
            Err(BrewError::ScalingOverflow { .. })
        ));

        let dark = vec![f[0].clone(), Fermentable::new("Black", "", "crystal", 1.025, 20_000.0)];
        let problem = GrainProblem { fermentables: &dark, categories: &c, max_unique: 2, sensory: &[] };
        assert!(matches!(
            GrainFormulation::build(&problem, &[]),
            Err(BrewError::ScalingOverflow { .. })
        ));
    }

    #[test]
    fn test_negative_intensity_rejected() {
        let (f, c) = example();
        let f = vec![f[0].clone().with_sensory("roast", -0.5), f[1].clone()];
        let problem = GrainProblem { fermentables: &f, categories: &c, max_unique: 2, sensory: &[] };
        assert!(matches!(
            GrainFormulation::build(&problem, &["roast".to_string()]),
            Err(BrewError::InvalidProfile(_))
        ));
        // descriptors nobody asks for are not checked
        assert!(GrainFormulation::build(&problem, &[]).is_ok());
    }

    #[test]
    fn test_descriptor_max_over_wide_catalog() {
        // 20 fermentables with caps; the best bill fills the strongest ones to their caps
        let f: Vec<Fermentable> = (0..20)
            .map(|i| {
                Fermentable::new(format!("F{i}"), "", "base", 1.036, 3.0)
                    .with_slug(format!("f{i}"))
                    .with_sensory("bready", f64::from(i) * 0.25)
                    .with_usage(0.0, 15.0 + f64::from(i % 3) * 10.0)
                    .unwrap()
            })
            .collect();
        let c = vec![Category::new("base", 0.0, 100.0)];
        let problem = GrainProblem { fermentables: &f, categories: &c, max_unique: 4, sensory: &[] };
        let g = GrainFormulation::build(&problem, &["bready".to_string()]).unwrap();
        let agg = g.descriptor("bready").unwrap();
        let r = Solver::new(&g.model).optimize(agg, ObjSense::Maximize, &Budget::unlimited());
        assert_eq!(r.status, SolveStatus::Optimal);
        // f19 (4.75, cap 25), f18 (4.5, cap 15), f17 (4.25, cap 35), f16 (4.0, cap 25)
        let s = r.solution.unwrap();
        assert!((g.descriptor_value(&s, "bready").unwrap() - 4.35).abs() < 1e-9);
        let bill = g.bill(&s).unwrap();
        assert_eq!(bill.unique_count(), 4);
    }
}
