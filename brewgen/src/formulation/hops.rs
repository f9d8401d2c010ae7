use crate::bill::{HopAddition, HopBill, TimingBucket};
use crate::error::{BrewError, Result};
use crate::ingredients::Hop;
use crate::profile::{BucketTarget, HopTarget};
use crate::scaling::{ensure_fits, refine, Scale, FLAVOR, IBU, MASS};
use crate::solver::{CpModel, LinearExpr, Solution, VarId};
use std::collections::BTreeSet;
use tracing::debug;

/// Inputs of a hop timing model.
#[derive(Debug, Clone, Copy)]
pub struct HopProblem<'a> {
    pub hops: &'a [Hop],
    pub buckets: &'a [BucketTarget],
    /// Whole-recipe target. Its mass range is mandatory: it bounds every
    /// mass variable.
    pub recipe: &'a HopTarget,
    pub original_sg: f64,
    pub volume_liters: f64,
}

/// Variables of one timing bucket.
#[derive(Debug, Clone)]
pub struct BucketVars {
    pub bucket: TimingBucket,
    pub mass: VarId,
    pub ibu: VarId,
    /// One per descriptor, in [`HopFormulation::descriptors`] order.
    pub flavor: Vec<VarId>,
}

/// Per-hop aggregates across buckets.
#[derive(Debug, Clone)]
pub struct HopVars {
    pub used: VarId,
    pub mass: VarId,
    pub ibu: VarId,
    pub flavor: Vec<VarId>,
}

/// A built hop timing model.
///
/// `mass[h][b]` is grams of hop `h` added in bucket `b`. IBU and flavor
/// variables are exact integer sums of rounded per-gram coefficients, in
/// `ibu_scale` and `flavor_scale`: [`IBU`] and [`FLAVOR`] refined for the
/// recipe's mass range.
#[derive(Debug, Clone)]
pub struct HopFormulation {
    pub model: CpModel,
    pub ibu_scale: Scale,
    pub flavor_scale: Scale,
    pub mass: Vec<Vec<VarId>>,
    pub used: Vec<Vec<VarId>>,
    pub buckets: Vec<BucketVars>,
    pub hops: Vec<HopVars>,
    pub recipe_mass: VarId,
    pub recipe_ibu: VarId,
    pub recipe_flavor: Vec<VarId>,
    descriptors: Vec<String>,
    hop_list: Vec<Hop>,
}

/// Sum `coeff[i] * x[i]` with each `x[i]` in `0..=ub[i]`, checked against the solver limit.
fn weighted_upper(what: &str, coeffs: &[i64], ubs: &[i64]) -> Result<i64> {
    let max: i128 = coeffs
        .iter()
        .zip(ubs)
        .map(|(c, u)| i128::from(*c).abs() * i128::from(*u))
        .sum();
    ensure_fits(what, max)?;
    Ok(max as i64)
}

fn add_bounds(model: &mut CpModel, name: &str, var: VarId, scale: &Scale, min: f64, max: f64) -> Result<()> {
    model.add_range(name, LinearExpr::from_var(var, 1), scale.encode(min)?, scale.encode(max)?);
    Ok(())
}

impl HopFormulation {
    pub fn build(problem: &HopProblem<'_>, extra_descriptors: &[String]) -> Result<Self> {
        problem.recipe.validate("recipe")?;
        for b in problem.buckets {
            b.target.validate(&format!("bucket `{}`", b.bucket.name))?;
        }
        let mut names = BTreeSet::new();
        if let Some(b) = problem.buckets.iter().find(|b| !names.insert(b.bucket.name.as_str())) {
            return Err(BrewError::InvalidProfile(format!(
                "timing bucket `{}` is listed more than once",
                b.bucket.name
            )));
        }
        let recipe_mass = problem.recipe.mass.ok_or_else(|| {
            BrewError::InvalidProfile("a recipe hop mass range is required".to_string())
        })?;
        if !(problem.volume_liters > 0.0) {
            return Err(BrewError::InvalidProfile(format!(
                "batch volume {} must be positive",
                problem.volume_liters
            )));
        }

        let descriptors: Vec<String> = problem
            .recipe
            .flavor
            .iter()
            .chain(problem.buckets.iter().flat_map(|b| b.target.flavor.iter()))
            .map(|t| t.name.clone())
            .chain(extra_descriptors.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let hop_list = problem.hops.to_vec();
        let (nh, nb, nd) = (hop_list.len(), problem.buckets.len(), descriptors.len());
        let mut model = CpModel::new("hop_bill");

        let recipe_mass_hi = MASS.encode(recipe_mass.max)?;
        let bucket_mass_hi: Vec<i64> = problem
            .buckets
            .iter()
            .map(|bt| match bt.target.mass {
                Some(m) => Ok(MASS.encode(m.max)?.min(recipe_mass_hi)),
                None => Ok(recipe_mass_hi),
            })
            .collect::<Result<_>>()?;

        for hop in &hop_list {
            if let Some(d) = descriptors.iter().find(|d| hop.intensity(d) < 0.0) {
                return Err(BrewError::InvalidProfile(format!(
                    "hop `{}` has negative `{d}` intensity {}",
                    hop.slug,
                    hop.intensity(d)
                )));
            }
        }

        // per-gram values, [bucket][hop] and [bucket][descriptor][hop]
        let mut ibu_raw = vec![vec![0.0; nh]; nb];
        let mut flavor_raw = vec![vec![vec![0.0; nh]; nd]; nb];
        for (b, bt) in problem.buckets.iter().enumerate() {
            for (h, hop) in hop_list.iter().enumerate() {
                ibu_raw[b][h] = bt.bucket.ibu_per_gram(hop, problem.original_sg, problem.volume_liters);
                for (d, name) in descriptors.iter().enumerate() {
                    flavor_raw[b][d][h] = bt.bucket.flavor_per_gram(hop, name, problem.volume_liters);
                }
            }
        }
        let worst = |per_gram: &dyn Fn(usize, usize) -> f64| -> f64 {
            (0..nb)
                .map(|b| (0..nh).map(|h| per_gram(b, h).abs()).sum::<f64>() * bucket_mass_hi[b] as f64)
                .sum()
        };
        let worst_ibu = worst(&|b, h| ibu_raw[b][h]);
        let worst_flavor = (0..nd)
            .map(|d| worst(&|b, h| flavor_raw[b][d][h]))
            .fold(0.0, f64::max);
        let ibu_scale = refine(IBU, recipe_mass.max, worst_ibu);
        let flavor_scale = refine(FLAVOR, recipe_mass.max, worst_flavor);

        let ibu_coef = ibu_raw
            .iter()
            .map(|row| row.iter().map(|&x| ibu_scale.encode(x)).collect::<Result<Vec<i64>>>())
            .collect::<Result<Vec<_>>>()?;
        let flavor_coef = flavor_raw
            .iter()
            .map(|per_desc| {
                per_desc
                    .iter()
                    .map(|row| row.iter().map(|&x| flavor_scale.encode(x)).collect::<Result<Vec<i64>>>())
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        let mut mass = vec![Vec::with_capacity(nb); nh];
        let mut used = vec![Vec::with_capacity(nb); nh];
        for (h, hop) in hop_list.iter().enumerate() {
            for (b, bt) in problem.buckets.iter().enumerate() {
                let key = format!("{}@{}", hop.slug, bt.bucket.name);
                let m = model.new_int_var(0, bucket_mass_hi[b], format!("mass[{key}]"));
                let u = model.new_bool_var(format!("used[{key}]"));
                model
                    .add_eq(format!("off[{key}]"), LinearExpr::from_var(m, 1), 0)
                    .only_enforce_if(u.not());
                model
                    .add_ge(format!("on[{key}]"), LinearExpr::from_var(m, 1), 1)
                    .only_enforce_if(u.lit());
                // unconditional copies of the above for the linear relaxation
                model.add_le(
                    format!("mass_link_hi[{key}]"),
                    LinearExpr::weighted([(m, 1), (u, -bucket_mass_hi[b])]),
                    0,
                );
                model.add_ge(format!("mass_link_lo[{key}]"), LinearExpr::weighted([(m, 1), (u, -1)]), 0);
                mass[h].push(m);
                used[h].push(u);
            }
        }

        let mut buckets = Vec::with_capacity(nb);
        for (b, bt) in problem.buckets.iter().enumerate() {
            let name = &bt.bucket.name;
            let column: Vec<VarId> = (0..nh).map(|h| mass[h][b]).collect();
            let ubs = vec![bucket_mass_hi[b]; nh];

            let bm = model.new_int_var(0, weighted_upper(name, &vec![1; nh], &ubs)?, format!("bucket_mass[{name}]"));
            model.add_eq(
                format!("bucket_mass_def[{name}]"),
                LinearExpr::sum(column.iter().copied()).sub(LinearExpr::from_var(bm, 1)),
                0,
            );

            let ibu_hi = weighted_upper(&format!("ibu of bucket `{name}`"), &ibu_coef[b], &ubs)?;
            let bi = model.new_int_var(0, ibu_hi, format!("bucket_ibu[{name}]"));
            model.add_eq(
                format!("bucket_ibu_def[{name}]"),
                LinearExpr::weighted(column.iter().copied().zip(ibu_coef[b].iter().copied()))
                    .sub(LinearExpr::from_var(bi, 1)),
                0,
            );

            let mut flavor = Vec::with_capacity(nd);
            for (d, desc) in descriptors.iter().enumerate() {
                let hi = weighted_upper(&format!("{desc} of bucket `{name}`"), &flavor_coef[b][d], &ubs)?;
                let bf = model.new_int_var(0, hi, format!("bucket_flavor[{name}][{desc}]"));
                model.add_eq(
                    format!("bucket_flavor_def[{name}][{desc}]"),
                    LinearExpr::weighted(column.iter().copied().zip(flavor_coef[b][d].iter().copied()))
                        .sub(LinearExpr::from_var(bf, 1)),
                    0,
                );
                flavor.push(bf);
            }

            let t = &bt.target;
            if let Some(m) = t.mass {
                add_bounds(&mut model, &format!("bucket_mass_bounds[{name}]"), bm, &MASS, m.min, m.max)?;
            }
            if let Some(i) = t.ibu {
                add_bounds(&mut model, &format!("bucket_ibu_bounds[{name}]"), bi, &ibu_scale, i.min, i.max)?;
            }
            for f in &t.flavor {
                let d = descriptors.iter().position(|x| *x == f.name).unwrap_or_default();
                add_bounds(
                    &mut model,
                    &format!("bucket_flavor_bounds[{name}][{}]", f.name),
                    flavor[d],
                    &flavor_scale,
                    f.min,
                    f.max,
                )?;
            }
            if let Some(cap) = t.max_unique {
                model.add_le(
                    format!("bucket_unique[{name}]"),
                    LinearExpr::sum((0..nh).map(|h| used[h][b])),
                    i64::from(cap),
                );
            }
            buckets.push(BucketVars {
                bucket: bt.bucket.clone(),
                mass: bm,
                ibu: bi,
                flavor,
            });
        }

        let mut hops = Vec::with_capacity(nh);
        for (h, hop) in hop_list.iter().enumerate() {
            let slug = &hop.slug;
            let hu = model.new_bool_var(format!("hop_used[{slug}]"));
            for (b, u) in used[h].iter().enumerate() {
                model.add_ge(
                    format!("hop_used_covers[{slug}][{b}]"),
                    LinearExpr::from_var(hu, 1).sub(LinearExpr::from_var(*u, 1)),
                    0,
                );
            }
            model.add_le(
                format!("hop_used_needs[{slug}]"),
                LinearExpr::from_var(hu, 1).sub(LinearExpr::sum(used[h].iter().copied())),
                0,
            );

            let hm = model.new_int_var(0, bucket_mass_hi.iter().sum::<i64>().min(recipe_mass_hi), format!("hop_mass[{slug}]"));
            model.add_eq(
                format!("hop_mass_def[{slug}]"),
                LinearExpr::sum(mass[h].iter().copied()).sub(LinearExpr::from_var(hm, 1)),
                0,
            );

            let coefs: Vec<i64> = (0..nb).map(|b| ibu_coef[b][h]).collect();
            let hi = weighted_upper(&format!("ibu of hop `{slug}`"), &coefs, &bucket_mass_hi)?;
            let hi_var = model.new_int_var(0, hi, format!("hop_ibu[{slug}]"));
            model.add_eq(
                format!("hop_ibu_def[{slug}]"),
                LinearExpr::weighted(mass[h].iter().copied().zip(coefs))
                    .sub(LinearExpr::from_var(hi_var, 1)),
                0,
            );

            let mut flavor = Vec::with_capacity(nd);
            for (d, desc) in descriptors.iter().enumerate() {
                let coefs: Vec<i64> = (0..nb).map(|b| flavor_coef[b][d][h]).collect();
                let hi = weighted_upper(&format!("{desc} of hop `{slug}`"), &coefs, &bucket_mass_hi)?;
                let v = model.new_int_var(0, hi, format!("hop_flavor[{slug}][{desc}]"));
                model.add_eq(
                    format!("hop_flavor_def[{slug}][{desc}]"),
                    LinearExpr::weighted(mass[h].iter().copied().zip(coefs))
                        .sub(LinearExpr::from_var(v, 1)),
                    0,
                );
                flavor.push(v);
            }
            hops.push(HopVars {
                used: hu,
                mass: hm,
                ibu: hi_var,
                flavor,
            });
        }

        let rt = problem.recipe;
        let total = |model: &mut CpModel, what: &str, parts: Vec<VarId>| -> Result<VarId> {
            let hi = parts.iter().map(|v| model.var(*v).hi).sum::<i64>();
            ensure_fits(what, i128::from(hi))?;
            let v = model.new_int_var(0, hi, format!("recipe_{what}"));
            model.add_eq(
                format!("recipe_{what}_def"),
                LinearExpr::sum(parts).sub(LinearExpr::from_var(v, 1)),
                0,
            );
            Ok(v)
        };
        let recipe_mass_var = total(&mut model, "mass", buckets.iter().map(|b| b.mass).collect())?;
        let recipe_ibu = total(&mut model, "ibu", buckets.iter().map(|b| b.ibu).collect())?;
        let mut recipe_flavor = Vec::with_capacity(nd);
        for (d, desc) in descriptors.iter().enumerate() {
            let v = total(
                &mut model,
                &format!("flavor[{desc}]"),
                buckets.iter().map(|b| b.flavor[d]).collect(),
            )?;
            recipe_flavor.push(v);
        }

        add_bounds(&mut model, "recipe_mass_bounds", recipe_mass_var, &MASS, recipe_mass.min, recipe_mass.max)?;
        if let Some(i) = rt.ibu {
            add_bounds(&mut model, "recipe_ibu_bounds", recipe_ibu, &ibu_scale, i.min, i.max)?;
        }
        for f in &rt.flavor {
            let d = descriptors.iter().position(|x| *x == f.name).unwrap_or_default();
            add_bounds(
                &mut model,
                &format!("recipe_flavor_bounds[{}]", f.name),
                recipe_flavor[d],
                &flavor_scale,
                f.min,
                f.max,
            )?;
        }
        if let Some(cap) = rt.max_unique {
            model.add_le(
                "recipe_unique",
                LinearExpr::sum(hops.iter().map(|h| h.used)),
                i64::from(cap),
            );
        }

        let decisions: Vec<VarId> = mass.iter().flatten().copied().collect();
        model.add_decision_strategy(&decisions);
        debug!(
            hops = nh,
            buckets = nb,
            descriptors = nd,
            vars = model.num_vars(),
            constraints = model.num_constraints(),
            "hop model built"
        );
        Ok(Self {
            model,
            ibu_scale,
            flavor_scale,
            mass,
            used,
            buckets,
            hops,
            recipe_mass: recipe_mass_var,
            recipe_ibu,
            recipe_flavor,
            descriptors,
            hop_list,
        })
    }

    /// Descriptors the model tracks, sorted.
    pub fn descriptors(&self) -> &[String] {
        &self.descriptors
    }

    pub fn recipe_flavor_var(&self, descriptor: &str) -> Option<VarId> {
        self.descriptors
            .iter()
            .position(|d| d == descriptor)
            .map(|i| self.recipe_flavor[i])
    }

    /// Additions with a positive mass, hop-major.
    pub fn bill(&self, solution: &Solution) -> HopBill {
        let mut additions = Vec::new();
        for (h, hop) in self.hop_list.iter().enumerate() {
            for (b, bv) in self.buckets.iter().enumerate() {
                let grams = MASS.decode(solution.value(self.mass[h][b]));
                if grams > 0.0 {
                    additions.push(HopAddition::new(
                        hop.clone(),
                        bv.bucket.minutes,
                        bv.bucket.usage,
                        grams,
                    ));
                }
            }
        }
        HopBill::new(additions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Bounds, SensoryRange};
    use crate::solver::{Budget, Control, ObjSense, SolveStatus, Solver};

    fn hops() -> Vec<Hop> {
        vec![
            Hop::new("Magnum", 14.0, 2.0),
            Hop::new("Citra", 12.0, 2.5).with_aroma("citrus", 4.0),
        ]
    }

    fn buckets() -> Vec<BucketTarget> {
        vec![
            BucketTarget { bucket: TimingBucket::boil(60.0), target: HopTarget::default() },
            BucketTarget { bucket: TimingBucket::dry_hop(), target: HopTarget::default() },
        ]
    }

    fn recipe(min: f64, max: f64) -> HopTarget {
        HopTarget {
            mass: Some(Bounds::new(min, max)),
            ..Default::default()
        }
    }

    #[test]
    fn test_mass_range_required() {
        let (h, b) = (hops(), buckets());
        let target = HopTarget::default();
        let p = HopProblem { hops: &h, buckets: &b, recipe: &target, original_sg: 1.050, volume_liters: 20.0 };
        assert!(matches!(HopFormulation::build(&p, &[]), Err(BrewError::InvalidProfile(_))));
    }

    #[test]
    fn test_enumerated_bills_hit_mass_total() {
        let (h, b) = (hops(), buckets());
        let target = HopTarget { max_unique: Some(1), ..recipe(3.0, 3.0) };
        let p = HopProblem { hops: &h, buckets: &b, recipe: &target, original_sg: 1.050, volume_liters: 20.0 };
        let f = HopFormulation::build(&p, &[]).unwrap();
        let mut n = 0;
        let r = Solver::new(&f.model).enumerate(&Budget::unlimited(), |s| {
            let bill = f.bill(s);
            assert_eq!(bill.amount(), 3.0);
            assert_eq!(bill.unique_hops().len(), 1);
            n += 1;
            Control::Continue
        });
        assert!(r.exhausted);
        // one hop, 3 g split over two buckets: 4 ways, times 2 hops
        assert_eq!(n, 8);
    }

    #[test]
    fn test_ibu_matches_chemistry() {
        let (h, b) = (hops(), buckets());
        let target = HopTarget {
            mass: Some(Bounds::new(28.0, 28.0)),
            ibu: Some(Bounds::new(0.0, 200.0)),
            ..Default::default()
        };
        let p = HopProblem { hops: &h, buckets: &b, recipe: &target, original_sg: 1.050, volume_liters: 20.0 };
        let f = HopFormulation::build(&p, &[]).unwrap();
        let r = Solver::new(&f.model).optimize(f.recipe_ibu, ObjSense::Maximize, &Budget::unlimited());
        assert_eq!(r.status, SolveStatus::Optimal);
        let s = r.solution.unwrap();
        // all of it into the 60 minute Magnum slot
        assert_eq!(s.value(f.mass[0][0]), 28);
        let solved = f.ibu_scale.decode(s.value(f.recipe_ibu));
        let exact = f.bill(&s).ibu(1.050, 20.0);
        assert!((solved - exact).abs() <= 28.0 * f.ibu_scale.resolution());
    }

    #[test]
    fn test_flavor_target_forces_dry_hop() {
        let (h, b) = (hops(), buckets());
        let per_gram = crate::chemistry::flavor_per_gram(crate::ingredients::HopUsage::DryHop, 0.0, 2.5, 4.0, 20.0);
        let target = HopTarget {
            mass: Some(Bounds::new(10.0, 10.0)),
            flavor: vec![SensoryRange::new("citrus", per_gram * 10.0 - 0.01, 100.0)],
            ..Default::default()
        };
        let p = HopProblem { hops: &h, buckets: &b, recipe: &target, original_sg: 1.050, volume_liters: 20.0 };
        let f = HopFormulation::build(&p, &[]).unwrap();
        assert_eq!(f.descriptors(), &["citrus".to_string()]);
        let r = Solver::new(&f.model).solve(&Budget::unlimited());
        let bill = f.bill(&r.solution.unwrap());
        assert_eq!(bill.additions.len(), 1);
        assert_eq!(bill.additions[0].hop.slug, "citra");
        assert_eq!(bill.additions[0].usage, crate::ingredients::HopUsage::DryHop);
    }

    #[test]
    fn test_scales_follow_mass_range() {
        let (h, b) = (hops(), buckets());
        let small = recipe(3.0, 3.0);
        let p = HopProblem { hops: &h, buckets: &b, recipe: &small, original_sg: 1.050, volume_liters: 20.0 };
        let f = HopFormulation::build(&p, &[]).unwrap();
        assert_eq!(f.ibu_scale.factor, 1_000);
        assert_eq!(f.flavor_scale, FLAVOR);

        let large = recipe(0.0, 500.0);
        let p = HopProblem { recipe: &large, ..p };
        let f = HopFormulation::build(&p, &["citrus".to_string()]).unwrap();
        assert_eq!(f.ibu_scale.factor, 100_000);
        assert_eq!(f.flavor_scale.factor, 100_000);
    }

    #[test]
    fn test_negative_aroma_rejected() {
        let h = vec![Hop::new("Odd", 10.0, 1.0).with_aroma("grassy", -1.0)];
        let b = buckets();
        let target = recipe(1.0, 5.0);
        let p = HopProblem { hops: &h, buckets: &b, recipe: &target, original_sg: 1.050, volume_liters: 20.0 };
        assert!(matches!(
            HopFormulation::build(&p, &["grassy".to_string()]),
            Err(BrewError::InvalidProfile(_))
        ));
        assert!(HopFormulation::build(&p, &[]).is_ok());
    }

    #[test]
    fn test_bucket_unique_cap() {
        let h = hops();
        let mut b = buckets();
        b[1].target.max_unique = Some(0);
        let target = recipe(2.0, 2.0);
        let p = HopProblem { hops: &h, buckets: &b, recipe: &target, original_sg: 1.050, volume_liters: 20.0 };
        let f = HopFormulation::build(&p, &[]).unwrap();
        Solver::new(&f.model).enumerate(&Budget::unlimited(), |s| {
            assert!(f.bill(s).additions.iter().all(|a| a.usage != crate::ingredients::HopUsage::DryHop));
            Control::Continue
        });
    }
}
