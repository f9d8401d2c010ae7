use brewgen::formulation::GrainFormulation;
use brewgen::solver::emit_lp;
use brewgen::{
    color_distribution, BrewgenConfig, Bounds, BucketTarget, Catalog, Category, Fermentable,
    Formulator, GrainProblem, Hop, HopProblem, HopTarget, Outcome, SensoryRange, StyleProfile,
    TimingBucket, UsageOverride,
};
use tracing_subscriber::EnvFilter;

fn main() -> brewgen::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let catalog = Catalog::new(
        vec![
            Fermentable::new("2-Row", "Briess", "base", 1.037, 1.8)
                .with_sensory("grainy", 1.5)
                .with_sensory("sweet", 0.5),
            Fermentable::new("Munich 10L", "Briess", "base", 1.035, 10.0)
                .with_sensory("bready", 2.5)
                .with_sensory("sweet", 1.0),
            Fermentable::new("Caramel 60L", "Briess", "crystal", 1.034, 60.0)
                .with_sensory("caramel", 4.0)
                .with_sensory("sweet", 3.0),
            Fermentable::new("Chocolate", "Briess", "roast", 1.028, 350.0)
                .with_sensory("roasted", 4.5),
        ],
        vec![
            Hop::new("Magnum", 14.0, 2.2),
            Hop::new("Cascade", 6.5, 1.2).with_aroma("floral", 2.0).with_aroma("citrus", 3.0),
            Hop::new("Centennial", 10.0, 2.0).with_aroma("floral", 3.0).with_aroma("citrus", 2.0),
        ],
    );

    let style = StyleProfile {
        name: "American Amber".into(),
        fermentables: vec![
            UsageOverride { slug: "briess-2-row".into(), min_percent: 50.0, max_percent: 90.0 },
            UsageOverride { slug: "briess-munich-10l".into(), min_percent: 5.0, max_percent: 30.0 },
            UsageOverride { slug: "briess-caramel-60l".into(), min_percent: 5.0, max_percent: 15.0 },
            UsageOverride { slug: "briess-chocolate".into(), min_percent: 1.0, max_percent: 3.0 },
        ],
        categories: vec![
            Category::new("base", 80.0, 95.0),
            Category::new("crystal", 5.0, 15.0),
            Category::new("roast", 0.0, 3.0).with_max_unique(1),
        ],
        sensory: vec![SensoryRange::new("caramel", 0.2, 0.5)],
    };

    let config = BrewgenConfig::default();
    let fermentables = style.resolve(&catalog)?;
    let problem = GrainProblem {
        fermentables: &fermentables,
        categories: &style.categories,
        max_unique: config.defaults.max_unique_grains,
        sensory: &style.sensory,
    };
    let beer = config.defaults.beer()?;
    let equipment = config.defaults.equipment()?;
    let brew = Formulator::new(config);

    println!("feasible: {:?}", brew.test_model(&problem)?);

    match brew.grain_bills(&problem, &beer, &equipment)? {
        Outcome::Infeasible => println!("no grain bill fits {}", style.name),
        outcome => {
            let complete = outcome.is_complete();
            let bills = outcome.into_value().unwrap_or_default();
            let recipes: Vec<_> = bills.iter().map(|b| b.recipe(&beer, &equipment)).collect();
            println!("{} bills (complete: {complete})", recipes.len());
            if let Some(r) = recipes.first() {
                println!("{}", serde_json::to_string_pretty(r)?);
            }
            for c in color_distribution(&recipes) {
                println!("  srm {:>2}: {}", c.srm, c.count);
            }
        }
    }

    if let Some(ranges) = brew.sensory_ranges(&problem, None)?.into_value() {
        for r in ranges {
            println!("  {:<8} {:.3} .. {:.3}", r.name, r.min, r.max);
        }
    }

    let buckets = vec![
        BucketTarget {
            bucket: TimingBucket::boil(60.0),
            target: HopTarget { ibu: Some(Bounds::new(20.0, 30.0)), ..Default::default() },
        },
        BucketTarget {
            bucket: TimingBucket::whirlpool(),
            target: HopTarget { max_unique: Some(1), ..Default::default() },
        },
        BucketTarget { bucket: TimingBucket::dry_hop(), target: HopTarget::default() },
    ];
    let recipe = HopTarget {
        ibu: Some(Bounds::new(25.0, 40.0)),
        mass: Some(Bounds::new(40.0, 60.0)),
        ..Default::default()
    };
    let hop_problem = HopProblem {
        hops: &catalog.hops,
        buckets: &buckets,
        recipe: &recipe,
        original_sg: beer.original_sg,
        volume_liters: equipment.target_volume_liters(),
    };
    println!("hops feasible: {:?}", brew.hop_feasibility(&hop_problem)?);
    if let Some(ranges) = brew.flavor_ranges(&hop_problem, None)?.into_value() {
        for r in ranges {
            println!("  {:<8} {:.3} .. {:.3}", r.name, r.min, r.max);
        }
    }

    // Same grain model for an external MIP solver: `scip -c "read amber_ale.lp optimize quit"`
    let lp = emit_lp(&GrainFormulation::build(&problem, &[])?.model, None);
    std::fs::write("amber_ale.lp", lp)?;
    eprintln!("wrote amber_ale.lp");
    Ok(())
}
