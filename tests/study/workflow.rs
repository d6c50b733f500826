use std::path::Path;

use spea2::prelude::*;

fn problem() -> Problem {
    Problem::builder()
        .variable("w", 0.0, 1.0)
        .variable("l", 0.0, 1.0)
        .maximize("gain")
        .maximize("bandwidth")
        .max_constraint("power", 1.2)
        .build()
        .expect("problem should be valid")
}

fn amplifier(p: &ParameterVector, _: &Path) -> std::result::Result<Outputs, EvaluationError> {
    let (w, l) = (p[0], p[1]);
    Ok(Outputs::from([
        ("gain".to_owned(), 1.0 + w * (1.0 - 0.5 * l)),
        ("bandwidth".to_owned(), 1.0 + l * (1.0 - 0.5 * w)),
        ("power".to_owned(), w + l),
    ]))
}

fn config(n: usize, generations: usize, concurrency: usize) -> Spea2Config {
    Spea2Config {
        population_size: n,
        max_generations: generations,
        concurrency,
        seed: Some(42),
        ..Spea2Config::default()
    }
}

#[test]
fn test_every_generation_holds_n() {
    let problem = problem();
    let study = Study::builder(problem.clone())
        .config(config(8, 6, 1))
        .evaluator(amplifier)
        .build()
        .expect("study should build");

    let pool = study.run().expect("run should succeed");
    let generations = pool.generations().expect("instance storage");
    assert_eq!(generations.len(), 6);

    for (i, g) in generations.iter().enumerate() {
        assert_eq!(g.index, i);
        assert_eq!(g.individuals.len(), 8);
        assert_eq!(g.archive.len(), 8);
        assert!(g.is_complete(8));
        for ind in g.individuals.iter().chain(&g.archive) {
            assert!(problem.contains(ind.params()), "out of bounds: {:?}", ind.params());
            assert!(ind.is_evaluated());
        }
    }
}

#[test]
fn test_fitness_records_are_well_formed() {
    let study = Study::builder(problem())
        .config(config(10, 5, 1))
        .evaluator(amplifier)
        .build()
        .unwrap();
    let pool = study.run().unwrap();

    for g in pool.generations().unwrap() {
        for ind in &g.individuals {
            let record = &ind.fitness;
            let m = ind.measurements.as_ref().expect("evaluated individuals carry measurements");
            assert!(record.distance >= 0.0);
            assert!(record.total_error >= 0.0);
            assert!(record.fitness.is_finite());
            // power = w + l; feasible iff at or below the bound.
            let feasible = m.constraints[0] <= 1.2;
            assert_eq!(record.total_error == 0.0, feasible);
        }
    }
}

#[test]
fn test_every_archive_keeps_an_elite() {
    let study = Study::builder(problem())
        .config(config(6, 8, 1))
        .evaluator(|p: &ParameterVector, _: &Path| -> std::result::Result<Outputs, EvaluationError> {
            let (w, l) = (p[0], p[1]);
            Ok(Outputs::from([
                ("gain".to_owned(), 1.0 + w),
                ("bandwidth".to_owned(), 2.0 - w + l),
                ("power".to_owned(), 0.0),
            ]))
        })
        .build()
        .unwrap();
    let pool = study.run().unwrap();

    for g in pool.generations().unwrap() {
        let elites = g
            .archive
            .iter()
            .filter(|i| i.effective_fitness().is_elite())
            .count();
        assert!(elites >= 1, "generation {} archive has no elite", g.index);
    }
}

#[test]
fn test_seeded_runs_repeat() {
    let run = || {
        Study::builder(problem())
            .config(config(6, 4, 1))
            .evaluator(amplifier)
            .build()
            .unwrap()
            .run()
            .unwrap()
    };
    let (a, b) = (run(), run());
    let params = |pool: &GenerationPool| -> Vec<Vec<f64>> {
        pool.last()
            .unwrap()
            .archive
            .iter()
            .map(|i| i.params().as_slice().to_vec())
            .collect()
    };
    assert_eq!(params(&a), params(&b));
}

#[test]
fn test_concurrent_run() {
    let study = Study::builder(problem())
        .config(config(8, 4, 4))
        .evaluator(amplifier)
        .build()
        .unwrap();
    assert_eq!(study.workspace().len(), 4);

    let pool = study.run().unwrap();
    assert_eq!(pool.len(), 4);
    let last = pool.last().unwrap();
    assert_eq!(last.archive.len(), 8);
    assert!(last.individuals.iter().all(Individual::is_evaluated));
}

#[test]
fn test_archive_truncation_modes() {
    for truncation in [Truncation::Density, Truncation::Arbitrary] {
        let study = Study::builder(problem())
            .config(Spea2Config {
                truncation,
                ..config(5, 4, 1)
            })
            .evaluator(amplifier)
            .build()
            .unwrap();
        let pool = study.run().unwrap();
        for g in pool.generations().unwrap() {
            assert_eq!(g.archive.len(), 5, "{truncation:?}");
        }
    }
}

#[test]
fn test_explicit_initial_population() {
    let vectors = vec![vec![0.1, 0.2], vec![0.3, 0.4], vec![0.5, 0.6]];
    let study = Study::builder(problem())
        .config(Spea2Config {
            initializer: Initializer::Explicit(vectors.clone()),
            ..config(3, 2, 1)
        })
        .evaluator(amplifier)
        .build()
        .unwrap();
    let pool = study.run().unwrap();

    let first: Vec<Vec<f64>> = pool.generations().unwrap()[0]
        .individuals
        .iter()
        .map(|i| i.params().as_slice().to_vec())
        .collect();
    assert_eq!(first, vectors);
}

#[test]
fn test_explicit_population_must_match_size() {
    let err = Study::builder(problem())
        .config(Spea2Config {
            initializer: Initializer::Explicit(vec![vec![0.1, 0.2]]),
            ..config(3, 2, 1)
        })
        .evaluator(amplifier)
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 3, got: 1 }));
}

#[test]
fn test_invalid_settings_are_rejected() {
    let build = |cfg: Spea2Config| {
        Study::builder(problem())
            .config(cfg)
            .evaluator(amplifier)
            .build()
    };
    assert!(matches!(
        build(config(0, 3, 1)),
        Err(Error::InvalidPopulationSize)
    ));
    assert!(matches!(
        build(config(4, 0, 1)),
        Err(Error::InvalidMaxGenerations)
    ));
    assert!(matches!(
        build(config(4, 3, 9)),
        Err(Error::InvalidConcurrency(9))
    ));
}

#[test]
fn test_single_generation_archive_mirrors_population() {
    let study = Study::builder(problem())
        .config(config(4, 1, 1))
        .evaluator(amplifier)
        .build()
        .unwrap();
    let pool = study.run().unwrap();
    assert_eq!(pool.len(), 1);

    let g = pool.last().unwrap();
    for (ind, member) in g.individuals.iter().zip(&g.archive) {
        assert_eq!(ind.id(), member.id());
        assert_eq!(member.provenance, Provenance::FromGeneration);
    }
}
