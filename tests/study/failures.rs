use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use spea2::prelude::*;

fn problem() -> Problem {
    Problem::builder()
        .variable("x", 0.0, 1.0)
        .variable("y", 0.0, 1.0)
        .maximize("f1")
        .maximize("f2")
        .build()
        .unwrap()
}

fn outputs(p: &ParameterVector) -> Outputs {
    Outputs::from([
        ("f1".to_owned(), 1.0 + p[0]),
        ("f2".to_owned(), 2.0 - p[0] + p[1]),
    ])
}

/// Sums the replacement counts of every evaluation report.
struct Tally {
    replacements: Arc<AtomicUsize>,
    exhausted: Arc<AtomicUsize>,
}

impl Observer for Tally {
    fn after_evaluation(&self, _index: usize, report: &EvaluationReport) {
        self.replacements
            .fetch_add(report.replacements, Ordering::SeqCst);
        self.exhausted
            .fetch_add(report.exhausted.len(), Ordering::SeqCst);
    }
}

#[test]
fn test_failed_designs_are_replaced() {
    for concurrency in [1, 3] {
        let failures = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&failures);
        let replacements = Arc::new(AtomicUsize::new(0));
        let exhausted = Arc::new(AtomicUsize::new(0));

        let study = Study::builder(problem())
            .config(Spea2Config {
                population_size: 6,
                max_generations: 4,
                concurrency,
                seed: Some(3),
                ..Spea2Config::default()
            })
            .evaluator(
                move |p: &ParameterVector, _: &Path| -> std::result::Result<Outputs, EvaluationError> {
                    if p[0] < 0.3 {
                        counter.fetch_add(1, Ordering::SeqCst);
                        return Err(EvaluationError::failed("simulation did not converge"));
                    }
                    Ok(outputs(p))
                },
            )
            .observer(Tally {
                replacements: Arc::clone(&replacements),
                exhausted: Arc::clone(&exhausted),
            })
            .build()
            .unwrap();

        let pool = study.run().unwrap();
        for g in pool.generations().unwrap() {
            assert_eq!(g.individuals.len(), 6);
            for ind in &g.individuals {
                assert!(ind.is_evaluated());
                assert!(ind.params()[0] >= 0.3);
            }
        }
        assert_eq!(
            replacements.load(Ordering::SeqCst),
            failures.load(Ordering::SeqCst)
        );
        assert_eq!(exhausted.load(Ordering::SeqCst), 0);
    }
}

#[test]
fn test_non_finite_output_is_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let study = Study::builder(problem())
        .config(Spea2Config {
            population_size: 4,
            max_generations: 2,
            seed: Some(11),
            ..Spea2Config::default()
        })
        .evaluator(
            move |p: &ParameterVector, _: &Path| -> std::result::Result<Outputs, EvaluationError> {
                let mut out = outputs(p);
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    out.insert("f1".to_owned(), f64::NAN);
                }
                Ok(out)
            },
        )
        .build()
        .unwrap();

    let pool = study.run().unwrap();
    // One extra call for the replaced slot.
    assert_eq!(calls.load(Ordering::SeqCst), 9);
    for g in pool.generations().unwrap() {
        assert!(g.individuals.iter().all(Individual::is_evaluated));
    }
}

#[test]
fn test_retry_ceiling_leaves_failed_slots() {
    let study = Study::builder(problem())
        .config(Spea2Config {
            population_size: 3,
            max_generations: 2,
            max_retries: Some(2),
            seed: Some(5),
            ..Spea2Config::default()
        })
        .evaluator(|_: &ParameterVector, _: &Path| -> std::result::Result<Outputs, EvaluationError> {
            Err(EvaluationError::failed("license server unreachable"))
        })
        .build()
        .unwrap();

    let pool = study.run().unwrap();
    assert_eq!(pool.len(), 2);
    for g in pool.generations().unwrap() {
        assert_eq!(g.archive.len(), 3);
        for ind in &g.individuals {
            assert_eq!(ind.status, EvaluationStatus::Failed);
            assert!(ind.fitness.fitness.is_infinite());
            assert!(!ind.fitness.is_elite());
        }
        assert!(g.archive.iter().all(|i| !i.effective_fitness().is_elite()));
    }
}

#[test]
fn test_unexpected_error_aborts_run() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let study = Study::builder(problem())
        .config(Spea2Config {
            population_size: 5,
            max_generations: 6,
            seed: Some(1),
            ..Spea2Config::default()
        })
        .evaluator(
            move |p: &ParameterVector, _: &Path| -> std::result::Result<Outputs, EvaluationError> {
                // Generations 0 and 1 take five calls each.
                if counter.fetch_add(1, Ordering::SeqCst) == 10 {
                    return Err(EvaluationError::Unexpected("simulator crashed".into()));
                }
                Ok(outputs(p))
            },
        )
        .build()
        .unwrap();

    match study.run() {
        Err(Error::RunAborted { generation, source }) => {
            assert_eq!(generation, 2);
            assert!(matches!(*source, Error::UnexpectedEvaluation(_)));
        }
        other => panic!("expected RunAborted, got {other:?}"),
    }
}

#[test]
fn test_missing_output_is_fatal() {
    let study = Study::builder(problem())
        .config(Spea2Config {
            population_size: 4,
            max_generations: 2,
            concurrency: 2,
            ..Spea2Config::default()
        })
        .evaluator(|p: &ParameterVector, _: &Path| -> std::result::Result<Outputs, EvaluationError> {
            Ok(Outputs::from([("f1".to_owned(), p[0])]))
        })
        .build()
        .unwrap();

    let err = study.run().unwrap_err();
    assert!(matches!(err.root(), Error::MissingOutput(name) if name == "f2"));
}

#[test]
fn test_zero_minimized_target_is_retried() {
    let problem = Problem::builder()
        .variable("x", 0.0, 1.0)
        .maximize("gain")
        .minimize("err")
        .build()
        .unwrap();
    let study = Study::builder(problem)
        .config(Spea2Config {
            population_size: 4,
            max_generations: 3,
            seed: Some(8),
            ..Spea2Config::default()
        })
        .evaluator(|p: &ParameterVector, _: &Path| -> std::result::Result<Outputs, EvaluationError> {
            let err = if p[0] < 0.3 { 0.0 } else { p[0] };
            Ok(Outputs::from([
                ("gain".to_owned(), 1.0),
                ("err".to_owned(), err),
            ]))
        })
        .build()
        .unwrap();

    let pool = study.run().unwrap();
    for g in pool.generations().unwrap() {
        for ind in g.individuals.iter().chain(&g.archive) {
            assert!(ind.is_evaluated());
            let record = ind.effective_fitness();
            assert!(record.fitness.is_finite());
            assert!(record.distance >= 0.0);
        }
    }
}
