use core::time::Duration;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use spea2::prelude::*;

fn template_dir() -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let mut path = std::env::temp_dir();
    path.push(format!(
        "spea2_study_template_{}_{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    fs::create_dir_all(&path).unwrap();
    fs::write(path.join("amp.sp"), "2.5").unwrap();
    path
}

fn problem() -> Problem {
    Problem::builder()
        .variable("w", 0.0, 1.0)
        .maximize("gain")
        .maximize("swing")
        .build()
        .unwrap()
}

fn config(concurrency: usize) -> Spea2Config {
    Spea2Config {
        population_size: 6,
        max_generations: 3,
        concurrency,
        seed: Some(21),
        ..Spea2Config::default()
    }
}

/// Reads a scale factor from the netlist in its working directory.
fn netlist_evaluator(
    seen: Arc<Mutex<HashSet<PathBuf>>>,
) -> impl Fn(&ParameterVector, &Path) -> std::result::Result<Outputs, EvaluationError> + Send + Sync
{
    move |p: &ParameterVector, dir: &Path| -> std::result::Result<Outputs, EvaluationError> {
        seen.lock().insert(dir.to_path_buf());
        let scale: f64 = fs::read_to_string(dir.join("amp.sp"))?
            .trim()
            .parse()
            .map_err(|_| EvaluationError::failed("bad netlist"))?;
        Ok(Outputs::from([
            ("gain".to_owned(), scale * (1.0 + p[0])),
            ("swing".to_owned(), scale * (2.0 - p[0])),
        ]))
    }
}

#[test]
fn test_template_is_mirrored_per_context() {
    let template = template_dir();
    let seen = Arc::new(Mutex::new(HashSet::new()));
    let study = Study::builder(problem())
        .config(config(3))
        .template(&template)
        .evaluator(netlist_evaluator(Arc::clone(&seen)))
        .build()
        .unwrap();

    let root = study.workspace().temp_root().unwrap().to_path_buf();
    assert_eq!(
        root.file_name().unwrap().to_string_lossy(),
        format!("{}_temp", template.file_name().unwrap().to_string_lossy())
    );

    study.run().unwrap();

    let seen = seen.lock();
    assert!(!seen.is_empty());
    for dir in seen.iter() {
        assert!(dir.starts_with(&root), "{} outside {}", dir.display(), root.display());
    }
    assert!(!root.exists(), "copies should be removed after the run");
    assert!(template.join("amp.sp").exists());
    fs::remove_dir_all(template).unwrap();
}

#[test]
fn test_keep_workspace_leaves_copies() {
    let template = template_dir();
    let study = Study::builder(problem())
        .config(config(2))
        .template(&template)
        .keep_workspace()
        .evaluator(netlist_evaluator(Arc::new(Mutex::new(HashSet::new()))))
        .build()
        .unwrap();

    study.run().unwrap();
    let root = study.workspace().temp_root().unwrap();
    assert!(root.join("0").join("amp.sp").exists());
    assert!(root.join("1").join("amp.sp").exists());

    study.workspace().teardown().unwrap();
    assert!(!root.exists());
    fs::remove_dir_all(template).unwrap();
}

#[test]
fn test_single_context_runs_in_template() {
    let template = template_dir();
    let seen = Arc::new(Mutex::new(HashSet::new()));
    let study = Study::builder(problem())
        .config(config(1))
        .template(&template)
        .evaluator(netlist_evaluator(Arc::clone(&seen)))
        .build()
        .unwrap();

    assert!(study.workspace().temp_root().is_none());
    study.run().unwrap();
    assert_eq!(*seen.lock(), HashSet::from([template.clone()]));
    fs::remove_dir_all(template).unwrap();
}

#[test]
fn test_missing_template_fails_to_build() {
    let mut missing = std::env::temp_dir();
    missing.push(format!("spea2_no_such_template_{}", std::process::id()));
    let err = Study::builder(problem())
        .config(config(2))
        .template(&missing)
        .evaluator(netlist_evaluator(Arc::new(Mutex::new(HashSet::new()))))
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::Workspace { .. }));
}

#[test]
fn test_run_twice_reuses_fresh_copies() {
    let template = template_dir();
    let seen = Arc::new(Mutex::new(HashSet::new()));
    let study = Study::builder(problem())
        .config(config(2))
        .template(&template)
        .evaluator(netlist_evaluator(Arc::clone(&seen)))
        .build()
        .unwrap();

    let root = study.workspace().temp_root().unwrap().to_path_buf();
    let first = study.run().unwrap();
    assert!(!root.exists());
    let second = study.run().unwrap();
    assert!(!root.exists());

    assert_eq!(first.len(), second.len());
    for g in second.generations().unwrap() {
        assert!(g.individuals.iter().all(Individual::is_evaluated));
    }
    assert_eq!(seen.lock().len(), 2);
    fs::remove_dir_all(template).unwrap();
}

/// Evaluations running per working directory, and the most ever seen at once.
#[derive(Default)]
struct Occupancy {
    running: HashMap<PathBuf, usize>,
    peak: HashMap<PathBuf, usize>,
}

#[test]
fn test_context_never_hosts_two_evaluations() {
    let template = template_dir();
    let occupancy = Arc::new(Mutex::new(Occupancy::default()));
    let calls = Arc::new(AtomicU64::new(0));
    let tracker = Arc::clone(&occupancy);
    let counter = Arc::clone(&calls);

    let study = Study::builder(problem())
        .config(Spea2Config {
            population_size: 10,
            max_generations: 3,
            concurrency: 3,
            seed: Some(17),
            ..Spea2Config::default()
        })
        .template(&template)
        .evaluator(
            move |p: &ParameterVector, dir: &Path| -> std::result::Result<Outputs, EvaluationError> {
                {
                    let mut occ = tracker.lock();
                    let running = occ.running.entry(dir.to_path_buf()).or_insert(0);
                    *running += 1;
                    let now = *running;
                    let peak = occ.peak.entry(dir.to_path_buf()).or_insert(0);
                    *peak = (*peak).max(now);
                }
                let call = counter.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(2 + (call % 4) * 5));
                *tracker.lock().running.entry(dir.to_path_buf()).or_insert(1) -= 1;
                Ok(Outputs::from([
                    ("gain".to_owned(), 1.0 + p[0]),
                    ("swing".to_owned(), 2.0 - p[0]),
                ]))
            },
        )
        .build()
        .unwrap();

    study.run().unwrap();

    let occ = occupancy.lock();
    assert_eq!(calls.load(Ordering::SeqCst), 30);
    assert_eq!(occ.peak.len(), 3);
    for (dir, &peak) in &occ.peak {
        assert_eq!(peak, 1, "{} hosted {peak} evaluations at once", dir.display());
    }
    assert!(occ.running.values().all(|&n| n == 0));
    fs::remove_dir_all(template).unwrap();
}
