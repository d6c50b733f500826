use std::ops::ControlFlow;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use spea2::prelude::*;

fn study(generations: usize, observer: impl Observer + 'static) -> Study {
    let problem = Problem::builder()
        .variable("x", -1.0, 1.0)
        .minimize("cost")
        .maximize("margin")
        .build()
        .unwrap();
    Study::builder(problem)
        .config(Spea2Config {
            population_size: 4,
            max_generations: generations,
            seed: Some(9),
            ..Spea2Config::default()
        })
        .evaluator(|p: &ParameterVector, _: &Path| -> std::result::Result<Outputs, EvaluationError> {
            Ok(Outputs::from([
                ("cost".to_owned(), 1.0 + p[0] * p[0]),
                ("margin".to_owned(), 2.0 + p[0]),
            ]))
        })
        .observer(observer)
        .build()
        .unwrap()
}

#[test]
fn test_observer_stops_run_early() {
    let study = study(10, |g: &Generation| {
        if g.index == 2 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    let pool = study.run().unwrap();
    assert_eq!(pool.len(), 3);
    assert_eq!(pool.last().unwrap().index, 2);
}

#[derive(Default)]
struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Observer for Recorder {
    fn after_evaluation(&self, index: usize, report: &EvaluationReport) {
        assert!(report.is_complete());
        self.events.lock().push(format!("evaluated {index}"));
    }

    fn after_generation(&self, generation: &Generation) -> ControlFlow<()> {
        assert_eq!(generation.archive.len(), 4);
        self.events.lock().push(format!("finished {}", generation.index));
        ControlFlow::Continue(())
    }
}

#[test]
fn test_observer_hook_order() {
    let recorder = Recorder::default();
    let events = Arc::clone(&recorder.events);
    study(3, recorder).run().unwrap();

    assert_eq!(
        *events.lock(),
        [
            "evaluated 0",
            "finished 0",
            "evaluated 1",
            "finished 1",
            "evaluated 2",
            "finished 2",
        ]
    );
}

#[test]
fn test_observer_stopping_at_first_generation() {
    let pool = study(5, |_: &Generation| ControlFlow::Break(()))
        .run()
        .unwrap();
    assert_eq!(pool.len(), 1);
}
