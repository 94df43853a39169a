//! The prelude alone is enough to build, drive, and tear down a pipeline.

use std::convert::Infallible;
use std::rc::Rc;

use rivulet::prelude::*;
use rivulet_harness::{CleanupProbe, Event, Recorder};
use web_time::Duration;

#[test]
fn hand_written_source_through_operators() {
    let probe = CleanupProbe::new();
    let cleanup = probe.clone();
    let numbers = create_source(move |out: Emitter<u32, Infallible>| {
        for v in 1..=6 {
            if out.is_terminated() {
                break;
            }
            out.next(v)?;
        }
        out.complete()?;
        Ok(cleanup.cleanup())
    });

    let rec = Recorder::new();
    numbers
        .filter(|v| v % 2 == 0)
        .scan(0, |acc, v| acc + v)
        .take(2)
        .subscribe(rec.sink())
        .unwrap();

    assert_eq!(rec.data(), vec![2, 6]);
    assert_eq!(rec.events().last(), Some(&Event::End(None)));
    assert_eq!(probe.count(), 1);
}

#[test]
fn scheduler_driven_pipeline() {
    let scheduler = Rc::new(ManualScheduler::new());
    let host: Rc<dyn Scheduler> = scheduler.clone();

    let rec = Recorder::<u64, Infallible>::new();
    interval(Rc::clone(&host), Duration::from_millis(10))
        .take(3)
        .subscribe(rec.sink())
        .unwrap();

    scheduler.run_until_idle().unwrap();
    assert_eq!(rec.data(), vec![0, 1, 2]);
    assert!(rec.is_ended());
    assert_eq!(scheduler.elapsed(), Duration::from_millis(30));
}

#[test]
fn errors_are_typed_end_to_end() {
    let rec = Recorder::<i32, String>::new();
    fail::<i32, &str>("boom")
        .catch_error(|reason: &str| fail(format!("wrapped: {reason}")))
        .subscribe(rec.sink())
        .unwrap();

    assert_eq!(
        rec.events(),
        vec![Event::Start, Event::End(Some("wrapped: boom".to_string()))]
    );
}
