#![no_main]

use std::cell::Cell;
use std::rc::Rc;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rivulet_core::{Message, Sink, Source, Talkback};
use rivulet_ops::{ReplayConfig, SourceExt, Subject};

#[derive(Arbitrary, Debug, Clone, Copy)]
enum Pipeline {
    Plain,
    Take(u8),
    Distinct,
    Shared,
    Replayed(u8),
}

#[derive(Arbitrary, Debug)]
enum Action {
    Subscribe(Pipeline),
    Push(u8),
    Cancel(u8),
    Complete,
    Fail,
}

/// Checks the sink contract: START first, nothing after END.
struct Watch {
    started: Cell<bool>,
    ended: Cell<bool>,
}

fn watched(pipeline: &Source<u8, u8>) -> Option<Talkback> {
    let watch = Rc::new(Watch {
        started: Cell::new(false),
        ended: Cell::new(false),
    });
    let w = Rc::clone(&watch);
    pipeline
        .subscribe(Sink::new(move |msg| {
            assert!(!w.ended.get(), "notification after END");
            match msg {
                Message::Start(_) => {
                    assert!(!w.started.get(), "second START");
                    w.started.set(true);
                }
                Message::Data(_) => assert!(w.started.get(), "DATA before START"),
                Message::End(_) => w.ended.set(true),
            }
        }))
        .ok()
}

fuzz_target!(|actions: Vec<Action>| {
    let subject = Subject::<u8, u8>::new();
    let base = subject.source();
    let mut talkbacks: Vec<Talkback> = Vec::new();

    for action in actions.into_iter().take(256) {
        match action {
            Action::Subscribe(kind) => {
                let pipeline = match kind {
                    Pipeline::Plain => base.clone(),
                    Pipeline::Take(n) => base.take(usize::from(n % 8)),
                    Pipeline::Distinct => base.distinct_until_changed(),
                    Pipeline::Shared => base.share(),
                    Pipeline::Replayed(cap) => base
                        .replay(ReplayConfig::default().with_capacity(usize::from(cap % 4))),
                };
                if let Some(talkback) = watched(&pipeline) {
                    talkbacks.push(talkback);
                }
            }
            Action::Push(v) => {
                let _ = subject.next(v);
            }
            Action::Cancel(i) => {
                if !talkbacks.is_empty() {
                    let idx = usize::from(i) % talkbacks.len();
                    let _ = talkbacks[idx].cancel();
                    assert!(talkbacks[idx].is_terminated());
                }
            }
            Action::Complete => {
                let _ = subject.complete();
            }
            Action::Fail => {
                let _ = subject.error(0xEE);
            }
        }
    }

    for talkback in &talkbacks {
        let _ = talkback.cancel();
    }
    assert_eq!(subject.observer_count(), 0);
});
