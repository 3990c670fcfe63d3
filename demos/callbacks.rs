//! Storing callables of different concrete types behind one signature.
//!
//! **Run this example:** `cargo run --example callbacks`
//!
//! An event bus keeps its handlers as `PolyFn`s. Small closures stay inside
//! the handler slot; one capturing a lookup table is placed on the heap.
//! Calling a slot whose handler was removed is reported with `try_call`.

use std::sync::atomic::{AtomicU64, Ordering};

use polybox::PolyFn;
use rootcause::prelude::*;

/// `fn(event id, payload) -> handled`
type Handler = PolyFn<fn(u32, u64) -> bool>;

static TOTAL: AtomicU64 = AtomicU64::new(0);

fn accumulate(_event: u32, payload: u64) -> bool {
    TOTAL.fetch_add(payload, Ordering::Relaxed);
    true
}

struct Bus {
    handlers: Vec<(&'static str, Handler)>,
}

impl Bus {
    fn dispatch(&self, event: u32, payload: u64) -> Result<usize, Report> {
        let mut handled = 0;
        for (name, handler) in &self.handlers {
            let accepted = handler
                .try_call(event, payload)
                .context(format!("dispatching event {event}"))
                .attach(format!("handler: {name}"))?;
            if accepted {
                handled += 1;
            }
        }
        Ok(handled)
    }
}

fn main() -> Result<(), Report> {
    let threshold = 10;
    let weights = [1u64, 2, 3, 5, 8, 13, 21, 34];

    let mut bus = Bus {
        handlers: vec![
            ("accumulate", Handler::new(accumulate)),
            (
                "threshold",
                Handler::new(move |_event: u32, payload: u64| payload > threshold),
            ),
            (
                "weighted",
                Handler::new(move |event: u32, payload: u64| {
                    weights[event as usize % weights.len()] * payload > 100
                }),
            ),
        ],
    };

    for (name, handler) in &bus.handlers {
        let placement = if handler.is_inline() { "inline" } else { "heap" };
        println!("{name:>10}: {placement}");
    }

    println!("event 1 handled by {}", bus.dispatch(1, 20)?);
    println!("event 7 handled by {}", bus.dispatch(7, 4)?);
    println!("total payload: {}", TOTAL.load(Ordering::Relaxed));

    // Removing a handler leaves an empty slot behind.
    bus.handlers[1].1.reset();
    match bus.dispatch(2, 1) {
        Ok(count) => println!("unexpectedly handled by {count}"),
        Err(report) => println!("{report}"),
    }

    Ok(())
}
