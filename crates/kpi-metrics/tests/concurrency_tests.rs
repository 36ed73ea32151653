//! Concurrent updates against one context.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use kpi_test_utils::*;
use std::sync::Arc;
use std::thread;

const THREADS: usize = 8;
const UPDATES_PER_THREAD: usize = 1_000;

#[test]
fn test_concurrent_increments_are_exact() {
    let ctx = Arc::new(TestContextBuilder::new().build());

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || {
                let labels = amf_labels();
                for _ in 0..UPDATES_PER_THREAD {
                    ctx.increment(AMF_SUBSCRIBERS, &labels).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    #[allow(clippy::cast_precision_loss)]
    let expected = (THREADS * UPDATES_PER_THREAD) as f64;
    assert_eq!(ctx.value(AMF_SUBSCRIBERS, &amf_labels()).unwrap(), Some(expected));
    assert_eq!(ctx.list_metrics().unwrap(), vec![AMF_SUBSCRIBERS_NAME]);
    ctx.render_text()
        .unwrap()
        .assert_has_series("testns_mean_registered_subscribers_amf", expected);
}

#[test]
fn test_concurrent_gauge_updates_on_distinct_slices() {
    let ctx = Arc::new(TestContextBuilder::new().build());

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || {
                let labels = kpi_metrics::LabelSet::new().with("NetworkSlice", format!("slice_{i}"));
                for _ in 0..UPDATES_PER_THREAD {
                    ctx.increment(REGISTRATION_RATE, &labels).unwrap();
                    ctx.decrement(REGISTRATION_RATE, &labels).unwrap();
                }
                ctx.set(REGISTRATION_RATE, 50.0, &labels).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for i in 0..THREADS {
        let labels = kpi_metrics::LabelSet::new().with("NetworkSlice", format!("slice_{i}"));
        assert_eq!(ctx.value(REGISTRATION_RATE, &labels).unwrap(), Some(50.0));
    }
}
