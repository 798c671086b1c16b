//! Asynchronous delivery example
//!
//! Demonstrates bounded queues, overflow handling and per-domain metrics
//! while several threads log concurrently.
//!
//! Run with: cargo run --example async_logging

use domain_logger::prelude::*;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Domain Logger - Async Logging Example ===\n");

    let manager = DomainManager::builder()
        .shutdown_timeout(Duration::from_secs(2))
        .on_overflow(Arc::new(|dropped: u64| {
            eprintln!("[overflow] {} records dropped so far", dropped);
        }))
        .build();

    // A small queue that drops new records when full
    manager.configure(
        "ingest",
        Settings::default()
            .with_max_queue_size(64)
            .with_overflow_policy(OverflowPolicy::DropNewest),
    )?;
    // A domain that waits briefly for space instead of dropping
    manager.configure(
        "billing",
        Settings::default()
            .with_max_queue_size(64)
            .with_overflow_policy(OverflowPolicy::BlockWithTimeout(Duration::from_millis(50))),
    )?;

    println!("1. Spawning producers:");
    let mut handles = Vec::new();
    for domain in ["ingest", "billing"] {
        for worker in 0..2 {
            let logger = manager
                .get_logger(domain, Some("worker"))?
                .bind("worker", worker);
            handles.push(thread::spawn(move || {
                for i in 0..500 {
                    logger.info(format!("event {}", i));
                }
            }));
        }
    }

    for handle in handles {
        let _ = handle.join();
    }

    println!("\n2. Shutting down:");
    for report in manager.shutdown_all() {
        println!(
            "   {}: dropped on stop {}, timed out {}",
            report.domain, report.dropped_on_stop, report.timed_out
        );
    }

    println!("\n3. Metrics:");
    for domain in manager.domains() {
        if let Some(metrics) = manager.metrics(&domain) {
            println!(
                "   {}: enqueued {}, delivered {}, overflow {}, drop rate {:.2}%",
                domain,
                metrics.enqueued(),
                metrics.delivered(),
                metrics.overflow_dropped(),
                metrics.drop_rate()
            );
        }
    }

    println!("\n=== Example completed successfully! ===");

    Ok(())
}
