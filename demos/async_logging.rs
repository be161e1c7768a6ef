//! Async logging example
//!
//! Demonstrates a bounded queue in front of console and file sinks with
//! several producer threads.
//!
//! Run with: cargo run --example async_logging

use rust_json_logger::prelude::*;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    println!("=== Rust JSON Logger - Async Logging Example ===\n");

    let logger = Logger::builder()
        .name("demo")
        .queue(
            QueueSettings::new("main").bounded(1000),
            [
                Sink::new("console", ConsoleAppender::stdout())
                    .with_level(LogLevel::Warning)
                    .with_formatter(TextFormatter::new("{asctime} {levelname} [{threadName}] {message}")),
                Sink::new("file", FileAppender::new("async_test.jsonl")?),
            ],
        )
        .build()?;

    println!("1. High-performance async logging:");

    for i in 0..100 {
        logger.record(LogLevel::Info, "Message #{}").arg(i).emit();
    }

    println!("   Logged 100 messages asynchronously");

    println!("\n2. Multi-threaded logging:");

    let mut handles = vec![];
    for thread_id in 0..5 {
        let logger = logger.named(format!("demo.worker{}", thread_id));
        let handle = thread::spawn(move || {
            for i in 0..20 {
                logger
                    .record(LogLevel::Info, "Thread {} - Message {}")
                    .arg(thread_id)
                    .arg(i)
                    .extra("worker", thread_id)
                    .emit();
                thread::sleep(Duration::from_millis(10));
            }
            logger.warning("worker finished");
        });
        handles.push(handle);
    }

    for handle in handles {
        if handle.join().is_err() {
            logger.error("worker thread panicked");
        }
    }

    println!("   5 threads logged 20 messages each");

    // Drains the queue before returning
    logger.shutdown(DEFAULT_SHUTDOWN_TIMEOUT)?;

    let metrics = logger.metrics();
    println!(
        "\n   queued: {}, delivered: {}, filtered: {}",
        metrics.queued(),
        metrics.delivered(),
        metrics.filtered()
    );

    println!("\n=== Example completed successfully! ===");
    println!("Check 'async_test.jsonl' for file output");

    Ok(())
}
