//! Basic domain logger usage example
//!
//! Demonstrates configuring a domain, level filtering, child loggers and
//! bound context fields.
//!
//! Run with: cargo run --example basic_usage

use domain_logger::info;
use domain_logger::prelude::*;

fn main() -> Result<()> {
    println!("=== Domain Logger - Basic Usage Example ===\n");

    let manager = DomainManager::new();

    // Synchronous delivery keeps console output interleaved with println!
    manager.configure(
        "app",
        Settings::default()
            .with_level(LogLevel::Debug)
            .with_use_async(false),
    )?;
    let logger = manager.get_logger("app", None)?;

    println!("1. Logging at different levels:");
    logger.debug("This is a debug message");
    logger.info("This is an info message");
    logger.warning("This is a warning message");
    logger.error("This is an error message");
    logger.critical("This is a critical message");

    println!("\n2. Raising the domain level to WARNING:");
    manager.configure(
        "app",
        Settings::default()
            .with_level(LogLevel::Warning)
            .with_use_async(false),
    )?;
    logger.info("Info message (hidden)");
    logger.warning("Warning message (visible)");

    println!("\n3. Child loggers and bound fields:");
    let http = logger.child("http").bind("request_id", "r-1001");
    http.warning("slow upstream");
    info!(http, "hidden at WARNING: {}", 42);

    let report = manager.shutdown("app");
    println!("\nShutdown: {} (clean: {})", report.status, report.is_clean());

    println!("\n=== Example completed successfully! ===");

    Ok(())
}
