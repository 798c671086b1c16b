//! File logging example
//!
//! Demonstrates two domains writing to separate rotating files, one in text
//! format and one in JSON.
//!
//! Run with: cargo run --example file_logging

use domain_logger::prelude::*;

fn main() -> Result<()> {
    println!("=== Domain Logger - File Logging Example ===\n");

    let manager = DomainManager::new();

    manager.configure(
        "app",
        Settings::default()
            .with_file("logs", "application.log")
            .with_max_bytes(64 * 1024)
            .with_backup_count(3),
    )?;
    manager.configure(
        "audit",
        Settings::default()
            .with_json(true)
            .with_file("logs", "audit.jsonl"),
    )?;

    let app = manager.get_logger("app", None)?;
    let audit = manager.get_logger("audit", None)?;

    println!("1. Logging to console and files:");
    app.info("Application started");
    app.info("Configuration loaded successfully");
    app.warning("Using default settings for some options");
    app.error("Failed to load optional plugin");

    audit.log_with_context(
        LogLevel::Info,
        "user login",
        LogContext::new()
            .with_field("user_id", 12345)
            .with_field("ip", "192.168.1.1"),
    );

    println!("\n2. Performing some operations:");
    for i in 1..=5 {
        app.info(format!("Processing item {}/5", i));
        if i == 3 {
            app.warning("Item 3 took longer than expected");
        }
    }

    // Drains both queues and closes the files
    for report in manager.shutdown_all() {
        println!("   {} -> {}", report.domain, report.status);
    }

    println!("\n=== Example completed successfully! ===");
    println!("Check 'logs/application.log' and 'logs/audit.jsonl' for the output");

    Ok(())
}
