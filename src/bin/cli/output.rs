use clap::ValueEnum;
use serde::Serialize;
use serde_json::Value;
use tarot_api::models::{Card, Reading};
use tarot_api::sync::CacheReport;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

/// Bundled output configuration passed to all print functions
#[derive(Debug, Clone, Copy)]
pub struct OutputConfig {
    /// The output format
    pub format: OutputFormat,
    /// When true, print minimal output (just IDs or counts)
    pub quiet: bool,
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to render JSON: {}", e),
    }
}

fn orientation(is_reversed: bool) -> &'static str {
    if is_reversed { "reversed" } else { "upright" }
}

/// Prints the health check response
pub fn print_health(body: &Value, config: &OutputConfig) {
    match config.format {
        OutputFormat::Human => {
            let status = body["status"].as_str().unwrap_or("unknown");
            if config.quiet {
                println!("{}", status);
            } else {
                println!("Server status: {}", status);
            }
        }
        OutputFormat::Json => print_json(body),
    }
}

/// Prints a list of cards in the specified format
pub fn print_cards(cards: &[Card], config: &OutputConfig) {
    match config.format {
        OutputFormat::Human => {
            if cards.is_empty() {
                if !config.quiet {
                    println!("No cards found.");
                }
                return;
            }
            if config.quiet {
                println!("{}", cards.len());
                return;
            }
            let max_name = cards.iter().map(|c| c.get_name().len()).max().unwrap_or(4);
            println!("{:>3}  {:<name_w$}  ARCANA", "ID", "NAME", name_w = max_name);
            for card in cards {
                println!(
                    "{:>3}  {:<name_w$}  {}",
                    card.get_id(),
                    card.get_name(),
                    card.get_arcana(),
                    name_w = max_name,
                );
            }
        }
        OutputFormat::Json => print_json(cards),
    }
}

/// Prints a reading in the specified format
pub fn print_reading(reading: &Reading, config: &OutputConfig) {
    match config.format {
        OutputFormat::Human => {
            if config.quiet {
                println!("{}", reading.get_id());
                return;
            }
            println!("ID:       {}", reading.get_id());
            println!("Question: {}", reading.question);
            let order: Vec<&str> = reading.order.iter().map(|g| g.as_str()).collect();
            println!("Order:    {}", order.join(""));
            for item in &reading.items {
                println!(
                    "  {}. {} ({})",
                    item.position,
                    item.card.get_name(),
                    orientation(item.is_reversed)
                );
            }
        }
        OutputFormat::Json => print_json(reading),
    }
}

/// Prints the outcome of an image caching run
pub fn print_report(label: &str, report: &CacheReport, config: &OutputConfig) {
    match config.format {
        OutputFormat::Human => {
            if config.quiet {
                println!("{}", report.downloaded);
            } else {
                println!("{}: {}", label, report);
            }
        }
        OutputFormat::Json => print_json(&serde_json::json!({
            "source": label,
            "downloaded": report.downloaded,
            "skipped": report.skipped,
            "failed": report.failed,
            "out_dir": report.out_dir.display().to_string(),
        })),
    }
}

/// Prints a one-line summary of a dataset operation
pub fn print_dataset_summary(message: &str, count: usize, config: &OutputConfig) {
    match config.format {
        OutputFormat::Human => {
            if config.quiet {
                println!("{}", count);
            } else {
                println!("{}", message);
            }
        }
        OutputFormat::Json => print_json(&serde_json::json!({"message": message, "cards": count})),
    }
}
