//! Interactive prompts and terminal output

use crate::error::{Error, Result};
use crate::proxy::models::{ProbeOutcome, ProxyRecord};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Invalid menu input is retried this many times before giving up.
const MAX_PROMPT_ATTEMPTS: usize = 3;

/// One parsed line of country-menu input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuChoice {
    /// `0`: no country filter
    AnyLocation,
    /// A valid index into the country listing
    Country(String),
    Invalid,
}

/// Parse a menu line against the numbered country listing.
pub fn parse_menu_choice(input: &str, countries: &[String]) -> MenuChoice {
    match input.trim().parse::<usize>() {
        Ok(0) => MenuChoice::AnyLocation,
        Ok(n) if n <= countries.len() => MenuChoice::Country(countries[n - 1].clone()),
        _ => MenuChoice::Invalid,
    }
}

/// Print the numbered country menu, with `0` reserved for any location.
pub fn print_country_menu(countries: &[String]) {
    println!("{}", "Available countries:".bold());
    println!("{:3}. {}", 0, "Any location".cyan());
    for (i, country) in countries.iter().enumerate() {
        println!("{:3}. {}", i + 1, country);
    }
}

/// Ask for a country until the answer parses, bounded by
/// [`MAX_PROMPT_ATTEMPTS`]. `Ok(None)` means any location.
pub async fn prompt_country(countries: &[String]) -> Result<Option<String>> {
    print_country_menu(countries);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    for _ in 0..MAX_PROMPT_ATTEMPTS {
        print!("Select a country by number (0 for any location): ");
        let _ = std::io::stdout().flush();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match parse_menu_choice(&line, countries) {
            MenuChoice::AnyLocation => return Ok(None),
            MenuChoice::Country(country) => return Ok(Some(country)),
            MenuChoice::Invalid => print_warning("Invalid selection, try again"),
        }
    }

    Err(Error::InvalidInput(format!(
        "no valid country selection after {} attempts",
        MAX_PROMPT_ATTEMPTS
    )))
}

/// Ask whether to continue with fewer working proxies than wanted.
/// Anything but an explicit yes declines.
pub async fn confirm_degraded(found: usize, wanted: usize) -> Result<bool> {
    print!(
        "Only {} working proxies found (wanted {}). Continue anyway? [y/N]: ",
        found, wanted
    );
    let _ = std::io::stdout().flush();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

/// Progress bar for one probe round.
pub fn round_progress(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .expect("Invalid progress template")
            .progress_chars("#>-"),
    );
    pb
}

/// Print the final proxy selection as a numbered listing.
pub fn print_selection(records: &[ProxyRecord]) {
    for (i, record) in records.iter().enumerate() {
        println!(
            "{:3}. {} ({})",
            i + 1,
            record.endpoint_url().cyan(),
            record.country.yellow()
        );
    }
}

/// Print probe passes as a numbered listing with round-trip time and
/// check time.
pub fn print_probe_report(outcomes: &[ProbeOutcome]) {
    for (i, outcome) in outcomes.iter().enumerate() {
        let latency = outcome
            .elapsed
            .map(|d| format!("{:.0} ms", d.as_secs_f64() * 1000.0))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:3}. {} ({}) {} at {}",
            i + 1,
            outcome.record.endpoint_url().cyan(),
            outcome.record.country.yellow(),
            latency.green(),
            outcome.checked_at.format("%H:%M:%S")
        );
    }
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Print an error message
pub fn print_error(msg: &str) {
    println!("{} {}", "✗".red().bold(), msg);
}

/// Print a warning message
pub fn print_warning(msg: &str) {
    println!("{} {}", "!".yellow().bold(), msg);
}

/// Print an informational message
pub fn print_info(msg: &str) {
    println!("{} {}", "i".blue().bold(), msg);
}
