// SPDX-FileCopyrightText: 2025 Joost van der Laan <joost@fashionunited.com>
//
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::{Context, Result};
use chrono::Local;
use csv::Writer;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::models::Ticker;
use crate::suite::ScenarioResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
}

impl Summary {
    pub fn of(results: &[ScenarioResult]) -> Self {
        let passed = results.iter().filter(|r| r.passed()).count();
        Self {
            passed,
            failed: results.len() - passed,
        }
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Prints one line per scenario followed by the totals.
pub fn print_summary(results: &[ScenarioResult]) -> Summary {
    let mut current_group = None;
    for result in results {
        let group = result.scenario.group();
        if current_group != Some(group) {
            println!("\n{}", group);
            current_group = Some(group);
        }
        let marker = if result.passed() { "✅" } else { "❌" };
        println!(
            "  {} {} ({}ms)",
            marker,
            result.scenario.description(),
            result.elapsed.as_millis()
        );
        if !result.passed() {
            println!("     {}", result.detail());
        }
    }

    let summary = Summary::of(results);
    println!(
        "\n{} passing, {} failing ({} scenarios)",
        summary.passed,
        summary.failed,
        summary.total()
    );
    summary
}

pub fn write_results_csv<W: Write>(results: &[ScenarioResult], out: W) -> Result<()> {
    let mut writer = Writer::from_writer(out);
    writer.write_record(["Scenario", "Group", "Status", "Elapsed (ms)", "Detail"])?;

    for result in results {
        writer.write_record([
            result.scenario.name(),
            result.scenario.group().to_string().as_str(),
            if result.passed() { "PASS" } else { "FAIL" },
            result.elapsed.as_millis().to_string().as_str(),
            result.detail().as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Writes `contract_results_<timestamp>.csv` into `output_dir`.
pub fn export_results_csv(results: &[ScenarioResult], output_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let csv_path = output_dir.join(format!("contract_results_{}.csv", timestamp));
    let file = fs::File::create(&csv_path)
        .with_context(|| format!("Failed to create {}", csv_path.display()))?;
    write_results_csv(results, file)?;

    println!("✅ Results written to {}", csv_path.display());
    Ok(csv_path)
}

pub fn print_ticker(ticker: &Ticker) {
    println!("{:<6} {:>16} {:>16} {:>16}", "Code", "Buy", "Sell", "Last");
    for (code, rate) in ticker.iter() {
        let fmt = |v: Option<f64>| v.map(|v| format!("{:.2}", v)).unwrap_or_default();
        println!(
            "{:<6} {:>16} {:>16.2} {:>16}",
            code,
            fmt(rate.buy),
            rate.sell,
            fmt(rate.last)
        );
    }
}
