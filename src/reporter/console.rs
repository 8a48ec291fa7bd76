use colored::Colorize;

use crate::models::{ParseOutcome, PipelineReport, Verdict};

pub struct ConsoleReporter;

impl ConsoleReporter {
    pub fn report(report: &PipelineReport) {
        Self::report_outcome(&report.outcome.parse);

        if let Some(archive) = &report.archive {
            println!("📦 Archive: {}", archive.display());
        }
        if let Some(err) = &report.package_error {
            println!("{} {err}", "❌ Packaging failed:".red().bold());
        }
        println!("⏱️ Finished in {}s", report.elapsed);
    }

    pub fn report_outcome(outcome: &ParseOutcome) {
        println!("\n--- 🪳 Build Summary ---");
        println!("Parsed {} steps", outcome.steps.len());

        match &outcome.verdict {
            Verdict::Success { artifact } => {
                println!("{} {}", "✅ Done!".green().bold(), artifact.display());
            }
            Verdict::Failure { errors } => {
                println!("{}", "❌ Errors:".red().bold());
                for step in errors {
                    println!("\nAction type: {}", step.kind.bold());
                    println!("Log:\n {}", step.error_log.as_deref().unwrap_or_default());
                }
            }
        }
    }
}
