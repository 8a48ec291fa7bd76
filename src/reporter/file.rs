use std::path::{Path, PathBuf};

use chrono::Local;
use tokio::{
    fs::{File, create_dir_all},
    io::AsyncWriteExt,
};

use crate::{
    models::{PipelineReport, Verdict},
    runner::PipelineError,
};

pub struct FileReporter;

impl FileReporter {
    /// Writes the report and the full tool log to
    /// `<dir>/build_<timestamp>.log`.
    pub async fn save(report: &PipelineReport, dir: &Path) -> anyhow::Result<PathBuf> {
        Self::write(&Self::render(report), dir).await
    }

    /// Same as [`FileReporter::save`] for a build that never reached a verdict.
    pub async fn save_aborted(aborted: &PipelineError, dir: &Path) -> anyhow::Result<PathBuf> {
        Self::write(&Self::render_aborted(aborted), dir).await
    }

    async fn write(text: &str, dir: &Path) -> anyhow::Result<PathBuf> {
        create_dir_all(dir).await?;
        let path = dir.join(format!(
            "build_{}.log",
            Local::now().format("%Y-%m-%d_%H-%M-%S")
        ));

        let mut file = File::create(&path).await?;
        file.write_all(text.as_bytes()).await?;
        file.flush().await?;

        Ok(path)
    }

    pub fn render_aborted(aborted: &PipelineError) -> String {
        let mut buffer = String::new();

        buffer.push_str("--- Build Report ---\n\n");
        buffer.push_str(&format!(
            "Result: aborted ({}) | Duration {}s\n",
            aborted.error, aborted.elapsed
        ));
        push_log(&mut buffer, &aborted.logs);

        buffer
    }

    pub fn render(report: &PipelineReport) -> String {
        let parse = &report.outcome.parse;
        let mut buffer = String::new();

        buffer.push_str("--- Build Report ---\n\n");
        buffer.push_str(&format!(
            "Steps: {} | Exit status {} | Duration {}s\n",
            parse.steps.len(),
            report.outcome.status,
            report.elapsed,
        ));

        match &parse.verdict {
            Verdict::Success { artifact } => {
                buffer.push_str(&format!(
                    "Result: success\nArtifact: {}\n",
                    artifact.display()
                ));
                if let Some(archive) = &report.archive {
                    buffer.push_str(&format!("Archive: {}\n", archive.display()));
                }
                if let Some(err) = &report.package_error {
                    buffer.push_str(&format!("Packaging failed: {err}\n"));
                }
            }
            Verdict::Failure { errors } => {
                buffer.push_str(&format!("Result: failed ({} steps)\n", errors.len()));
                for step in errors {
                    buffer.push_str(&format!(
                        "\nAction type: {} {}\n",
                        step.kind, step.argument
                    ));
                    buffer.push_str(step.error_log.as_deref().unwrap_or_default());
                }
            }
        }

        if let Some(tail) = &parse.dropped_tail {
            buffer.push_str("\nDiscarded unterminated step:\n");
            buffer.push_str(tail);
        }

        push_log(&mut buffer, &report.logs);

        buffer
    }
}

fn push_log(buffer: &mut String, logs: &[String]) {
    buffer.push_str("\n--- Build Log ---\n");
    for line in logs {
        buffer.push_str(line);
        buffer.push('\n');
    }
}
