pub mod step;

pub use step::*;

use std::path::Path;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::models::{ParseOutcome, ParserRules, StepRecord, TrailingStep, Verdict};

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("cannot read a step type from a step starting with {:?}", preview(.text))]
    Step { text: String },
    #[error("build finished without errors but no '{terminal}' step names the artifact")]
    MissingTerminalStep { terminal: String },
    #[error("failed to read build output: {0}")]
    Io(#[from] std::io::Error),
}

fn preview(text: &str) -> String {
    text.chars().take(60).collect()
}

/// Splits a build log into steps, one line at a time.
///
/// A line that is exactly `"\n"` closes the current step if anything but
/// whitespace has been buffered. Every other line, including a blank line
/// seen while the buffer is still empty, is buffered as is.
#[derive(Debug)]
pub struct LogParser {
    rules: ParserRules,
    buffer: String,
    steps: Vec<StepRecord>,
}

impl LogParser {
    pub fn new(rules: ParserRules) -> Self {
        Self {
            rules,
            buffer: String::new(),
            steps: Vec::new(),
        }
    }

    /// Feeds one line, terminator included. Returns the step it closed, if any.
    pub fn push_line(&mut self, line: &str) -> Result<Option<&StepRecord>, ParseError> {
        if line == "\n" && !self.buffer.trim().is_empty() {
            let record = parse_step(self.buffer.trim_start(), &self.rules)?;
            self.buffer.clear();
            self.steps.push(record);
            return Ok(self.steps.last());
        }

        self.buffer.push_str(line);
        Ok(None)
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Ends the stream and computes the verdict. Artifact paths are resolved
    /// against `cwd`.
    pub fn finish(self, cwd: &Path) -> Result<ParseOutcome, ParseError> {
        let Self {
            rules,
            buffer,
            mut steps,
        } = self;

        let mut dropped_tail = None;
        if !buffer.trim().is_empty() {
            match rules.trailing {
                TrailingStep::Flush => steps.push(parse_step(buffer.trim_start(), &rules)?),
                TrailingStep::Drop => dropped_tail = Some(buffer),
            }
        }

        let verdict = judge(&steps, &rules, cwd)?;

        Ok(ParseOutcome {
            steps,
            verdict,
            dropped_tail,
        })
    }
}

/// Decides the build result from the parsed steps.
///
/// Steps with an error log fail the build unless their type is suppressed.
/// Without failures, the last terminal step's argument is the artifact.
pub fn judge(
    steps: &[StepRecord],
    rules: &ParserRules,
    cwd: &Path,
) -> Result<Verdict, ParseError> {
    let errors: Vec<StepRecord> = steps
        .iter()
        .filter(|step| step.has_error() && !rules.is_suppressed(&step.kind))
        .cloned()
        .collect();

    if !errors.is_empty() {
        return Ok(Verdict::Failure { errors });
    }

    let terminal = steps
        .iter()
        .rev()
        .find(|step| step.kind == rules.terminal)
        .ok_or_else(|| ParseError::MissingTerminalStep {
            terminal: rules.terminal.clone(),
        })?;

    Ok(Verdict::Success {
        artifact: cwd.join(&terminal.argument),
    })
}

/// Reads a whole log from `reader` and parses it.
pub async fn parse_stream<R>(
    reader: R,
    rules: ParserRules,
    cwd: &Path,
) -> Result<ParseOutcome, ParseError>
where
    R: AsyncBufRead + Unpin,
{
    let mut reader = reader;
    let mut parser = LogParser::new(rules);
    let mut bytes = Vec::new();

    loop {
        bytes.clear();
        if reader.read_until(b'\n', &mut bytes).await? == 0 {
            break;
        }
        parser.push_line(&String::from_utf8_lossy(&bytes))?;
    }

    parser.finish(cwd)
}
