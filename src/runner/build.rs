use std::{
    path::PathBuf,
    process::Stdio,
    time::Duration,
};

use colored::Colorize;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
    sync::mpsc,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    logger::LogMessage,
    models::{BuildConfig, BuildOutcome, ParserRules, Verdict},
    parser::{LogParser, ParseError},
    ui::StepProgress,
};

pub const BUILD_PHASE: &str = "build";

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("before-build hook failed: {0:#}")]
    BeforeHook(anyhow::Error),
    #[error("after-build hook failed: {0:#}")]
    AfterHook(anyhow::Error),
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("'{0}' did not expose its output streams")]
    NoOutput(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("build output reader failed: {0}")]
    Reader(String),
    #[error("build timed out after {0:?}")]
    TimedOut(Duration),
    #[error("build cancelled")]
    Cancelled,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Runs the build tool and parses its output as it arrives.
pub struct BuildRunner<'c> {
    config: &'c BuildConfig,
    rules: ParserRules,
    cwd: PathBuf,
    progress: bool,
}

impl<'c> BuildRunner<'c> {
    pub fn new(config: &'c BuildConfig, rules: ParserRules, cwd: impl Into<PathBuf>) -> Self {
        Self {
            config,
            rules,
            cwd: cwd.into(),
            progress: true,
        }
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub async fn run(
        &self,
        log_tx: mpsc::Sender<LogMessage>,
        token: CancellationToken,
    ) -> Result<BuildOutcome, BuildError> {
        if let Some(hook) = self.config.before().cloned() {
            run_hook(move || hook())
                .await
                .map_err(BuildError::BeforeHook)?;
        }

        let args = self.config.args(&self.cwd);
        println!(
            "🔨 Running: {} {}",
            self.config.program.bold(),
            args.join(" ")
        );

        let mut child = Command::new(&self.config.program)
            .args(&args)
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| BuildError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BuildError::NoOutput(self.config.program.clone()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BuildError::NoOutput(self.config.program.clone()))?;

        let (line_tx, mut line_rx) = mpsc::channel::<LogMessage>(256);
        let readers = [
            forward(stdout, false, line_tx.clone()),
            forward(stderr, true, line_tx),
        ];

        let progress = StepProgress::new(self.progress);
        let mut parser = LogParser::new(self.rules.clone());

        let consume = async {
            while let Some(message) = line_rx.recv().await {
                if let Some(step) = parser.push_line(&message.line)? {
                    let failed = step.has_error() && !self.rules.is_suppressed(&step.kind);
                    progress.step(&step.kind, failed);
                }
                log_tx.send(message).await.ok();
            }
            Ok::<_, BuildError>(())
        };

        let deadline = async {
            match self.config.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        let consumed = tokio::select! {
            res = consume => res,
            _ = token.cancelled() => Err(BuildError::Cancelled),
            _ = deadline => Err(BuildError::TimedOut(self.config.timeout.unwrap_or_default())),
        };

        if let Err(err) = consumed {
            child.kill().await.ok();
            progress.fail(&err.to_string());
            return Err(err);
        }

        let status = child.wait().await?;
        for reader in readers {
            reader
                .await
                .map_err(|err| BuildError::Reader(err.to_string()))?
                .map_err(|err| BuildError::Reader(err.to_string()))?;
        }

        let parse = match parser.finish(&self.cwd) {
            Ok(parse) => parse,
            Err(err) => {
                progress.fail(&err.to_string());
                return Err(err.into());
            }
        };

        match &parse.verdict {
            Verdict::Success { .. } => progress.succeed(),
            Verdict::Failure { errors } => {
                progress.fail(&format!("{} failing steps", errors.len()))
            }
        }

        if let Some(tail) = &parse.dropped_tail {
            let first = tail.trim_start().lines().next().unwrap_or_default();
            println!("⚠️ Log ended mid-step. Discarded unterminated step: {first}");
        }

        if !status.success() && parse.verdict.is_success() {
            println!(
                "⚠️ {} exited with {status} but its log shows no errors",
                self.config.program
            );
        }

        if let (Verdict::Success { artifact }, Some(hook)) = (&parse.verdict, self.config.after())
        {
            let (hook, artifact) = (hook.clone(), artifact.clone());
            run_hook(move || hook(artifact.as_path()))
                .await
                .map_err(BuildError::AfterHook)?;
        }

        Ok(BuildOutcome { parse, status })
    }
}

/// Hooks are plain blocking closures, so they run off the async workers.
async fn run_hook<F>(hook: F) -> anyhow::Result<()>
where
    F: FnOnce() -> anyhow::Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(hook)
        .await
        .map_err(|err| anyhow::anyhow!("hook task failed: {err}"))?
}

/// Forwards every line of `stream` to `tx`, terminators included.
fn forward<R>(
    stream: R,
    is_error: bool,
    tx: mpsc::Sender<LogMessage>,
) -> JoinHandle<std::io::Result<()>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut bytes = Vec::new();

        loop {
            bytes.clear();
            if reader.read_until(b'\n', &mut bytes).await? == 0 {
                break;
            }

            let line = String::from_utf8_lossy(&bytes).to_string();
            if tx.send(LogMessage::new(BUILD_PHASE, line, is_error)).await.is_err() {
                break;
            }
        }

        Ok(())
    })
}
