use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use tokio_util::sync::CancellationToken;

use crate::{
    logger::Logger,
    models::{BuildConfig, PipelineReport, RawConfig, Settings},
    runner::{BuildError, BuildRunner, Packager},
};

/// A build that stopped before it produced a verdict. Carries whatever the
/// tool printed up to that point so it can still be saved.
#[derive(Debug, thiserror::Error)]
#[error("build aborted")]
pub struct PipelineError {
    #[source]
    pub error: BuildError,
    pub logs: Vec<String>,
    pub elapsed: u64,
}

/// Build, parse, then package on success.
pub struct PipelineRunner {
    settings: Settings,
    cwd: PathBuf,
    echo: bool,
    progress: bool,
}

impl PipelineRunner {
    pub async fn new(config_path: Option<&Path>, cwd: PathBuf) -> anyhow::Result<Self> {
        let raw = RawConfig::load(config_path, &cwd).await?;
        Ok(Self::from_settings(raw.compile()?, cwd))
    }

    pub fn from_settings(settings: Settings, cwd: PathBuf) -> Self {
        Self {
            settings,
            cwd,
            echo: false,
            progress: true,
        }
    }

    /// Echo every line of tool output instead of only the step spinner.
    pub fn verbose(mut self, echo: bool) -> Self {
        self.echo = echo;
        self.progress = !echo;
        self
    }

    pub fn without_package(mut self) -> Self {
        self.settings.package.enabled = false;
        self
    }

    /// Runs the build and, on a clean log, the packaging tool.
    ///
    /// A packaging failure is kept in the report next to the build verdict.
    /// A build that never reaches a verdict fails with [`PipelineError`].
    pub async fn run(self, token: CancellationToken) -> anyhow::Result<PipelineReport> {
        let timer = Instant::now();
        let config = self.build_config();
        let packager = if self.settings.package.enabled {
            Some(Packager::new(self.settings.package.clone(), &self.cwd)?)
        } else {
            None
        };
        let logger = Logger::new(100, self.echo);

        println!("🚀 Starting build in {}", self.cwd.display());

        let built = BuildRunner::new(&config, self.settings.parser.clone(), &self.cwd)
            .with_progress(self.progress)
            .run(logger.tx(), token.clone())
            .await;

        let outcome = match built {
            Ok(outcome) => outcome,
            Err(error) => {
                let logs = logger.finish().await?;
                return Err(PipelineError {
                    error,
                    logs,
                    elapsed: timer.elapsed().as_secs(),
                }
                .into());
            }
        };

        let mut archive = None;
        let mut package_error = None;
        if let (Some(packager), Some(artifact)) = (&packager, outcome.parse.verdict.artifact()) {
            match packager
                .run(&artifact.to_string_lossy(), &logger.tx(), &token)
                .await
            {
                Ok(path) => archive = Some(path),
                Err(err) => {
                    println!("❌ Packaging failed: {err}");
                    package_error = Some(err);
                }
            }
        }

        let logs = logger.finish().await?;

        Ok(PipelineReport {
            outcome,
            archive,
            package_error,
            elapsed: timer.elapsed().as_secs(),
            logs,
        })
    }

    fn build_config(&self) -> BuildConfig {
        let mut builder = self.settings.build.clone();

        if self.settings.clean {
            let cwd = self.cwd.clone();
            let dirs = builder.clone().build().output_dirs();
            builder = builder.before(move || clean_dirs(&cwd, &dirs));
        }

        builder.build()
    }
}

// Runs as a before hook, on the blocking pool.
fn clean_dirs(cwd: &Path, dirs: &[PathBuf]) -> anyhow::Result<()> {
    for dir in dirs {
        let path = cwd.join(dir);
        if !path.exists() {
            continue;
        }
        fs::remove_dir_all(&path)
            .map_err(|err| anyhow::anyhow!("Failed to remove '{}': {err}", path.display()))?;
        println!("🧹 Removed {}", path.display());
    }
    Ok(())
}
