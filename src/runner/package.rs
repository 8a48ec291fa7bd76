use std::{
    path::{Path, PathBuf},
    process::Stdio,
};

use regex::Regex;
use tokio::{process::Command, sync::mpsc};
use tokio_util::sync::CancellationToken;

use crate::{logger::LogMessage, models::PackageConfig};

pub const PACKAGE_PHASE: &str = "package";

const BUNDLE_PATTERN: &str = r"(?m)^/[/\w-]+/\w+\.app";
const RESULT_PATTERN: &str = r"Results at '(.*)'";
const ARCHIVE_EXTENSION: &str = "ipa";

#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    #[error("no .app bundle path found in '{0}'")]
    NoBundle(String),
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("packaging tool reported no result location. Output:\n{0}")]
    NoResult(String),
    #[error("packaging cancelled")]
    Cancelled,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Wraps a built `.app` bundle into an `.ipa` with `xcrun PackageApplication`.
pub struct Packager {
    config: PackageConfig,
    cwd: PathBuf,
    bundle: Regex,
    result: Regex,
}

impl Packager {
    pub fn new(config: PackageConfig, cwd: impl Into<PathBuf>) -> anyhow::Result<Self> {
        Ok(Self {
            config,
            cwd: cwd.into(),
            bundle: Regex::new(BUNDLE_PATTERN)?,
            result: Regex::new(RESULT_PATTERN)?,
        })
    }

    /// First absolute `.app` path in `input`.
    pub fn bundle_path<'i>(&self, input: &'i str) -> Option<&'i str> {
        self.bundle.find(input).map(|m| m.as_str())
    }

    /// `<cwd>/<bundle name>.ipa`
    pub fn archive_path(&self, bundle: &Path) -> Option<PathBuf> {
        let name = bundle.file_name()?;
        Some(self.cwd.join(name).with_extension(ARCHIVE_EXTENSION))
    }

    pub fn args(&self, bundle: &Path, archive: &Path) -> Vec<String> {
        vec![
            "--sdk".to_string(),
            self.config.sdk.clone(),
            "PackageApplication".to_string(),
            "-v".to_string(),
            bundle.to_string_lossy().to_string(),
            "-o".to_string(),
            archive.to_string_lossy().to_string(),
        ]
    }

    /// Last `Results at '<path>'` reported by the tool.
    pub fn result_path(&self, output: &str) -> Option<PathBuf> {
        self.result
            .captures_iter(output)
            .last()
            .map(|caps| PathBuf::from(&caps[1]))
    }

    /// Runs the packaging tool on the bundle named in `input`. The tool's
    /// output is forwarded to `log_tx`. Cancelling `token` kills the tool.
    pub async fn run(
        &self,
        input: &str,
        log_tx: &mpsc::Sender<LogMessage>,
        token: &CancellationToken,
    ) -> Result<PathBuf, PackageError> {
        let bundle = self
            .bundle_path(input)
            .map(PathBuf::from)
            .ok_or_else(|| PackageError::NoBundle(input.to_string()))?;
        let archive = self
            .archive_path(&bundle)
            .ok_or_else(|| PackageError::NoBundle(input.to_string()))?;

        println!("📦 PackageApplication at path {}", bundle.display());

        let child = Command::new(&self.config.program)
            .args(self.args(&bundle, &archive))
            .current_dir(&self.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PackageError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        let output = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(PackageError::Cancelled),
            output = child.wait_with_output() => output?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        for (text, is_error) in [(&stdout, false), (&stderr, true)] {
            for line in text.lines() {
                log_tx
                    .send(LogMessage::new(PACKAGE_PHASE, line, is_error))
                    .await
                    .ok();
            }
        }

        let text = stdout + &stderr;
        let result = self
            .result_path(&text)
            .ok_or_else(|| PackageError::NoResult(text.clone()))?;

        println!("📦 Result: {}", result.display());
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::Logger;

    fn packager() -> Packager {
        Packager::new(PackageConfig::default(), "/work").unwrap()
    }

    #[test]
    fn finds_first_bundle_path() {
        let packager = packager();
        assert_eq!(
            packager.bundle_path("/work/build/Release-iphoneos/FNConnect.app"),
            Some("/work/build/Release-iphoneos/FNConnect.app")
        );
        assert_eq!(
            packager.bundle_path("built:\n/a/b/One.app\n/a/b/Two.app\n"),
            Some("/a/b/One.app")
        );
        assert_eq!(packager.bundle_path("relative/App.app"), None);
        assert_eq!(packager.bundle_path("/work/build/App.framework"), None);
    }

    #[test]
    fn archive_takes_bundle_name() {
        let archive = packager()
            .archive_path(Path::new("/work/build/Release-iphoneos/MyApp.app"))
            .unwrap();
        assert_eq!(archive, PathBuf::from("/work/MyApp.ipa"));
    }

    #[test]
    fn archive_keeps_app_inside_name() {
        let archive = packager()
            .archive_path(Path::new("/work/build/happapp.app"))
            .unwrap();
        assert_eq!(archive, PathBuf::from("/work/happapp.ipa"));
    }

    #[test]
    fn builds_xcrun_arguments() {
        let packager = packager();
        let args = packager.args(Path::new("/b/App.app"), Path::new("/work/App.ipa"));
        assert_eq!(
            args,
            vec![
                "--sdk",
                "iphoneos",
                "PackageApplication",
                "-v",
                "/b/App.app",
                "-o",
                "/work/App.ipa",
            ]
        );
    }

    #[test]
    fn reads_last_result_location() {
        let output = "\
Packaging application: '/b/App.app'
Results at '/tmp/first.ipa'
Results at '/work/App.ipa'
";
        assert_eq!(
            packager().result_path(output),
            Some(PathBuf::from("/work/App.ipa"))
        );
        assert_eq!(packager().result_path("nothing here"), None);
    }

    async fn run(
        packager: &Packager,
        input: &str,
    ) -> (Result<PathBuf, PackageError>, Vec<String>) {
        let logger = Logger::new(16, false);
        let result = packager
            .run(input, &logger.tx(), &CancellationToken::new())
            .await;
        (result, logger.finish().await.unwrap())
    }

    #[tokio::test]
    async fn rejects_input_without_bundle() {
        let (result, _) = run(&packager(), "no bundle in here").await;
        assert!(matches!(result, Err(PackageError::NoBundle(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn tool_output_without_result_is_an_error() {
        // `echo` prints its arguments back, which carry no result marker.
        let config = PackageConfig {
            program: "echo".to_string(),
            ..PackageConfig::default()
        };
        let packager = Packager::new(config, "/").unwrap();

        let (result, logs) = run(&packager, "/work/build/App.app").await;
        let output = match result {
            Err(PackageError::NoResult(output)) => output,
            other => panic!("expected a missing result, got {other:?}"),
        };
        assert_eq!(
            output.trim(),
            "--sdk iphoneos PackageApplication -v /work/build/App.app -o /App.ipa"
        );
        assert_eq!(logs.len(), 1);
        assert!(logs[0].contains("[package] [OUT] --sdk iphoneos"));
    }

    #[tokio::test]
    async fn missing_tool_fails_to_spawn() {
        let config = PackageConfig {
            program: "xcroach-no-such-xcrun".to_string(),
            ..PackageConfig::default()
        };
        let packager = Packager::new(config, "/").unwrap();
        let (result, _) = run(&packager, "/work/build/App.app").await;
        assert!(matches!(result, Err(PackageError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancelled_token_stops_packaging() {
        let config = PackageConfig {
            program: "echo".to_string(),
            ..PackageConfig::default()
        };
        let packager = Packager::new(config, "/").unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let logger = Logger::new(16, false);
        let result = packager
            .run("/work/build/App.app", &logger.tx(), &token)
            .await;
        let logs = logger.finish().await.unwrap();

        assert!(matches!(result, Err(PackageError::Cancelled)));
        assert!(logs.is_empty());
    }
}
