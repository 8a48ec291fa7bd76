use std::{path::Path, time::Duration};

use serde::Deserialize;
use tokio::fs::read_to_string;

use crate::models::{
    BuildConfig, BuildConfigBuilder, PackageConfig, ParserRules, Settings, TrailingStep,
};

pub const DEFAULT_CONFIG_FILE: &str = "xcroach.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    #[serde(default)]
    pub build: RawBuild,
    #[serde(default)]
    pub parser: RawParser,
    #[serde(default)]
    pub package: RawPackage,
}

impl RawConfig {
    /// Reads the config file. With no explicit path, a missing
    /// `xcroach.toml` in `cwd` means all defaults.
    pub async fn load(path: Option<&Path>, cwd: &Path) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let fallback = cwd.join(DEFAULT_CONFIG_FILE);
                if !fallback.is_file() {
                    println!("⚠️ No {DEFAULT_CONFIG_FILE} found. Using defaults.");
                    return Ok(Self::default());
                }
                fallback
            }
        };

        let content = read_to_string(&path)
            .await
            .map_err(|err| anyhow::anyhow!("Failed to read '{}': {err}", path.display()))?;
        Ok(toml::from_str(&content)?)
    }

    pub fn compile(self) -> anyhow::Result<Settings> {
        Ok(Settings {
            clean: self.build.clean.unwrap_or(false),
            build: self.build.compile()?,
            parser: self.parser.compile()?,
            package: self.package.compile(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawBuild {
    pub program: Option<String>,
    pub workspace: Option<String>,
    pub scheme: Option<String>,
    pub configuration: Option<String>,
    pub action: Option<String>,
    pub obj_root: Option<String>,
    pub sym_root: Option<String>,
    pub clean: Option<bool>,
    pub timeout: Option<String>,
}

impl RawBuild {
    fn compile(&self) -> anyhow::Result<BuildConfigBuilder> {
        let mut builder = BuildConfig::builder();

        if let Some(program) = &self.program {
            builder = builder.program(program);
        }
        if let Some(workspace) = &self.workspace {
            builder = builder.workspace(workspace);
        }
        if let Some(scheme) = &self.scheme {
            builder = builder.scheme(scheme);
        }
        if let Some(configuration) = &self.configuration {
            builder = builder.configuration(configuration);
        }
        if let Some(action) = &self.action {
            builder = builder.action(action);
        }
        if let Some(obj_root) = &self.obj_root {
            builder = builder.obj_root(obj_root);
        }
        if let Some(sym_root) = &self.sym_root {
            builder = builder.sym_root(sym_root);
        }
        if let Some(timeout) = self.timeout_limit()? {
            builder = builder.timeout(timeout);
        }

        Ok(builder)
    }

    pub fn timeout_limit(&self) -> anyhow::Result<Option<Duration>> {
        let raw = match &self.timeout {
            Some(raw) => raw.trim().to_lowercase(),
            None => return Ok(None),
        };

        let (digits, multiplier) = if let Some(digits) = raw.strip_suffix('h') {
            (digits, 60 * 60)
        } else if let Some(digits) = raw.strip_suffix('m') {
            (digits, 60)
        } else if let Some(digits) = raw.strip_suffix('s') {
            (digits, 1)
        } else {
            (raw.as_str(), 1)
        };

        let value = digits.trim().parse::<u64>().map_err(|_| {
            anyhow::anyhow!("Invalid timeout format: '{}'. Use '90s', '30m' or '1h'", raw)
        })?;

        if value == 0 {
            anyhow::bail!("Timeout must be greater than zero");
        }

        let secs = value
            .checked_mul(multiplier)
            .ok_or_else(|| anyhow::anyhow!("Timeout '{}' is too large", raw))?;

        Ok(Some(Duration::from_secs(secs)))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawParser {
    pub error_marker: Option<String>,
    pub suppressed: Option<Vec<String>>,
    pub terminal: Option<String>,
    pub trailing: Option<RawTrailing>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RawTrailing {
    Drop,
    Flush,
}

impl RawParser {
    fn compile(self) -> anyhow::Result<ParserRules> {
        let defaults = ParserRules::default();

        let error_marker = self.error_marker.unwrap_or(defaults.error_marker);
        if error_marker.is_empty() {
            anyhow::bail!("parser.error_marker must not be empty");
        }

        let terminal = self.terminal.unwrap_or(defaults.terminal);
        if terminal.trim().is_empty() {
            anyhow::bail!("parser.terminal must name a step type");
        }

        let trailing = match self.trailing {
            Some(RawTrailing::Drop) | None => TrailingStep::Drop,
            Some(RawTrailing::Flush) => TrailingStep::Flush,
        };

        Ok(ParserRules {
            error_marker,
            suppressed: self.suppressed.unwrap_or(defaults.suppressed),
            terminal,
            trailing,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawPackage {
    pub enabled: Option<bool>,
    pub program: Option<String>,
    pub sdk: Option<String>,
}

impl RawPackage {
    fn compile(self) -> PackageConfig {
        let defaults = PackageConfig::default();
        PackageConfig {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            program: self.program.unwrap_or(defaults.program),
            sdk: self.sdk.unwrap_or(defaults.sdk),
        }
    }
}
