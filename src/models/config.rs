use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

pub const DEFAULT_BUILD_PROGRAM: &str = "xcodebuild";
pub const DEFAULT_PACKAGE_PROGRAM: &str = "xcrun";
pub const DEFAULT_SDK: &str = "iphoneos";

/// Runs before the build tool is spawned. An error aborts the build.
pub type BeforeHook = Arc<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// Runs after a successful verdict with the resolved artifact path.
pub type AfterHook = Arc<dyn Fn(&Path) -> anyhow::Result<()> + Send + Sync>;

/// Everything loaded from the config file, compiled into typed values.
#[derive(Debug)]
pub struct Settings {
    pub build: BuildConfigBuilder,
    pub clean: bool,
    pub parser: ParserRules,
    pub package: PackageConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            build: BuildConfig::builder(),
            clean: false,
            parser: ParserRules::default(),
            package: PackageConfig::default(),
        }
    }
}

/// What happens to a non-empty buffer when the stream ends without a
/// closing blank line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrailingStep {
    /// Discard it. xcodebuild always ends its last step with a blank line, so
    /// a dangling buffer is usually a truncated log.
    #[default]
    Drop,
    /// Parse it as a final step.
    Flush,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserRules {
    pub error_marker: String,
    pub suppressed: Vec<String>,
    pub terminal: String,
    pub trailing: TrailingStep,
}

impl Default for ParserRules {
    fn default() -> Self {
        Self {
            error_marker: "error:".to_string(),
            suppressed: vec!["CopyPNGFile".to_string(), "While".to_string()],
            terminal: "CodeSign".to_string(),
            trailing: TrailingStep::default(),
        }
    }
}

impl ParserRules {
    pub fn is_suppressed(&self, kind: &str) -> bool {
        self.suppressed.iter().any(|s| s == kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageConfig {
    pub enabled: bool,
    pub program: String,
    pub sdk: String,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: DEFAULT_PACKAGE_PROGRAM.to_string(),
            sdk: DEFAULT_SDK.to_string(),
        }
    }
}

/// Immutable description of one build tool invocation.
///
/// Every option that is set turns into exactly one argument group on the
/// command line; unset options produce nothing.
#[derive(Clone)]
pub struct BuildConfig {
    pub program: String,
    pub workspace: Option<String>,
    pub scheme: Option<String>,
    pub configuration: Option<String>,
    pub action: Option<String>,
    pub obj_root: Option<String>,
    pub sym_root: Option<String>,
    pub timeout: Option<Duration>,
    before: Option<BeforeHook>,
    after: Option<AfterHook>,
}

impl BuildConfig {
    pub fn builder() -> BuildConfigBuilder {
        BuildConfigBuilder::default()
    }

    /// Arguments passed to the build program. Output directories are resolved
    /// against `cwd`.
    pub fn args(&self, cwd: &Path) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(workspace) = &self.workspace {
            args.push("-workspace".to_string());
            args.push(format!("{workspace}.xcworkspace"));
        }
        if let Some(scheme) = &self.scheme {
            args.push("-scheme".to_string());
            args.push(scheme.clone());
        }
        if let Some(configuration) = &self.configuration {
            args.push("-configuration".to_string());
            args.push(configuration.clone());
        }
        if let Some(action) = &self.action {
            args.push(action.clone());
        }
        if let Some(obj_root) = &self.obj_root {
            args.push(format!("OBJROOT={}", cwd.join(obj_root).display()));
        }
        if let Some(sym_root) = &self.sym_root {
            args.push(format!("SYMROOT={}", cwd.join(sym_root).display()));
        }

        args
    }

    /// Output directories owned by this build, relative to the working dir.
    pub fn output_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = [&self.obj_root, &self.sym_root]
            .into_iter()
            .flatten()
            .map(PathBuf::from)
            .collect();
        dirs.dedup();
        dirs
    }

    pub fn before(&self) -> Option<&BeforeHook> {
        self.before.as_ref()
    }

    pub fn after(&self) -> Option<&AfterHook> {
        self.after.as_ref()
    }
}

impl fmt::Debug for BuildConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildConfig")
            .field("program", &self.program)
            .field("workspace", &self.workspace)
            .field("scheme", &self.scheme)
            .field("configuration", &self.configuration)
            .field("action", &self.action)
            .field("obj_root", &self.obj_root)
            .field("sym_root", &self.sym_root)
            .field("timeout", &self.timeout)
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct BuildConfigBuilder {
    config: BuildConfig,
}

impl Default for BuildConfigBuilder {
    fn default() -> Self {
        Self {
            config: BuildConfig {
                program: DEFAULT_BUILD_PROGRAM.to_string(),
                workspace: None,
                scheme: None,
                configuration: None,
                action: None,
                obj_root: None,
                sym_root: None,
                timeout: None,
                before: None,
                after: None,
            },
        }
    }
}

impl BuildConfigBuilder {
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.config.program = program.into();
        self
    }

    pub fn workspace(mut self, workspace: impl Into<String>) -> Self {
        self.config.workspace = Some(workspace.into());
        self
    }

    pub fn scheme(mut self, scheme: impl Into<String>) -> Self {
        self.config.scheme = Some(scheme.into());
        self
    }

    pub fn configuration(mut self, configuration: impl Into<String>) -> Self {
        self.config.configuration = Some(configuration.into());
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.config.action = Some(action.into());
        self
    }

    pub fn obj_root(mut self, obj_root: impl Into<String>) -> Self {
        self.config.obj_root = Some(obj_root.into());
        self
    }

    pub fn sym_root(mut self, sym_root: impl Into<String>) -> Self {
        self.config.sym_root = Some(sym_root.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    pub fn before(mut self, hook: impl Fn() -> anyhow::Result<()> + Send + Sync + 'static) -> Self {
        self.config.before = Some(Arc::new(hook));
        self
    }

    pub fn after(
        mut self,
        hook: impl Fn(&Path) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.config.after = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> BuildConfig {
        self.config
    }
}
