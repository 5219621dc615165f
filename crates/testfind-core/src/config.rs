//! Configuration loading and precedence resolution.
//!
//! Settings come from four places, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. `<root>/.testfind/config.toml`
//! 3. Environment variables (`TESTFIND_*`)
//! 4. CLI flags
//!
//! `ResolvedConfig` records where each value came from and produces the
//! explicit `ResolveOptions` handed to the finder chain. Nothing downstream
//! reads the environment or global state.
//!
//! ## Example
//!
//! ```toml
//! [cache]
//! enabled = true
//!
//! [search]
//! exclude_dirs = [".git", ".repo", "out", "*.egg-info"]
//!
//! [fuzzy]
//! max_distance = 2
//! profile = "typo"
//!
//! [selection]
//! config_mode = "all"
//!
//! [build.suite_deps]
//! cts = ["cts-tradefed"]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::fuzzy::FuzzyProfile;
use crate::search::DEFAULT_EXCLUDE_DIRS;

/// Config file location relative to the source root.
pub const CONFIG_FILE: &str = ".testfind/config.toml";

/// Environment variable overriding the cache directory.
pub const ENV_CACHE_DIR: &str = "TESTFIND_CACHE_DIR";
/// Environment variable disabling the cache when set to a truthy value.
pub const ENV_NO_CACHE: &str = "TESTFIND_NO_CACHE";
/// Environment variable selecting `all` or `one` config mode.
pub const ENV_CONFIG_MODE: &str = "TESTFIND_CONFIG_MODE";
/// Environment variable overriding the fuzzy distance.
pub const ENV_FUZZY_DISTANCE: &str = "TESTFIND_FUZZY_DISTANCE";

const DEFAULT_INTEGRATION_DIRS: &[&str] = &[
    "tools/tradefederation/core/res/config",
    "tools/tradefederation/contrib/res/config",
    "vendor/google_tradefederation/core/res/config",
    "vendor/google_tradefederation/contrib/res/config",
];

const DEFAULT_LTP_MODULES: &[&str] = &[
    "vts_ltp_test_arm",
    "vts_ltp_test_arm_64",
    "vts_ltp_test_arm_64_lowmem",
    "vts_ltp_test_arm_64_hwasan",
    "vts_ltp_test_arm_64_lowmem_hwasan",
    "vts_ltp_test_arm_lowmem",
    "vts_ltp_test_x86_64",
    "vts_ltp_test_x86",
];

// ============================================================================
// Errors
// ============================================================================

/// Errors loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// An environment variable or flag carried an unusable value.
    #[error("invalid value for {key}: {value:?} ({message})")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },
}

// ============================================================================
// Config file
// ============================================================================

/// How a module with several test configs is resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigMode {
    /// One descriptor per config.
    #[default]
    All,
    /// Ask for exactly one config.
    One,
}

impl ConfigMode {
    fn parse(key: &str, value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(ConfigMode::All),
            "one" => Ok(ConfigMode::One),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.to_string(),
                message: "expected `all` or `one`".to_string(),
            }),
        }
    }
}

/// `[cache]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub enabled: bool,
    /// Cache directory; relative paths are taken from the source root.
    pub dir: Option<PathBuf>,
}

impl Default for CacheSection {
    fn default() -> Self {
        CacheSection {
            enabled: true,
            dir: None,
        }
    }
}

/// `[search]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    /// Directory names pruned from tree walks; `*suffix` matches by suffix.
    pub exclude_dirs: Vec<String>,
    /// Directories holding integration configs.
    pub integration_dirs: Vec<String>,
    /// Extra suite plan directories, on top of `*-tradefed/res/config`.
    pub suite_plan_dirs: Vec<String>,
}

impl Default for SearchSection {
    fn default() -> Self {
        SearchSection {
            exclude_dirs: DEFAULT_EXCLUDE_DIRS.iter().map(|d| d.to_string()).collect(),
            integration_dirs: DEFAULT_INTEGRATION_DIRS
                .iter()
                .map(|d| d.to_string())
                .collect(),
            suite_plan_dirs: Vec::new(),
        }
    }
}

/// `[fuzzy]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzySection {
    pub max_distance: usize,
    pub profile: FuzzyProfile,
}

impl Default for FuzzySection {
    fn default() -> Self {
        FuzzySection {
            max_distance: 2,
            profile: FuzzyProfile::Typo,
        }
    }
}

/// `[selection]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionSection {
    pub config_mode: ConfigMode,
}

/// `[build]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSection {
    /// Host output dir, relative to the root.
    pub host_out_dir: String,
    /// Extra build targets per compatibility suite.
    pub suite_deps: BTreeMap<String, Vec<String>>,
    /// Modules that need the LTP kernel test bundle.
    pub ltp_modules: Vec<String>,
}

impl Default for BuildSection {
    fn default() -> Self {
        BuildSection {
            host_out_dir: "out/host/linux-x86".to_string(),
            suite_deps: BTreeMap::new(),
            ltp_modules: DEFAULT_LTP_MODULES.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Contents of `.testfind/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheSection,
    pub search: SearchSection,
    pub fuzzy: FuzzySection,
    pub selection: SelectionSection,
    pub build: BuildSection,
}

impl Config {
    /// Load the config of a source tree; a missing file yields defaults.
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE);
        if !path.is_file() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::parse(&path, &content)
    }

    /// Parse TOML text read from `path`.
    pub fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

// ============================================================================
// Configuration Sources
// ============================================================================

/// Where a setting came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigSource {
    /// Built-in default value.
    Default = 0,
    /// From `.testfind/config.toml`.
    ProjectConfig = 1,
    /// From environment variable.
    EnvVar = 2,
    /// From CLI flag (highest precedence).
    CliFlag = 3,
}

/// A configuration value with its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValue<T> {
    /// The actual value.
    pub value: T,
    /// Where the value came from.
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    /// Create a new config value with the given source.
    pub fn new(value: T, source: ConfigSource) -> Self {
        ConfigValue { value, source }
    }

    /// Merge with another value, preferring higher precedence.
    pub fn merge(self, other: Self) -> Self {
        if other.source >= self.source {
            other
        } else {
            self
        }
    }
}

/// CLI configuration overrides.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// --no-cache
    pub no_cache: bool,
    /// --select-config
    pub select_config: bool,
    /// --max-distance
    pub max_distance: Option<usize>,
    /// --profile
    pub profile: Option<FuzzyProfile>,
    /// --no-fuzzy
    pub no_fuzzy: bool,
}

// ============================================================================
// Resolved Configuration
// ============================================================================

/// Options threaded through one resolution batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    /// How modules with several configs are resolved.
    pub config_mode: ConfigMode,
    /// Skip the persistent cache entirely.
    pub use_cache: bool,
    /// Offer fuzzy suggestions when nothing is found.
    pub fuzzy: bool,
    pub fuzzy_profile: FuzzyProfile,
    pub max_distance: usize,
    /// Host output dir, relative to the root.
    pub host_out_dir: String,
    pub suite_deps: BTreeMap<String, Vec<String>>,
    pub ltp_modules: Vec<String>,
    pub integration_dirs: Vec<String>,
    pub suite_plan_dirs: Vec<String>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        ResolvedConfig::from_config(&Config::default()).resolve_options()
    }
}

/// Resolved configuration with precedence information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: Config,
    pub cache_enabled: ConfigValue<bool>,
    pub cache_dir: ConfigValue<PathBuf>,
    pub config_mode: ConfigValue<ConfigMode>,
    pub max_distance: ConfigValue<usize>,
    pub fuzzy_profile: ConfigValue<FuzzyProfile>,
    pub fuzzy_enabled: ConfigValue<bool>,
}

impl ResolvedConfig {
    /// Resolve configuration from all sources.
    ///
    /// # Errors
    ///
    /// An unreadable config file or an unparsable environment value.
    pub fn resolve(root: &Path, overrides: &CliOverrides) -> Result<Self, ConfigError> {
        let config = Config::load(root)?;
        let mut resolved = Self::from_config(&config);
        if let Some(dir) = &config.cache.dir {
            resolved.cache_dir = ConfigValue::new(root.join(dir), ConfigSource::ProjectConfig);
        } else {
            resolved.cache_dir = ConfigValue::new(default_cache_dir(root), ConfigSource::Default);
        }
        resolved.apply_env_vars(root, |key| std::env::var(key).ok())?;
        resolved.apply_cli_overrides(overrides);
        Ok(resolved)
    }

    /// Values taken from a config, tagged by whether they differ from the
    /// defaults.
    pub fn from_config(config: &Config) -> Self {
        let defaults = Config::default();
        let source_of = |same: bool| {
            if same {
                ConfigSource::Default
            } else {
                ConfigSource::ProjectConfig
            }
        };
        ResolvedConfig {
            config: config.clone(),
            cache_enabled: ConfigValue::new(
                config.cache.enabled,
                source_of(config.cache.enabled == defaults.cache.enabled),
            ),
            cache_dir: ConfigValue::new(
                config.cache.dir.clone().unwrap_or_default(),
                source_of(config.cache.dir.is_none()),
            ),
            config_mode: ConfigValue::new(
                config.selection.config_mode,
                source_of(config.selection.config_mode == defaults.selection.config_mode),
            ),
            max_distance: ConfigValue::new(
                config.fuzzy.max_distance,
                source_of(config.fuzzy.max_distance == defaults.fuzzy.max_distance),
            ),
            fuzzy_profile: ConfigValue::new(
                config.fuzzy.profile,
                source_of(config.fuzzy.profile == defaults.fuzzy.profile),
            ),
            fuzzy_enabled: ConfigValue::new(true, ConfigSource::Default),
        }
    }

    /// Apply `TESTFIND_*` variables read through `lookup`.
    pub fn apply_env_vars<F>(&mut self, root: &Path, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(ENV_CACHE_DIR).filter(|d| !d.is_empty()) {
            self.cache_dir = self
                .cache_dir
                .clone()
                .merge(ConfigValue::new(root.join(dir), ConfigSource::EnvVar));
        }
        if let Some(value) = lookup(ENV_NO_CACHE) {
            let disabled = matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
            self.cache_enabled = self
                .cache_enabled
                .clone()
                .merge(ConfigValue::new(!disabled, ConfigSource::EnvVar));
        }
        if let Some(value) = lookup(ENV_CONFIG_MODE) {
            let mode = ConfigMode::parse(ENV_CONFIG_MODE, &value)?;
            self.config_mode = self
                .config_mode
                .clone()
                .merge(ConfigValue::new(mode, ConfigSource::EnvVar));
        }
        if let Some(value) = lookup(ENV_FUZZY_DISTANCE) {
            let distance = value
                .trim()
                .parse::<usize>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: ENV_FUZZY_DISTANCE.to_string(),
                    value: value.clone(),
                    message: e.to_string(),
                })?;
            self.max_distance = self
                .max_distance
                .clone()
                .merge(ConfigValue::new(distance, ConfigSource::EnvVar));
        }
        Ok(())
    }

    /// Apply CLI flags (highest precedence).
    pub fn apply_cli_overrides(&mut self, overrides: &CliOverrides) {
        if overrides.no_cache {
            self.cache_enabled = ConfigValue::new(false, ConfigSource::CliFlag);
        }
        if overrides.select_config {
            self.config_mode = ConfigValue::new(ConfigMode::One, ConfigSource::CliFlag);
        }
        if let Some(distance) = overrides.max_distance {
            self.max_distance = ConfigValue::new(distance, ConfigSource::CliFlag);
        }
        if let Some(profile) = overrides.profile {
            self.fuzzy_profile = ConfigValue::new(profile, ConfigSource::CliFlag);
        }
        if overrides.no_fuzzy {
            self.fuzzy_enabled = ConfigValue::new(false, ConfigSource::CliFlag);
        }
    }

    /// The options for one resolution batch.
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            config_mode: self.config_mode.value,
            use_cache: self.cache_enabled.value,
            fuzzy: self.fuzzy_enabled.value,
            fuzzy_profile: self.fuzzy_profile.value,
            max_distance: self.max_distance.value,
            host_out_dir: self.config.build.host_out_dir.clone(),
            suite_deps: self.config.build.suite_deps.clone(),
            ltp_modules: self.config.build.ltp_modules.clone(),
            integration_dirs: self.config.search.integration_dirs.clone(),
            suite_plan_dirs: self.config.search.suite_plan_dirs.clone(),
        }
    }
}

/// `<root>/out/testfind_cache`
pub fn default_cache_dir(root: &Path) -> PathBuf {
    root.join("out").join("testfind_cache")
}

// ============================================================================
// Tests
// ============================================================================
