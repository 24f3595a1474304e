use directories::BaseDirs;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

use crate::error::{ShellError, ShellResult};
use crate::search::{DEFAULT_SEARCH_ENGINE, is_valid_template};
use crate::transport::BackendDescriptor;

pub const CONFIG_ENV: &str = "VORTEX_CONFIG";
pub const DEFAULT_ORIGIN: &str = "http://localhost:8080";
pub const DEFAULT_TRANSPORT: &str = "/epoxy/index.mjs";
pub const DEFAULT_WISP_PATH: &str = "/wisp/";
pub const DEFAULT_PROXY_PREFIX: &str = "/service/";

const DEFAULT_SRC_SIGNATURES: &[&str] = &[
    "goguardian",
    "securly",
    "lightspeed",
    "linewize",
    "contentkeeper",
    "iboss",
];
const DEFAULT_INLINE_SIGNATURES: &[&str] = &[
    "goguardian",
    "securly",
    "lightspeed",
    "monitoring",
    "contentkeeper",
];

/// Denylists for the guard's script filter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub src_signatures: Vec<String>,
    pub inline_signatures: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            src_signatures: DEFAULT_SRC_SIGNATURES.iter().map(|s| s.to_string()).collect(),
            inline_signatures: DEFAULT_INLINE_SIGNATURES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Shell configuration: defaults, then the TOML file, then `VORTEX_*`
/// environment overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct ShellConfig {
    /// Origin of the page hosting the shell; the wisp endpoint lives here.
    pub origin: String,
    pub transport: String,
    pub wisp_path: String,
    pub proxy_prefix: String,
    /// Search URL with a `%s` slot for the encoded query.
    pub search_engine: String,
    pub homepage: Option<String>,
    pub guard_on_start: bool,
    pub monitor: MonitorConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    origin: Option<String>,
    transport: Option<String>,
    wisp_path: Option<String>,
    proxy_prefix: Option<String>,
    search_engine: Option<String>,
    homepage: Option<String>,
    guard_on_start: Option<bool>,
    monitor: Option<MonitorConfig>,
}

impl ShellConfig {
    /// Loads from `path`, else `$VORTEX_CONFIG`, else `~/.vortex/config.toml`
    /// when it exists. An explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> ShellResult<Self> {
        let mut config = Self::default();
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));
        let file = match explicit {
            Some(path) => Some(path),
            None => Self::default_path().filter(|path| path.exists()),
        };
        if let Some(file) = file {
            debug!(target: "vortex::config", path = %file.display(), "reading config file");
            let raw = fs::read_to_string(&file)?;
            config.apply_toml(&raw)?;
        }
        config.apply_env(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        BaseDirs::new().map(|base| base.home_dir().join(".vortex").join("config.toml"))
    }

    pub fn apply_toml(&mut self, raw: &str) -> ShellResult<()> {
        let file: FileConfig = toml::from_str(raw)?;
        if let Some(origin) = file.origin {
            self.origin = origin;
        }
        if let Some(transport) = file.transport {
            self.transport = transport;
        }
        if let Some(wisp_path) = file.wisp_path {
            self.wisp_path = wisp_path;
        }
        if let Some(prefix) = file.proxy_prefix {
            self.proxy_prefix = prefix;
        }
        if let Some(engine) = file.search_engine {
            self.search_engine = engine;
        }
        if file.homepage.is_some() {
            self.homepage = file.homepage.filter(|home| !home.trim().is_empty());
        }
        if let Some(guard) = file.guard_on_start {
            self.guard_on_start = guard;
        }
        if let Some(monitor) = file.monitor {
            self.monitor = monitor;
        }
        Ok(())
    }

    /// Applies `VORTEX_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> ShellResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(origin) = lookup("VORTEX_ORIGIN") {
            self.origin = origin;
        }
        if let Some(transport) = lookup("VORTEX_TRANSPORT") {
            self.transport = transport;
        }
        if let Some(wisp_path) = lookup("VORTEX_WISP_PATH") {
            self.wisp_path = wisp_path;
        }
        if let Some(prefix) = lookup("VORTEX_PROXY_PREFIX") {
            self.proxy_prefix = prefix;
        }
        if let Some(engine) = lookup("VORTEX_SEARCH_ENGINE") {
            self.search_engine = engine;
        }
        if let Some(home) = lookup("VORTEX_HOMEPAGE") {
            self.homepage = Some(home).filter(|home| !home.trim().is_empty());
        }
        if let Some(guard) = lookup("VORTEX_GUARD") {
            self.guard_on_start = is_truthy(&guard);
        }
        Ok(())
    }

    pub fn validate(&self) -> ShellResult<()> {
        let origin = self.origin_url()?;
        if origin.host_str().is_none() {
            return Err(ShellError::Config(format!("origin {origin} has no host")));
        }
        if self.transport.trim().is_empty() {
            return Err(ShellError::Config("transport must not be empty".into()));
        }
        if self.proxy_prefix.is_empty() {
            return Err(ShellError::Config("proxy_prefix must not be empty".into()));
        }
        if !is_valid_template(&self.search_engine) {
            return Err(ShellError::Config(format!(
                "search_engine '{}' must be a URL containing %s",
                self.search_engine
            )));
        }
        Ok(())
    }

    pub fn origin_url(&self) -> ShellResult<Url> {
        Url::parse(self.origin.trim()).map_err(|err| {
            ShellError::Config(format!("invalid origin '{}': {err}", self.origin))
        })
    }

    pub fn backend(&self) -> ShellResult<BackendDescriptor> {
        BackendDescriptor::for_origin(&self.origin_url()?, self.transport.clone(), &self.wisp_path)
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            origin: DEFAULT_ORIGIN.to_string(),
            transport: DEFAULT_TRANSPORT.to_string(),
            wisp_path: DEFAULT_WISP_PATH.to_string(),
            proxy_prefix: DEFAULT_PROXY_PREFIX.to_string(),
            search_engine: DEFAULT_SEARCH_ENGINE.to_string(),
            homepage: None,
            guard_on_start: false,
            monitor: MonitorConfig::default(),
        }
    }
}

pub(crate) fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
