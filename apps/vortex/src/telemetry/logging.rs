use clap::ValueEnum;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Raw `EnvFilter` directives; replaces everything derived from [`LogConfig`].
pub const FILTER_ENV: &str = "VORTEX_LOG_FILTER";
/// Lets runtime crates log at trace alongside the shell.
pub const TRACE_DEPS_ENV: &str = "VORTEX_TRACE_DEPS";

/// Parts of the shell core that log under `vortex::<component>`.
pub const COMPONENTS: &[&str] = &[
    "config",
    "guard",
    "loading",
    "session",
    "terminal",
    "transport",
];

const NOISY_DEPENDENCIES: &[&str] = &["tokio", "runtime", "mio"];

#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub file: Option<PathBuf>,
    /// Components raised to trace regardless of `level`.
    pub trace_components: Vec<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("unknown log component '{0}'")]
    UnknownComponent(String),
    #[error("failed to open log file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to install subscriber: {0}")]
    Install(String),
}

static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Installs the global subscriber. Calls after the first success are no-ops.
pub fn init(config: &LogConfig) -> Result<(), InitError> {
    if GUARD.get().is_some() {
        return Ok(());
    }

    let (directives, source) = match std::env::var(FILTER_ENV) {
        Ok(raw) => (raw, FILTER_ENV),
        Err(_) => (
            directives_for(config, super::env_flag(TRACE_DEPS_ENV))?,
            "log config",
        ),
    };

    // stdout carries the event stream.
    let (writer, guard) = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| InitError::Io {
                    path: path.clone(),
                    source,
                })?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    let detailed = config.level >= LogLevel::Debug || !config.trace_components.is_empty();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&directives))
        .with_target(detailed)
        .with_thread_names(config.level == LogLevel::Trace)
        .with_ansi(config.file.is_none())
        .with_writer(writer)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| InitError::Install(err.to_string()))?;

    let _ = GUARD.set(guard);
    tracing::debug!(target: "vortex::telemetry", %directives, source, "logging ready");
    Ok(())
}

/// `EnvFilter` directives for `config`. Dependency crates stay at info under
/// a global trace level unless `trace_dependencies` is set.
pub fn directives_for(config: &LogConfig, trace_dependencies: bool) -> Result<String, InitError> {
    let level = config.level.directive();
    let mut directives = vec![match config.level {
        LogLevel::Debug => format!("info,vortex={level}"),
        _ => level.to_string(),
    }];
    if config.level == LogLevel::Trace && !trace_dependencies {
        directives.extend(NOISY_DEPENDENCIES.iter().map(|dep| format!("{dep}=info")));
    }
    for component in &config.trace_components {
        if !COMPONENTS.contains(&component.as_str()) {
            return Err(InitError::UnknownComponent(component.clone()));
        }
        directives.push(format!("vortex::{component}=trace"));
    }
    Ok(directives.join(","))
}
