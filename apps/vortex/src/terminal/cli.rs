use clap::{Args, Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::ShellConfig;
use crate::telemetry::logging::{COMPONENTS, LogConfig, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "vortex",
    about = "Drive the Vortex proxy shell core from stdin",
    author,
    version = concat!(env!("CARGO_PKG_VERSION"), "-", env!("BUILD_TIMESTAMP"))
)]
pub struct Cli {
    #[arg(
        long,
        value_name = "PATH",
        help = "Config file (defaults to $VORTEX_CONFIG, then ~/.vortex/config.toml)"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, value_name = "URL", help = "Origin of the page hosting the shell")]
    pub origin: Option<String>,

    #[arg(
        long = "search-engine",
        value_name = "TEMPLATE",
        help = "Search URL with %s where the query goes"
    )]
    pub search_engine: Option<String>,

    #[arg(long, help = "Enable the session guard at startup")]
    pub guard: bool,

    #[arg(
        long,
        value_enum,
        default_value_t = ConfirmAnswer::Yes,
        help = "How guard confirmation prompts are answered"
    )]
    pub confirm: ConfirmAnswer,

    #[arg(
        long = "frame-delay-ms",
        value_name = "MS",
        default_value_t = 300,
        help = "Simulated time for the frame to finish loading"
    )]
    pub frame_delay_ms: u64,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

impl Cli {
    /// Command-line flags win over file and environment values.
    pub fn apply_overrides(&self, config: &mut ShellConfig) {
        if let Some(origin) = self.origin.as_ref() {
            config.origin = origin.clone();
        }
        if let Some(engine) = self.search_engine.as_ref() {
            config.search_engine = engine.clone();
        }
        if self.guard {
            config.guard_on_start = true;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ConfirmAnswer {
    Yes,
    No,
}

impl ConfirmAnswer {
    pub fn as_bool(self) -> bool {
        matches!(self, ConfirmAnswer::Yes)
    }
}

#[derive(Args, Debug, Clone)]
pub struct LoggingArgs {
    #[arg(
        long = "log-level",
        value_enum,
        env = "VORTEX_LOG_LEVEL",
        default_value_t = LogLevel::Warn,
        help = "Minimum log level (error, warn, info, debug, trace)"
    )]
    pub level: LogLevel,

    #[arg(long = "log-file", value_name = "PATH", env = "VORTEX_LOG_FILE")]
    pub file: Option<PathBuf>,

    /// Trace one component (session, transport, loading, ...). Repeatable.
    #[arg(
        long = "trace",
        value_name = "COMPONENT",
        value_parser = clap::builder::PossibleValuesParser::new(COMPONENTS.iter().copied())
    )]
    pub trace: Vec<String>,
}

impl LoggingArgs {
    pub fn to_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            file: self.file.clone(),
            trace_components: self.trace.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn trace_flags_select_components() {
        let cli = Cli::try_parse_from(["vortex", "--trace", "session", "--trace", "guard"])
            .expect("parse flags");
        let config = cli.logging.to_config();
        assert_eq!(config.trace_components, vec!["session", "guard"]);

        assert!(Cli::try_parse_from(["vortex", "--trace", "renderer"]).is_err());
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "vortex",
            "--origin",
            "https://proxy.test",
            "--guard",
            "--confirm",
            "no",
        ])
        .expect("parse flags");
        let mut config = ShellConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.origin, "https://proxy.test");
        assert!(config.guard_on_start);
        assert!(!cli.confirm.as_bool());
        assert_eq!(config.search_engine, ShellConfig::default().search_engine);
    }
}
