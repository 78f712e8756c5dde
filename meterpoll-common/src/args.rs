//! CLI argument parsing for services.

use std::path::PathBuf;

use clap::Parser;

/// Common CLI arguments for all services.
#[derive(Parser, Debug, Clone)]
#[command(about = "meterpoll service")]
pub struct ServiceArgs {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Run a single poll cycle and exit.
    #[arg(long)]
    pub once: bool,
}

impl ServiceArgs {
    /// Parse CLI arguments with a default config path.
    ///
    /// If no `--config` argument is provided, uses the default.
    pub fn parse_with_default(default_config: &'static str) -> Self {
        let matches = <Self as clap::CommandFactory>::command()
            .mut_arg("config", |arg| arg.default_value(default_config))
            .get_matches();

        <Self as clap::FromArgMatches>::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let args =
            ServiceArgs::try_parse_from(["meterpoll", "-c", "meter.json5", "--once"]).unwrap();
        assert_eq!(args.config, PathBuf::from("meter.json5"));
        assert!(args.once);
        assert!(args.log_level.is_none());
    }

    #[test]
    fn test_log_level_override() {
        let args = ServiceArgs::try_parse_from([
            "meterpoll",
            "--config",
            "meter.json5",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(!args.once);
    }
}
