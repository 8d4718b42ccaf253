use crate::cli::{Args, ColorChoice};
use crate::interpreter::EvalOptions;
use crate::workspace::{Clock, FixedClock, SystemClock};

pub struct AppConfig {
    pub color_enabled: bool,
    pub compact: bool,
    pub verbose: bool,
    pub strict: bool,
    pub now: Option<FixedClock>,
}

impl AppConfig {
    pub fn from_args(args: &Args) -> Self {
        let color_enabled = match args.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => atty::is(atty::Stream::Stderr) && atty::is(atty::Stream::Stdout),
        };

        AppConfig {
            color_enabled,
            compact: args.compact,
            verbose: args.verbose,
            strict: args.strict,
            now: args.now,
        }
    }

    pub fn eval_options(&self) -> EvalOptions {
        EvalOptions { strict: self.strict }
    }

    /// The pinned instant from `--now`, else the wall clock.
    pub fn clock(&self) -> Box<dyn Clock> {
        match self.now {
            Some(fixed) => Box::new(fixed),
            None => Box::new(SystemClock),
        }
    }

    /// Default log filter when `MAGICTEXT_LOG` and `RUST_LOG` are unset.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "magictext=debug"
        } else {
            "warn"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_from_args() {
        let args = Args::try_parse_from([
            "magictext",
            "--color",
            "never",
            "-v",
            "--strict",
            "tree",
            "--data",
            "shop.json",
        ])
        .unwrap();
        let config = AppConfig::from_args(&args);
        assert!(!config.color_enabled);
        assert!(config.verbose);
        assert!(config.eval_options().strict);
        assert_eq!(config.log_filter(), "magictext=debug");
    }

    #[test]
    fn test_pinned_clock() {
        let args = Args::try_parse_from(["magictext", "--now", "2024-03-05T14:30:00Z", "tree", "-d", "x.json"]).unwrap();
        let config = AppConfig::from_args(&args);
        assert_eq!(config.clock().now().timestamp_millis(), 1_709_649_000_000);
    }
}
