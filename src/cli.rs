use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

use crate::workspace::FixedClock;

#[derive(Parser, Debug)]
#[command(name = "magictext")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Preview, classify and autocomplete {{...}} bindings against a workspace", long_about = None)]
pub struct Args {
    #[arg(long = "color", value_name = "WHEN", default_value = "auto", global = true)]
    pub color: ColorChoice,

    #[arg(long = "compact", global = true)]
    pub compact: bool,

    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Report missing fields and out-of-range indices instead of yielding null.
    #[arg(long = "strict", global = true)]
    pub strict: bool,

    /// Freeze the `system` roots at this instant.
    #[arg(long = "now", value_name = "RFC3339", value_parser = parse_instant, global = true)]
    pub now: Option<FixedClock>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a template against the workspace.
    Render {
        #[arg(short, long, value_name = "FILE")]
        data: PathBuf,

        #[arg(value_name = "TEMPLATE")]
        template: String,

        /// JSON value bound to `item`, as inside a repeater.
        #[arg(long, value_name = "JSON")]
        item: Option<String>,

        /// Value bound to `index`.
        #[arg(long, value_name = "N")]
        index: Option<usize>,
    },
    /// Print whether a binding yields a collection, a single value, or an unknown shape.
    Classify {
        #[arg(short, long, value_name = "FILE")]
        data: PathBuf,

        #[arg(value_name = "EXPR")]
        expr: String,

        /// Classify as if inside a repeater bound to this expression.
        #[arg(long = "repeater-source", value_name = "EXPR")]
        repeater_source: Option<String>,
    },
    /// List completions for the token open at the cursor.
    Suggest {
        #[arg(short, long, value_name = "FILE")]
        data: PathBuf,

        #[arg(value_name = "TEXT")]
        text: String,

        /// Cursor position in characters; defaults to the end of TEXT.
        #[arg(long, value_name = "N")]
        cursor: Option<usize>,

        #[arg(long = "repeater-source", value_name = "EXPR")]
        repeater_source: Option<String>,
    },
    /// Dump the data source tree built from the workspace.
    Tree {
        #[arg(short, long, value_name = "FILE")]
        data: PathBuf,
    },
    Complete {
        #[arg(value_name = "SHELL")]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy)]
pub enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl std::str::FromStr for ColorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ColorChoice::Auto),
            "always" => Ok(ColorChoice::Always),
            "never" => Ok(ColorChoice::Never),
            _ => Err(format!(
                "Invalid color choice: {}. Must be 'auto', 'always', or 'never'",
                s
            )),
        }
    }
}

fn parse_instant(s: &str) -> Result<FixedClock, String> {
    FixedClock::parse(s).map_err(|e| format!("expected an RFC 3339 timestamp such as 2024-03-05T14:30:00Z: {}", e))
}

pub fn generate_completions(shell: Shell) {
    let mut cmd = Args::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, &bin_name, &mut io::stdout());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "magictext",
            "render",
            "--data",
            "shop.json",
            "{{app.name}}",
            "--strict",
            "--now",
            "2024-03-05T14:30:00Z",
        ])
        .unwrap();
        assert!(args.strict);
        assert!(args.now.is_some());
        assert!(matches!(args.command, Commands::Render { index: None, .. }));
    }

    #[test]
    fn test_rejects_bad_instant() {
        let result = Args::try_parse_from(["magictext", "tree", "-d", "x.json", "--now", "yesterday"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_color_choice() {
        assert!(matches!("ALWAYS".parse::<ColorChoice>(), Ok(ColorChoice::Always)));
        assert!("sometimes".parse::<ColorChoice>().is_err());
    }
}
