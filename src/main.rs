use clap::Parser;
use owo_colors::OwoColorize;
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use magictext::autocomplete::suggest_in_scope;
use magictext::builder::TreeBuilder;
use magictext::classify::{classify_template, RepeaterScope};
use magictext::cli::{generate_completions, Args, Commands};
use magictext::config::AppConfig;
use magictext::convert::parse_json;
use magictext::diagnostic::{render_diagnostics, Diagnostic, Severity};
use magictext::format::value_to_json_string;
use magictext::interpreter::{render_with_diagnostics, EvaluationContext};
use magictext::template::{parse, parse_template};
use magictext::tree::DataSourceTree;
use magictext::workspace::Workspace;
use magictext::Value;

enum Failure {
    Message(String),
    Diagnostics { source: String, diagnostics: Vec<Diagnostic> },
}

impl Failure {
    fn at(source: &str, diagnostic: Diagnostic) -> Self {
        Failure::Diagnostics {
            source: source.to_string(),
            diagnostics: vec![diagnostic],
        }
    }
}

fn main() {
    let args = Args::parse();

    if let Commands::Complete { shell } = &args.command {
        generate_completions(*shell);
        return;
    }

    let config = AppConfig::from_args(&args);
    init_tracing(&config);

    if let Err(failure) = run(&args.command, &config) {
        report(&config, failure);
        std::process::exit(1);
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = std::env::var("MAGICTEXT_LOG")
        .map(|value| EnvFilter::builder().parse_lossy(value))
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(config.color_enabled)
        .with_target(false)
        .init();
}

fn run(command: &Commands, config: &AppConfig) -> Result<(), Failure> {
    match command {
        Commands::Render {
            data,
            template,
            item,
            index,
        } => {
            let tree = load_tree(data, config)?;
            let ctx = EvaluationContext::new(&tree).with_options(config.eval_options());
            let ctx = if item.is_some() || index.is_some() {
                let item = match item {
                    Some(json) => parse_json(json)
                        .map_err(|e| Failure::Message(format!("--item is not valid JSON: {}", e)))?,
                    None => Value::Null,
                };
                ctx.with_item(item, index.unwrap_or(0))
            } else {
                ctx
            };

            let (value, diagnostics) = match parse_template(template) {
                Ok(parsed) => {
                    let (value, errors) = render_with_diagnostics(&parsed, &ctx);
                    let diagnostics = errors
                        .iter()
                        .map(|token| token.error.to_diagnostic_at(token.span))
                        .collect();
                    (value, diagnostics)
                }
                Err(error) => (Value::string(template), vec![error.to_diagnostic()]),
            };
            warn(config, template, diagnostics);
            emit(&value_to_json_string(&value, config.compact));
            Ok(())
        }
        Commands::Classify {
            data,
            expr,
            repeater_source,
        } => {
            let tree = load_tree(data, config)?;
            let repeater = repeater_scope(&tree, repeater_source.as_deref())?;
            let template = parse_template(expr).map_err(|e| Failure::at(expr, e.to_diagnostic()))?;
            let classification = classify_template(&template, &tree, repeater.as_ref());
            debug!(expression = %expr, %classification, "classified");
            emit_json(
                &serde_json::json!({ "expression": expr, "classification": classification }),
                config,
            )
        }
        Commands::Suggest {
            data,
            text,
            cursor,
            repeater_source,
        } => {
            let tree = load_tree(data, config)?;
            let repeater = repeater_scope(&tree, repeater_source.as_deref())?;
            let cursor = cursor.unwrap_or_else(|| text.chars().count());
            let suggestions = suggest_in_scope(text, cursor, &tree, repeater.as_ref());
            emit_json(&suggestions, config)
        }
        Commands::Tree { data } => {
            let tree = load_tree(data, config)?;
            emit_json(&tree, config)
        }
        Commands::Complete { shell } => {
            generate_completions(*shell);
            Ok(())
        }
    }
}

fn load_tree(path: &Path, config: &AppConfig) -> Result<DataSourceTree, Failure> {
    let workspace = Workspace::load(path).map_err(|e| Failure::Message(e.to_string()))?;
    info!(
        path = %path.display(),
        tables = workspace.tables.len(),
        "loaded workspace"
    );
    let clock = config.clock();
    Ok(TreeBuilder::from_workspace(&workspace).build(clock.as_ref()))
}

fn repeater_scope(tree: &DataSourceTree, source: Option<&str>) -> Result<Option<RepeaterScope>, Failure> {
    let Some(source) = source else {
        return Ok(None);
    };
    let parsed = parse(source).map_err(|e| Failure::at(source, e.to_diagnostic()))?;
    RepeaterScope::for_source(tree, &parsed)
        .map(Some)
        .ok_or_else(|| Failure::Message(format!("repeater source '{}' is not a collection", source)))
}

fn emit(output: &str) {
    println!("{}", output);
    let _ = io::stdout().flush();
}

fn emit_json<T: Serialize>(value: &T, config: &AppConfig) -> Result<(), Failure> {
    let rendered = if config.compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    };
    let rendered = rendered.map_err(|e| Failure::Message(format!("cannot serialize output: {}", e)))?;
    emit(&rendered);
    Ok(())
}

/// Token failures do not stop a render; they are shown as warnings.
fn warn(config: &AppConfig, source: &str, mut diagnostics: Vec<Diagnostic>) {
    if diagnostics.is_empty() {
        return;
    }
    for diagnostic in &mut diagnostics {
        diagnostic.severity = Severity::Warning;
    }
    eprint!("{}", render_diagnostics(source, "template", &diagnostics, config.color_enabled));
}

fn report(config: &AppConfig, failure: Failure) {
    match failure {
        Failure::Message(message) => {
            if config.color_enabled {
                eprintln!("{} {}", "error:".red().bold(), message);
            } else {
                eprintln!("error: {}", message);
            }
        }
        Failure::Diagnostics { source, diagnostics } => {
            eprint!("{}", render_diagnostics(&source, "expression", &diagnostics, config.color_enabled));
        }
    }
}
