use std::{env, path::PathBuf, process::ExitCode};

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use spel_preview::{evaluate_expression_with, parse_expressions, PreviewOptions, SpelEngine};

#[derive(Debug)]
struct EvalOptions {
    template: String,
    context: JsonValue,
    preview_options: PreviewOptions,
    compact: bool,
}

fn main() -> ExitCode {
    init_tracing();
    match run(env::args().collect()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{err}");
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Returns `Ok(false)` when the command ran but the template did not
/// evaluate cleanly.
fn run(args: Vec<String>) -> Result<bool, String> {
    if args.len() < 2 {
        return Err("not enough arguments".to_string());
    }

    let command = args[1].as_str();
    match command {
        "eval" => {
            let options = parse_eval_options(&args[2..])?;
            run_eval(&options)
        }
        "segments" => {
            let (template, compact) = parse_segments_options(&args[2..])?;
            run_segments(&template, compact)
        }
        _ => Err(format!("unknown command '{command}'")),
    }
}

fn run_eval(options: &EvalOptions) -> Result<bool, String> {
    let preview = evaluate_expression_with(
        &SpelEngine,
        &options.preview_options,
        &options.context,
        Some(options.template.as_str()),
    );
    print_json(&preview, options.compact)?;
    Ok(preview.is_ok())
}

fn run_segments(template: &str, compact: bool) -> Result<bool, String> {
    match parse_expressions(template) {
        Ok(segments) => {
            print_json(&segments, compact)?;
            Ok(true)
        }
        Err(err) => {
            eprintln!("{err}");
            Ok(false)
        }
    }
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> Result<(), String> {
    let output = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .map_err(|e| format!("failed to serialize output: {e}"))?;
    println!("{output}");
    Ok(())
}

fn parse_eval_options(args: &[String]) -> Result<EvalOptions, String> {
    let mut template = None;
    let mut context = JsonValue::Object(Default::default());
    let mut preview_options = PreviewOptions::default();
    let mut compact = false;
    let mut i = 0usize;

    while i < args.len() {
        match args[i].as_str() {
            "--compact" => {
                compact = true;
                i += 1;
            }
            "--context" => {
                let raw = option_value(args, i, "--context")?;
                context = serde_json::from_str(raw)
                    .map_err(|e| format!("invalid JSON for --context: {e}"))?;
                i += 2;
            }
            "--context-file" => {
                let path = PathBuf::from(option_value(args, i, "--context-file")?);
                let raw = std::fs::read_to_string(&path)
                    .map_err(|e| format!("failed to read '{}': {e}", path.display()))?;
                context = serde_json::from_str(&raw)
                    .map_err(|e| format!("invalid JSON in '{}': {e}", path.display()))?;
                i += 2;
            }
            "--options" => {
                let path = PathBuf::from(option_value(args, i, "--options")?);
                let raw = std::fs::read_to_string(&path)
                    .map_err(|e| format!("failed to read '{}': {e}", path.display()))?;
                preview_options = serde_json::from_str(&raw)
                    .map_err(|e| format!("invalid options in '{}': {e}", path.display()))?;
                i += 2;
            }
            other if other.starts_with("--") => {
                return Err(format!("unknown eval option '{other}'"))
            }
            other => {
                set_template(&mut template, other)?;
                i += 1;
            }
        }
    }

    Ok(EvalOptions {
        template: template.ok_or("missing template")?,
        context,
        preview_options,
        compact,
    })
}

fn parse_segments_options(args: &[String]) -> Result<(String, bool), String> {
    let mut template = None;
    let mut compact = false;
    for arg in args {
        match arg.as_str() {
            "--compact" => compact = true,
            other if other.starts_with("--") => {
                return Err(format!("unknown segments option '{other}'"))
            }
            other => set_template(&mut template, other)?,
        }
    }
    Ok((template.ok_or("missing template")?, compact))
}

/// The template is the single positional argument, before or after options.
fn set_template(slot: &mut Option<String>, value: &str) -> Result<(), String> {
    if let Some(existing) = slot {
        return Err(format!(
            "unexpected argument '{value}' (template already given as '{existing}')"
        ));
    }
    *slot = Some(value.to_string());
    Ok(())
}

fn option_value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, String> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| format!("missing value for {flag}"))
}

fn print_usage() {
    eprintln!("usage:");
    eprintln!(
        "  spel-preview eval [--context <json> | --context-file <path>] [--options <path>] [--compact] <template>"
    );
    eprintln!("  spel-preview segments [--compact] <template>");
    eprintln!();
    eprintln!("options file (JSON, all fields optional):");
    eprintln!("  context_truncate_len   characters of error context kept inline (default 200)");
    eprintln!("  max_segments           maximum segments per template (default 128)");
    eprintln!("  max_expression_len     maximum characters per expression (default 4096)");
    eprintln!("  max_nesting_depth      maximum expression nesting (default 128)");
    eprintln!();
    eprintln!("logging is controlled by RUST_LOG (default: warn).");
}
