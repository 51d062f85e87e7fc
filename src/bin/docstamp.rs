//! Command line front end for validating and rendering templates.
//!
//! Validate a template:
//! ```sh
//! docstamp validate to_trinh.docx
//! ```
//!
//! Render a template with a JSON data file:
//! ```sh
//! docstamp render bang_ke.xlsx --data rows.json -o out.xlsx
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `docstamp=info`).

use clap::{Parser, Subcommand, ValueEnum};
use docstamp::common::{DocumentKind, Value};
use docstamp::config::EngineConfig;
use docstamp::ooxml::{MissingValuePolicy, render_template};
use docstamp::validate::Validator;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "docstamp", about = "Fill Word and Excel templates with data", version)]
struct Args {
    /// YAML configuration file; environment variables override it
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that a file is a well-formed template package
    Validate {
        input: PathBuf,

        /// Package kind; guessed from the extension when omitted
        #[arg(short, long, value_enum)]
        kind: Option<KindArg>,
    },
    /// Render a template with a JSON data file
    Render {
        input: PathBuf,

        #[arg(short, long, value_enum)]
        kind: Option<KindArg>,

        /// JSON object with the template data
        #[arg(short, long, value_name = "JSON")]
        data: Option<PathBuf>,

        #[arg(short, long, visible_alias = "out", value_name = "OUTPUT")]
        output: PathBuf,

        /// Fail when a placeholder has no value
        #[arg(long)]
        strict: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Docx,
    Xlsx,
}

impl From<KindArg> for DocumentKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Docx => DocumentKind::WordProcessing,
            KindArg::Xlsx => DocumentKind::Spreadsheet,
        }
    }
}

fn resolve_kind(input: &Path, kind: Option<KindArg>) -> Result<DocumentKind, Box<dyn Error>> {
    if let Some(kind) = kind {
        return Ok(kind.into());
    }
    let ext = input
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("docx") => Ok(DocumentKind::WordProcessing),
        Some("xlsx") => Ok(DocumentKind::Spreadsheet),
        _ => Err(format!("cannot tell the kind of {}; pass --kind", input.display()).into()),
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, Box<dyn Error>> {
    let mut config = match path {
        Some(path) => EngineConfig::from_yaml_file(path)?,
        None => EngineConfig::default(),
    };
    config.apply_env()?;
    Ok(config)
}

fn validate(config: &EngineConfig, input: &Path, kind: DocumentKind) -> Result<bool, Box<dyn Error>> {
    let bytes = fs::read(input)?;
    let verdict = Validator::new(config.validator.clone()).validate(&bytes, kind);
    println!("{}", serde_json::to_string_pretty(&verdict)?);
    Ok(verdict.is_valid)
}

fn render(
    config: &EngineConfig,
    input: &Path,
    kind: DocumentKind,
    data: Option<&Path>,
    output: &Path,
) -> Result<(), Box<dyn Error>> {
    let context = match data {
        Some(path) => Value::from(serde_json::from_slice::<serde_json::Value>(&fs::read(path)?)?),
        None => Value::Null,
    };

    let bytes = fs::read(input)?;
    let (mut archive, _) = Validator::new(config.validator.clone()).open_validated(bytes.into(), kind)?;
    let rendered = render_template(kind, &config.template, &mut archive, &context)?;

    for name in &rendered.report.missing_variables {
        warn!(variable = %name, "no value");
    }
    for warning in &rendered.report.warnings {
        warn!("{warning}");
    }
    fs::write(output, &rendered.content)?;
    info!(
        output = %output.display(),
        substitutions = rendered.report.substitutions,
        rows = rendered.report.rows_written,
        "rendered"
    );
    Ok(())
}

fn run(args: Args) -> Result<bool, Box<dyn Error>> {
    let mut config = load_config(args.config.as_deref())?;
    match args.command {
        Command::Validate { input, kind } => {
            let kind = resolve_kind(&input, kind)?;
            validate(&config, &input, kind)
        },
        Command::Render {
            input,
            kind,
            data,
            output,
            strict,
        } => {
            if strict {
                config.template.missing = MissingValuePolicy::Error;
            }
            let kind = resolve_kind(&input, kind)?;
            render(&config, &input, kind, data.as_deref(), &output)?;
            Ok(true)
        },
    }
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docstamp=info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    match run(Args::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        },
    }
}
