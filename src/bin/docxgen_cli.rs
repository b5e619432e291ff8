//! DocxGen CLI - fill DOCX templates with JSON data
//!
//! Commands: render, batch, tags
//! Outputs JSON to stdout, logs to stderr (RUST_LOG)
//! Returns 2 when a template fails to generate

use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use docxgen_core::{
    Batch, Context, Converter, DocxDocument, FailurePolicy, Generator, GeneratorConfig,
    SofficeConverter, TemplateDocument,
};

#[derive(Parser)]
#[command(name = "docxgen-cli")]
#[command(about = "DocxGen CLI - DOCX template expansion")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render one document
    Render {
        /// Template .docx
        #[arg(short, long)]
        template: PathBuf,

        /// JSON object with the document data
        #[arg(short, long)]
        data: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Convert the result with the configured converter
        #[arg(long)]
        convert: bool,
    },

    /// Render one document per item into a zip archive
    Batch {
        /// Template .docx
        #[arg(short, long)]
        template: PathBuf,

        /// JSON array of document data objects
        #[arg(short, long)]
        data: PathBuf,

        /// Output archive
        #[arg(short, long)]
        output: PathBuf,

        /// Convert each document with the configured converter
        #[arg(long)]
        convert: bool,

        /// Leave failing documents out instead of aborting
        #[arg(long)]
        skip_failures: bool,
    },

    /// List the tags found in a template
    Tags {
        /// Template .docx
        #[arg(short, long)]
        template: PathBuf,
    },
}

enum CliError {
    /// Bad input or I/O
    Usage(String),
    /// The template could not be generated
    Generation(String),
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(output) => {
            println!("{:#}", output);
            ExitCode::SUCCESS
        }
        Err(CliError::Usage(error)) => {
            println!("{}", json!({"success": false, "error": error}));
            ExitCode::FAILURE
        }
        Err(CliError::Generation(error)) => {
            println!("{}", json!({"success": false, "error": error}));
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<Value, CliError> {
    let config = match &cli.config {
        Some(path) => GeneratorConfig::load(path).map_err(|e| CliError::Usage(e.to_string()))?,
        None => GeneratorConfig::default(),
    };
    let generator = Generator::from_config(&config);
    let converter = SofficeConverter::from_config(&config.converter);

    match cli.command {
        Commands::Render {
            template,
            data,
            output,
            convert,
        } => {
            let template = open_template(&template)?;
            let context: Context = read_json(&data)?;

            let tree = generator
                .expand(template.tree(), &context)
                .map_err(|e| CliError::Generation(e.to_string()))?;
            let document = template.with_tree(tree);

            if convert || config.converter.enabled {
                let workdir = tempfile::tempdir().map_err(|e| CliError::Usage(e.to_string()))?;
                let saved = workdir.path().join("document.docx");
                document
                    .save(&saved)
                    .map_err(|e| CliError::Usage(e.to_string()))?;
                converter
                    .convert(&saved, &output)
                    .map_err(|e| CliError::Generation(e.to_string()))?;
            } else {
                document
                    .save(&output)
                    .map_err(|e| CliError::Usage(e.to_string()))?;
            }

            Ok(json!({"success": true, "output": output.display().to_string()}))
        }

        Commands::Batch {
            template,
            data,
            output,
            convert,
            skip_failures,
        } => {
            let template = open_template(&template)?;
            let contexts: Vec<Context> = read_json(&data)?;

            let policy = if skip_failures {
                FailurePolicy::Skip
            } else {
                config.batch.failure_policy
            };
            let mut batch = Batch::new(&generator, &template).with_policy(policy);
            if convert || config.converter.enabled {
                batch = batch.with_converter(&converter);
            }

            let report = batch
                .write(&contexts, &output)
                .map_err(|e| CliError::Generation(e.to_string()))?;

            Ok(json!({
                "success": true,
                "output": output.display().to_string(),
                "report": report,
            }))
        }

        Commands::Tags { template } => {
            let template = open_template(&template)?;
            let tags = generator.tags(template.tree());
            let valid = tags.iter().all(|t| t.error.is_none());
            Ok(json!({"valid": valid, "tags": tags}))
        }
    }
}

fn open_template(path: &Path) -> Result<DocxDocument, CliError> {
    DocxDocument::open(path).map_err(|e| CliError::Usage(format!("Failed to load template: {}", e)))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let content = fs::read_to_string(path)
        .map_err(|e| CliError::Usage(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content).map_err(|e| CliError::Usage(format!("Invalid payload: {}", e)))
}
