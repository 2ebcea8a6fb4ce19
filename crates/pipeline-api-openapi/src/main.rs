//! CLI for `pipeline-api-openapi`.
//!
//! Renders an `OpenAPI` document from a resource manifest, without a running
//! server.
//!
//! # Subcommands
//!
//! ```text
//! # Write the document as YAML (format inferred from the extension)
//! pipeline-api-openapi generate \
//!   --manifest api/resources.yaml \
//!   --config api/openapi/config.yaml \
//!   --output api/openapi/openapi.yaml
//!
//! # Print JSON to stdout
//! pipeline-api-openapi generate --manifest api/resources.yaml --format json
//!
//! # List the routes a manifest exposes
//! pipeline-api-openapi routes --manifest api/resources.yaml
//! ```

#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use pipeline_api_openapi::{DocumentConfig, OpenApiDocument, ResourceManifest};
use tracing_subscriber::EnvFilter;

/// `OpenAPI` 3.0 generator for schema-described resource pipelines.
#[derive(Parser)]
#[command(name = "pipeline-api-openapi", version, about)]
enum Cli {
    /// Render the document of every resource in a manifest.
    Generate(GenerateArgs),

    /// Print the method and path of every documented operation.
    Routes(RoutesArgs),
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Yaml,
}

#[derive(Parser)]
struct ManifestArgs {
    /// Path to the resource manifest (YAML or JSON).
    #[arg(short, long)]
    manifest: PathBuf,

    /// Path to a document config YAML file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base path prefix. Overrides `base_path` from the config file.
    #[arg(long)]
    base_path: Option<String>,
}

#[derive(Parser)]
struct GenerateArgs {
    #[command(flatten)]
    manifest: ManifestArgs,

    /// Output file. Defaults to stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format. Inferred from the `--output` extension when omitted,
    /// YAML otherwise.
    #[arg(short, long, value_enum)]
    format: Option<Format>,
}

#[derive(Parser)]
struct RoutesArgs {
    #[command(flatten)]
    manifest: ManifestArgs,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse() {
        Cli::Generate(args) => run_generate(&args),
        Cli::Routes(args) => run_routes(&args),
    }
}

fn build_document(args: &ManifestArgs) -> anyhow::Result<OpenApiDocument> {
    let mut config = match &args.config {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading config");
            DocumentConfig::load(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?
        }
        None => DocumentConfig::default(),
    };
    if let Some(base_path) = &args.base_path {
        config = config.base_path(base_path.clone());
    }

    let manifest = ResourceManifest::load(&args.manifest)
        .with_context(|| format!("Failed to load manifest: {}", args.manifest.display()))?;
    tracing::info!(resources = manifest.resources.len(), "loaded manifest");

    manifest
        .document(&config)
        .context("Failed to build the OpenAPI document")
}

/// Pick the output format from the flag, then the file extension.
fn resolve_format(explicit: Option<Format>, output: Option<&Path>) -> Format {
    if let Some(format) = explicit {
        return format;
    }
    match output.and_then(Path::extension).and_then(|e| e.to_str()) {
        Some("json") => Format::Json,
        _ => Format::Yaml,
    }
}

fn render(doc: &OpenApiDocument, format: Format) -> anyhow::Result<String> {
    Ok(match format {
        Format::Json => {
            let mut text = serde_json::to_string_pretty(doc).context("Failed to render JSON")?;
            text.push('\n');
            text
        }
        Format::Yaml => doc.to_yaml().context("Failed to render YAML")?,
    })
}

fn run_generate(args: &GenerateArgs) -> anyhow::Result<()> {
    let doc = build_document(&args.manifest)?;
    let format = resolve_format(args.format, args.output.as_deref());
    let text = render(&doc, format)?;

    match &args.output {
        Some(path) => {
            fs::write(path, text)
                .with_context(|| format!("Failed to write output: {}", path.display()))?;
            eprintln!(
                "Wrote {} paths, {} schemas to {}",
                doc.paths.len(),
                doc.components.schemas.len(),
                path.display()
            );
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn run_routes(args: &RoutesArgs) -> anyhow::Result<()> {
    let doc = build_document(&args.manifest)?;
    for (path, item) in &doc.paths {
        for (method, operation) in item {
            println!(
                "{:<7} {path:<32} {}",
                method.to_uppercase(),
                operation.operation_id
            );
        }
    }
    Ok(())
}
