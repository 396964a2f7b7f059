//! specdiff-service CLI
//!
//! Runs the HTTP service, or compares two documents once from the command line.

use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use specdiff::config::{
    DEPRECATION_DAYS, EXCLUDE_DESCRIPTION, EXCLUDE_ENDPOINTS, EXCLUDE_EXAMPLES, FILTER_EXTENSION,
    PATH_FILTER, PATH_PREFIX_BASE, PATH_PREFIX_REVISION, PATH_STRIP_PREFIX_BASE,
    PATH_STRIP_PREFIX_REVISION,
};
use specdiff::{
    logging, serve, CheckContext, ComparisonConfig, Disabled, Handler, HttpCollector, MediaType,
    OpenApiComparator, Operation, PipelineError, QueryParams, RenderRequest, ServerConfig,
    SourcePair, SpecSource, TelemetrySender,
};

#[derive(Parser)]
#[command(name = "specdiff-service")]
#[command(about = "Report diffs, breaking changes and changelogs between OpenAPI documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP service
    Serve(ServeArgs),

    /// Print the structural diff between two documents
    Diff(CompareArgs),

    /// Print the breaking changes (exit code 1 when any are found)
    Breaking(CompareArgs),

    /// Print every classified change
    Changelog(CompareArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "SPECDIFF_ADDR", default_value = "0.0.0.0:8080")]
    addr: SocketAddr,

    /// Directory holding docs.html and openapi.yaml
    #[arg(long, env = "SPECDIFF_DOCS_DIR", default_value = "/app/docs")]
    docs_dir: PathBuf,

    /// Collector URL for usage events (disabled when unset)
    #[arg(long, env = "SPECDIFF_TELEMETRY_URL")]
    telemetry_url: Option<String>,
}

#[derive(Args)]
struct CompareArgs {
    /// Base document: file path or URL (http:// or https://)
    base: String,

    /// Revised document: file path or URL
    revision: String,

    /// Output format
    #[arg(long, value_enum, default_value_t = Format::Yaml)]
    format: Format,

    /// Language of report messages
    #[arg(long, default_value = "en")]
    lang: String,

    /// Only compare paths matching this regex
    #[arg(long)]
    path_filter: Option<String>,

    /// Exclude paths and operations with an extension matching this regex
    #[arg(long)]
    filter_extension: Option<String>,

    /// Prefix prepended to base paths
    #[arg(long)]
    path_prefix_base: Option<String>,

    /// Prefix prepended to revision paths
    #[arg(long)]
    path_prefix_revision: Option<String>,

    /// Prefix stripped from base paths
    #[arg(long)]
    path_strip_prefix_base: Option<String>,

    /// Prefix stripped from revision paths
    #[arg(long)]
    path_strip_prefix_revision: Option<String>,

    /// Minimum days between deprecation and sunset
    #[arg(long)]
    deprecation_days: Option<u32>,

    /// Ignore example changes
    #[arg(long)]
    exclude_examples: bool,

    /// Ignore description and summary changes
    #[arg(long)]
    exclude_description: bool,

    /// Omit the endpoint summary from the diff
    #[arg(long)]
    exclude_endpoints: bool,
}

impl CompareArgs {
    /// The flags as the parameter list the HTTP routes accept.
    fn params(&self) -> QueryParams {
        let text = [
            (PATH_FILTER, &self.path_filter),
            (FILTER_EXTENSION, &self.filter_extension),
            (PATH_PREFIX_BASE, &self.path_prefix_base),
            (PATH_PREFIX_REVISION, &self.path_prefix_revision),
            (PATH_STRIP_PREFIX_BASE, &self.path_strip_prefix_base),
            (PATH_STRIP_PREFIX_REVISION, &self.path_strip_prefix_revision),
        ];
        let switches = [
            (EXCLUDE_EXAMPLES, self.exclude_examples),
            (EXCLUDE_DESCRIPTION, self.exclude_description),
            (EXCLUDE_ENDPOINTS, self.exclude_endpoints),
        ];

        text.into_iter()
            .filter_map(|(key, value)| value.clone().map(|v| (key.to_string(), v)))
            .chain(
                self.deprecation_days
                    .map(|days| (DEPRECATION_DAYS.to_string(), days.to_string())),
            )
            .chain(
                switches
                    .into_iter()
                    .filter(|(_, on)| *on)
                    .map(|(key, _)| (key.to_string(), "true".to_string())),
            )
            .collect()
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Yaml,
    Json,
    Html,
    Text,
    Markdown,
}

impl From<Format> for MediaType {
    fn from(format: Format) -> Self {
        match format {
            Format::Yaml => MediaType::Yaml,
            Format::Json => MediaType::Json,
            Format::Html => MediaType::Html,
            Format::Text => MediaType::Text,
            Format::Markdown => MediaType::Markdown,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve(args) => run_serve(args).map_err(|e| {
            eprintln!("Error: {:#}", e);
            3u8
        }),
        Commands::Diff(args) => run_compare(Operation::Diff, &args),
        Commands::Breaking(args) => run_compare(Operation::BreakingChanges, &args),
        Commands::Changelog(args) => run_compare(Operation::Changelog, &args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn run_serve(args: ServeArgs) -> anyhow::Result<()> {
    logging::init();

    let telemetry: Arc<dyn TelemetrySender> = match args.telemetry_url {
        Some(url) => Arc::new(HttpCollector::new(url)),
        None => Arc::new(Disabled),
    };
    let handler = Handler::new(Arc::new(OpenApiComparator), telemetry);
    let config = ServerConfig {
        addr: args.addr,
        docs_dir: args.docs_dir,
    };

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime
        .block_on(serve(config, handler))
        .with_context(|| format!("server on {} failed", args.addr))
}

fn run_compare(operation: Operation, args: &CompareArgs) -> Result<(), u8> {
    let fail = |e: PipelineError| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    };

    let base = SpecSource::from_location(&args.base).map_err(|e| fail(e.into()))?;
    let revision = SpecSource::from_location(&args.revision).map_err(|e| fail(e.into()))?;
    let sources = SourcePair::new(base, revision);

    let handler = Handler::new(Arc::new(OpenApiComparator), Arc::new(Disabled));
    let request = RenderRequest::new(args.format.into(), &args.lang);
    let config = ComparisonConfig::from_params(&args.params());
    let ctx = CheckContext::now(config.deprecation_days);

    let report = handler
        .evaluate(operation, config, &sources, &ctx, request.media_type)
        .map_err(fail)?;
    let mut body = handler
        .renderer()
        .render(&report, &request)
        .map_err(|e| fail(e.into()))?;
    if !body.ends_with(b"\n") {
        body.push(b'\n');
    }

    std::io::stdout().write_all(&body).map_err(|e| {
        eprintln!("Error writing output: {}", e);
        3u8
    })?;

    if report.has_breaking_changes() {
        Err(1)
    } else {
        Ok(())
    }
}
