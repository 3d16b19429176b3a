//! Refract CLI

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use http::header::{HeaderName, CONTENT_ENCODING};
use http::{HeaderValue, Method, StatusCode, Uri};
use refract_config::load_config;
use refract_core::{RequestHead, ResponseHead};
use refract_pipeline::{ResponsePipeline, ResponseSink, WriterSink};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const READ_CHUNK: usize = 8 * 1024;

#[derive(Parser)]
#[command(name = "refract")]
#[command(about = "Rewrite HTTP response bodies with a rules file", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a captured response body through the rules
    Apply {
        /// Path to rules file
        #[arg(short, long, env = "REFRACT_RULES")]
        rules: PathBuf,

        /// Request path the response belongs to
        #[arg(long, default_value = "/")]
        path: String,

        /// Request method
        #[arg(long, default_value = "GET")]
        method: String,

        /// Response status
        #[arg(long, default_value_t = 200)]
        status: u16,

        /// Response content-encoding (gzip, deflate)
        #[arg(short, long)]
        encoding: Option<String>,

        /// Extra response header, NAME:VALUE
        #[arg(long = "header", value_name = "NAME:VALUE")]
        headers: Vec<String>,

        /// Output file (stdout when absent)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Log level (trace, debug, info, warn, error)
        #[arg(short, long, default_value = "warn")]
        log_level: String,

        /// Captured body (`-` for stdin)
        input: PathBuf,
    },

    /// Validate a rules file
    Validate {
        /// Path to rules file
        #[arg(short, long, env = "REFRACT_RULES")]
        rules: PathBuf,
    },

    /// Show version information
    Version,
}

/// What the response under test looks like
struct ApplyArgs {
    path: String,
    method: String,
    status: u16,
    encoding: Option<String>,
    headers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Apply {
            rules,
            path,
            method,
            status,
            encoding,
            headers,
            output,
            log_level,
            input,
        } => {
            init_tracing(&log_level)?;

            let args = ApplyArgs {
                path,
                method,
                status,
                encoding,
                headers,
            };
            let reader = open_input(&input).await?;
            let writer = open_output(output.as_deref()).await?;

            let written = apply(&rules, &args, reader, writer).await?;
            tracing::info!(bytes_in = written, "Body processed");
            Ok(())
        }

        Commands::Validate { rules } => {
            tracing_subscriber::fmt().with_target(false).init();

            tracing::info!("Validating rules: {}", rules.display());

            match load_config(&rules) {
                Ok(file) => {
                    tracing::info!("✓ Rules file is valid");
                    for (index, rule) in file.rules.iter().enumerate() {
                        tracing::info!(
                            "  {}: {} replace, {} json",
                            rule.display_name(index),
                            rule.replace.len(),
                            rule.json.len()
                        );
                    }
                    Ok(())
                }
                Err(e) => {
                    tracing::error!("✗ Rules validation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Version => {
            println!("Refract");
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
            Ok(())
        }
    }
}

/// Push `reader` through the pipeline into `writer`; returns the input size
async fn apply<R, W>(rules: &Path, args: &ApplyArgs, mut reader: R, writer: W) -> Result<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let file = load_config(rules)
        .with_context(|| format!("Failed to load rules from {}", rules.display()))?;
    let pipeline = ResponsePipeline::from_rules(&file)?;

    let request = request_head(&args.path, &args.method)?;
    let response = response_head(args.status, args.encoding.as_deref(), &args.headers)?;

    let mut sink = pipeline.intercept(&response, &request, WriterSink::new(writer));
    tracing::debug!(rewritten = sink.is_rewritten(), "Response intercepted");

    let mut total = 0u64;
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut buf).await.context("Failed to read input")?;
        if n == 0 {
            break;
        }
        total += n as u64;
        sink.write(Bytes::copy_from_slice(&buf[..n])).await?;
    }
    sink.end().await?;

    Ok(total)
}

fn request_head(path: &str, method: &str) -> Result<RequestHead> {
    let uri: Uri = path
        .parse()
        .with_context(|| format!("Invalid request path: {path}"))?;
    let mut head = RequestHead::new(uri);
    head.method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid method: {method}"))?;
    Ok(head)
}

fn response_head(status: u16, encoding: Option<&str>, headers: &[String]) -> Result<ResponseHead> {
    let status = StatusCode::from_u16(status).context("Invalid status")?;
    let mut head = ResponseHead::new(status);

    for header in headers {
        let (name, value) = header
            .split_once(':')
            .with_context(|| format!("Header must be NAME:VALUE, got {header}"))?;
        head.headers.append(
            HeaderName::from_bytes(name.trim().as_bytes())?,
            HeaderValue::from_str(value.trim())?,
        );
    }

    if let Some(encoding) = encoding {
        head.headers
            .insert(CONTENT_ENCODING, HeaderValue::from_str(encoding)?);
    }

    Ok(head)
}

async fn open_input(path: &Path) -> Result<Box<dyn AsyncRead + Unpin + Send>> {
    if path == Path::new("-") {
        return Ok(Box::new(tokio::io::stdin()));
    }
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(Box::new(file))
}

async fn open_output(path: Option<&Path>) -> Result<Box<dyn AsyncWrite + Unpin + Send>> {
    match path {
        None => Ok(Box::new(tokio::io::stdout())),
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Ok(Box::new(file))
        }
    }
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::WARN,
    };

    // Bodies may go to stdout, so logs go to stderr.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true),
        )
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(filter.into()))
        .init();

    Ok(())
}
