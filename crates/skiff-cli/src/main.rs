//! Skiff CLI
//!
//! Point-to-point secure file transfer.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use skiff_cli::config::Config;
use skiff_cli::progress::{TransferProgress, format_bytes, format_duration, format_speed};
use skiff_core::{Server, ServerConfig, client};

/// Skiff - send files to a peer over an encrypted TCP session
#[derive(Parser)]
#[command(name = "skiff")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send files to a receiving peer, in order, over one session
    Send {
        /// Files to send
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Receiver address (host:port)
        #[arg(long)]
        to: String,
    },

    /// Accept sessions and write received files
    Receive {
        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Listen address
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig { force } = cli.command {
        let path = cli.config.unwrap_or_else(Config::default_path);
        return init_config(path, force);
    }

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_default()?,
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose {
            "debug"
        } else {
            config.logging.level.as_str()
        })
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    config.validate()?;

    match cli.command {
        Commands::Send { files, to } => {
            send_files(files, to, &config).await?;
        }
        Commands::Receive { output, bind } => {
            receive_files(output, bind, &config).await?;
        }
        Commands::InitConfig { .. } => {}
    }

    Ok(())
}

/// Send files to a receiver over one session
async fn send_files(files: Vec<PathBuf>, to: String, config: &Config) -> anyhow::Result<()> {
    // Every file must exist before the session starts
    for file in &files {
        if !file.is_file() {
            anyhow::bail!("File not found: {}", file.display());
        }
    }

    let session_config = Arc::new(config.session_config()?);
    tracing::info!(
        files = files.len(),
        to = %to,
        prime_bits = session_config.dh.bits(),
        "Sending"
    );

    let mut session = client::connect(to.as_str(), session_config)
        .await
        .with_context(|| format!("Failed to establish a session with {to}"))?;

    println!("Connected to: {to}");
    println!("Session key fingerprint: {}", session.session_key().fingerprint());

    let start = Instant::now();
    let mut total_bytes = 0;

    for file in &files {
        let size = tokio::fs::metadata(file).await?.len();
        let name = file
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("No usable file name in {}", file.display()))?;

        let source = tokio::fs::File::open(file)
            .await
            .with_context(|| format!("Failed to open {}", file.display()))?;

        let progress = TransferProgress::new(size, name);
        let mut reader = progress.wrap_async_read(source);

        match session.send_named(name, &mut reader).await {
            Ok(report) => {
                total_bytes += report.stats.plaintext_bytes;
                progress.finish_with_message(format!(
                    "Sent {name}: {} in {} records ({})",
                    format_bytes(report.stats.plaintext_bytes),
                    report.stats.records,
                    format_speed(report.throughput())
                ));
            }
            Err(e) => {
                progress.abandon();
                return Err(e).with_context(|| format!("Failed to send {}", file.display()));
            }
        }
    }

    session.finish().await?;

    println!(
        "Sent {} file(s), {} in {}",
        files.len(),
        format_bytes(total_bytes),
        format_duration(start.elapsed())
    );

    Ok(())
}

/// Receive files until interrupted
async fn receive_files(
    output: Option<PathBuf>,
    bind: Option<String>,
    config: &Config,
) -> anyhow::Result<()> {
    let output = output.unwrap_or_else(|| config.receive.output_dir.clone());
    let bind = bind.unwrap_or_else(|| config.network.listen_addr.clone());

    if !output.exists() {
        std::fs::create_dir_all(&output)
            .with_context(|| format!("Failed to create {}", output.display()))?;
    }

    let server_config = ServerConfig::new(config.session_config()?, &output);
    let server = Server::bind(bind.as_str(), server_config)
        .await
        .with_context(|| format!("Failed to listen on {bind}"))?;

    println!("Output directory: {}", output.display());
    println!("Listening on: {}", server.local_addr()?);
    println!(
        "Chunk size: {}",
        format_bytes(config.protocol.chunk_size as u64)
    );
    println!("Press Ctrl+C to stop");

    tokio::select! {
        () = server.run() => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            println!("\nShutting down...");
        }
    }

    Ok(())
}

/// Write the default configuration
fn init_config(path: PathBuf, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }

    Config::default().save(&path)?;
    println!("Configuration written to: {}", path.display());

    Ok(())
}
