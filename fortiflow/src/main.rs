//! `fortiflow` command-line entry point.
//!
//! ```bash
//! FORTIFLOW_PASSWORD=secret fortiflow --host 192.168.1.99 --filter-type dport --option1 443
//! ```
//!
//! Tracing runs until Ctrl-C. The debug configuration is then cleared on
//! the device and the raw capture plus the report are written to
//! `--output-dir`. A run that cannot connect still writes both files, empty,
//! and exits with status 2.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};

use fortiflow::report::{ArtifactPaths, ArtifactWriter};
use fortiflow::transport::{HostKeyVerification, SshOptions, SshTransport};
use fortiflow::{
    CancelToken, FilterKind, FilterSpec, ReportFormat, SessionConfig, SessionController,
    SessionMeta, correlate, render,
};

#[derive(Parser, Debug)]
#[command(
    name = "fortiflow",
    version,
    about = "Capture a FortiGate flow trace over SSH and render a per-flow report"
)]
struct Cli {
    /// Device address
    #[arg(long, env = "FORTIFLOW_HOST")]
    host: String,

    /// SSH port
    #[arg(long, default_value_t = 22)]
    port: u16,

    /// Login name
    #[arg(long, short, env = "FORTIFLOW_USERNAME", default_value = "admin")]
    username: String,

    /// Login password
    #[arg(long, env = "FORTIFLOW_PASSWORD", hide_env_values = true)]
    password: String,

    /// Filter type: addr, saddr, daddr, port, sport, dport
    #[arg(long, short = 't')]
    filter_type: FilterKind,

    /// Host address or port, or the start of a range when --option2 is given
    #[arg(long)]
    option1: String,

    /// End of the address or port range
    #[arg(long)]
    option2: Option<String>,

    /// Packets to trace before the device stops on its own
    #[arg(long, default_value_t = 1000)]
    trace_count: u32,

    /// Trace polling interval in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,

    /// Seconds to wait for the connection and for each command prompt
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Host key policy
    #[arg(long, value_enum, default_value_t = HostKeys::AcceptNew)]
    host_keys: HostKeys,

    /// Custom known_hosts file
    #[arg(long)]
    known_hosts: Option<PathBuf>,

    /// Directory for the capture and report files
    #[arg(long, short, default_value = ".")]
    output_dir: PathBuf,

    /// Report format
    #[arg(long, value_enum, default_value_t = Format::Html)]
    format: Format,

    /// Do not echo trace output to the terminal
    #[arg(long, short)]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum HostKeys {
    Strict,
    AcceptNew,
    /// Lab use only
    Off,
}

impl From<HostKeys> for HostKeyVerification {
    fn from(value: HostKeys) -> Self {
        match value {
            HostKeys::Strict => HostKeyVerification::Strict,
            HostKeys::AcceptNew => HostKeyVerification::AcceptNew,
            HostKeys::Off => HostKeyVerification::Disabled,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Html,
    Json,
}

impl From<Format> for ReportFormat {
    fn from(value: Format) -> Self {
        match value {
            Format::Html => ReportFormat::Html,
            Format::Json => ReportFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let filter = FilterSpec::build(cli.filter_type, &cli.option1, cli.option2.as_deref())?;
    let meta = SessionMeta::new(&cli.host, &filter);

    let config = SessionConfig::builder(&cli.host)
        .port(cli.port)
        .username(&cli.username)
        .password(&cli.password)
        .filter(filter)
        .poll_interval(Duration::from_millis(cli.poll_ms))
        .trace_count(cli.trace_count)
        .build()?;

    let transport = SshTransport::new(SshOptions {
        timeout: Duration::from_secs(cli.timeout),
        host_key_verification: cli.host_keys.into(),
        known_hosts_path: cli.known_hosts.clone(),
        ..Default::default()
    })
    .context("compile prompt pattern")?;

    let mut controller = SessionController::new(transport, config);
    if !cli.quiet {
        controller = controller.with_echo(|chunk| {
            let mut out = io::stdout().lock();
            let _ = out.write_all(chunk.as_bytes());
            let _ = out.flush();
        });
    }

    let cancel = CancelToken::new();
    let stopper = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping trace");
        }
        stopper.cancel();
    });

    let writer = ArtifactWriter::new(&cli.output_dir, chrono::Local::now());
    let format = ReportFormat::from(cli.format);

    info!("trace will run until Ctrl-C");
    let outcome = match controller.run(&cancel).await {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("{} ({})", e, e.guidance());
            // Every run leaves its artifacts, even an empty one
            write_artifacts(&writer, "", &meta, format).await?;
            std::process::exit(2);
        }
    };

    for failed in outcome.failed_commands() {
        warn!("command failed: {}", failed.command);
    }
    info!("debugging disabled on {}", cli.host);

    let raw = outcome.capture.into_text();
    let (flows, paths) = write_artifacts(&writer, &raw, &meta, format).await?;

    println!(
        "{} flows from {} bytes; capture: {}, report: {}",
        flows,
        raw.len(),
        paths.capture.display(),
        paths.report.display()
    );

    Ok(())
}

/// Correlate `raw`, render it and write both artifacts. Returns the number
/// of flows found.
async fn write_artifacts(
    writer: &ArtifactWriter,
    raw: &str,
    meta: &SessionMeta,
    format: ReportFormat,
) -> Result<(usize, ArtifactPaths)> {
    let result = correlate(raw);
    let report = render(&result, meta);
    for malformed in report.malformed() {
        warn!("{}", malformed);
    }

    tokio::fs::create_dir_all(writer.dir())
        .await
        .with_context(|| format!("create {}", writer.dir().display()))?;
    let paths = writer
        .write_all(raw, &report, format)
        .await
        .context("write artifacts")?;

    Ok((result.len(), paths))
}
