//! VPN Check: tell whether this machine is routed through the authorized Wi-Fi network.

mod config;
mod descriptor;
mod detect;
mod network;
mod probe;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use config::Config;
use network::{Fetch, ReqwestFetcher};
use probe::{ProbeResult, ProbeSettings, Status};

#[derive(Parser, Debug)]
#[command(
    name = "vpn-check",
    about = "Check whether traffic leaves through the authorized Wi-Fi network",
    long_about = "Echoes the public IP, then loads a verification page that is only reachable as 'authorized' from the expected network. The page body is matched against two marker strings to decide success, denial, or an uncertain state."
)]
struct Cli {
    /// Verification page URL (overrides probe.target_url)
    #[arg(long, short = 't')]
    pub target_url: Option<String>,

    /// IP-echo endpoint returning JSON with an `origin` field
    #[arg(long)]
    pub echo_url: Option<String>,

    /// Echo request timeout in seconds
    #[arg(long)]
    pub echo_timeout: Option<u64>,

    /// Verification page request timeout in seconds
    #[arg(long)]
    pub target_timeout: Option<u64>,

    /// Text the page shows when access is authorized
    #[arg(long)]
    pub authorized_marker: Option<String>,

    /// Text the page shows when access is denied
    #[arg(long)]
    pub denied_marker: Option<String>,

    /// TOML config file with [probe] and [network] sections
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Print the result as JSON instead of the status block
    #[arg(long)]
    pub json: bool,

    /// Also print the expected network and VPN server parameters
    #[arg(long)]
    pub show_network: bool,

    /// Describe the current network as a [network] config section instead of checking
    #[arg(long)]
    pub detect: bool,
}

impl Cli {
    fn load_config(&self) -> anyhow::Result<Config> {
        let mut cfg = match self.config {
            Some(ref path) => Config::load_from(path)?,
            None => Config::default(),
        };
        let probe = &mut cfg.probe;
        if let Some(ref url) = self.target_url {
            probe.target_url = Some(url.clone());
        }
        if let Some(ref url) = self.echo_url {
            probe.echo_url = url.clone();
        }
        if let Some(secs) = self.echo_timeout {
            probe.echo_timeout_secs = secs;
        }
        if let Some(secs) = self.target_timeout {
            probe.target_timeout_secs = secs;
        }
        if let Some(ref marker) = self.authorized_marker {
            probe.authorized_marker = marker.clone();
        }
        if let Some(ref marker) = self.denied_marker {
            probe.denied_marker = marker.clone();
        }
        Ok(cfg)
    }
}

/// Exit code when the configuration is unusable and nothing was probed
const CONFIG_ERROR_EXIT: u8 = 3;

/// Exit code for a finished probe
fn exit_code(status: Status) -> ExitCode {
    match status {
        Status::Success => ExitCode::SUCCESS,
        Status::Error => ExitCode::from(1),
        Status::Warning => ExitCode::from(2),
    }
}

/// The completion hook: the final message goes to stdout, once
fn complete(message: String) {
    println!("{}", message);
}

fn render(result: &ProbeResult, json: bool) -> String {
    if json {
        report::format_json(result).unwrap_or_else(|e| {
            tracing::warn!("JSON rendering failed, using text: {}", e);
            report::format_result(result)
        })
    } else {
        report::format_result(result)
    }
}

/// Probe, render, and hand the message to `complete` exactly once
async fn run<F, C>(fetcher: &F, settings: &ProbeSettings, json: bool, complete: C) -> Status
where
    F: Fetch + ?Sized,
    C: FnOnce(String),
{
    let result = probe::probe(fetcher, settings).await;
    complete(render(&result, json));
    result.status
}

/// Load and validate configuration; on failure the error is reported through
/// `complete` like any other failed check
fn prepare<C>(cli: &Cli, complete: C) -> Option<(Config, ProbeSettings)>
where
    C: FnOnce(String),
{
    let prepared = cli.load_config().and_then(|cfg| {
        let settings = cfg.to_settings()?;
        Ok((cfg, settings))
    });
    match prepared {
        Ok(prepared) => Some(prepared),
        Err(e) => {
            tracing::error!("Configuration error: {:#}", e);
            complete(render(&ProbeResult::failed(format!("error: {}", e)), cli.json));
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let fetcher = ReqwestFetcher::new();

    if cli.detect {
        tracing::info!("Detecting current network parameters");
        let local_ip = detect::local_ipv4().await;
        let settings = detect::DetectSettings::default();
        let detected = detect::detect(&fetcher, &settings, local_ip).await;
        complete(detected.to_toml()?);
        return Ok(ExitCode::SUCCESS);
    }

    let Some((cfg, settings)) = prepare(&cli, complete) else {
        return Ok(ExitCode::from(CONFIG_ERROR_EXIT));
    };

    tracing::info!(
        "VPN check started, echo: {}, target: {}",
        settings.echo_url,
        settings.target_url
    );
    if cli.show_network {
        println!("{}\n{}\n", cfg.network, cfg.server);
    }

    let status = run(&fetcher, &settings, cli.json, complete).await;

    tracing::info!("Finished with status {:?}", status);
    Ok(exit_code(status))
}
