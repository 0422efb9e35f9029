//! Command-line entry point: parses arguments, sets up logging, and hands
//! off to the accept loop (or the inetd single-session path).

use std::path::PathBuf;

use clap::Parser;

use rwhoisd_rs::listener::{self, ListenOptions};

/// RWhois-style directory service daemon.
#[derive(Debug, Parser)]
#[command(name = "rwhoisd", version, about = "RWhois directory service daemon")]
struct Cli {
    /// Path to the main configuration file.
    #[arg(short = 'c', long = "config", default_value = "rwhoisd.conf")]
    config: PathBuf,

    /// Vendor string reported in the session banner.
    #[arg(long = "vendor", default_value = "rwhoisd-rs")]
    vendor: String,

    /// Stay attached to the controlling terminal instead of running as a
    /// standalone accept-loop daemon (no detach/fork is performed either
    /// way; this only affects logging defaults).
    #[arg(short = 'f', long = "foreground")]
    foreground: bool,

    /// Serve exactly one session over the inherited stdin socket, for
    /// inetd/xinetd-style superservers, instead of binding and accepting.
    #[arg(long = "inetd")]
    inetd: bool,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    init_logging(cli.foreground);

    let options = ListenOptions { config_path: cli.config, vendor: cli.vendor, foreground: cli.foreground };

    let result = if cli.inetd {
        #[cfg(unix)]
        {
            listener::serve_inetd(options).await
        }
        #[cfg(not(unix))]
        {
            tracing::error!("--inetd is only supported on unix targets");
            Err(std::io::Error::other("--inetd requires unix"))
        }
    } else {
        listener::serve(options).await
    };

    match result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "exiting on fatal error");
            std::process::ExitCode::FAILURE
        }
    }
}

/// Installs a `tracing` subscriber honoring `RUST_LOG`, falling back to
/// `info` level (or `debug` when running in the foreground).
fn init_logging(foreground: bool) {
    let default_level = if foreground { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}
