//! Relay server binary.

use clap::Parser;
use server::admin::{self, AdminConfig};
use server::banner::{BannerConfig, print_banner};
use server::config::Config;
use server::relay::Relay;
use server::{logging, signal};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "TCP echo / broadcast relay")]
struct Args {
    /// Path to configuration file
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,
}

fn main() {
    let args = Args::parse();

    if args.print_config {
        print_default_config();
        return;
    }

    let mut config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config: {}", e);
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    if let Some(listen) = args.listen {
        config.relay.listen = listen;
    }

    logging::init(&config.logging);

    let shutdown = match signal::install_signal_handler() {
        Ok(shutdown) => shutdown,
        Err(e) => {
            eprintln!("Failed to install signal handler: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config, shutdown) {
        tracing::error!(error = %e, "relay error");
        std::process::exit(1);
    }
}

fn run(config: Config, shutdown: Arc<AtomicBool>) -> Result<(), Box<dyn std::error::Error>> {
    let admin = if config.metrics.enabled {
        Some(admin::start(AdminConfig {
            address: config.metrics.address,
            shutdown: shutdown.clone(),
        })?)
    } else {
        None
    };

    let relay = Relay::start(&config)?;

    print_banner(&BannerConfig {
        version: env!("CARGO_PKG_VERSION"),
        mode: config.relay.mode,
        listen: relay.local_addr(),
        metrics: admin.as_ref().map(|admin| admin.local_addr()),
        kernel: &config.kernel,
    });

    let result = relay.run(shutdown);

    if let Some(admin) = admin {
        admin.shutdown();
    }

    Ok(result?)
}

fn print_default_config() {
    let config = r#"# Relay Configuration

[relay]
# Address to accept connections on
listen = "127.0.0.1:7000"
# "echo" sends bytes back to their sender,
# "broadcast" sends them to every other connection
mode = "echo"

[kernel]
# Listen backlog
backlog = 1024
# Set TCP_NODELAY on accepted connections
nodelay = true
# Size of the per-read buffer; bounds the size of each DataReceived event
read_buffer_size = 8192
# Capacity of the event queue between the selector and the relay
event_capacity = 65536
# Readiness events handled per poll
poll_capacity = 1024

[metrics]
# Serve /health, /ready and Prometheus-format /metrics over HTTP
enabled = true
address = "127.0.0.1:9090"

[logging]
# Log level: "error", "warn", "info", "debug", "trace"
# Can be overridden with RUST_LOG environment variable
level = "info"
# Log format: "pretty" (human-readable), "json", or "compact"
format = "pretty"
# Include timestamps
timestamps = true
# Include thread names
thread_names = false
# Include module target
target = true
"#;
    print!("{}", config);
}
