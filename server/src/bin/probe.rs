//! Send one message to a relay and print what comes back.

use clap::Parser;
use io_kernel::{Connector, ConnectorConfig, Error, ReadOutcome};
use server::config::LoggingConfig;
use server::logging;
use std::io::Write;
use std::net::SocketAddr;

#[derive(Parser)]
#[command(name = "probe")]
#[command(about = "Blocking TCP client for poking at a relay")]
struct Args {
    /// Relay address
    #[arg(default_value = "127.0.0.1:7000")]
    addr: SocketAddr,

    /// Message to send
    #[arg(short, long, default_value = "ping\r\n")]
    message: String,

    /// Stop after this many response bytes (default: length of the message)
    #[arg(short, long)]
    bytes: Option<usize>,

    /// Connect timeout in milliseconds
    #[arg(long, default_value_t = 1000)]
    connect_timeout_ms: u64,

    /// Read timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    read_timeout_ms: u64,
}

fn main() {
    let args = Args::parse();

    logging::init(&LoggingConfig {
        level: "warn".to_string(),
        ..Default::default()
    });

    if let Err(e) = run(&args) {
        eprintln!("probe failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Error> {
    let config = ConnectorConfig {
        connect_timeout_ms: Some(args.connect_timeout_ms),
        read_timeout_ms: Some(args.read_timeout_ms),
        ..Default::default()
    };

    let connector = Connector::connect(args.addr, &config)?;
    connector.write(args.message.as_bytes())?;

    let want = args.bytes.unwrap_or(args.message.len());
    let mut received = Vec::with_capacity(want);
    let mut buf = [0u8; 4096];

    while received.len() < want {
        match connector.read(&mut buf)? {
            ReadOutcome::Bytes(n) => received.extend_from_slice(&buf[..n]),
            ReadOutcome::Eof | ReadOutcome::WouldBlock => break,
        }
    }

    connector.close()?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&received)?;
    stdout.flush()?;

    Ok(())
}
