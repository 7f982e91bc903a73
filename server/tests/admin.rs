//! Integration tests for the admin HTTP server.

use server::admin::{self, AdminConfig};
use server::config::Config;
use server::relay::Relay;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Issue a GET and return the status line and body.
fn http_get(addr: SocketAddr, path: &str) -> (String, String) {
    let mut stream = TcpStream::connect(addr).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    write!(
        stream,
        "GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n"
    )
    .unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();

    let (head, body) = response.split_once("\r\n\r\n").unwrap_or((&response, ""));
    let status = head.lines().next().unwrap_or_default().to_string();
    (status, body.to_string())
}

/// Value of an unlabelled sample in Prometheus text output.
fn sample(body: &str, name: &str) -> Option<u64> {
    body.lines()
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| {
            let (metric, value) = line.split_once(' ')?;
            (metric == name).then(|| value.trim().parse().ok())?
        })
}

fn start_admin(shutdown: Arc<AtomicBool>) -> admin::AdminHandle {
    admin::start(AdminConfig {
        address: "127.0.0.1:0".parse().unwrap(),
        shutdown,
    })
    .unwrap()
}

#[test]
fn test_health_and_ready() {
    let shutdown = Arc::new(AtomicBool::new(false));
    let handle = start_admin(shutdown.clone());
    let addr = handle.local_addr();

    let (status, body) = http_get(addr, "/health");
    assert!(status.contains("200"), "{status}");
    assert_eq!(body, "OK");

    let (status, _) = http_get(addr, "/ready");
    assert!(status.contains("200"), "{status}");

    shutdown.store(true, Ordering::SeqCst);
    let (status, _) = http_get(addr, "/ready");
    assert!(status.contains("503"), "{status}");

    handle.shutdown();
}

#[test]
fn test_metrics_reflect_relay_traffic() {
    let shutdown = Arc::new(AtomicBool::new(false));
    let handle = start_admin(shutdown.clone());

    let (_, before) = http_get(handle.local_addr(), "/metrics");
    let accepted_before = sample(&before, "kernel_endpoints_accepted").unwrap_or(0);
    let sent_before = sample(&before, "kernel_bytes_sent").unwrap_or(0);
    let messages_before = sample(&before, "relay_messages").unwrap_or(0);

    let config: Config = toml::from_str("[relay]\nlisten = \"127.0.0.1:0\"\n").unwrap();
    let relay = Relay::start(&config).unwrap();
    let relay_addr = relay.local_addr();
    let flag = shutdown.clone();
    let relay_thread = thread::spawn(move || relay.run(flag));

    let mut client = TcpStream::connect(relay_addr).unwrap();
    client
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    client.write_all(b"metered").unwrap();
    let mut echoed = [0u8; 7];
    client.read_exact(&mut echoed).unwrap();
    assert_eq!(&echoed, b"metered");

    let (status, after) = http_get(handle.local_addr(), "/metrics");
    assert!(status.contains("200"), "{status}");
    assert!(after.contains("# TYPE kernel_endpoints_accepted counter"));
    assert!(after.contains("# TYPE kernel_endpoints_active gauge"));

    assert!(sample(&after, "kernel_endpoints_accepted").unwrap() > accepted_before);
    assert!(sample(&after, "kernel_bytes_sent").unwrap() >= sent_before + 7);
    assert!(sample(&after, "relay_messages").unwrap() > messages_before);

    shutdown.store(true, Ordering::SeqCst);
    relay_thread.join().unwrap().unwrap();
    handle.shutdown();
}
