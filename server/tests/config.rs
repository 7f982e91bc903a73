//! Configuration parsing tests.

use server::config::{Config, LogFormat, RelayMode};
use std::io::Write;

#[test]
fn test_full_config() {
    let config: Config = toml::from_str(
        r#"
        [relay]
        listen = "0.0.0.0:9000"
        mode = "broadcast"

        [kernel]
        backlog = 64
        nodelay = false
        read_buffer_size = 4096
        event_capacity = 128
        poll_capacity = 256

        [metrics]
        enabled = false
        address = "127.0.0.1:9191"

        [logging]
        level = "debug"
        format = "json"
        timestamps = false
        thread_names = true
        target = false
        "#,
    )
    .unwrap();

    assert_eq!(config.relay.listen, "0.0.0.0:9000".parse().unwrap());
    assert_eq!(config.relay.mode, RelayMode::Broadcast);
    assert_eq!(config.kernel.backlog, 64);
    assert!(!config.kernel.nodelay);
    assert_eq!(config.kernel.read_buffer_size, 4096);
    assert_eq!(config.kernel.event_capacity, 128);
    assert_eq!(config.kernel.poll_capacity, 256);
    assert!(!config.metrics.enabled);
    assert_eq!(config.metrics.address, "127.0.0.1:9191".parse().unwrap());
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.format, LogFormat::Json);
    assert!(!config.logging.timestamps);
    assert!(config.logging.thread_names);
    assert!(!config.logging.target);
    config.validate().unwrap();
}

#[test]
fn test_unknown_fields_rejected() {
    assert!(toml::from_str::<Config>("[relay]\nport = 7000\n").is_err());
    assert!(toml::from_str::<Config>("[kernel]\nthreads = 4\n").is_err());
    assert!(toml::from_str::<Config>("[cache]\n").is_err());
    assert!(toml::from_str::<Config>("[metrics]\nport = 9090\n").is_err());
}

#[test]
fn test_unknown_mode_rejected() {
    assert!(toml::from_str::<Config>("[relay]\nmode = \"multicast\"\n").is_err());
}

#[test]
fn test_load_from_file() {
    let path = std::env::temp_dir().join(format!("relay-config-{}.toml", std::process::id()));
    {
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[relay]\nmode = \"broadcast\"").unwrap();
    }

    let config = Config::load(&path).unwrap();
    assert_eq!(config.relay.mode, RelayMode::Broadcast);

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_load_rejects_invalid() {
    let path = std::env::temp_dir().join(format!("relay-invalid-{}.toml", std::process::id()));
    std::fs::write(&path, "[kernel]\nevent_capacity = 0\n").unwrap();

    assert!(Config::load(&path).is_err());

    std::fs::remove_file(&path).unwrap();
}
