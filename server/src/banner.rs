//! Startup banner.

use crate::config::RelayMode;
use io_kernel::KernelConfig;
use std::fmt::Write;
use std::net::SocketAddr;

pub struct BannerConfig<'a> {
    pub version: &'a str,
    pub mode: RelayMode,
    /// The address actually bound, after port 0 has been resolved
    pub listen: SocketAddr,
    /// Admin address, when enabled
    pub metrics: Option<SocketAddr>,
    pub kernel: &'a KernelConfig,
}

/// Render the banner.
pub fn render_banner(config: &BannerConfig) -> String {
    let mut output = String::with_capacity(256);

    let name = "relay";
    let _ = writeln!(output, "{} v{}", name, config.version);
    let _ = writeln!(output, "{}", "=".repeat(name.len() + config.version.len() + 2));
    let _ = writeln!(output);

    let _ = writeln!(output, "Mode:        {}", config.mode.as_str());
    let _ = writeln!(output, "Listen:      {}", config.listen);
    if let Some(metrics) = config.metrics {
        let _ = writeln!(output, "Metrics:     {}", metrics);
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "Kernel:");
    let _ = writeln!(output, "  Backlog:      {}", config.kernel.backlog);
    let _ = writeln!(output, "  TCP_NODELAY:  {}", config.kernel.nodelay);
    let _ = writeln!(output, "  Read buffer:  {} bytes", config.kernel.read_buffer_size);
    let _ = writeln!(output, "  Event queue:  {}", config.kernel.event_capacity);

    output
}

/// Print the banner to stdout.
pub fn print_banner(config: &BannerConfig) {
    println!("{}", render_banner(config));
}
