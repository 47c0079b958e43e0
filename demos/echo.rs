//! Echo demo - a host page and a plugin exchanging calls.
//!
//! This demo shows:
//! - Building exchangers over an in-process hub
//! - Registering an `update` handler on the plugin side
//! - Calling it from the host and handling both success and failure
//!
//! # Running
//!
//! ```sh
//! RUST_LOG=msg_exchanger=debug cargo run --example echo
//! ```

use std::time::Duration;

use msg_exchanger::transport::MemoryHub;
use msg_exchanger::{Callback, Exchanger};
use serde_json::{json, Value};
use tracing_subscriber::EnvFilter;

/// Plugin side: echoes `update` messages back after a short delay,
/// failing on the message `"error"`.
fn plugin_update() -> Callback {
    Callback::new(|message: Value| async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        match message.as_str() {
            Some("error") => Err(json!("error")),
            Some(data) => Ok(json!(format!("echo:{}", data))),
            None => Ok(json!(format!("echo:{}", message))),
        }
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let hub = MemoryHub::new();
    let (host_port, host_inbox) = hub.connect("host");
    let (plugin_port, plugin_inbox) = hub.connect("plugin");

    let plugin = Exchanger::builder(plugin_port).default_target("host").build();
    plugin.on("update", plugin_update());
    plugin.init(plugin_inbox)?;

    let host = Exchanger::builder(host_port)
        .default_target("plugin")
        .call_timeout(Duration::from_secs(5))
        .build();
    host.init(host_inbox)?;

    for data in ["hello", "world", "error"] {
        match host.send("update", json!(data))?.await {
            Ok(reply) => println!("{} -> {}", data, reply),
            Err(e) => println!("{} -> failed: {}", data, e),
        }
    }

    host.uninit().await;
    plugin.uninit().await;
    Ok(())
}
