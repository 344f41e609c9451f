//! Dynamic DNS update daemon: RFC 2136 (TSIG, UDP/TCP) and HTTP (JSON +
//! DynDNS-style "simple") front-ends over a pluggable zone backend.
//!
//! Try updates such as:
//!
//!   nsupdate -k update.key <<EOF
//!   server 127.0.0.1 8053
//!   zone example.com
//!   update add www.example.com 300 A 192.0.2.1
//!   send
//!   EOF
//!
//!   curl -X POST localhost:5380/dnsup/v1/update -d '{"zone":"example.com",
//!     "key":"...","updates":[{"op":"add","dns_name":"www.example.com",
//!     "type":"A","ttl":300,"data":"192.0.2.1"}]}'

use std::process::exit;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::backend::memory::MemoryBackend;

mod backend;
mod config;
mod dns;
mod engine;
mod error;
mod http;
mod key;
mod logger;
mod metric;
mod record;
mod server;

#[tokio::main]
async fn main() {
    let config_path = std::env::var("DNSUP_CONFIG").unwrap_or_else(|_| config::BASE_CONFIG_FILE.into());
    let bytes = match std::fs::read(&config_path) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("failed to read config file at {config_path}: {e}");
            exit(1);
        }
    };
    let config = match config::Config::try_from(&bytes[..]) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("failed to parse config file at {config_path}: {e}");
            exit(1);
        }
    };

    logger::Logger::new()
        .with_level(config.log.level)
        .with_metrics(config.log.enable_metrics)
        .init()
        .expect("failed to initialize logger");

    let backend = Arc::new(build_backend(&config).await);

    if let Err(e) = server::run(config, backend).await {
        log::error!(target: "server", "fatal error: {e}");
        exit(1);
    }
}

async fn build_backend(config: &config::Config) -> MemoryBackend {
    let backend = MemoryBackend::new();

    for zone in &config.zones {
        backend
            .add_zone(backend::ZoneInfo {
                name: zone.name.trim_end_matches('.').to_ascii_lowercase(),
                hostname: zone.hostname.clone(),
                serial: zone.serial,
                ttl: zone.ttl,
            })
            .await;
    }

    for key in &config.keys {
        let secret = match STANDARD.decode(&key.secret) {
            Ok(s) => s,
            Err(e) => {
                log::warn!(target: "server", "skipping key {}: invalid base64 secret: {e}", key.name);
                continue;
            }
        };
        backend
            .add_key(backend::KeyInfo {
                name: key.name.trim_end_matches('.').to_ascii_lowercase(),
                secret,
                algorithm: key.algorithm.clone(),
                zones: key.zones.iter().map(|z| z.trim_end_matches('.').to_ascii_lowercase()).collect(),
            })
            .await;
    }

    backend
}
