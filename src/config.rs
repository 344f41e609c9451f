//! Startup configuration, loaded once from a YAML file named by the
//! `DNSUP_CONFIG` environment variable. Mirrors the keyword arguments
//! `original_source`'s `Server`/`DnsFrontend`/`HttpFrontend`/
//! `MemoryBackend` constructors take.

use std::net::SocketAddr;

use serde::Deserialize;

use crate::error::Result;

pub const BASE_CONFIG_FILE: &str = "/etc/dnsup/config.yaml";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub dns: DnsConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default = "default_minimum_ttl")]
    pub minimum_ttl: u32,
    #[serde(default = "default_ttl")]
    pub default_ttl: u32,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub zones: Vec<ZoneConfig>,
    #[serde(default)]
    pub keys: Vec<KeyConfig>,
}

impl TryFrom<&[u8]> for Config {
    type Error = crate::error::Error;

    fn try_from(value: &[u8]) -> Result<Self> {
        Ok(serde_yaml::from_slice(value)?)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DnsConfig {
    #[serde(default = "default_dns_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_true")]
    pub enable_udp: bool,
    #[serde(default = "default_true")]
    pub enable_tcp: bool,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_dns_bind_addr(),
            enable_udp: true,
            enable_tcp: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_http_bind_addr")]
    pub bind_addr: SocketAddr,
    #[serde(default = "default_http_prefix")]
    pub prefix: String,
    #[serde(default = "default_true")]
    pub enable_json_api: bool,
    #[serde(default = "default_true")]
    pub enable_simple_api: bool,
    #[serde(default)]
    pub enable_welcome: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_http_bind_addr(),
            prefix: default_http_prefix(),
            enable_json_api: true,
            enable_simple_api: true,
            enable_welcome: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ZoneConfig {
    pub name: String,
    pub hostname: String,
    #[serde(default)]
    pub serial: u32,
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KeyConfig {
    pub name: String,
    /// Base64-encoded shared secret, same encoding `tsig-keygen`/BIND use.
    pub secret: String,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    pub zones: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct LogConfig {
    #[serde(deserialize_with = "de_level_filter", default = "default_log_level")]
    pub level: log::LevelFilter,
    #[serde(default)]
    pub color: bool,
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: log::LevelFilter::Info,
            color: false,
            enable_metrics: true,
        }
    }
}

fn de_level_filter<'de, D>(deserializer: D) -> std::result::Result<log::LevelFilter, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: LevelFilter = Deserialize::deserialize(deserializer)?;
    Ok(match s {
        LevelFilter::Off => log::LevelFilter::Off,
        LevelFilter::Error => log::LevelFilter::Error,
        LevelFilter::Warn => log::LevelFilter::Warn,
        LevelFilter::Info => log::LevelFilter::Info,
        LevelFilter::Debug => log::LevelFilter::Debug,
        LevelFilter::Trace => log::LevelFilter::Trace,
    })
}

#[derive(Debug, Deserialize)]
enum LevelFilter {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn default_dns_bind_addr() -> SocketAddr {
    "0.0.0.0:8053".parse().expect("static bind addr is valid")
}

fn default_http_bind_addr() -> SocketAddr {
    "0.0.0.0:5380".parse().expect("static bind addr is valid")
}

fn default_http_prefix() -> String {
    "/dnsup".to_string()
}

fn default_true() -> bool {
    true
}

fn default_minimum_ttl() -> u32 {
    120
}

fn default_ttl() -> u32 {
    300
}

fn default_algorithm() -> String {
    "hmac-sha256".to_string()
}

fn default_log_level() -> log::LevelFilter {
    log::LevelFilter::Info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let yaml = b"zones: []\nkeys: []\n";
        let config = Config::try_from(&yaml[..]).unwrap();
        assert_eq!(config.minimum_ttl, 120);
        assert!(config.dns.enable_udp);
        assert!(config.http.enable_json_api);
    }

    #[test]
    fn full_config_parses() {
        let yaml = br#"
dns:
  bind_addr: "127.0.0.1:5300"
  enable_tcp: true
  enable_udp: true
http:
  bind_addr: "127.0.0.1:8080"
  enable_json_api: true
  enable_simple_api: false
minimum_ttl: 60
default_ttl: 300
log:
  level: debug
  color: true
zones:
  - name: example.com
    hostname: ns1.example.com
    serial: 1
    ttl: 300
keys:
  - name: update-key
    secret: c2VjcmV0
    algorithm: hmac-sha256
    zones: [example.com]
"#;
        let config = Config::try_from(&yaml[..]).unwrap();
        assert_eq!(config.zones.len(), 1);
        assert_eq!(config.keys[0].name, "update-key");
        assert!(!config.http.enable_simple_api);
        assert!(matches!(config.log.level, log::LevelFilter::Debug));
    }
}
