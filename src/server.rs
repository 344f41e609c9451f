//! Server orchestrator: builds the configured front-ends over one shared
//! backend, runs them concurrently, and blocks until an operator
//! interrupt, matching the original's `Server.run()`/`KeyboardInterrupt`
//! handling and spec section 4.6.

use std::sync::Arc;

use crate::backend::Backend;
use crate::config::Config;
use crate::dns::DnsFrontend;
use crate::engine::UpdateEngine;
use crate::error::Result;
use crate::http::HttpFrontend;

/// Start every enabled front-end and wait for `ctrl_c`. Returns once the
/// operator interrupts the process; startup failures (bind errors, bad
/// config) propagate to the caller so `main` can exit non-zero.
pub async fn run(config: Config, backend: Arc<dyn Backend>) -> Result<()> {
    let engine = Arc::new(UpdateEngine::new(backend.clone(), config.minimum_ttl));

    let dns = Arc::new(DnsFrontend::new(backend.clone(), engine.clone(), config.log.enable_metrics));
    dns.run(&config.dns).await?;

    let http = HttpFrontend::new(backend, engine, config.default_ttl, config.log.enable_metrics);
    http.run(&config.http).await?;

    log::info!(target: "server", "dnsup is up");

    tokio::signal::ctrl_c().await?;
    log::info!(target: "server", "shutdown requested, exiting");

    Ok(())
}
