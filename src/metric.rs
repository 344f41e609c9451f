//! Periodic traffic counters for both front-ends, logged on a timer the
//! way the teacher's `metric.rs`/`MetricsMiddlewareSvc` logs `ServerMetrics`
//! for its zone-file server. We don't have a zone-transfer connection pool
//! to report on, so the counters here are the simpler "how many requests,
//! how many of them failed" shape both front-ends can maintain themselves.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Default)]
pub struct Counters {
    requests: AtomicU64,
    rejected: AtomicU64,
}

impl Counters {
    pub fn record(&self, ok: bool) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.rejected.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl fmt::Display for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#reqs={} #rejected={}",
            self.requests.load(Ordering::Relaxed),
            self.rejected.load(Ordering::Relaxed)
        )
    }
}

/// Log `counters` under the `metrics` target every five seconds, matching
/// the teacher's `metric::log_svc` polling loop. The caller is expected to
/// `tokio::spawn` this and gate it on `log.enable_metrics`.
pub async fn log_periodically(name: &'static str, counters: std::sync::Arc<Counters>) {
    loop {
        tokio::time::sleep(Duration::from_millis(5000)).await;
        log::info!(target: "metrics", "{name}: {counters}");
    }
}
