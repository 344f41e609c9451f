//! The RFC 2136 front-end: UDP + TCP listeners, TSIG verification, the
//! per-message state machine in spec section 4.4, and SOA zone discovery.
//! Built on the same `domain::net::server` stack the teacher's own
//! zone-file server uses (`DgramServer`/`StreamServer`, `Service`), with
//! the zone-transfer/ordinary-query handling it exists for trimmed away:
//! this front-end answers only SOA discovery queries and UPDATE requests.

mod update;

use core::future::{ready, Future};
use core::pin::Pin;
use core::str::FromStr;

use std::sync::Arc;

use bytes::Bytes;
use domain::base::iana::{Opcode, Rcode};
use domain::base::message_builder::AdditionalBuilder;
use domain::base::{Message, Name, Serial, Ttl};
use domain::net::server::buf::VecBufSource;
use domain::net::server::dgram::DgramServer;
use domain::net::server::message::Request;
use domain::net::server::service::{CallResult, Service, ServiceResult};
use domain::net::server::stream::StreamServer;
use domain::net::server::util::mk_builder_for_target;
use domain::rdata::tsig::Time48;
use domain::rdata::Soa;
use domain::tsig::ServerTransaction;
use futures::stream::{once, Stream};
use tokio::net::{TcpListener, UdpSocket};

use crate::backend::Backend;
use crate::config::DnsConfig;
use crate::engine::UpdateEngine;
use crate::error::{Error, Result};
use crate::key::KeyRing;
use crate::metric::{self, Counters};
use crate::record::UpdateOp;

/// Everything the DNS front-end needs to answer a request: the backend (for
/// zone/key lookup) and the update engine (for UPDATE requests). Cheap to
/// clone; both fields are already `Arc`.
#[derive(Clone)]
pub struct DnsFrontend {
    backend: Arc<dyn Backend>,
    engine: Arc<UpdateEngine>,
    stats: Arc<Counters>,
    enable_metrics: bool,
}

impl DnsFrontend {
    pub fn new(backend: Arc<dyn Backend>, engine: Arc<UpdateEngine>, enable_metrics: bool) -> Self {
        Self {
            backend,
            engine,
            stats: Arc::new(Counters::default()),
            enable_metrics,
        }
    }

    /// Bind UDP and/or TCP per `config` and run both listeners until the
    /// process shuts down. Each accepted connection/datagram is handled by
    /// its own task, per spec section 5's concurrency contract.
    pub async fn run(self: Arc<Self>, config: &DnsConfig) -> Result<()> {
        if self.enable_metrics {
            tokio::spawn(metric::log_periodically("dns", self.stats.clone()));
        }

        let svc = self;

        if config.enable_udp {
            let sock = UdpSocket::bind(config.bind_addr).await?;
            log::info!(target: "dns", "listening for UDP updates on {}", config.bind_addr);
            let sock = Arc::new(sock);
            let srv = DgramServer::new(sock, VecBufSource, svc.clone());
            tokio::spawn(async move { srv.run().await });
        }

        if config.enable_tcp {
            let sock = TcpListener::bind(config.bind_addr).await?;
            log::info!(target: "dns", "listening for TCP updates on {}", config.bind_addr);
            let srv = StreamServer::new(sock, VecBufSource, svc.clone());
            tokio::spawn(async move { srv.run().await });
        }

        Ok(())
    }

    async fn handle(&self, request: Request<Vec<u8>>) -> ServiceResult<Vec<u8>> {
        let mut wire = request.message().clone();

        let mut additional = match wire.header().opcode() {
            Opcode::QUERY => {
                let decoded = Message::from_octets(Bytes::copy_from_slice(wire.as_slice()))
                    .expect("re-decoding an already-parsed message cannot fail");
                self.handle_query(&wire, &decoded).await
            }
            Opcode::UPDATE => {
                let mutable = Arc::make_mut(&mut wire);
                self.handle_update(mutable).await
            }
            _ => self.plain_response(&wire, Rcode::NOTIMP),
        };

        self.stats.record(additional.header_mut().rcode() == Rcode::NOERROR);

        Ok(CallResult::new(additional))
    }

    /// Zone discovery: the only query this service answers, per spec
    /// section 1 ("answering normal DNS queries is not a goal"; only SOA
    /// discovery is served so `nsupdate` can find the zone).
    async fn handle_query(
        &self,
        wire: &Message<Vec<u8>>,
        message: &Message<Bytes>,
    ) -> AdditionalBuilder<domain::base::StreamTarget<Vec<u8>>> {
        let question = match message.sole_question() {
            Ok(q) if q.qtype() == domain::base::Rtype::SOA => q,
            _ => return self.plain_response(wire, Rcode::NOTIMP),
        };

        let qname = question.qname().to_string();
        let qname = qname.trim_end_matches('.').to_ascii_lowercase();

        let zones = match self.backend.get_all_zones().await {
            Ok(zones) => zones,
            Err(e) => {
                log::error!(target: "dns", "backend error during zone discovery: {e}");
                return self.plain_response(wire, Rcode::SERVFAIL);
            }
        };

        let Some(zone) = zones.get(&qname) else {
            return self.plain_response(wire, Rcode::NXDOMAIN);
        };

        let (owner, soa) = match build_soa(&qname, zone) {
            Ok(pair) => pair,
            Err(e) => {
                log::error!(target: "dns", "failed to build SOA reply for {qname}: {e}");
                return self.plain_response(wire, Rcode::SERVFAIL);
            }
        };

        let builder = mk_builder_for_target();
        let mut answer = match builder.start_answer(wire, Rcode::NOERROR) {
            Ok(a) => a,
            Err(_) => return self.plain_response(wire, Rcode::SERVFAIL),
        };
        if answer.push((owner, Ttl::from_secs(zone.ttl), soa)).is_err() {
            return self.plain_response(wire, Rcode::SERVFAIL);
        }
        let mut additional = answer.additional();
        additional.header_mut().set_aa(true);
        additional
    }

    /// The UPDATE state machine from spec section 4.4: TSIG, then
    /// prerequisites, then decode, then the engine, in that order.
    ///
    /// TSIG verification happens on the original `Vec<u8>`-backed message,
    /// the same way `ServerTransaction::request` is driven in the teacher's
    /// rfc2136/tsig middleware; a separate `Bytes`-backed decode of the same
    /// wire bytes is used for walking the update section, since
    /// `AllRecordData` parsing wants `Bytes`-compatible octets.
    async fn handle_update(&self, wire: &mut Message<Vec<u8>>) -> AdditionalBuilder<domain::base::StreamTarget<Vec<u8>>> {
        let keys = match self.backend.get_all_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                log::error!(target: "dns", "backend error building tsig ring: {e}");
                return self.plain_response(wire, Rcode::SERVFAIL);
            }
        };
        let ring = KeyRing::from_keys(keys);

        let transaction = match ServerTransaction::request::<KeyRing, Vec<u8>>(&ring, wire, Time48::now()) {
            Ok(Some(t)) => t,
            Ok(None) => {
                log::warn!(target: "tsig", "update rejected: no tsig present");
                return self.plain_response(wire, Rcode::REFUSED);
            }
            Err(e) => {
                log::warn!(target: "tsig", "update rejected: tsig verification failed: {e}");
                return self.plain_response(wire, Rcode::REFUSED);
            }
        };

        let key_name = transaction.key().name().to_string();
        let key_name = key_name.trim_end_matches('.').to_ascii_lowercase();

        let decoded = Message::from_octets(Bytes::copy_from_slice(wire.as_slice()))
            .expect("re-decoding an already-parsed message cannot fail");

        let question = match decoded.sole_question() {
            Ok(q) => q,
            Err(_) => return self.plain_response(wire, Rcode::FORMERR),
        };
        let zone = question.qname().to_string();
        let zone = zone.trim_end_matches('.').to_ascii_lowercase();

        let rcode = self.run_update(&decoded, &zone, &key_name).await;

        let builder = mk_builder_for_target();
        let answer = match builder.start_answer(wire, rcode) {
            Ok(a) => a,
            Err(_) => return self.plain_response(wire, Rcode::SERVFAIL),
        };
        let mut additional = answer.additional();
        if transaction.answer(&mut additional, Time48::now()).is_err() {
            log::warn!(target: "tsig", "failed to sign update response for key {key_name}");
        }
        additional
    }

    async fn run_update(&self, message: &Message<Bytes>, zone: &str, key_name: &str) -> Rcode {
        match self.backend.check_key_in_zone(key_name, zone).await {
            Ok(true) => {}
            Ok(false) => {
                log::warn!(target: "tsig", "key {key_name} is not bound to zone {zone}");
                return Rcode::REFUSED;
            }
            Err(e) => {
                log::error!(target: "dns", "backend error checking key scope: {e}");
                return Rcode::SERVFAIL;
            }
        }

        match message.answer() {
            Ok(mut prereqs) if prereqs.next().is_some() => {
                log::info!(target: "update", "rejecting update with a prerequisite section (unsupported)");
                return Rcode::NOTIMP;
            }
            Err(_) => return Rcode::FORMERR,
            _ => {}
        }

        let ops: Vec<UpdateOp> = match update::decode_update_section(message) {
            Ok(ops) => ops,
            Err(Error::Malformed(msg)) => {
                log::info!(target: "update", "malformed update section: {msg}");
                return Rcode::FORMERR;
            }
            Err(e) => {
                log::info!(target: "update", "update section rejected: {e}");
                return Rcode::NOTIMP;
            }
        };

        if ops.is_empty() {
            return Rcode::FORMERR;
        }

        match self.engine.apply(zone, &ops).await {
            Ok(_) => Rcode::NOERROR,
            Err(e) => {
                log::info!(target: "update", "update rejected for zone {zone}: {e}");
                e.to_rcode()
            }
        }
    }

    fn plain_response(&self, wire: &Message<Vec<u8>>, rcode: Rcode) -> AdditionalBuilder<domain::base::StreamTarget<Vec<u8>>> {
        let builder = mk_builder_for_target();
        match builder.start_answer(wire, rcode) {
            Ok(answer) => answer.additional(),
            Err(_) => {
                let builder = mk_builder_for_target();
                builder.start_answer(wire, Rcode::SERVFAIL).expect("servfail answer always fits").additional()
            }
        }
    }
}

fn build_soa(zone_name: &str, zone: &crate::backend::ZoneInfo) -> Result<(Name<Vec<u8>>, Soa<Name<Vec<u8>>>)> {
    let owner = Name::<Vec<u8>>::from_str(zone_name)?;
    let mname = Name::<Vec<u8>>::from_str(&zone.hostname)?;
    let rname = Name::<Vec<u8>>::from_str(".")?;
    let soa = Soa::new(
        mname,
        rname,
        Serial::from(zone.serial),
        Ttl::from_secs(zone.ttl),
        Ttl::from_secs(0),
        Ttl::from_secs(0),
        Ttl::from_secs(0),
    );
    Ok((owner, soa))
}

impl Service<Vec<u8>> for DnsFrontend {
    type Target = Vec<u8>;
    type Stream = Pin<Box<dyn Stream<Item = ServiceResult<Self::Target>> + Send>>;
    type Future = Pin<Box<dyn Future<Output = Self::Stream> + Send>>;

    fn call(&self, request: Request<Vec<u8>>) -> Self::Future {
        let front = self.clone();
        Box::pin(async move {
            let result = front.handle(request).await;
            Box::pin(once(ready(result))) as Self::Stream
        })
    }
}
