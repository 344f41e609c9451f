//! `GET /v1/simple`: the DynDNS-compatible route, per spec section 4.5.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;

use crate::error::Error;
use crate::record::{RecordData, RecordType, UpdateOp};

use super::auth;
use super::AppState;

#[derive(Debug, Deserialize)]
pub struct SimpleQuery {
    pub hostname: String,
    #[serde(default)]
    pub myip: Option<String>,
    #[serde(default)]
    pub myipv6: Option<String>,
    #[serde(default)]
    pub ttl: Option<u32>,
    #[serde(default)]
    pub offline: Option<u8>,
}

pub async fn handle_simple(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SimpleQuery>,
    headers: HeaderMap,
) -> (StatusCode, String) {
    match run_simple(&state, &headers, query).await {
        Ok(body) => (StatusCode::OK, body),
        Err(e @ (Error::Unauthenticated(_) | Error::Unauthorized(_))) => {
            log::info!(target: "http", "simple update auth failure: {e}");
            (StatusCode::FORBIDDEN, "badauth".to_string())
        }
        Err(e @ (Error::Malformed(_) | Error::PolicyRejected(_))) => {
            log::info!(target: "http", "simple update rejected: {e}");
            (StatusCode::BAD_REQUEST, String::new())
        }
        Err(e) => {
            log::error!(target: "http", "simple update failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "911".to_string())
        }
    }
}

async fn run_simple(state: &AppState, headers: &HeaderMap, query: SimpleQuery) -> Result<String, Error> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::unauthenticated("missing basic auth header"))?;
    let (zone, secret) = auth::parse_basic_auth(auth_header)?;

    let keys = state.backend.get_keys(&zone).await?;
    auth::find_key_by_secret(&keys, &secret).ok_or_else(|| Error::unauthorized("secret does not match zone"))?;

    let ttl = query.ttl.unwrap_or(state.default_ttl);
    let (v4, v6) = split_addresses(query.offline.unwrap_or(0) == 1, query.myip.as_deref(), query.myipv6.as_deref())?;

    let hostnames: Vec<&str> = query.hostname.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    if hostnames.is_empty() {
        return Err(Error::malformed("hostname is required"));
    }

    let mut ops = Vec::new();
    for hostname in &hostnames {
        push_family_ops(&mut ops, hostname, RecordType::A, ttl, &v4);
        push_family_ops(&mut ops, hostname, RecordType::Aaaa, ttl, &v6);
    }

    state.engine.apply(&zone, &ops).await?;

    let lines: Vec<String> = hostnames
        .iter()
        .map(|_| {
            let mut addrs: Vec<String> = v4.iter().map(Ipv4Addr::to_string).collect();
            addrs.extend(v6.iter().map(Ipv6Addr::to_string));
            format!("good {}", addrs.join(","))
        })
        .collect();

    Ok(lines.join("\n"))
}

fn push_family_ops(ops: &mut Vec<UpdateOp>, hostname: &str, rtype: RecordType, ttl: u32, addrs: &[IpAddr]) {
    let owner = hostname.trim_end_matches('.').to_ascii_lowercase();
    let matching: Vec<&IpAddr> = addrs.iter().filter(|a| family_matches(a, rtype)).collect();
    if matching.is_empty() {
        ops.push(UpdateOp::DeleteRRset { owner, rtype });
        return;
    }
    for addr in matching {
        let data = match addr {
            IpAddr::V4(v4) => RecordData::A(*v4),
            IpAddr::V6(v6) => RecordData::Aaaa(*v6),
        };
        ops.push(UpdateOp::AddToRRset { owner: owner.clone(), rtype, ttl, data });
    }
}

fn family_matches(addr: &IpAddr, rtype: RecordType) -> bool {
    matches!((addr, rtype), (IpAddr::V4(_), RecordType::A) | (IpAddr::V6(_), RecordType::Aaaa))
}

/// Parses `myip`/`myipv6` into typed address lists. `offline=1` clears
/// both regardless of what was supplied. When `myipv6` is absent, any
/// `:`-containing entry in `myip` is promoted into the v6 list, matching
/// the original's lenient single-parameter client convention.
fn split_addresses(offline: bool, myip: Option<&str>, myipv6: Option<&str>) -> Result<(Vec<IpAddr>, Vec<IpAddr>), Error> {
    if offline {
        return Ok((Vec::new(), Vec::new()));
    }

    let mut v4 = Vec::new();
    let mut v6 = Vec::new();

    if let Some(myip) = myip {
        for entry in myip.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if entry.contains(':') && myipv6.is_none() {
                v6.push(parse_addr(entry)?);
            } else {
                v4.push(parse_addr(entry)?);
            }
        }
    }

    if let Some(myipv6) = myipv6 {
        for entry in myipv6.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            v6.push(parse_addr(entry)?);
        }
    }

    Ok((v4, v6))
}

fn parse_addr(s: &str) -> Result<IpAddr, Error> {
    s.parse().map_err(|_| Error::malformed(format!("invalid IP address: {s}")))
}
