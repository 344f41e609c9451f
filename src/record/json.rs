//! JSON codec for the HTTP JSON API's update list, mirroring
//! `original_source`'s `records.rdata_from_json` / `rrset_from_json`.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::record::{RecordData, RecordType, UpdateOp};

/// One entry of the JSON API's `updates` array.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct JsonUpdate {
    pub op: JsonOp,
    pub dns_name: String,
    #[serde(rename = "type")]
    pub rtype: String,
    #[serde(default)]
    pub ttl: Option<u32>,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub priority: Option<u16>,
    #[serde(default)]
    pub weight: Option<u16>,
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JsonOp {
    Add,
    Delete,
}

fn hostname_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.)+[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?\.?$")
            .expect("static hostname regex is valid")
    })
}

/// Rejects anything that isn't a legal LDH hostname, matching the
/// original's reliance on `dns.name.from_text`'s syntax checking for
/// CNAME/MX/SRV targets.
pub fn is_valid_hostname(name: &str) -> bool {
    hostname_re().is_match(name)
}

impl JsonUpdate {
    /// Translate one JSON update entry into an `UpdateOp`, per RFC 2136
    /// section 2.5's class/TTL encoding (`deleting` is `ANY` when the
    /// type is ANY or no data was given, `NONE` otherwise).
    pub fn into_op(self) -> Result<UpdateOp, Error> {
        let owner = self.dns_name.trim_end_matches('.').to_ascii_lowercase();
        if owner.is_empty() {
            return Err(Error::malformed("dns_name must not be empty"));
        }

        match self.op {
            JsonOp::Delete if self.rtype.eq_ignore_ascii_case("ANY") => {
                Ok(UpdateOp::DeleteAllRRsets { owner })
            }
            JsonOp::Delete if self.data.is_none() => {
                let rtype: RecordType = self.rtype.parse()?;
                Ok(UpdateOp::DeleteRRset { owner, rtype })
            }
            JsonOp::Delete => {
                let rtype: RecordType = self.rtype.parse()?;
                let data = decode_data(rtype, &self)?;
                Ok(UpdateOp::DeleteFromRRset { owner, rtype, data })
            }
            JsonOp::Add => {
                let rtype: RecordType = self.rtype.parse()?;
                let ttl = self.ttl.ok_or_else(|| Error::malformed("ttl is required for op=add"))?;
                let data = decode_data(rtype, &self)?;
                Ok(UpdateOp::AddToRRset { owner, rtype, ttl, data })
            }
        }
    }

    /// Inverse of `into_op`, used to echo back the applied updates in the
    /// JSON API's response and in round-trip tests.
    pub fn from_op(op: &UpdateOp) -> Self {
        match op {
            UpdateOp::AddToRRset { owner, rtype, ttl, data } => {
                let (priority, weight, port, text) = encode_data(data);
                JsonUpdate {
                    op: JsonOp::Add,
                    dns_name: owner.clone(),
                    rtype: rtype.as_str().to_string(),
                    ttl: Some(*ttl),
                    data: text,
                    priority,
                    weight,
                    port,
                }
            }
            UpdateOp::DeleteFromRRset { owner, rtype, data } => {
                let (priority, weight, port, text) = encode_data(data);
                JsonUpdate {
                    op: JsonOp::Delete,
                    dns_name: owner.clone(),
                    rtype: rtype.as_str().to_string(),
                    ttl: None,
                    data: text,
                    priority,
                    weight,
                    port,
                }
            }
            UpdateOp::DeleteRRset { owner, rtype } => JsonUpdate {
                op: JsonOp::Delete,
                dns_name: owner.clone(),
                rtype: rtype.as_str().to_string(),
                ttl: None,
                data: None,
                priority: None,
                weight: None,
                port: None,
            },
            UpdateOp::DeleteAllRRsets { owner } => JsonUpdate {
                op: JsonOp::Delete,
                dns_name: owner.clone(),
                rtype: "ANY".to_string(),
                ttl: None,
                data: None,
                priority: None,
                weight: None,
                port: None,
            },
        }
    }
}

fn decode_data(rtype: RecordType, u: &JsonUpdate) -> Result<RecordData, Error> {
    let text = u
        .data
        .as_deref()
        .ok_or_else(|| Error::malformed(format!("data is required for type {rtype}")))?;
    match rtype {
        RecordType::A => {
            let addr: std::net::Ipv4Addr = text
                .parse()
                .map_err(|_| Error::malformed(format!("invalid A address: {text}")))?;
            Ok(RecordData::A(addr))
        }
        RecordType::Aaaa => {
            let addr: std::net::Ipv6Addr = text
                .parse()
                .map_err(|_| Error::malformed(format!("invalid AAAA address: {text}")))?;
            Ok(RecordData::Aaaa(addr))
        }
        RecordType::Cname => {
            if !is_valid_hostname(text) {
                return Err(Error::malformed(format!("invalid CNAME target: {text}")));
            }
            Ok(RecordData::Cname(text.trim_end_matches('.').to_string()))
        }
        RecordType::Mx => {
            if !is_valid_hostname(text) {
                return Err(Error::malformed(format!("invalid MX exchange: {text}")));
            }
            let preference = u.priority.ok_or_else(|| Error::malformed("priority is required for MX"))?;
            if preference == 0 {
                return Err(Error::malformed("MX priority must be positive"));
            }
            Ok(RecordData::Mx {
                preference,
                exchange: text.trim_end_matches('.').to_string(),
            })
        }
        RecordType::Srv => {
            if !is_valid_hostname(text) {
                return Err(Error::malformed(format!("invalid SRV target: {text}")));
            }
            let priority = u.priority.ok_or_else(|| Error::malformed("priority is required for SRV"))?;
            let weight = u.weight.ok_or_else(|| Error::malformed("weight is required for SRV"))?;
            let port = u.port.ok_or_else(|| Error::malformed("port is required for SRV"))?;
            Ok(RecordData::Srv {
                priority,
                weight,
                port,
                target: text.trim_end_matches('.').to_string(),
            })
        }
        RecordType::Txt => Ok(RecordData::Txt(vec![text.to_string()])),
    }
}

fn encode_data(data: &RecordData) -> (Option<u16>, Option<u16>, Option<u16>, Option<String>) {
    match data {
        RecordData::A(addr) => (None, None, None, Some(addr.to_string())),
        RecordData::Aaaa(addr) => (None, None, None, Some(addr.to_string())),
        RecordData::Cname(target) => (None, None, None, Some(target.clone())),
        RecordData::Mx { preference, exchange } => (Some(*preference), None, None, Some(exchange.clone())),
        RecordData::Srv { priority, weight, port, target } => {
            (Some(*priority), Some(*weight), Some(*port), Some(target.clone()))
        }
        RecordData::Txt(strings) => (None, None, None, Some(strings.join(""))),
    }
}
