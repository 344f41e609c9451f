//! The record model: the record kinds this service understands, and the
//! request/RRset shapes both front-ends translate into before they reach
//! the update engine.

pub mod json;
pub mod wire;

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// The record kinds this service knows how to decode, validate and apply.
/// SOA is not included here: it is never accepted in an update, only
/// synthesized to answer zone-discovery queries (see `dns::service`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    Aaaa,
    Cname,
    Mx,
    Srv,
    Txt,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Mx => "MX",
            RecordType::Srv => "SRV",
            RecordType::Txt => "TXT",
        }
    }

    pub fn to_rtype(self) -> domain::base::iana::Rtype {
        use domain::base::iana::Rtype;
        match self {
            RecordType::A => Rtype::A,
            RecordType::Aaaa => Rtype::AAAA,
            RecordType::Cname => Rtype::CNAME,
            RecordType::Mx => Rtype::MX,
            RecordType::Srv => Rtype::SRV,
            RecordType::Txt => Rtype::TXT,
        }
    }

    pub fn from_rtype(rtype: domain::base::iana::Rtype) -> Option<Self> {
        use domain::base::iana::Rtype;
        match rtype {
            Rtype::A => Some(RecordType::A),
            Rtype::AAAA => Some(RecordType::Aaaa),
            Rtype::CNAME => Some(RecordType::Cname),
            Rtype::MX => Some(RecordType::Mx),
            Rtype::SRV => Some(RecordType::Srv),
            Rtype::TXT => Some(RecordType::Txt),
            _ => None,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Ok(RecordType::A),
            "AAAA" => Ok(RecordType::Aaaa),
            "CNAME" => Ok(RecordType::Cname),
            "MX" => Ok(RecordType::Mx),
            "SRV" => Ok(RecordType::Srv),
            "TXT" => Ok(RecordType::Txt),
            other => Err(Error::malformed(format!("unsupported record type {other}"))),
        }
    }
}

/// The decoded payload of one resource record, independent of its owner
/// name, class (always IN) and TTL.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordData {
    A(std::net::Ipv4Addr),
    Aaaa(std::net::Ipv6Addr),
    Cname(String),
    Mx { preference: u16, exchange: String },
    Srv { priority: u16, weight: u16, port: u16, target: String },
    Txt(Vec<String>),
}

impl RecordData {
    pub fn rtype(&self) -> RecordType {
        match self {
            RecordData::A(_) => RecordType::A,
            RecordData::Aaaa(_) => RecordType::Aaaa,
            RecordData::Cname(_) => RecordType::Cname,
            RecordData::Mx { .. } => RecordType::Mx,
            RecordData::Srv { .. } => RecordType::Srv,
            RecordData::Txt(_) => RecordType::Txt,
        }
    }
}

/// A fully-qualified resource record as it is held by a backend:
/// owner name, class IN implied, type, TTL, payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    pub owner: String,
    pub ttl: u32,
    pub data: RecordData,
}

impl ResourceRecord {
    pub fn rtype(&self) -> RecordType {
        self.data.rtype()
    }
}

/// One operation out of an UPDATE section's update list, already
/// classified per RFC 2136 section 2.5's class/TTL encoding. This is
/// the shape both front-ends translate requests into before handing them
/// to the update engine; it is also what the engine's six-step pipeline
/// iterates over.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    /// class IN, ttl >= minimum_ttl: add `data` to the RRset at
    /// `(owner, rtype)`, creating it if absent.
    AddToRRset {
        owner: String,
        rtype: RecordType,
        ttl: u32,
        data: RecordData,
    },
    /// class NONE, ttl == 0: remove the single matching record from the
    /// RRset at `(owner, rtype)`, if present.
    DeleteFromRRset {
        owner: String,
        rtype: RecordType,
        data: RecordData,
    },
    /// class ANY, ttl == 0, type != ANY: remove the entire RRset at
    /// `(owner, rtype)`.
    DeleteRRset { owner: String, rtype: RecordType },
    /// class ANY, ttl == 0, type == ANY: remove every RRset at `owner`.
    DeleteAllRRsets { owner: String },
}

impl UpdateOp {
    pub fn owner(&self) -> &str {
        match self {
            UpdateOp::AddToRRset { owner, .. }
            | UpdateOp::DeleteFromRRset { owner, .. }
            | UpdateOp::DeleteRRset { owner, .. }
            | UpdateOp::DeleteAllRRsets { owner } => owner,
        }
    }

    /// The TTL an operation carries per the wire encoding; deletions are
    /// always ttl == 0 and are validated as such before this is built.
    pub fn ttl(&self) -> u32 {
        match self {
            UpdateOp::AddToRRset { ttl, .. } => *ttl,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_type_round_trips_through_str() {
        for rt in [
            RecordType::A,
            RecordType::Aaaa,
            RecordType::Cname,
            RecordType::Mx,
            RecordType::Srv,
            RecordType::Txt,
        ] {
            let parsed: RecordType = rt.as_str().parse().unwrap();
            assert_eq!(parsed, rt);
        }
    }

    #[test]
    fn record_type_parse_is_case_insensitive() {
        assert_eq!("a".parse::<RecordType>().unwrap(), RecordType::A);
        assert_eq!("Aaaa".parse::<RecordType>().unwrap(), RecordType::Aaaa);
    }

    #[test]
    fn unknown_record_type_is_malformed() {
        assert!("NS".parse::<RecordType>().is_err());
    }
}
