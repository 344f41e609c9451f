//! Translates an RFC 2136 UPDATE message's update section into the ordered
//! `UpdateOp` list the update engine drives, per the class/type/ttl mapping
//! table in the protocol state machine (spec section 4.4). Grounded on
//! `original_source/duppy/dns_updates.py`'s `handle_nsupdate`, which walks
//! `update.authority` and dispatches on `(rdclass, rdtype, ttl)` exactly the
//! same way.

use bytes::Bytes;
use domain::base::iana::{Class, Rtype};
use domain::base::{Message, ParsedName, ParsedRecord};
use domain::rdata::AllRecordData;

use crate::error::{Error, Result};
use crate::record::wire::decode_record_data;
use crate::record::{RecordData, RecordType, UpdateOp};

/// Non-empty per invariant 6 of the data model: a request with zero update
/// operations is rejected by the caller before this is invoked.
pub fn decode_update_section(message: &Message<Bytes>) -> Result<Vec<UpdateOp>> {
    let authority = message
        .authority()
        .map_err(|e| Error::malformed(format!("malformed update section: {e}")))?;

    let mut ops = Vec::new();
    for item in authority {
        let record: ParsedRecord<'_, Bytes> = item.map_err(|e| Error::malformed(format!("malformed update record: {e}")))?;

        let owner = record.owner().to_string();
        let owner = owner.trim_end_matches('.').to_ascii_lowercase();
        let class = record.class();
        let rtype = record.rtype();
        let ttl = record.ttl().as_secs();

        let op = match (class, rtype) {
            (Class::ANY, Rtype::ANY) if ttl == 0 => UpdateOp::DeleteAllRRsets { owner },
            (Class::ANY, rtype) if ttl == 0 => {
                let rtype = decodable_rtype(rtype)?;
                UpdateOp::DeleteRRset { owner, rtype }
            }
            (Class::NONE, rtype) if ttl == 0 => {
                let rtype = decodable_rtype(rtype)?;
                let data = decode_present_rdata(record, rtype)?;
                UpdateOp::DeleteFromRRset { owner, rtype, data }
            }
            (Class::IN, rtype) => {
                let rtype = decodable_rtype(rtype)?;
                let data = decode_present_rdata(record, rtype)?;
                UpdateOp::AddToRRset { owner, rtype, ttl, data }
            }
            (class, rtype) => {
                return Err(Error::malformed(format!(
                    "unsupported class/type/ttl combination in update section: {class} {rtype} ttl={ttl}"
                )));
            }
        };
        ops.push(op);
    }
    Ok(ops)
}

fn decodable_rtype(rtype: Rtype) -> Result<RecordType> {
    RecordType::from_rtype(rtype).ok_or_else(|| Error::policy_rejected(format!("unsupported record type {rtype}")))
}

/// Decode the rdata of one update-section record whose class is `IN` or
/// `NONE`, both of which carry a real payload. A record that fails to parse
/// with empty-looking rdata is treated per spec 4.1's defensiveness note:
/// A/AAAA become the zero address rather than a hard failure, since some
/// clients encode a delete-from-rrset with empty rdata.
fn decode_present_rdata(record: ParsedRecord<'_, Bytes>, rtype: RecordType) -> Result<RecordData> {
    match record.to_record::<AllRecordData<Bytes, ParsedName<Bytes>>>() {
        Ok(Some(decoded)) => decode_record_data(rtype.to_rtype(), decoded.data()),
        Ok(None) => Err(Error::malformed(format!("record type mismatch for {rtype}"))),
        Err(_) if matches!(rtype, RecordType::A | RecordType::Aaaa) => Ok(empty_address(rtype)),
        Err(e) => Err(Error::malformed(format!("malformed {rtype} rdata: {e}"))),
    }
}

fn empty_address(rtype: RecordType) -> RecordData {
    match rtype {
        RecordType::A => RecordData::A(std::net::Ipv4Addr::UNSPECIFIED),
        RecordType::Aaaa => RecordData::Aaaa(std::net::Ipv6Addr::UNSPECIFIED),
        _ => unreachable!("only called for A/AAAA"),
    }
}
