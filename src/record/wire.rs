//! Decoding resource record data out of a parsed DNS message into our
//! canonical [`RecordData`], for the update section of an RFC 2136
//! UPDATE message.

use domain::base::iana::Rtype;
use domain::base::name::ToName;
use domain::rdata::AllRecordData;

use crate::error::Error;
use crate::record::RecordData;

pub fn decode_record_data<Octs, Name>(
    rtype: Rtype,
    rdata: &AllRecordData<Octs, Name>,
) -> Result<RecordData, Error>
where
    Octs: AsRef<[u8]>,
    Name: ToName + std::fmt::Display,
{
    match rdata {
        AllRecordData::A(a) => Ok(RecordData::A(a.addr())),
        AllRecordData::Aaaa(aaaa) => Ok(RecordData::Aaaa(aaaa.addr())),
        AllRecordData::Cname(cname) => Ok(RecordData::Cname(strip_dot(cname.cname().to_string()))),
        AllRecordData::Mx(mx) => Ok(RecordData::Mx {
            preference: mx.preference(),
            exchange: strip_dot(mx.exchange().to_string()),
        }),
        AllRecordData::Srv(srv) => Ok(RecordData::Srv {
            priority: srv.priority(),
            weight: srv.weight(),
            port: srv.port(),
            target: strip_dot(srv.target().to_string()),
        }),
        AllRecordData::Txt(txt) => {
            let strings = txt
                .iter()
                .map(|chunk| String::from_utf8_lossy(chunk.as_ref()).into_owned())
                .collect();
            Ok(RecordData::Txt(strings))
        }
        _ => Err(Error::malformed(format!("unsupported record type in update: {rtype}"))),
    }
}

fn strip_dot(mut name: String) -> String {
    if name.ends_with('.') {
        name.pop();
    }
    name
}
