//! Customer record model

use crate::proto;

/// One customer record.
///
/// The store is keyed by `email`, not `id`: two records with the same email
/// collapse to a single stored entry, last write wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub mobile_number: String,
}

impl From<Record> for proto::UpdateRequest {
    fn from(record: Record) -> Self {
        proto::UpdateRequest {
            id: record.id,
            name: record.name,
            email: record.email,
            mobile_number: record.mobile_number,
        }
    }
}

impl From<proto::UpdateRequest> for Record {
    fn from(request: proto::UpdateRequest) -> Self {
        Record {
            id: request.id,
            name: request.name,
            email: request.email,
            mobile_number: request.mobile_number,
        }
    }
}
