//! Ingestion pipeline
//!
//! Drives a raw CSV byte stream through parsing, normalization and one
//! update session, strictly one record per round trip. Throughput is bounded
//! by network round-trip latency by design: each record must know its own
//! outcome before the next is sent.
//!
//! Cancellation is cooperative and polled once per loop iteration only — an
//! in-flight parse or update call is never interrupted.

use async_trait::async_trait;
use csv::{ReaderBuilder, StringRecord};
use custrelay_common::{Record, Session, UpdateOutcome};
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::error::IngestError;

/// Interface the pipeline drives records through.
///
/// Implemented by the real [`Session`]; tests substitute a mock.
#[async_trait]
pub trait Updater {
    async fn update(&mut self, record: &Record) -> custrelay_common::Result<UpdateOutcome>;
}

#[async_trait]
impl Updater for Session {
    async fn update(&mut self, record: &Record) -> custrelay_common::Result<UpdateOutcome> {
        Session::update(self, record).await
    }
}

/// Counts reported by a completed ingestion run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    /// Records applied by the update service
    pub accepted: u64,
    /// Records the update service refused (skipped, not fatal)
    pub rejected: u64,
}

/// Ingest a CSV stream through `updater`, one record at a time.
///
/// Exactly one header row is read and discarded before processing begins;
/// input without even a header is malformed. Clean end-of-input reports
/// success. Any parse failure aborts the whole batch — there is no partial
/// success for malformed input. A [`UpdateOutcome::Rejected`] record is
/// logged and skipped; any session error aborts.
///
/// The caller owns the session's lifecycle: the pipeline neither opens nor
/// closes it.
pub async fn ingest<R, U>(
    input: R,
    updater: &mut U,
    cancel: &CancellationToken,
) -> Result<IngestSummary, IngestError>
where
    R: std::io::Read,
    U: Updater + Send,
{
    // Field counts are validated per-row in parse_record, so the reader is
    // flexible about them here.
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input);

    let mut row = StringRecord::new();

    // A deadline that expired before we even start is reported as such,
    // not as an input problem.
    if cancel.is_cancelled() {
        warn!("cancelled before reading header");
        return Err(IngestError::Cancelled);
    }

    // Read and discard the header row.
    if !reader.read_record(&mut row)? {
        error!("failed to read header from the stream");
        return Err(IngestError::MissingHeader);
    }

    let mut summary = IngestSummary::default();

    loop {
        if cancel.is_cancelled() {
            warn!("cancelled before reaching end of stream");
            return Err(IngestError::Cancelled);
        }

        if !reader.read_record(&mut row)? {
            return Ok(summary);
        }

        let record = parse_record(&row)?;

        match updater.update(&record).await {
            Ok(UpdateOutcome::Accepted) => summary.accepted += 1,
            Ok(UpdateOutcome::Rejected) => {
                warn!(id = record.id, email = %record.email, "record rejected by update service");
                summary.rejected += 1;
            }
            Err(err) => {
                error!(id = record.id, error = %err, "failed to update record");
                return Err(err.into());
            }
        }
    }
}

/// Normalize one raw CSV row into a [`Record`].
///
/// The row must have exactly 4 fields (id, name, email, mobile) and the id
/// must be a base-10 signed 64-bit integer. Name and email pass through
/// verbatim; only the mobile number is normalized.
pub fn parse_record(row: &StringRecord) -> Result<Record, IngestError> {
    if row.len() != 4 {
        return Err(IngestError::MalformedRow(format!(
            "expected 4 fields, found {}",
            row.len()
        )));
    }

    let id = row[0].parse::<i64>().map_err(|err| {
        IngestError::MalformedRow(format!("failed to parse id value [{}]: {err}", &row[0]))
    })?;

    Ok(Record {
        id,
        name: row[1].to_string(),
        email: row[2].to_string(),
        mobile_number: normalize_mobile_number(&row[3]),
    })
}

/// Best-effort mobile number normalization.
///
/// Strips every non-digit character, then removes at most one international
/// prefix. The branch order matters: a digit string starting "0044" does not
/// match the "44" test (it starts with "0"), so it falls through to the
/// second branch. No length or country-code validation is performed.
pub fn normalize_mobile_number(value: &str) -> String {
    let cleaned: String = value.chars().filter(char::is_ascii_digit).collect();

    if let Some(rest) = cleaned.strip_prefix("44") {
        rest.to_string()
    } else if let Some(rest) = cleaned.strip_prefix("0044") {
        rest.to_string()
    } else {
        cleaned
    }
}
