//! Payload ingestion shared by the webhook and the poll collector.
//!
//! Normalization happens before the writer lock is taken; only the state
//! mutation runs under it.

use occupancy_store::IngestOutcome;
use occupancy_types::{NormalizedEvent, ParseError, RawPayload};
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::config::SensorMode;
use crate::state::AppState;

/// Longest payload excerpt written to the log.
pub const LOG_PAYLOAD_LIMIT: usize = 512;

/// Cut `body` to at most `limit` bytes on a char boundary.
pub fn truncate_for_log(body: &str, limit: usize) -> &str {
    if body.len() <= limit {
        return body;
    }
    let mut end = limit;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

/// Ingestion errors.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("Failed to parse payload: {0}")]
    Parse(#[from] ParseError),
    #[error("Failed to store event: {0}")]
    Store(#[from] occupancy_store::Error),
}

/// A payload that went through the normalizer and the writer.
#[derive(Debug, Clone)]
pub struct Ingested {
    /// Extractor that recognized the payload, if any.
    pub source: Option<&'static str>,
    /// The normalized event.
    pub event: NormalizedEvent,
    /// What the store did with it.
    pub outcome: IngestOutcome,
}

/// Normalize a payload from a `mode` producer and apply it to the live state.
///
/// Push payloads only go through the webhook frame extractor, so they can
/// only ever add deltas. Unrecognized payloads become [`NormalizedEvent::Empty`] and still pass
/// through the writer so a due reset runs. Broken payloads are logged with
/// an excerpt of the body and leave the state untouched.
pub async fn ingest_payload(
    state: &AppState,
    mode: SensorMode,
    raw: RawPayload<'_>,
    now: OffsetDateTime,
) -> Result<Ingested, IngestError> {
    let normalized = state.normalizer_for(mode).normalize_with_source(&raw).inspect_err(|e| {
        warn!(
            "Rejected sensor payload: {} (payload: {:?})",
            e,
            truncate_for_log(raw.body, LOG_PAYLOAD_LIMIT)
        );
    })?;

    let (source, event) = match normalized {
        Some((source, event)) => {
            debug!("Payload recognized by {}: {:?}", source, event);
            (Some(source), event)
        }
        None => {
            warn!(
                "Unrecognized sensor payload (payload: {:?})",
                truncate_for_log(raw.body, LOG_PAYLOAD_LIMIT)
            );
            (None, NormalizedEvent::Empty)
        }
    };

    let outcome = state.ingest(&event, now).await?;

    Ok(Ingested {
        source,
        event,
        outcome,
    })
}
