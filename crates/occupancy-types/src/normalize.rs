//! Sensor payload normalization.
//!
//! Producers speak several dialects: webhook pushes with nested frame/event
//! arrays, polled JSON counters under a handful of key spellings, and XML
//! documents that only yield to tag scraping. Each dialect is one
//! [`Extractor`]; the [`Normalizer`] runs them in order and the first one to
//! recognize the payload wins.
//!
//! ```
//! use occupancy_types::{NormalizedEvent, Normalizer, RawPayload};
//!
//! let body = r#"{"live_data":{"frames":[{"events":[
//!     {"category":"COUNT","type":"COUNT_INCREMENT","attributes":{"direction":"forward"}}
//! ]}]}}"#;
//!
//! let event = Normalizer::default().normalize(&RawPayload::json(body))?;
//! assert_eq!(event, NormalizedEvent::Delta { in_delta: 1, out_delta: 0 });
//! # Ok::<(), occupancy_types::ParseError>(())
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::ParseResult;

/// A payload as received from a producer.
#[derive(Debug, Clone, Copy)]
pub struct RawPayload<'a> {
    /// `Content-Type` header, if the transport had one.
    pub content_type: Option<&'a str>,
    /// Body text.
    pub body: &'a str,
}

impl<'a> RawPayload<'a> {
    /// Create a payload.
    pub fn new(content_type: Option<&'a str>, body: &'a str) -> Self {
        Self { content_type, body }
    }

    /// A payload labelled as JSON.
    pub fn json(body: &'a str) -> Self {
        Self::new(Some("application/json"), body)
    }

    /// Whether the payload claims to be JSON.
    pub fn looks_like_json(&self) -> bool {
        if self
            .content_type
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"))
        {
            return true;
        }
        let trimmed = self.body.trim_start_matches('\u{feff}').trim_start();
        trimmed.starts_with('{') || trimmed.starts_with('[')
    }
}

/// Cumulative counters reported by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsoluteReading {
    /// Total entries since the sensor's own counter start.
    pub count_in: u64,
    /// Total exits since the sensor's own counter start.
    pub count_out: u64,
    /// Occupancy as reported by the sensor. Informational; occupancy is
    /// always re-derived from the counters.
    pub reported_occupancy: Option<u64>,
}

/// Canonical form of a producer payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizedEvent {
    /// New crossings since the previous push.
    Delta {
        /// New entries.
        in_delta: u64,
        /// New exits.
        out_delta: u64,
    },
    /// Cumulative counters from a poll.
    Absolute(AbsoluteReading),
    /// Nothing usable; apply as a no-op.
    Empty,
}

impl NormalizedEvent {
    /// Whether applying this event can change live state.
    pub fn is_empty(&self) -> bool {
        matches!(self, NormalizedEvent::Empty)
    }
}

/// A payload as seen by extractors: raw text plus the JSON tree if it parsed.
#[derive(Debug)]
pub struct Payload<'a> {
    /// The original payload.
    pub raw: RawPayload<'a>,
    /// Parsed JSON, when the payload is JSON.
    pub json: Option<Value>,
}

/// One producer dialect.
pub trait Extractor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Recognize and normalize a payload, or decline with `None`.
    fn try_parse(&self, payload: &Payload<'_>) -> Option<NormalizedEvent>;
}

/// Runs extractors in order; first success wins.
pub struct Normalizer {
    extractors: Vec<Box<dyn Extractor>>,
}

impl Normalizer {
    /// A normalizer with a custom extractor chain.
    pub fn new(extractors: Vec<Box<dyn Extractor>>) -> Self {
        Self { extractors }
    }

    /// A normalizer for webhook pushes: frames of count events only.
    ///
    /// Pushes are always deltas. Bodies that merely look like counter
    /// objects or XML stay unrecognized instead of overwriting the counters
    /// as absolute readings.
    pub fn push() -> Self {
        Self::new(vec![Box::new(WebhookFrames)])
    }

    /// Extractor names in chain order.
    pub fn extractor_names(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }

    /// Normalize a payload.
    ///
    /// A payload that claims to be JSON but does not parse is an error.
    /// A payload no extractor recognizes is [`NormalizedEvent::Empty`].
    pub fn normalize(&self, raw: &RawPayload<'_>) -> ParseResult<NormalizedEvent> {
        Ok(self
            .normalize_with_source(raw)?
            .map(|(_, event)| event)
            .unwrap_or(NormalizedEvent::Empty))
    }

    /// Like [`normalize`](Self::normalize), also naming the extractor that matched.
    pub fn normalize_with_source(
        &self,
        raw: &RawPayload<'_>,
    ) -> ParseResult<Option<(&'static str, NormalizedEvent)>> {
        let json = if raw.looks_like_json() {
            Some(serde_json::from_str::<Value>(
                raw.body.trim_start_matches('\u{feff}'),
            )?)
        } else {
            None
        };
        let payload = Payload { raw: *raw, json };

        Ok(self
            .extractors
            .iter()
            .find_map(|e| e.try_parse(&payload).map(|event| (e.name(), event))))
    }
}

impl Default for Normalizer {
    /// Webhook frames, then JSON counters, then XML tag scraping.
    fn default() -> Self {
        Self::new(vec![
            Box::new(WebhookFrames),
            Box::new(JsonCounters),
            Box::new(XmlTags),
        ])
    }
}

impl std::fmt::Debug for Normalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Normalizer")
            .field("extractors", &self.extractor_names())
            .finish()
    }
}

// ==========================================================================
// Webhook frames (push, deltas)
// ==========================================================================

/// Crossing direction of a single count event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Entering.
    Forward,
    /// Leaving.
    Backward,
}

impl Direction {
    /// Parse a direction attribute; unknown values yield `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Self::from_label(s),
            Value::Number(n) => match n.as_i64()? {
                1 => Some(Direction::Forward),
                0 | -1 => Some(Direction::Backward),
                _ => None,
            },
            _ => None,
        }
    }

    /// Parse a textual direction label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "forward" | "fw" | "1" => Some(Direction::Forward),
            "backward" | "bw" | "-1" | "0" => Some(Direction::Backward),
            _ => None,
        }
    }
}

/// Push payloads: `{live_data: {frames: [...]}}` or `{frames: [...]}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebhookFrames;

impl WebhookFrames {
    fn frames(json: &Value) -> Option<&Vec<Value>> {
        json.get("live_data")
            .and_then(|live| live.get("frames"))
            .or_else(|| json.get("frames"))
            .and_then(Value::as_array)
    }
}

/// Whether an event's `category` or `type` marks it as a count increment.
fn is_count_increment(event: &Value) -> bool {
    ["category", "type"].iter().any(|key| {
        event
            .get(*key)
            .and_then(Value::as_str)
            .is_some_and(|s| normalize_label(s) == "count increment")
    })
}

fn normalize_label(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c {
            '_' | '-' => ' ',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

impl Extractor for WebhookFrames {
    fn name(&self) -> &'static str {
        "webhook-frames"
    }

    fn try_parse(&self, payload: &Payload<'_>) -> Option<NormalizedEvent> {
        let frames = Self::frames(payload.json.as_ref()?)?;

        let mut in_delta = 0u64;
        let mut out_delta = 0u64;

        let events = frames
            .iter()
            .filter_map(|frame| frame.get("events").and_then(Value::as_array))
            .flatten()
            .filter(|event| is_count_increment(event));

        for event in events {
            let direction = event
                .get("attributes")
                .and_then(|attrs| attrs.get("direction"))
                .and_then(Direction::from_value);
            match direction {
                Some(Direction::Forward) => in_delta += 1,
                Some(Direction::Backward) => out_delta += 1,
                None => {}
            }
        }

        Some(NormalizedEvent::Delta {
            in_delta,
            out_delta,
        })
    }
}

// ==========================================================================
// JSON counters (poll, absolute)
// ==========================================================================

const IN_KEYS: [&str; 3] = ["count_in", "in", "forward"];
const OUT_KEYS: [&str; 3] = ["count_out", "out", "backward"];
const OCCUPANCY_KEYS: [&str; 2] = ["occupancy", "current"];

/// Polled JSON objects carrying cumulative counters under common key spellings.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCounters;

fn counter(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn first_counter(object: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| object.get(*key).and_then(counter))
}

impl Extractor for JsonCounters {
    fn name(&self) -> &'static str {
        "json-counters"
    }

    fn try_parse(&self, payload: &Payload<'_>) -> Option<NormalizedEvent> {
        let object = payload.json.as_ref().filter(|json| json.is_object())?;

        let count_in = first_counter(object, &IN_KEYS);
        let count_out = first_counter(object, &OUT_KEYS);
        if count_in.is_none() && count_out.is_none() {
            return None;
        }

        Some(NormalizedEvent::Absolute(AbsoluteReading {
            count_in: count_in.unwrap_or(0),
            count_out: count_out.unwrap_or(0),
            reported_occupancy: first_counter(object, &OCCUPANCY_KEYS),
        }))
    }
}

// ==========================================================================
// XML tag scraping (poll, absolute)
// ==========================================================================

static XML_IN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(?:in|countin|forward)\b[^>]*>\s*(\d+)\s*</").expect("valid in-tag pattern")
});
static XML_OUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(?:out|countout|backward)\b[^>]*>\s*(\d+)\s*</")
        .expect("valid out-tag pattern")
});
static XML_OCCUPANCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(?:occupancy|current|fill)\b[^>]*>\s*(\d+)\s*</")
        .expect("valid occupancy-tag pattern")
});

/// Non-JSON bodies scraped for the first `<in>`/`<out>`/`<occupancy>`-like tags.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlTags;

fn scrape(pattern: &Regex, text: &str) -> Option<u64> {
    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

impl Extractor for XmlTags {
    fn name(&self) -> &'static str {
        "xml-tags"
    }

    fn try_parse(&self, payload: &Payload<'_>) -> Option<NormalizedEvent> {
        if payload.json.is_some() {
            return None;
        }
        let text = payload.raw.body;

        let count_in = scrape(&XML_IN, text);
        let count_out = scrape(&XML_OUT, text);
        if count_in.is_none() && count_out.is_none() {
            return None;
        }

        Some(NormalizedEvent::Absolute(AbsoluteReading {
            count_in: count_in.unwrap_or(0),
            count_out: count_out.unwrap_or(0),
            reported_occupancy: scrape(&XML_OCCUPANCY, text),
        }))
    }
}
