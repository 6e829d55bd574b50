//! Query events: the raw input the analytics pipeline clusters.
//!
//! Events arrive from the event store as loosely structured documents. All
//! optional fields are resolved here, at the serde boundary, so the rest of the
//! crate only ever sees a typed [`QueryEvent`]:
//!
//! | Wire field | Type | Absent / null |
//! |------------|------|---------------|
//! | `doc_id` | string | required |
//! | `type` | string | `"chat"` |
//! | `query_text` | string | `""` |
//! | `embedding` (alias `query_vector`) | `[f32]` | no embedding (empty array too) |
//! | `rating` | `"helpful"`/`"good"`, `"not_helpful"`/`"bad"` | [`Rating::Unrated`] |
//! | `timestamp` | RFC 3339 | time of decoding |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Event type of a logged user question.
pub const CHAT_EVENT: &str = "chat";

/// End-user feedback on the answer a query received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Rating {
    /// The user marked the answer helpful.
    Helpful,
    /// The user marked the answer not helpful.
    NotHelpful,
    /// No feedback given.
    #[default]
    Unrated,
}

impl Rating {
    /// Wire name, or `None` for [`Rating::Unrated`].
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            Rating::Helpful => Some("helpful"),
            Rating::NotHelpful => Some("not_helpful"),
            Rating::Unrated => None,
        }
    }

    /// Parse a wire rating. Accepts both the `helpful`/`not_helpful` and the
    /// `good`/`bad` spellings.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "helpful" | "good" => Some(Rating::Helpful),
            "not_helpful" | "bad" => Some(Rating::NotHelpful),
            "" | "none" => Some(Rating::Unrated),
            _ => None,
        }
    }

    /// Whether the user left any feedback.
    pub fn is_rated(&self) -> bool {
        !matches!(self, Rating::Unrated)
    }
}

impl Serialize for Rating {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_str() {
            Some(name) => serializer.serialize_str(name),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Rating {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(Rating::Unrated),
            Some(value) => Rating::parse(&value).ok_or_else(|| {
                serde::de::Error::unknown_variant(
                    &value,
                    &["helpful", "not_helpful", "good", "bad"],
                )
            }),
        }
    }
}

/// A logged user question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryEvent {
    /// Stable document id assigned by the event store.
    pub doc_id: String,
    /// Event type; the pipeline only reads `chat` events.
    #[serde(rename = "type", default = "default_event_type")]
    pub event_type: String,
    /// Tenant (course, workspace, ...) the event belongs to.
    #[serde(default)]
    pub tenant_id: String,
    /// The question as the user typed it.
    #[serde(default)]
    pub query_text: String,
    /// Semantic embedding of `query_text`, if one was computed.
    #[serde(
        default,
        alias = "query_vector",
        deserialize_with = "non_empty_vector",
        skip_serializing_if = "Option::is_none"
    )]
    pub embedding: Option<Vec<f32>>,
    /// Feedback on the answer.
    #[serde(default)]
    pub rating: Rating,
    /// When the question was asked.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn default_event_type() -> String {
    CHAT_EVENT.to_string()
}

fn non_empty_vector<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Vec<f32>>, D::Error> {
    let raw: Option<Vec<f32>> = Option::deserialize(deserializer)?;
    Ok(raw.filter(|v| !v.is_empty()))
}

impl QueryEvent {
    /// Create an unrated chat event.
    pub fn new(doc_id: impl Into<String>, query_text: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            event_type: default_event_type(),
            tenant_id: String::new(),
            query_text: query_text.into(),
            embedding: None,
            rating: Rating::Unrated,
            timestamp: Utc::now(),
        }
    }

    /// Set the tenant.
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = tenant_id.into();
        self
    }

    /// Set the embedding. An empty vector counts as no embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding).filter(|v| !v.is_empty());
        self
    }

    /// Set the rating.
    pub fn with_rating(mut self, rating: Rating) -> Self {
        self.rating = rating;
        self
    }

    /// Set the event type.
    pub fn with_event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    /// Set the timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
