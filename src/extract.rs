//! Vector extraction: the first pipeline stage.
//!
//! Keeps only events that carry an embedding, preserving their relative order,
//! and splits them into a row matrix plus a parallel list of document ids.
//! Row `i` of [`Extracted::vectors`] belongs to [`Extracted::doc_ids`]`[i]`.

use crate::error::{Error, Result};
use crate::event::QueryEvent;

/// Embeddings aligned with the ids of the events they came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    /// One embedding per vectored event.
    pub vectors: Vec<Vec<f32>>,
    /// Document id of each row.
    pub doc_ids: Vec<String>,
}

impl Extracted {
    /// Number of extracted rows.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Whether no event carried an embedding.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Embedding dimension, if any rows were extracted.
    pub fn dimension(&self) -> Option<usize> {
        self.vectors.first().map(Vec::len)
    }
}

/// Extract the embeddings of `events`.
///
/// Events without an embedding are skipped; zero vectored events is not an
/// error and yields empty containers. Every row must share the dimension of
/// the first one.
pub fn extract_vectors(events: &[QueryEvent]) -> Result<Extracted> {
    let mut out = Extracted::default();

    for event in events {
        let Some(embedding) = event.embedding.as_ref().filter(|v| !v.is_empty()) else {
            continue;
        };

        if let Some(expected) = out.dimension() {
            if embedding.len() != expected {
                return Err(Error::DimensionMismatch {
                    expected,
                    found: embedding.len(),
                });
            }
        }

        out.vectors.push(embedding.clone());
        out.doc_ids.push(event.doc_id.clone());
    }

    Ok(out)
}
