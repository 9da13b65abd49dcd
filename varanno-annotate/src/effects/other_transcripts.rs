//! Versioned encoding of the non-canonical transcripts of a gene.
//!
//! Version 1 is `transcript_id:effect` entries joined by `;`, with `?` in
//! place of a missing transcript id.

use std::fmt::{self, Display};

use crate::errors::{AnnotateError, AnnotateResult};

pub const FORMAT_VERSION: u32 = 1;

const ENTRY_SEPARATOR: char = ';';
const FIELD_SEPARATOR: char = ':';
const UNKNOWN_TRANSCRIPT: &str = "?";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherTranscript {
    pub transcript_id: Option<String>,
    pub effect: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OtherTranscripts {
    entries: Vec<OtherTranscript>,
}

impl OtherTranscripts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, transcript_id: Option<&str>, effect: &str) {
        self.entries.push(OtherTranscript {
            transcript_id: transcript_id.filter(|t| !t.is_empty()).map(str::to_string),
            effect: effect.to_string(),
        });
    }

    pub fn entries(&self) -> &[OtherTranscript] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn encode(&self) -> String {
        self.entries
            .iter()
            .map(|e| {
                format!(
                    "{}{}{}",
                    e.transcript_id.as_deref().unwrap_or(UNKNOWN_TRANSCRIPT),
                    FIELD_SEPARATOR,
                    e.effect
                )
            })
            .collect::<Vec<String>>()
            .join(&ENTRY_SEPARATOR.to_string())
    }

    pub fn decode(encoded: &str) -> AnnotateResult<Self> {
        let mut decoded = OtherTranscripts::new();
        for entry in encoded.split(ENTRY_SEPARATOR).filter(|e| !e.is_empty()) {
            // transcript ids never contain ':', effect labels might
            let Some((transcript, effect)) = entry.split_once(FIELD_SEPARATOR) else {
                return Err(AnnotateError::Other(anyhow::anyhow!(
                    "other transcripts v{}: entry '{}' has no effect",
                    FORMAT_VERSION,
                    entry
                )));
            };
            let transcript = (transcript != UNKNOWN_TRANSCRIPT).then_some(transcript);
            decoded.push(transcript, effect);
        }
        Ok(decoded)
    }
}

impl Display for OtherTranscripts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}
