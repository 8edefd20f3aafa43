// /////////////////////////////////////////////////////////////////////////////
// Docuflow
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # OCR Processor
//!
//! Local text recovery from stored document content. Plain-text payloads
//! are decoded directly; binary payloads (PDF and friends) get a printable
//! text harvest - runs of printable characters long enough to look like
//! words. This is the local baseline; deployments that want real OCR
//! register a remote processor under the same slug.

use async_trait::async_trait;
use serde_json::json;

use docuflow_domain::services::{
    Processor, ProcessorContext, ProcessorDescriptor, ProcessorOutcome,
};
use docuflow_domain::{EngineError, ProcessorCategory};

/// Minimum run of printable characters to keep from binary payloads.
const MIN_RUN: usize = 4;

pub struct OcrProcessor;

impl OcrProcessor {
    fn is_textual(mime_type: &str) -> bool {
        mime_type.starts_with("text/")
            || mime_type == "application/json"
            || mime_type == "text/csv"
    }

    /// Harvests word-like printable runs from a binary payload.
    fn harvest_printable(bytes: &[u8]) -> String {
        let mut text = String::new();
        let mut run = String::new();
        for &b in bytes {
            let c = b as char;
            if c.is_ascii_graphic() || c == ' ' {
                run.push(c);
            } else {
                if run.trim().len() >= MIN_RUN {
                    if !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(run.trim());
                }
                run.clear();
            }
        }
        if run.trim().len() >= MIN_RUN {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(run.trim());
        }
        text
    }
}

#[async_trait]
impl Processor for OcrProcessor {
    fn id(&self) -> &str {
        "ocr"
    }

    fn describe(&self) -> ProcessorDescriptor {
        ProcessorDescriptor::new(
            "Local OCR",
            ProcessorCategory::Ocr,
            json!({
                "type": "object",
                "properties": {
                    "lang": { "type": "string" }
                }
            }),
        )
        .with_output_schema(json!({
            "type": "object",
            "required": ["text"],
            "properties": {
                "text": { "type": "string" },
                "lang": { "type": "string" },
                "bytes_processed": { "type": "integer", "minimum": 0 }
            }
        }))
    }

    async fn execute(&self, ctx: &ProcessorContext) -> Result<ProcessorOutcome, EngineError> {
        let bytes = ctx.document_bytes().await?;
        let lang = ctx.config_str("lang").unwrap_or("eng").to_string();

        let text = if Self::is_textual(ctx.document.mime_type()) {
            String::from_utf8_lossy(&bytes).into_owned()
        } else {
            Self::harvest_printable(&bytes)
        };

        let output = json!({
            "text": text,
            "lang": lang,
            "bytes_processed": bytes.len(),
        });
        let metadata_delta = json!({
            "ocr_lang": lang,
            "text_length": text.len(),
        });

        Ok(ProcessorOutcome::Success {
            output,
            tokens_used: 0,
            cost_credits: 0.0,
            metadata_delta,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harvest_keeps_word_runs_only() {
        let bytes = b"\x00\x01Invoice Total 42\x02\x03ab\x04Hello";
        assert_eq!(
            OcrProcessor::harvest_printable(bytes),
            "Invoice Total 42 Hello"
        );
    }

    #[test]
    fn textual_mimes_are_recognized() {
        assert!(OcrProcessor::is_textual("text/plain"));
        assert!(OcrProcessor::is_textual("text/csv"));
        assert!(!OcrProcessor::is_textual("application/pdf"));
    }
}
