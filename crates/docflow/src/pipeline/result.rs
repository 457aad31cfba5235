use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::ExtractedText;
use crate::enrich::NlpAnalysis;
use crate::normalize::{NormalizedText, Paragraph, TextStats};

/// Processor version stamped on every result.
pub const PROCESSOR_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAnalysis {
    pub word_count: usize,
    pub character_count: usize,
    pub line_count: usize,
    /// 0-100.
    pub average_confidence: f64,
    pub page_count: usize,
}

impl From<&ExtractedText> for DocumentAnalysis {
    fn from(extracted: &ExtractedText) -> Self {
        Self {
            word_count: extracted.word_count(),
            character_count: extracted.character_count(),
            line_count: extracted.line_count,
            average_confidence: extracted.average_confidence,
            page_count: extracted.page_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    pub processor_version: String,
    pub job_id: String,
    pub job_name: String,
    pub analysis_duration_ms: u64,
    pub enrichment_duration_ms: u64,
    pub total_duration_ms: u64,
    pub processed_at: DateTime<Utc>,
}

/// Everything the pipeline produced for one file, stored keyed by file id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    pub file_id: String,
    pub upload_timestamp: String,
    pub extracted_text: String,
    pub formatted_text: String,
    pub paragraphs: Vec<Paragraph>,
    pub text_stats: TextStats,
    pub analysis: DocumentAnalysis,
    pub nlp_analysis: NlpAnalysis,
    pub metadata: ResultMetadata,
}

impl ProcessingResult {
    pub fn assemble(
        file_id: &str,
        upload_timestamp: &str,
        extracted: &ExtractedText,
        normalized: NormalizedText,
        nlp_analysis: NlpAnalysis,
        metadata: ResultMetadata,
    ) -> Self {
        Self {
            file_id: file_id.to_string(),
            upload_timestamp: upload_timestamp.to_string(),
            extracted_text: extracted.text.clone(),
            formatted_text: normalized.formatted_text,
            paragraphs: normalized.paragraphs,
            text_stats: normalized.stats,
            analysis: DocumentAnalysis::from(extracted),
            nlp_analysis,
            metadata,
        }
    }

    #[cfg(test)]
    pub fn sample_for_tests(file_id: &str) -> Self {
        let extracted = ExtractedText {
            text: "Hello World.\nThis is fine.".to_string(),
            line_count: 2,
            average_confidence: 95.0,
            page_count: 1,
        };
        let normalized = crate::normalize::normalize(&extracted.text);
        Self::assemble(
            file_id,
            "2026-01-01T00:00:00.000Z",
            &extracted,
            normalized,
            NlpAnalysis::empty(),
            ResultMetadata {
                processor_version: PROCESSOR_VERSION.to_string(),
                job_id: "job-1".to_string(),
                job_name: format!("process-file-{}-0", file_id),
                analysis_duration_ms: 10,
                enrichment_duration_ms: 0,
                total_duration_ms: 12,
                processed_at: Utc::now(),
            },
        )
    }
}
