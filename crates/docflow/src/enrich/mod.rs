//! Text-analytics enrichment.
//!
//! Five independent sub-calls against the NLP service. A failed sub-call
//! degrades only its own field; [`Enricher::enrich`] never fails.

pub mod http;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EnrichmentError, ServiceError};

pub use http::HttpTextAnalyticsService;

/// Language code used for sub-calls when detection fails.
pub const FALLBACK_LANGUAGE_CODE: &str = "en";
pub const UNKNOWN_LANGUAGE: &str = "unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalysisKind {
    Language,
    Sentiment,
    Entities,
    KeyPhrases,
    Syntax,
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnalysisKind::Language => "language",
            AnalysisKind::Sentiment => "sentiment",
            AnalysisKind::Entities => "entity",
            AnalysisKind::KeyPhrases => "key phrase",
            AnalysisKind::Syntax => "syntax",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageScore {
    pub language_code: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentScores {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
    pub mixed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sentiment {
    pub sentiment: String,
    pub scores: SentimentScores,
}

/// An entity as the service reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedEntity {
    pub text: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub score: f64,
    pub begin_offset: usize,
    pub end_offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.80 {
            ConfidenceTier::High
        } else if score >= 0.50 {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }
}

/// Coarse display category for an entity type.
pub fn entity_category(entity_type: &str) -> &'static str {
    match entity_type {
        "PERSON" => "People",
        "LOCATION" => "Places",
        "ORGANIZATION" => "Organizations",
        "COMMERCIAL_ITEM" => "Products & Services",
        "EVENT" => "Events",
        "DATE" => "Dates & Times",
        "QUANTITY" => "Numbers & Quantities",
        "TITLE" => "Titles & Positions",
        _ => "Other",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub text: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub score: f64,
    pub begin_offset: usize,
    pub end_offset: usize,
    pub category: String,
    pub confidence: ConfidenceTier,
}

impl From<DetectedEntity> for Entity {
    fn from(e: DetectedEntity) -> Self {
        Self {
            category: entity_category(&e.entity_type).to_string(),
            confidence: ConfidenceTier::from_score(e.score),
            text: e.text,
            entity_type: e.entity_type,
            score: e.score,
            begin_offset: e.begin_offset,
            end_offset: e.end_offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMention {
    pub text: String,
    pub score: f64,
    pub confidence: ConfidenceTier,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityStats {
    pub total: usize,
    pub unique_types: Vec<String>,
    pub high_confidence: usize,
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPhrase {
    pub text: String,
    pub score: f64,
    pub begin_offset: usize,
    pub end_offset: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyntaxToken {
    pub token_id: u32,
    pub text: String,
    pub part_of_speech: String,
    pub score: f64,
    pub begin_offset: usize,
    pub end_offset: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NlpAnalysis {
    pub language: String,
    pub language_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    pub entities: Vec<Entity>,
    pub entity_summary: BTreeMap<String, Vec<EntityMention>>,
    pub entity_stats: EntityStats,
    pub key_phrases: Vec<KeyPhrase>,
    pub syntax_tokens: Vec<SyntaxToken>,
    pub processing_time_ms: u64,
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzed_length: Option<usize>,
    #[serde(default)]
    pub failed_analyses: Vec<AnalysisKind>,
}

impl NlpAnalysis {
    /// Result for blank text: nothing was sent to the service.
    pub fn empty() -> Self {
        Self {
            language: UNKNOWN_LANGUAGE.to_string(),
            language_score: 0.0,
            sentiment: None,
            entities: Vec::new(),
            entity_summary: BTreeMap::new(),
            entity_stats: EntityStats::default(),
            key_phrases: Vec::new(),
            syntax_tokens: Vec::new(),
            processing_time_ms: 0,
            truncated: false,
            original_length: None,
            analyzed_length: None,
            failed_analyses: Vec::new(),
        }
    }
}

/// The external NLP service. Every sub-call is independent.
#[async_trait]
pub trait TextAnalyticsService: Send + Sync {
    async fn detect_language(&self, text: &str) -> Result<Vec<LanguageScore>, ServiceError>;

    async fn detect_sentiment(
        &self,
        text: &str,
        language_code: &str,
    ) -> Result<Sentiment, ServiceError>;

    async fn detect_entities(
        &self,
        text: &str,
        language_code: &str,
    ) -> Result<Vec<DetectedEntity>, ServiceError>;

    async fn detect_key_phrases(
        &self,
        text: &str,
        language_code: &str,
    ) -> Result<Vec<KeyPhrase>, ServiceError>;

    async fn detect_syntax(
        &self,
        text: &str,
        language_code: &str,
    ) -> Result<Vec<SyntaxToken>, ServiceError>;
}

/// Outcome of each sub-call before assembly. `None` means it failed.
struct SubAnalyses {
    language: Option<Vec<LanguageScore>>,
    sentiment: Option<Sentiment>,
    entities: Option<Vec<DetectedEntity>>,
    key_phrases: Option<Vec<KeyPhrase>>,
    syntax_tokens: Option<Vec<SyntaxToken>>,
}

#[derive(Clone)]
pub struct Enricher {
    service: Arc<dyn TextAnalyticsService>,
    max_chars: usize,
}

impl Enricher {
    pub fn new(service: Arc<dyn TextAnalyticsService>, max_chars: usize) -> Self {
        Self {
            service,
            max_chars: max_chars.max(1),
        }
    }

    pub async fn enrich(&self, text: &str) -> NlpAnalysis {
        let started = Instant::now();

        let original_length = text.chars().count();
        let truncated = original_length > self.max_chars;
        let analyzed: String = if truncated {
            text.chars().take(self.max_chars).collect()
        } else {
            text.to_string()
        };
        if truncated {
            debug!(
                "Truncated text from {} to {} characters for analysis",
                original_length, self.max_chars
            );
        }

        let language = degrade(
            AnalysisKind::Language,
            self.service.detect_language(&analyzed).await,
        );
        let dominant = language.as_deref().and_then(dominant_language);
        let language_code = dominant
            .map(|l| l.language_code.as_str())
            .unwrap_or(FALLBACK_LANGUAGE_CODE);

        let (sentiment, entities, key_phrases, syntax_tokens) = tokio::join!(
            self.service.detect_sentiment(&analyzed, language_code),
            self.service.detect_entities(&analyzed, language_code),
            self.service.detect_key_phrases(&analyzed, language_code),
            self.service.detect_syntax(&analyzed, language_code),
        );

        let subs = SubAnalyses {
            sentiment: degrade(AnalysisKind::Sentiment, sentiment),
            entities: degrade(AnalysisKind::Entities, entities),
            key_phrases: degrade(AnalysisKind::KeyPhrases, key_phrases),
            syntax_tokens: degrade(AnalysisKind::Syntax, syntax_tokens),
            language,
        };

        let mut analysis = assemble(subs);
        if truncated {
            analysis.truncated = true;
            analysis.original_length = Some(original_length);
            analysis.analyzed_length = Some(self.max_chars);
        }
        analysis.processing_time_ms = started.elapsed().as_millis() as u64;
        analysis
    }
}

fn degrade<T>(kind: AnalysisKind, result: Result<T, ServiceError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(source) => {
            let err = EnrichmentError {
                analysis: kind,
                source,
            };
            warn!("{}", err);
            None
        }
    }
}

fn dominant_language(scores: &[LanguageScore]) -> Option<&LanguageScore> {
    scores
        .iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))
}

fn assemble(subs: SubAnalyses) -> NlpAnalysis {
    let mut analysis = NlpAnalysis::empty();

    let failures = [
        (AnalysisKind::Language, subs.language.is_none()),
        (AnalysisKind::Sentiment, subs.sentiment.is_none()),
        (AnalysisKind::Entities, subs.entities.is_none()),
        (AnalysisKind::KeyPhrases, subs.key_phrases.is_none()),
        (AnalysisKind::Syntax, subs.syntax_tokens.is_none()),
    ];
    analysis.failed_analyses = failures
        .into_iter()
        .filter_map(|(kind, failed)| failed.then_some(kind))
        .collect();

    if let Some(dominant) = subs.language.as_deref().and_then(dominant_language) {
        analysis.language = dominant.language_code.clone();
        analysis.language_score = dominant.score;
    }

    analysis.sentiment = subs.sentiment;

    let entities: Vec<Entity> = subs
        .entities
        .unwrap_or_default()
        .into_iter()
        .map(Entity::from)
        .collect();
    analysis.entity_summary = summarize_entities(&entities);
    analysis.entity_stats = entity_stats(&entities);
    analysis.entities = entities;

    analysis.key_phrases = subs.key_phrases.unwrap_or_default();
    analysis.syntax_tokens = subs.syntax_tokens.unwrap_or_default();
    analysis
}

fn summarize_entities(entities: &[Entity]) -> BTreeMap<String, Vec<EntityMention>> {
    let mut summary: BTreeMap<String, Vec<EntityMention>> = BTreeMap::new();
    for e in entities {
        summary
            .entry(e.entity_type.clone())
            .or_default()
            .push(EntityMention {
                text: e.text.clone(),
                score: e.score,
                confidence: e.confidence,
            });
    }
    summary
}

fn entity_stats(entities: &[Entity]) -> EntityStats {
    let unique_types: BTreeSet<&str> = entities.iter().map(|e| e.entity_type.as_str()).collect();
    let categories: BTreeSet<&str> = entities.iter().map(|e| e.category.as_str()).collect();
    EntityStats {
        total: entities.len(),
        unique_types: unique_types.into_iter().map(str::to_string).collect(),
        high_confidence: entities
            .iter()
            .filter(|e| e.confidence == ConfidenceTier::High)
            .count(),
        categories: categories.into_iter().map(str::to_string).collect(),
    }
}
