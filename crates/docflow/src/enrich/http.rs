use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::{
    DetectedEntity, KeyPhrase, LanguageScore, Sentiment, SentimentScores, SyntaxToken,
    TextAnalyticsService,
};
use crate::config::TextAnalyticsConfig;
use crate::error::ServiceError;
use crate::http::JsonTargetClient;
use crate::secrets;

const TARGET_PREFIX: &str = "Comprehend_20171127";

/// Text analytics over the JSON-1.1 `Comprehend_20171127.*` operations.
#[derive(Debug, Clone)]
pub struct HttpTextAnalyticsService {
    client: JsonTargetClient,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct TextRequest<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_code: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct LanguagesResponse {
    #[serde(default)]
    languages: Vec<WireLanguage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireLanguage {
    language_code: String,
    score: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SentimentResponse {
    sentiment: String,
    #[serde(default)]
    sentiment_score: WireSentimentScore,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
struct WireSentimentScore {
    #[serde(default)]
    positive: f64,
    #[serde(default)]
    negative: f64,
    #[serde(default)]
    neutral: f64,
    #[serde(default)]
    mixed: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EntitiesResponse {
    #[serde(default)]
    entities: Vec<WireEntity>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireEntity {
    text: String,
    #[serde(rename = "Type")]
    entity_type: String,
    score: f64,
    #[serde(default)]
    begin_offset: usize,
    #[serde(default)]
    end_offset: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KeyPhrasesResponse {
    #[serde(default)]
    key_phrases: Vec<WireKeyPhrase>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireKeyPhrase {
    text: String,
    score: f64,
    #[serde(default)]
    begin_offset: usize,
    #[serde(default)]
    end_offset: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SyntaxResponse {
    #[serde(default)]
    syntax_tokens: Vec<WireSyntaxToken>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireSyntaxToken {
    token_id: u32,
    text: String,
    #[serde(default)]
    begin_offset: usize,
    #[serde(default)]
    end_offset: usize,
    part_of_speech: WirePartOfSpeech,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WirePartOfSpeech {
    tag: String,
    #[serde(default)]
    score: f64,
}

impl HttpTextAnalyticsService {
    pub fn new(
        endpoint: &str,
        api_key: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            client: JsonTargetClient::new(endpoint, TARGET_PREFIX, api_key, timeout)?,
        })
    }

    pub fn from_config(config: &TextAnalyticsConfig) -> Result<Self, ServiceError> {
        let api_key = secrets::resolve_credentials(&config.credentials)
            .map_err(|e| ServiceError::Config(e.to_string()))?;
        Self::new(
            &config.endpoint,
            api_key,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    async fn call<R: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        text: &str,
        language_code: Option<&str>,
    ) -> Result<R, ServiceError> {
        self.client
            .call(
                operation,
                &TextRequest {
                    text,
                    language_code,
                },
            )
            .await
    }
}

#[async_trait]
impl TextAnalyticsService for HttpTextAnalyticsService {
    async fn detect_language(&self, text: &str) -> Result<Vec<LanguageScore>, ServiceError> {
        let response: LanguagesResponse = self.call("DetectDominantLanguage", text, None).await?;
        Ok(response
            .languages
            .into_iter()
            .map(|l| LanguageScore {
                language_code: l.language_code,
                score: l.score,
            })
            .collect())
    }

    async fn detect_sentiment(
        &self,
        text: &str,
        language_code: &str,
    ) -> Result<Sentiment, ServiceError> {
        let response: SentimentResponse = self
            .call("DetectSentiment", text, Some(language_code))
            .await?;
        let s = response.sentiment_score;
        Ok(Sentiment {
            sentiment: response.sentiment,
            scores: SentimentScores {
                positive: s.positive,
                negative: s.negative,
                neutral: s.neutral,
                mixed: s.mixed,
            },
        })
    }

    async fn detect_entities(
        &self,
        text: &str,
        language_code: &str,
    ) -> Result<Vec<DetectedEntity>, ServiceError> {
        let response: EntitiesResponse = self
            .call("DetectEntities", text, Some(language_code))
            .await?;
        Ok(response
            .entities
            .into_iter()
            .map(|e| DetectedEntity {
                text: e.text,
                entity_type: e.entity_type,
                score: e.score,
                begin_offset: e.begin_offset,
                end_offset: e.end_offset,
            })
            .collect())
    }

    async fn detect_key_phrases(
        &self,
        text: &str,
        language_code: &str,
    ) -> Result<Vec<KeyPhrase>, ServiceError> {
        let response: KeyPhrasesResponse = self
            .call("DetectKeyPhrases", text, Some(language_code))
            .await?;
        Ok(response
            .key_phrases
            .into_iter()
            .map(|k| KeyPhrase {
                text: k.text,
                score: k.score,
                begin_offset: k.begin_offset,
                end_offset: k.end_offset,
            })
            .collect())
    }

    async fn detect_syntax(
        &self,
        text: &str,
        language_code: &str,
    ) -> Result<Vec<SyntaxToken>, ServiceError> {
        let response: SyntaxResponse = self
            .call("DetectSyntax", text, Some(language_code))
            .await?;
        Ok(response
            .syntax_tokens
            .into_iter()
            .map(|t| SyntaxToken {
                token_id: t.token_id,
                text: t.text,
                part_of_speech: t.part_of_speech.tag,
                score: t.part_of_speech.score,
                begin_offset: t.begin_offset,
                end_offset: t.end_offset,
            })
            .collect())
    }
}
