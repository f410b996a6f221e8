// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::env;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use serde::Deserialize;
use serde::Serialize;

use crate::backend::GenerationError;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail;
use crate::types::analysis::WordAnalysis;

const API_KEY_ENV: &str = "OPENAI_API_KEY";
const BASE_URL: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const INSTRUCTIONS: &str = "You are an expert in the Spanish language, teaching me to learn it.";

const ANALYSIS_TEMPLATE: &str = "Analyze the Spanish word '{word}' and provide the following information in JSON format:

1. IPA pronunciation (broken down by syllable using dots (.) for syllable boundaries and ˈ to indicate primary stress)
2. Part of speech (one of: noun, verb, adjective, adverb, pronoun, preposition, conjunction, article, interjection)
3. Gender (for nouns only: masculine or feminine, otherwise null)
4. Verb type (for verbs only: transitive, intransitive, reflexive, or pronominal, otherwise null)
5. Up to 15 natural example sentences using the word, spread across different tenses and persons for verbs. For each sentence give the tense label in Spanish and the exact form of the word used in the sentence.
{context}
Return ONLY valid JSON with this structure (no markdown formatting, no code blocks):
{
  \"ipa\": \"string\",
  \"part_of_speech\": \"string\",
  \"gender\": \"string or null\",
  \"verb_type\": \"string or null\",
  \"example_sentences\": [{\"text\": \"string\", \"tense\": \"string\", \"word_form\": \"string\"}]
}";

/// Client for the OpenAI chat and image endpoints.
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    analysis_model: String,
    image_model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'static str,
    response_format: &'static str,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
}

impl OpenAiClient {
    pub fn from_env(analysis_model: &str, image_model: &str) -> Fallible<Self> {
        let api_key = match env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => key,
            _ => return fail(format!("{API_KEY_ENV} is not set.")),
        };
        Self::new(BASE_URL, &api_key, analysis_model, image_model)
    }

    pub fn new(
        base_url: &str,
        api_key: &str,
        analysis_model: &str,
        image_model: &str,
    ) -> Fallible<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|_| ErrorReport::new("invalid OpenAI API key"))?,
        );
        let http = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            analysis_model: analysis_model.to_string(),
            image_model: image_model.to_string(),
        })
    }

    pub async fn analyze(
        &self,
        word: &str,
        personal_context: Option<&str>,
    ) -> Result<WordAnalysis, GenerationError> {
        log::debug!("Analyzing {word:?}.");
        let request = ChatRequest {
            model: &self.analysis_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: INSTRUCTIONS.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: analysis_prompt(word, personal_context),
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };
        let err = |msg: String| GenerationError::Analysis(msg);
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| err(format!("request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(err(format!("HTTP {status}: {body}")));
        }
        let response: ChatResponse = response
            .json()
            .await
            .map_err(|e| err(format!("unreadable response: {e}")))?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| err("empty response".to_string()))?;
        log::debug!("Analysis received for {word:?}.");
        parse_analysis(&content)
    }

    pub async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, GenerationError> {
        let request = ImageRequest {
            model: &self.image_model,
            prompt,
            n: 1,
            size: "1024x1024",
            response_format: "b64_json",
        };
        let err = |msg: String| GenerationError::Image(msg);
        let response = self
            .http
            .post(format!("{}/images/generations", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| err(format!("request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(err(format!("HTTP {status}: {body}")));
        }
        let response: ImageResponse = response
            .json()
            .await
            .map_err(|e| err(format!("unreadable response: {e}")))?;
        decode_image(response)
    }
}

fn analysis_prompt(word: &str, personal_context: Option<&str>) -> String {
    let context = match personal_context {
        Some(context) => format!(
            "\nThe learner's personal context for this word, use it to pick relevant sentences: {context}\n"
        ),
        None => String::new(),
    };
    ANALYSIS_TEMPLATE
        .replace("{word}", word)
        .replace("{context}", &context)
}

/// Parse and validate the model's JSON answer. Tolerates a surrounding
/// markdown code fence.
pub fn parse_analysis(content: &str) -> Result<WordAnalysis, GenerationError> {
    let json = strip_code_fence(content);
    if json.is_empty() {
        return Err(GenerationError::Analysis("empty response".to_string()));
    }
    let analysis: WordAnalysis = serde_json::from_str(json)
        .map_err(|e| GenerationError::Analysis(format!("malformed response: {e}")))?;
    analysis
        .validate()
        .map_err(|defect| GenerationError::Analysis(defect.to_string()))?;
    Ok(analysis)
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    }
}

fn decode_image(response: ImageResponse) -> Result<Vec<u8>, GenerationError> {
    let b64 = response
        .data
        .into_iter()
        .next()
        .and_then(|datum| datum.b64_json)
        .ok_or_else(|| GenerationError::Image("no image data received".to_string()))?;
    let bytes = BASE64
        .decode(b64.as_bytes())
        .map_err(|e| GenerationError::Image(format!("invalid base64: {e}")))?;
    if bytes.is_empty() {
        return Err(GenerationError::Image("empty image".to_string()));
    }
    Ok(bytes)
}
