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

use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use serde::Serialize;

use crate::backend::GenerationError;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail;

const API_KEY_ENV: &str = "ELEVENLABS_API_KEY";
const BASE_URL: &str = "https://api.elevenlabs.io/v1";
const OUTPUT_FORMAT: &str = "mp3_44100_128";
const LANGUAGE_CODE: &str = "es";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for the ElevenLabs text-to-speech endpoint.
pub struct ElevenLabsClient {
    http: Client,
    base_url: String,
    model: String,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    language_code: &'static str,
}

impl ElevenLabsClient {
    pub fn from_env(model: &str) -> Fallible<Self> {
        let api_key = match env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => key,
            _ => return fail(format!("{API_KEY_ENV} is not set.")),
        };
        Self::new(BASE_URL, &api_key, model)
    }

    pub fn new(base_url: &str, api_key: &str, model: &str) -> Fallible<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "xi-api-key",
            HeaderValue::from_str(api_key)
                .map_err(|_| ErrorReport::new("invalid ElevenLabs API key"))?,
        );
        let http = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub async fn generate_audio(
        &self,
        text: &str,
        voice_id: &str,
    ) -> Result<Vec<u8>, GenerationError> {
        log::debug!(
            "Synthesizing {} with voice {voice_id}.",
            if text.contains(' ') { "sentence" } else { "word" }
        );
        let err = |msg: String| GenerationError::Audio(msg);
        let request = SpeechRequest {
            text,
            model_id: &self.model,
            language_code: LANGUAGE_CODE,
        };
        let response = self
            .http
            .post(speech_url(&self.base_url, voice_id))
            .json(&request)
            .send()
            .await
            .map_err(|e| err(format!("request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(err(format!("HTTP {status}: {body}")));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| err(format!("truncated response: {e}")))?;
        if bytes.is_empty() {
            return Err(err("empty audio".to_string()));
        }
        Ok(bytes.to_vec())
    }
}

fn speech_url(base_url: &str, voice_id: &str) -> String {
    format!("{base_url}/text-to-speech/{voice_id}?output_format={OUTPUT_FORMAT}")
}
