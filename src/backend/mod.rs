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

//! The generation services a card depends on: grammatical analysis, an
//! illustrative image, and pronunciation audio.

pub mod elevenlabs;
pub mod openai;
pub mod retry;

use std::fmt::Display;
use std::fmt::Formatter;
use std::future::Future;

use crate::backend::elevenlabs::ElevenLabsClient;
use crate::backend::openai::OpenAiClient;
use crate::config::Config;
use crate::error::Fallible;
use crate::types::analysis::WordAnalysis;
use crate::types::card::Card;

/// A failed backend call. Recorded on the card, never raised past the
/// dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationError {
    Analysis(String),
    Image(String),
    Audio(String),
}

impl Display for GenerationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationError::Analysis(msg) => write!(f, "analysis failed: {msg}"),
            GenerationError::Image(msg) => write!(f, "image generation failed: {msg}"),
            GenerationError::Audio(msg) => write!(f, "audio generation failed: {msg}"),
        }
    }
}

impl std::error::Error for GenerationError {}

pub trait AnalysisBackend: Send + Sync {
    fn analyze(
        &self,
        word: &str,
        personal_context: Option<&str>,
    ) -> impl Future<Output = Result<WordAnalysis, GenerationError>> + Send;
}

pub trait ImageBackend: Send + Sync {
    /// Returns the encoded image.
    fn generate_image(
        &self,
        prompt: &str,
    ) -> impl Future<Output = Result<Vec<u8>, GenerationError>> + Send;
}

pub trait AudioBackend: Send + Sync {
    /// Returns the encoded audio.
    fn generate_audio(
        &self,
        text: &str,
        voice_id: &str,
    ) -> impl Future<Output = Result<Vec<u8>, GenerationError>> + Send;
}

/// Everything the dispatcher needs from the outside world.
pub trait Backend: AnalysisBackend + ImageBackend + AudioBackend + 'static {}

impl<T> Backend for T where T: AnalysisBackend + ImageBackend + AudioBackend + 'static {}

/// The production backend: OpenAI for analysis and images, ElevenLabs for
/// speech.
pub struct RemoteBackend {
    openai: OpenAiClient,
    elevenlabs: ElevenLabsClient,
}

impl RemoteBackend {
    pub fn from_env(config: &Config) -> Fallible<Self> {
        let openai = OpenAiClient::from_env(&config.models.analysis, &config.models.image)?;
        let elevenlabs = ElevenLabsClient::from_env(&config.models.audio)?;
        Ok(Self { openai, elevenlabs })
    }
}

impl AnalysisBackend for RemoteBackend {
    async fn analyze(
        &self,
        word: &str,
        personal_context: Option<&str>,
    ) -> Result<WordAnalysis, GenerationError> {
        self.openai.analyze(word, personal_context).await
    }
}

impl ImageBackend for RemoteBackend {
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, GenerationError> {
        self.openai.generate_image(prompt).await
    }
}

impl AudioBackend for RemoteBackend {
    async fn generate_audio(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, GenerationError> {
        self.elevenlabs.generate_audio(text, voice_id).await
    }
}

/// Build the prompt for a card's illustration. `extra` is additional
/// context supplied when regenerating; it is appended to the card's own
/// extra prompt.
pub fn image_prompt(card: &Card, extra: Option<&str>) -> String {
    let mut prompt = format!(
        "Create a clear, educational image representing the Spanish word '{}'. \
         The image should help language learners remember the meaning. \
         Do not include any text or letters in the image.",
        card.word()
    );
    if let Some(analysis) = card.analysis() {
        prompt.push_str(&format!(" The word is a {}.", analysis.part_of_speech));
    }
    if let Some(sentence) = card.sentence() {
        prompt.push_str(&format!(
            " Depict the situation in this sentence: '{}'.",
            sentence.text
        ));
    }
    if let Some(context) = card.personal_context() {
        prompt.push_str(&format!(" Personal context: {context}."));
    }
    if let Some(extra) = combine_prompts(card.extra_image_prompt(), extra) {
        prompt.push_str(&format!(" Additional details: {extra}."));
    }
    prompt
}

/// Join the card's extra prompt with a regeneration prompt as `"old. new"`.
pub fn combine_prompts(original: Option<&str>, additional: Option<&str>) -> Option<String> {
    match (original, additional) {
        (Some(a), Some(b)) => Some(format!("{a}. {b}")),
        (Some(a), None) => Some(a.to_string()),
        (None, Some(b)) => Some(b.to_string()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::types::analysis::PartOfSpeech;
    use crate::types::card::SentenceInfo;
    use crate::types::card_id::CardId;
    use crate::types::word_input::WordInput;

    #[test]
    fn test_combine_prompts() {
        assert_eq!(combine_prompts(None, None), None);
        assert_eq!(combine_prompts(Some("a dog"), None), Some("a dog".to_string()));
        assert_eq!(combine_prompts(None, Some("sunset")), Some("sunset".to_string()));
        assert_eq!(
            combine_prompts(Some("a dog"), Some("sunset")),
            Some("a dog. sunset".to_string())
        );
    }

    #[test]
    fn test_image_prompt() {
        let input = WordInput::new("correr", Some("I run every morning"), Some("in a park"));
        let mut card = Card::new(CardId::new(Uuid::new_v4()), &input);
        card.set_analysis(Arc::new(WordAnalysis {
            ipa: "koˈrer".to_string(),
            part_of_speech: PartOfSpeech::Verb,
            gender: None,
            verb_type: None,
            example_sentences: vec![],
        }));
        let sentence = SentenceInfo {
            text: "Ayer corrí mucho.".to_string(),
            tense: "pretérito".to_string(),
            word_form: None,
        };
        card.retarget(sentence, card.id().short());
        let prompt = image_prompt(&card, Some("sunset lighting"));
        assert!(prompt.contains("'correr'"));
        assert!(prompt.contains("is a verb"));
        assert!(prompt.contains("'Ayer corrí mucho.'"));
        assert!(prompt.contains("I run every morning"));
        assert!(prompt.contains("in a park. sunset lighting"));
    }
}
