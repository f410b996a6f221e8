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

//! Test fixtures: scratch directories, an in-process backend, and a
//! scripted review surface.

use std::collections::HashSet;
use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tempfile::tempdir;
use tokio::sync::oneshot;

use crate::backend::AnalysisBackend;
use crate::backend::AudioBackend;
use crate::backend::GenerationError;
use crate::backend::ImageBackend;
use crate::error::Fallible;
use crate::review::Decision;
use crate::review::ReviewSurface;
use crate::store::SharedStore;
use crate::types::analysis::ExampleSentence;
use crate::types::analysis::Gender;
use crate::types::analysis::PartOfSpeech;
use crate::types::analysis::VerbType;
use crate::types::analysis::WordAnalysis;
use crate::types::card::Card;
use crate::types::card::CardState;

/// Create a scratch directory that outlives the call.
pub fn create_tmp_directory() -> Fallible<PathBuf> {
    let target: PathBuf = tempdir()?.keep().canonicalize()?;
    Ok(target)
}

/// Fifteen conjugated forms of `correr`, one per example sentence.
const CORRER_FORMS: [(&str, &str); 15] = [
    ("corro", "presente"),
    ("corres", "presente"),
    ("corre", "presente"),
    ("corremos", "presente"),
    ("corren", "presente"),
    ("corrí", "pretérito"),
    ("corriste", "pretérito"),
    ("corrió", "pretérito"),
    ("corrimos", "pretérito"),
    ("corrieron", "pretérito"),
    ("corría", "imperfecto"),
    ("corríamos", "imperfecto"),
    ("correré", "futuro"),
    ("correría", "condicional"),
    ("corriendo", "gerundio"),
];

/// A backend that answers from canned data. Words that are not purely
/// alphabetic are treated as nonsense and fail analysis.
#[derive(Default)]
pub struct MockBackend {
    failing_images: Mutex<HashSet<String>>,
    failing_audio: Mutex<HashSet<String>>,
    delay: Duration,
    pub analysis_calls: AtomicUsize,
    pub image_calls: AtomicUsize,
    pub audio_calls: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every backend call sleeps this long before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn fail_images_for(&self, word: &str) {
        self.lock(&self.failing_images).insert(word.to_string());
    }

    pub fn restore_images_for(&self, word: &str) {
        self.lock(&self.failing_images).remove(word);
    }

    pub fn fail_audio_for(&self, word: &str) {
        self.lock(&self.failing_audio).insert(word.to_string());
    }

    fn lock<'a>(&self, set: &'a Mutex<HashSet<String>>) -> std::sync::MutexGuard<'a, HashSet<String>> {
        set.lock().unwrap()
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

impl AnalysisBackend for MockBackend {
    async fn analyze(
        &self,
        word: &str,
        _personal_context: Option<&str>,
    ) -> Result<WordAnalysis, GenerationError> {
        self.analysis_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        canned_analysis(word)
            .ok_or_else(|| GenerationError::Analysis(format!("malformed response for {word:?}")))
    }
}

impl ImageBackend for MockBackend {
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, GenerationError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let failing = self
            .lock(&self.failing_images)
            .iter()
            .any(|word| prompt.contains(&format!("'{word}'")));
        if failing {
            return Err(GenerationError::Image("rate limited".to_string()));
        }
        Ok(format!("image: {prompt}").into_bytes())
    }
}

impl AudioBackend for MockBackend {
    async fn generate_audio(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, GenerationError> {
        self.audio_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        let failing = self
            .lock(&self.failing_audio)
            .iter()
            .any(|word| text.contains(word.as_str()));
        if failing {
            return Err(GenerationError::Audio("quota exceeded".to_string()));
        }
        Ok(format!("audio: {voice_id}: {text}").into_bytes())
    }
}

pub fn canned_analysis(word: &str) -> Option<WordAnalysis> {
    if word.is_empty() || !word.chars().all(char::is_alphabetic) {
        return None;
    }
    let analysis = match word {
        "gato" => WordAnalysis {
            ipa: "ˈga.to".to_string(),
            part_of_speech: PartOfSpeech::Noun,
            gender: Some(Gender::Masculine),
            verb_type: None,
            example_sentences: vec![
                sentence("El gato duerme en el sofá.", "presente", "gato"),
                sentence("Mi gato se llama Tom.", "presente", "gato"),
                sentence("El gato comió pescado.", "pretérito", "gato"),
            ],
        },
        "correr" => WordAnalysis {
            ipa: "koˈrer".to_string(),
            part_of_speech: PartOfSpeech::Verb,
            gender: None,
            verb_type: Some(VerbType::Intransitive),
            example_sentences: CORRER_FORMS
                .iter()
                .map(|(form, tense)| {
                    sentence(&format!("Por la mañana {form} en el parque."), tense, form)
                })
                .collect(),
        },
        _ => WordAnalysis {
            ipa: format!("ˈ{word}"),
            part_of_speech: PartOfSpeech::Adjective,
            gender: None,
            verb_type: None,
            example_sentences: vec![sentence(
                &format!("Es muy {word}."),
                "presente",
                word,
            )],
        },
    };
    Some(analysis)
}

fn sentence(text: &str, tense: &str, form: &str) -> ExampleSentence {
    ExampleSentence {
        text: text.to_string(),
        tense: tense.to_string(),
        word_form: Some(form.to_string()),
    }
}

/// Completes once `count` cards are generating at the same time.
pub async fn until_generating(store: SharedStore, count: usize) {
    let mut changes = store.subscribe();
    loop {
        let generating = store.read(|s| s.ids_where(|state| state == &CardState::Generating).len());
        if generating >= count || changes.changed().await.is_err() {
            return;
        }
    }
}

/// What a [`ScriptedSurface`] was shown.
#[derive(Debug, Clone, PartialEq)]
pub struct Shown {
    pub word: String,
    pub sentence: Option<String>,
}

/// A review surface that plays back a fixed list of decisions, then
/// abandons.
pub struct ScriptedSurface {
    decisions: VecDeque<Decision>,
    pub shown: Vec<Shown>,
    pub notices: Vec<String>,
    /// Fired once this many cards have been presented.
    interrupt: Option<(usize, oneshot::Sender<()>)>,
}

impl ScriptedSurface {
    pub fn new(decisions: Vec<Decision>) -> Self {
        Self {
            decisions: decisions.into(),
            shown: Vec::new(),
            notices: Vec::new(),
            interrupt: None,
        }
    }

    /// A future that completes when the `presented`-th card has been
    /// presented, as if the user pressed Ctrl-C right after deciding.
    pub fn interrupt_after(&mut self, presented: usize) -> impl Future<Output = ()> + 'static {
        let (sender, receiver) = oneshot::channel();
        self.interrupt = Some((presented, sender));
        async move {
            if receiver.await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl ReviewSurface for ScriptedSurface {
    async fn present(&mut self, card: &Card, _voices: &[String]) -> Fallible<Decision> {
        self.shown.push(Shown {
            word: card.word().to_string(),
            sentence: card.sentence().map(|s| s.text.clone()),
        });
        let presented = self.shown.len();
        if let Some((_, sender)) = self.interrupt.take_if(|(n, _)| *n == presented) {
            let _ = sender.send(());
        }
        Ok(self.decisions.pop_front().unwrap_or(Decision::Abandon))
    }

    fn notify(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tmp_directory() -> Fallible<()> {
        let dir = create_tmp_directory()?;
        assert!(dir.is_dir());
        Ok(())
    }

    #[test]
    fn test_canned_analyses_are_valid() {
        for word in ["gato", "correr", "rojo"] {
            let analysis = canned_analysis(word).unwrap();
            assert_eq!(analysis.validate(), Ok(()));
        }
        assert_eq!(canned_analysis("correr").unwrap().example_sentences.len(), 15);
        assert!(canned_analysis("xyz123").is_none());
    }
}
