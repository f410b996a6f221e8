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

use std::fmt::Display;
use std::fmt::Formatter;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::error::SessionError;
use crate::types::analysis::WordAnalysis;
use crate::types::card_id::AUDIO_EXTENSION;
use crate::types::card_id::CardId;
use crate::types::card_id::IMAGE_EXTENSION;
use crate::types::card_id::media_filename;
use crate::types::word_input::WordInput;

#[derive(Clone, Debug, Serialize)]
pub struct Card {
    id: CardId,
    word: String,
    personal_context: Option<String>,
    extra_image_prompt: Option<String>,
    /// What the word sounds like, for the mnemonic priming image.
    mnemonic_description: Option<String>,
    /// The short id in this card's media filenames. Starts as the card's own
    /// and changes when the card is retargeted, so earlier files survive.
    media_key: String,
    /// Shared with every card split from the same word.
    analysis: Option<Arc<WordAnalysis>>,
    image_path: Option<PathBuf>,
    audio_path: Option<PathBuf>,
    mnemonic_path: Option<PathBuf>,
    state: CardState,
    /// Only set on cloze cards.
    sentence: Option<SentenceInfo>,
    /// The card this one was split from. A relation, not ownership.
    parent_id: Option<CardId>,
}

/// The example sentence a cloze card practises.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SentenceInfo {
    pub text: String,
    pub tense: String,
    pub word_form: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CardState {
    Pending,
    Generating,
    AwaitingReview,
    /// `incomplete_media` is set when the user approved the card while its
    /// image or audio was missing.
    Approved {
        incomplete_media: bool,
    },
    Failed {
        reason: String,
    },
}

/// Which media a card lacks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MissingMedia {
    pub image: bool,
    pub audio: bool,
}

impl MissingMedia {
    pub fn any(&self) -> bool {
        self.image || self.audio
    }
}

impl CardState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CardState::Approved { .. } | CardState::Failed { .. })
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, CardState::Approved { .. })
    }

    /// The edges of the card lifecycle:
    ///
    /// - Pending → Generating
    /// - Generating → AwaitingReview | Failed
    /// - AwaitingReview → Generating (regeneration) | Pending (split) | Approved
    ///
    /// Approved and Failed have no outgoing edges.
    pub fn can_transition_to(&self, next: &CardState) -> bool {
        use CardState::*;
        matches!(
            (self, next),
            (Pending, Generating)
                | (Generating, AwaitingReview)
                | (Generating, Failed { .. })
                | (AwaitingReview, Generating)
                | (AwaitingReview, Pending)
                | (AwaitingReview, Approved { .. })
        )
    }
}

impl Display for CardState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CardState::Pending => write!(f, "pending"),
            CardState::Generating => write!(f, "generating"),
            CardState::AwaitingReview => write!(f, "awaiting review"),
            CardState::Approved {
                incomplete_media: false,
            } => write!(f, "approved"),
            CardState::Approved {
                incomplete_media: true,
            } => write!(f, "approved (incomplete media)"),
            CardState::Failed { reason } => write!(f, "failed ({reason})"),
        }
    }
}

impl Card {
    pub fn new(id: CardId, input: &WordInput) -> Self {
        Self {
            id,
            word: input.word().to_string(),
            personal_context: input.personal_context().map(ToString::to_string),
            extra_image_prompt: input.extra_image_prompt().map(ToString::to_string),
            mnemonic_description: input.mnemonic().map(ToString::to_string),
            media_key: id.short(),
            analysis: None,
            image_path: None,
            audio_path: None,
            mnemonic_path: None,
            state: CardState::Pending,
            sentence: None,
            parent_id: None,
        }
    }

    /// A fresh cloze card for `sentence`, sharing the parent's word, notes,
    /// analysis and mnemonic image, with no image or audio of its own.
    pub fn derive(id: CardId, parent: &Card, sentence: SentenceInfo) -> Self {
        Self {
            id,
            word: parent.word.clone(),
            personal_context: parent.personal_context.clone(),
            extra_image_prompt: parent.extra_image_prompt.clone(),
            mnemonic_description: parent.mnemonic_description.clone(),
            media_key: id.short(),
            analysis: parent.analysis.clone(),
            image_path: None,
            audio_path: None,
            mnemonic_path: parent.mnemonic_path.clone(),
            state: CardState::Pending,
            sentence: Some(sentence),
            parent_id: Some(parent.id),
        }
    }

    pub fn id(&self) -> CardId {
        self.id
    }

    pub fn word(&self) -> &str {
        &self.word
    }

    pub fn personal_context(&self) -> Option<&str> {
        self.personal_context.as_deref()
    }

    pub fn extra_image_prompt(&self) -> Option<&str> {
        self.extra_image_prompt.as_deref()
    }

    pub fn mnemonic_description(&self) -> Option<&str> {
        self.mnemonic_description.as_deref()
    }

    pub fn mnemonic_path(&self) -> Option<&Path> {
        self.mnemonic_path.as_deref()
    }

    pub fn analysis(&self) -> Option<&Arc<WordAnalysis>> {
        self.analysis.as_ref()
    }

    pub fn image_path(&self) -> Option<&Path> {
        self.image_path.as_deref()
    }

    pub fn audio_path(&self) -> Option<&Path> {
        self.audio_path.as_deref()
    }

    pub fn state(&self) -> &CardState {
        &self.state
    }

    pub fn sentence(&self) -> Option<&SentenceInfo> {
        self.sentence.as_ref()
    }

    pub fn parent_id(&self) -> Option<CardId> {
        self.parent_id
    }

    pub fn is_cloze(&self) -> bool {
        self.sentence.is_some()
    }

    pub fn missing_media(&self) -> MissingMedia {
        MissingMedia {
            image: self.image_path.is_none(),
            audio: self.audio_path.is_none(),
        }
    }

    pub fn image_filename(&self) -> String {
        media_filename(&self.word, &self.media_key, IMAGE_EXTENSION)
    }

    pub fn audio_filename(&self) -> String {
        media_filename(&self.word, &self.media_key, AUDIO_EXTENSION)
    }

    /// What the pronunciation audio should say: the sentence for cloze
    /// cards, the bare word otherwise.
    pub fn audio_text(&self) -> &str {
        match &self.sentence {
            Some(sentence) => &sentence.text,
            None => &self.word,
        }
    }

    /// Move the card to `next`, enforcing the lifecycle edges and the rule
    /// that a card is only approved with complete media when both media
    /// paths are present.
    pub fn set_state(&mut self, next: CardState) -> Result<(), SessionError> {
        let allowed = self.state.can_transition_to(&next)
            && match next {
                CardState::Approved {
                    incomplete_media: false,
                } => !self.missing_media().any(),
                _ => true,
            };
        if !allowed {
            return Err(SessionError::InvalidTransition {
                id: self.id,
                from: self.state.clone(),
                to: next,
            });
        }
        log::debug!("{} {}: {} -> {}", self.id, self.word, self.state, next);
        self.state = next;
        Ok(())
    }

    pub fn set_analysis(&mut self, analysis: Arc<WordAnalysis>) {
        self.analysis = Some(analysis);
    }

    pub fn set_image_path(&mut self, path: PathBuf) {
        self.image_path = Some(path);
    }

    pub fn set_audio_path(&mut self, path: PathBuf) {
        self.audio_path = Some(path);
    }

    pub fn set_mnemonic_path(&mut self, path: PathBuf) {
        self.mnemonic_path = Some(path);
    }

    /// Point the card at a new sentence and forget its media, so the next
    /// generation pass produces media for that sentence. New media is named
    /// with `media_key`, leaving the files of the old target in place.
    pub fn retarget(&mut self, sentence: SentenceInfo, media_key: String) {
        self.sentence = Some(sentence);
        self.media_key = media_key;
        self.image_path = None;
        self.audio_path = None;
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn card() -> Card {
        let input = WordInput::new("gato", Some("my cat Tom"), None);
        Card::new(CardId::new(Uuid::new_v4()), &input)
    }

    #[test]
    fn test_new_card_is_pending() {
        let card = card();
        assert_eq!(card.state(), &CardState::Pending);
        assert_eq!(
            card.missing_media(),
            MissingMedia {
                image: true,
                audio: true
            }
        );
        assert_eq!(card.personal_context(), Some("my cat Tom"));
        assert!(!card.is_cloze());
        assert_eq!(card.audio_text(), "gato");
    }

    #[test]
    fn test_lifecycle() -> Result<(), SessionError> {
        let mut card = card();
        card.set_state(CardState::Generating)?;
        card.set_state(CardState::AwaitingReview)?;
        card.set_image_path(PathBuf::from("gato.jpg"));
        card.set_audio_path(PathBuf::from("gato.mp3"));
        card.set_state(CardState::Generating)?;
        card.set_state(CardState::AwaitingReview)?;
        card.set_state(CardState::Approved {
            incomplete_media: false,
        })?;
        assert!(card.state().is_terminal());
        Ok(())
    }

    #[test]
    fn test_no_way_back_from_approved() -> Result<(), SessionError> {
        let mut card = card();
        card.set_image_path(PathBuf::from("gato.jpg"));
        card.set_audio_path(PathBuf::from("gato.mp3"));
        card.set_state(CardState::Generating)?;
        card.set_state(CardState::AwaitingReview)?;
        card.set_state(CardState::Approved {
            incomplete_media: false,
        })?;
        for next in [
            CardState::Pending,
            CardState::Generating,
            CardState::AwaitingReview,
        ] {
            assert!(card.set_state(next).is_err());
        }
        Ok(())
    }

    #[test]
    fn test_pending_cannot_skip_generation() {
        let mut card = card();
        assert!(card.set_state(CardState::AwaitingReview).is_err());
        assert!(
            card.set_state(CardState::Approved {
                incomplete_media: true
            })
            .is_err()
        );
    }

    #[test]
    fn test_complete_approval_requires_media() -> Result<(), SessionError> {
        let mut card = card();
        card.set_state(CardState::Generating)?;
        card.set_state(CardState::AwaitingReview)?;
        card.set_image_path(PathBuf::from("gato.jpg"));
        let result = card.set_state(CardState::Approved {
            incomplete_media: false,
        });
        assert!(matches!(
            result,
            Err(SessionError::InvalidTransition { .. })
        ));
        card.set_state(CardState::Approved {
            incomplete_media: true,
        })?;
        assert!(card.state().is_approved());
        Ok(())
    }

    #[test]
    fn test_derive_shares_analysis() {
        let mut parent = card();
        let analysis = Arc::new(WordAnalysis {
            ipa: "ˈga.to".to_string(),
            part_of_speech: crate::types::analysis::PartOfSpeech::Noun,
            gender: Some(crate::types::analysis::Gender::Masculine),
            verb_type: None,
            example_sentences: vec![],
        });
        parent.set_analysis(analysis.clone());
        parent.set_image_path(PathBuf::from("gato.jpg"));
        let sentence = SentenceInfo {
            text: "El gato duerme.".to_string(),
            tense: "presente".to_string(),
            word_form: None,
        };
        let child = Card::derive(CardId::new(Uuid::new_v4()), &parent, sentence);
        assert_ne!(child.id(), parent.id());
        assert_eq!(child.parent_id(), Some(parent.id()));
        assert!(Arc::ptr_eq(child.analysis().unwrap(), &analysis));
        assert_eq!(child.image_path(), None);
        assert_eq!(child.audio_text(), "El gato duerme.");
        assert_eq!(child.state(), &CardState::Pending);
    }

    #[test]
    fn test_retarget_renames_media() {
        let mut card = card();
        let id = card.id();
        assert_eq!(card.image_filename(), format!("gato-{}.jpg", id.short()));
        card.set_image_path(PathBuf::from("gato.jpg"));
        let sentence = SentenceInfo {
            text: "El gato duerme.".to_string(),
            tense: "presente".to_string(),
            word_form: None,
        };
        card.retarget(sentence, "0badcafe".to_string());
        assert_eq!(card.id(), id);
        assert_eq!(card.image_path(), None);
        assert_eq!(card.image_filename(), "gato-0badcafe.jpg");
        assert_eq!(card.audio_filename(), "gato-0badcafe.mp3");
    }
}
