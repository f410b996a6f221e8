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

use std::collections::HashSet;
use std::fmt::Display;
use std::fmt::Formatter;

use regex::Regex;

use crate::error::SessionError;
use crate::store::CardStore;
use crate::types::card::CardState;
use crate::types::card::SentenceInfo;
use crate::types::card_id::CardId;

/// What replaces the word in a cloze sentence.
pub const BLANK: &str = "______";

/// An index into the card's example sentences.
pub type SentenceChoice = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum SplitError {
    NoSelection,
    /// The card has no analysis, hence no sentences to choose from.
    NoAnalysis,
    OutOfRange(SentenceChoice),
    Duplicate(SentenceChoice),
    Session(SessionError),
}

impl Display for SplitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SplitError::NoSelection => write!(f, "no sentences selected"),
            SplitError::NoAnalysis => write!(f, "the card has no example sentences"),
            SplitError::OutOfRange(i) => write!(f, "there is no sentence {}", i + 1),
            SplitError::Duplicate(i) => write!(f, "sentence {} selected twice", i + 1),
            SplitError::Session(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for SplitError {}

impl From<SessionError> for SplitError {
    fn from(value: SessionError) -> Self {
        SplitError::Session(value)
    }
}

/// The cards carrying a split's sentences, in selection order.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitOutcome {
    /// The original card, now bound to the first selection.
    pub original: CardId,
    /// One new card per further selection.
    pub derived: Vec<CardId>,
}

impl SplitOutcome {
    pub fn all(&self) -> Vec<CardId> {
        let mut ids = vec![self.original];
        ids.extend(&self.derived);
        ids
    }
}

/// Split a card awaiting review into one cloze card per selected sentence.
///
/// The first selection retargets the card itself: it gets the sentence, its
/// media paths are cleared, and it goes back to pending. Its old files stay
/// on disk until new ones are written over them. Every other selection
/// becomes a new pending card sharing the same analysis. Nothing is changed
/// unless every selection is valid.
pub fn split(
    store: &mut CardStore,
    id: CardId,
    selections: &[SentenceChoice],
) -> Result<SplitOutcome, SplitError> {
    let Some((&first, rest)) = selections.split_first() else {
        return Err(SplitError::NoSelection);
    };
    let card = store.get(id)?;
    let analysis = card.analysis().ok_or(SplitError::NoAnalysis)?;
    let mut seen = HashSet::new();
    for &choice in selections {
        if choice >= analysis.example_sentences.len() {
            return Err(SplitError::OutOfRange(choice));
        }
        if !seen.insert(choice) {
            return Err(SplitError::Duplicate(choice));
        }
    }
    if !card.state().can_transition_to(&CardState::Pending) {
        return Err(SessionError::InvalidTransition {
            id,
            from: card.state().clone(),
            to: CardState::Pending,
        }
        .into());
    }
    let sentence_at = |i: SentenceChoice| {
        let sentence = &analysis.example_sentences[i];
        SentenceInfo {
            text: sentence.text.clone(),
            tense: sentence.tense.clone(),
            word_form: sentence.word_form.clone(),
        }
    };
    let first = sentence_at(first);
    let rest: Vec<SentenceInfo> = rest.iter().map(|&i| sentence_at(i)).collect();

    let word = card.word().to_string();
    let media_key = store.fresh_media_key(&word)?;
    store.update(id, |c| {
        c.set_state(CardState::Pending)?;
        c.retarget(first, media_key);
        Ok::<_, SessionError>(())
    })??;
    let mut derived = Vec::with_capacity(rest.len());
    for sentence in rest {
        derived.push(store.append_derived(id, sentence)?);
    }
    log::info!("Split {id} into {} cloze cards.", derived.len() + 1);
    Ok(SplitOutcome {
        original: id,
        derived,
    })
}

/// Replace the word in `sentence` with [`BLANK`]. Tries the inflected form
/// first, then any word starting with the dictionary form. Matching is
/// case-insensitive and respects word boundaries.
pub fn blank_word_in_sentence(sentence: &str, word: &str, word_form: Option<&str>) -> String {
    let patterns = [
        word_form.map(|form| format!(r"(?i)\b{}\b", regex::escape(form))),
        Some(format!(r"(?i)\b{}\w*\b", regex::escape(word))),
    ];
    for pattern in patterns.into_iter().flatten() {
        let Ok(re) = Regex::new(&pattern) else {
            continue;
        };
        if re.is_match(sentence) {
            let blanked = re.replace_all(sentence, BLANK).into_owned();
            log::debug!("Blanked {sentence:?} -> {blanked:?}");
            return blanked;
        }
    }
    log::warn!("Could not find {word:?} in {sentence:?}.");
    sentence.to_string()
}
