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

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use tokio::sync::watch;

use crate::error::SessionError;
use crate::identity::IdAllocator;
use crate::types::card::Card;
use crate::types::card::CardState;
use crate::types::card::SentenceInfo;
use crate::types::card_id::CardId;
use crate::types::word_input::WordInput;

/// The session's cards, in review order, and where their media lives.
///
/// The store is the only thing that adds cards. Pipeline steps mutate the
/// fields of a card they own through [`CardStore::update`] and never touch
/// membership.
pub struct CardStore {
    cards: Vec<Card>,
    /// Position of each card in `cards`.
    index: HashMap<CardId, usize>,
    allocator: IdAllocator,
    output_directory: PathBuf,
    /// The export target's media directory, if any.
    export_media_dir: Option<PathBuf>,
}

impl CardStore {
    pub fn new(output_directory: PathBuf, export_media_dir: Option<PathBuf>) -> Self {
        let mut media_dirs = vec![output_directory.clone()];
        media_dirs.extend(export_media_dir.clone());
        let allocator = IdAllocator::new(media_dirs);
        Self::with_allocator(output_directory, export_media_dir, allocator)
    }

    pub fn with_allocator(
        output_directory: PathBuf,
        export_media_dir: Option<PathBuf>,
        allocator: IdAllocator,
    ) -> Self {
        Self {
            cards: Vec::new(),
            index: HashMap::new(),
            allocator,
            output_directory,
            export_media_dir,
        }
    }

    /// Create one pending card per input, in input order.
    pub fn create_initial(&mut self, inputs: &[WordInput]) -> Result<Vec<CardId>, SessionError> {
        let mut ids = Vec::with_capacity(inputs.len());
        for input in inputs {
            let id = self.allocator.allocate(input.word())?;
            self.push(Card::new(id, input));
            ids.push(id);
        }
        log::info!("Created {} cards.", ids.len());
        Ok(ids)
    }

    /// Append a pending cloze card split from `parent_id`.
    pub fn append_derived(
        &mut self,
        parent_id: CardId,
        sentence: SentenceInfo,
    ) -> Result<CardId, SessionError> {
        let word = self.get(parent_id)?.word().to_string();
        let id = self.allocator.allocate(&word)?;
        let card = Card::derive(id, self.get(parent_id)?, sentence);
        log::debug!("Derived card {id} from {parent_id}.");
        self.push(card);
        Ok(id)
    }

    /// A short id for `word` that no card and no file on disk uses yet, to
    /// name the media of a retargeted card.
    pub fn fresh_media_key(&mut self, word: &str) -> Result<String, SessionError> {
        Ok(self.allocator.allocate(word)?.short())
    }

    pub fn get(&self, id: CardId) -> Result<&Card, SessionError> {
        self.index
            .get(&id)
            .map(|&i| &self.cards[i])
            .ok_or(SessionError::UnknownCard(id))
    }

    pub fn update<R>(
        &mut self,
        id: CardId,
        f: impl FnOnce(&mut Card) -> R,
    ) -> Result<R, SessionError> {
        let i = *self.index.get(&id).ok_or(SessionError::UnknownCard(id))?;
        Ok(f(&mut self.cards[i]))
    }

    /// Transition a card, reporting a forbidden edge as an error.
    pub fn transition(&mut self, id: CardId, next: CardState) -> Result<(), SessionError> {
        self.update(id, |card| card.set_state(next))?
    }

    /// True iff every card is approved, with or without complete media.
    pub fn all_approved(&self) -> bool {
        self.cards.iter().all(|card| card.state().is_approved())
    }

    /// True iff every card is approved or permanently failed.
    #[cfg(test)]
    pub fn all_settled(&self) -> bool {
        self.cards.iter().all(|card| card.state().is_terminal())
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Ids of the cards in the given state, in review order.
    pub fn ids_where(&self, pred: impl Fn(&CardState) -> bool) -> Vec<CardId> {
        self.cards
            .iter()
            .filter(|card| pred(card.state()))
            .map(Card::id)
            .collect()
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }

    pub fn export_media_dir(&self) -> Option<&Path> {
        self.export_media_dir.as_deref()
    }

    fn push(&mut self, card: Card) {
        self.index.insert(card.id(), self.cards.len());
        self.cards.push(card);
    }
}

/// A [`CardStore`] shared between the dispatcher's tasks and the review
/// loop. Every write bumps a version counter so waiters can sleep until
/// something changes. The lock is never held across an await point.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<CardStore>>,
    version: Arc<watch::Sender<u64>>,
}

impl SharedStore {
    pub fn new(store: CardStore) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(store)),
            version: Arc::new(version),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&CardStore) -> R) -> R {
        f(&self.acquire())
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut CardStore) -> R) -> R {
        let result = f(&mut self.acquire());
        self.version.send_modify(|v| *v += 1);
        result
    }

    /// A snapshot of one card.
    pub fn card(&self, id: CardId) -> Result<Card, SessionError> {
        self.read(|store| store.get(id).cloned())
    }

    pub fn update<R>(
        &self,
        id: CardId,
        f: impl FnOnce(&mut Card) -> R,
    ) -> Result<R, SessionError> {
        self.write(|store| store.update(id, f))
    }

    pub fn transition(&self, id: CardId, next: CardState) -> Result<(), SessionError> {
        self.write(|store| store.transition(id, next))
    }

    /// A receiver that wakes on the next write after this call.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    fn acquire(&self) -> MutexGuard<'_, CardStore> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::error::Fallible;

    fn inputs(words: &[&str]) -> Vec<WordInput> {
        words.iter().map(|w| WordInput::new(w, None, None)).collect()
    }

    fn store() -> CardStore {
        CardStore::new(PathBuf::from("./derpherp"), None)
    }

    #[test]
    fn test_create_initial() -> Fallible<()> {
        let mut store = store();
        let ids = store.create_initial(&inputs(&["gato", "correr", "rojo"]))?;
        assert_eq!(store.cards().len(), 3);
        let distinct: HashSet<CardId> = ids.iter().copied().collect();
        assert_eq!(distinct.len(), 3);
        let words: Vec<&str> = store.cards().iter().map(|c| c.word()).collect();
        assert_eq!(words, vec!["gato", "correr", "rojo"]);
        assert!(
            store
                .cards()
                .iter()
                .all(|c| c.state() == &CardState::Pending)
        );
        Ok(())
    }

    #[test]
    fn test_unknown_card() {
        let mut store = store();
        let mut other = CardStore::new(PathBuf::from("./derpherp"), None);
        let ids = other.create_initial(&inputs(&["gato"])).unwrap();
        assert_eq!(
            store.get(ids[0]).err(),
            Some(SessionError::UnknownCard(ids[0]))
        );
        assert!(store.update(ids[0], |_| ()).is_err());
    }

    #[test]
    fn test_append_derived() -> Fallible<()> {
        let mut store = store();
        let ids = store.create_initial(&inputs(&["correr", "gato"]))?;
        let sentence = SentenceInfo {
            text: "Ayer corrí mucho.".to_string(),
            tense: "pretérito".to_string(),
            word_form: Some("corrí".to_string()),
        };
        let child = store.append_derived(ids[0], sentence)?;
        assert_eq!(store.cards().len(), 3);
        // Appended after the existing cards.
        assert_eq!(store.cards()[2].id(), child);
        let child = store.get(child)?;
        assert_eq!(child.word(), "correr");
        assert_eq!(child.parent_id(), Some(ids[0]));
        assert_eq!(child.state(), &CardState::Pending);
        Ok(())
    }

    #[test]
    fn test_all_approved() -> Fallible<()> {
        let mut store = store();
        assert!(store.all_approved());
        let ids = store.create_initial(&inputs(&["gato", "xyz123"]))?;
        assert!(!store.all_approved());
        for id in &ids {
            store.transition(*id, CardState::Generating)?;
        }
        store.transition(ids[0], CardState::AwaitingReview)?;
        store.transition(
            ids[1],
            CardState::Failed {
                reason: "nonsense".to_string(),
            },
        )?;
        assert!(!store.all_approved());
        assert!(!store.all_settled());
        store.transition(
            ids[0],
            CardState::Approved {
                incomplete_media: true,
            },
        )?;
        assert!(!store.all_approved());
        assert!(store.all_settled());
        Ok(())
    }

    #[test]
    fn test_shared_store_bumps_version() -> Fallible<()> {
        let mut store = store();
        let ids = store.create_initial(&inputs(&["gato"]))?;
        let shared = SharedStore::new(store);
        let mut rx = shared.subscribe();
        assert!(!rx.has_changed().unwrap());
        shared.transition(ids[0], CardState::Generating)?;
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();
        assert_eq!(shared.card(ids[0])?.state(), &CardState::Generating);
        Ok(())
    }
}
