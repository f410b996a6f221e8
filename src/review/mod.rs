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

//! Drives each card through review, one at a time, in the order the cards
//! were created. Generation keeps running in the background while the user
//! reviews.

pub mod terminal;

use std::fmt::Display;
use std::fmt::Formatter;
use std::future::Future;

use tokio::task::JoinError;
use tokio::task::JoinSet;

use crate::backend::Backend;
use crate::cloze::SentenceChoice;
use crate::cloze::SplitError;
use crate::cloze::SplitOutcome;
use crate::cloze::split;
use crate::dispatch::BatchReport;
use crate::dispatch::Dispatcher;
use crate::dispatch::RegenOutcome;
use crate::error::Fallible;
use crate::error::SessionError;
use crate::error::fail;
use crate::store::SharedStore;
use crate::types::card::Card;
use crate::types::card::CardState;
use crate::types::card_id::CardId;

/// What the user decided about the card in front of them.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Approve,
    /// Approve even though image or audio is missing.
    ApproveIncomplete,
    /// Regenerate the image, optionally with more prompt text.
    RegenerateImage(Option<String>),
    /// Regenerate the audio with this voice.
    RegenerateAudio(String),
    Split(Vec<SentenceChoice>),
    Abandon,
}

/// Shows cards to the user and collects decisions.
pub trait ReviewSurface {
    fn present(
        &mut self,
        card: &Card,
        voices: &[String],
    ) -> impl Future<Output = Fallible<Decision>>;

    /// Tell the user something went wrong, or what happened.
    fn notify(&mut self, message: &str);
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReviewError {
    MediaMissing { image: bool, audio: bool },
    NotReviewable(CardState),
    Split(SplitError),
    /// Session-fatal. Ends the review.
    Session(SessionError),
}

impl Display for ReviewError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewError::MediaMissing { image, audio } => {
                let what = match (image, audio) {
                    (true, true) => "image and audio",
                    (true, false) => "image",
                    _ => "audio",
                };
                write!(
                    f,
                    "media missing: {what}. Regenerate it, or approve with missing media."
                )
            }
            ReviewError::NotReviewable(state) => write!(f, "card is {state}, not awaiting review"),
            ReviewError::Split(err) => write!(f, "cannot split: {err}"),
            ReviewError::Session(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ReviewError {}

impl From<SessionError> for ReviewError {
    fn from(value: SessionError) -> Self {
        ReviewError::Session(value)
    }
}

impl From<SplitError> for ReviewError {
    fn from(value: SplitError) -> Self {
        match value {
            SplitError::Session(err) => ReviewError::Session(err),
            other => ReviewError::Split(other),
        }
    }
}

/// Where review stands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NextCard {
    /// The first unsettled card is ready.
    Review(CardId),
    /// The first unsettled card is still being generated.
    Wait(CardId),
    /// Every card is approved or failed.
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReviewOutcome {
    Completed,
    Abandoned,
}

pub struct ReviewMachine<B: Backend> {
    store: SharedStore,
    dispatcher: Dispatcher<B>,
    /// Generation batches running in the background.
    batches: JoinSet<Result<BatchReport, SessionError>>,
}

impl<B: Backend> ReviewMachine<B> {
    pub fn new(store: SharedStore, dispatcher: Dispatcher<B>) -> Self {
        Self {
            store,
            dispatcher,
            batches: JoinSet::new(),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Start generating every pending card in the background.
    pub fn spawn_batch(&mut self) {
        if self.dispatcher.is_cancelled() {
            return;
        }
        let dispatcher = self.dispatcher.clone();
        let store = self.store.clone();
        self.batches
            .spawn(async move { dispatcher.run_batch(&store).await });
    }

    /// The first card, in creation order, that is neither approved nor
    /// failed.
    pub fn next(&self) -> NextCard {
        let first = self.store.read(|s| {
            s.cards()
                .iter()
                .find(|card| !card.state().is_terminal())
                .map(|card| (card.id(), card.state() == &CardState::AwaitingReview))
        });
        match first {
            None => NextCard::Complete,
            Some((id, true)) => NextCard::Review(id),
            Some((id, false)) => NextCard::Wait(id),
        }
    }

    /// Wait until the next card in order is ready for review. `None` once
    /// every card is settled.
    pub async fn next_ready(&mut self) -> Fallible<Option<CardId>> {
        loop {
            // Subscribe before looking, so a change in between is not lost.
            let mut changes = self.store.subscribe();
            let id = match self.next() {
                NextCard::Complete => return Ok(None),
                NextCard::Review(id) => return Ok(Some(id)),
                NextCard::Wait(id) => id,
            };
            if self.batches.is_empty() {
                if self.dispatcher.is_cancelled() {
                    return fail("generation was cancelled with cards still pending.");
                }
                log::debug!("{id} is pending with no batch running, dispatching.");
                self.spawn_batch();
            }
            log::debug!("Waiting for {id}.");
            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        return fail("card store closed.");
                    }
                }
                Some(joined) = self.batches.join_next() => {
                    absorb(joined)?;
                }
            }
        }
    }

    pub fn approve(&self, id: CardId) -> Result<(), ReviewError> {
        self.store.write(|s| {
            let card = s.get(id)?;
            ensure_reviewable(card)?;
            let missing = card.missing_media();
            if missing.any() {
                return Err(ReviewError::MediaMissing {
                    image: missing.image,
                    audio: missing.audio,
                });
            }
            s.transition(
                id,
                CardState::Approved {
                    incomplete_media: false,
                },
            )?;
            Ok(())
        })
    }

    /// Approve a card whatever media it has. A card missing media is
    /// flagged as such for the export.
    pub fn approve_incomplete(&self, id: CardId) -> Result<(), ReviewError> {
        self.store.write(|s| {
            let card = s.get(id)?;
            ensure_reviewable(card)?;
            let missing = card.missing_media();
            if missing.any() {
                log::warn!(
                    "Approving {:?} ({id}) with missing media (image: {}, audio: {}).",
                    card.word(),
                    missing.image,
                    missing.audio
                );
            }
            s.transition(
                id,
                CardState::Approved {
                    incomplete_media: missing.any(),
                },
            )?;
            Ok(())
        })
    }

    pub async fn request_image_regen(
        &self,
        id: CardId,
        extra: Option<&str>,
    ) -> Result<RegenOutcome, ReviewError> {
        self.store.read(|s| ensure_reviewable(s.get(id)?))?;
        Ok(self
            .dispatcher
            .regenerate_image(&self.store, id, extra)
            .await?)
    }

    pub async fn request_audio_regen(
        &self,
        id: CardId,
        voice_id: &str,
    ) -> Result<RegenOutcome, ReviewError> {
        self.store.read(|s| ensure_reviewable(s.get(id)?))?;
        Ok(self
            .dispatcher
            .regenerate_audio(&self.store, id, voice_id)
            .await?)
    }

    /// Split the card into cloze cards and start generating them.
    pub fn request_split(
        &mut self,
        id: CardId,
        selections: &[SentenceChoice],
    ) -> Result<SplitOutcome, ReviewError> {
        let outcome = self.store.write(|s| {
            ensure_reviewable(s.get(id)?)?;
            Ok::<_, ReviewError>(split(s, id, selections)?)
        })?;
        self.spawn_batch();
        Ok(outcome)
    }

    /// Wait for every background batch to finish.
    pub async fn settle(&mut self) -> Fallible<()> {
        while let Some(joined) = self.batches.join_next().await {
            absorb(joined)?;
        }
        Ok(())
    }

    /// Stop dispatching and let the cards in flight finish.
    pub async fn abandon(&mut self) -> Fallible<()> {
        self.dispatcher.cancel();
        self.settle().await
    }

    /// Review every card with `surface` until all are settled or the user
    /// gives up.
    pub async fn run<S: ReviewSurface>(&mut self, surface: &mut S) -> Fallible<ReviewOutcome> {
        self.run_until(surface, std::future::pending()).await
    }

    /// Like [`run`](Self::run), but give up once `interrupt` completes.
    /// Waiting for a card and waiting for the user are cut short. A decision
    /// already taken is carried out first, so no card is left generating.
    pub async fn run_until<S: ReviewSurface>(
        &mut self,
        surface: &mut S,
        interrupt: impl Future<Output = ()>,
    ) -> Fallible<ReviewOutcome> {
        tokio::pin!(interrupt);
        self.spawn_batch();
        loop {
            let next = tokio::select! {
                biased;
                () = &mut interrupt => None,
                next = self.next_ready() => Some(next?),
            };
            let Some(next) = next else {
                return self.interrupted().await;
            };
            let Some(id) = next else {
                break;
            };
            let card = self.store.card(id)?;
            let decision = tokio::select! {
                biased;
                () = &mut interrupt => None,
                decision = surface.present(&card, self.dispatcher.voices()) => Some(decision?),
            };
            let Some(decision) = decision else {
                return self.interrupted().await;
            };
            log::debug!("{id}: {decision:?}");
            let result: Result<Option<String>, ReviewError> = match decision {
                Decision::Approve => self.approve(id).map(|()| None),
                Decision::ApproveIncomplete => self.approve_incomplete(id).map(|()| None),
                Decision::RegenerateImage(extra) => self
                    .request_image_regen(id, extra.as_deref())
                    .await
                    .map(regen_notice),
                Decision::RegenerateAudio(voice) => self
                    .request_audio_regen(id, &voice)
                    .await
                    .map(regen_notice),
                Decision::Split(selections) => self
                    .request_split(id, &selections)
                    .map(|outcome| Some(format!("Split into {} cloze cards.", outcome.all().len()))),
                Decision::Abandon => {
                    log::info!("Review abandoned.");
                    self.abandon().await?;
                    return Ok(ReviewOutcome::Abandoned);
                }
            };
            match result {
                Ok(Some(notice)) => surface.notify(&notice),
                Ok(None) => {}
                Err(ReviewError::Session(err)) => return Err(err.into()),
                Err(err) => surface.notify(&err.to_string()),
            }
        }
        self.settle().await?;
        Ok(ReviewOutcome::Completed)
    }

    async fn interrupted(&mut self) -> Fallible<ReviewOutcome> {
        log::warn!("Interrupted, waiting for cards in flight.");
        self.abandon().await?;
        Ok(ReviewOutcome::Abandoned)
    }
}

fn ensure_reviewable(card: &Card) -> Result<(), ReviewError> {
    if card.state() != &CardState::AwaitingReview {
        return Err(ReviewError::NotReviewable(card.state().clone()));
    }
    Ok(())
}

fn regen_notice(outcome: RegenOutcome) -> Option<String> {
    match outcome {
        RegenOutcome::Replaced(_) => None,
        RegenOutcome::Kept(err) => Some(format!("{err}. Kept the previous file.")),
    }
}

fn absorb(joined: Result<Result<BatchReport, SessionError>, JoinError>) -> Fallible<()> {
    let report = joined??;
    log::debug!("Background batch finished, {} cards processed.", report.processed());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::backend::retry::RetryPolicy;
    use crate::helper::MockBackend;
    use crate::helper::ScriptedSurface;
    use crate::helper::Shown;
    use crate::helper::create_tmp_directory;
    use crate::helper::until_generating;
    use crate::store::CardStore;
    use crate::types::word_input::WordInput;

    fn machine(
        words: &[&str],
        backend: Arc<MockBackend>,
    ) -> Fallible<(ReviewMachine<MockBackend>, Vec<CardId>)> {
        let mut store = CardStore::new(create_tmp_directory()?, None);
        let inputs: Vec<WordInput> = words.iter().map(|w| WordInput::new(w, None, None)).collect();
        let ids = store.create_initial(&inputs)?;
        let dispatcher = Dispatcher::new(
            backend,
            2,
            RetryPolicy::new(2, Duration::ZERO),
            vec!["voice-a".to_string()],
        );
        Ok((ReviewMachine::new(SharedStore::new(store), dispatcher), ids))
    }

    fn shown(word: &str, sentence: Option<&str>) -> Shown {
        Shown {
            word: word.to_string(),
            sentence: sentence.map(ToString::to_string),
        }
    }

    #[tokio::test]
    async fn test_reviews_in_creation_order() -> Fallible<()> {
        let backend = Arc::new(MockBackend::with_delay(Duration::from_millis(2)));
        let (mut machine, ids) = machine(&["gato", "correr", "rojo"], backend)?;
        assert_eq!(machine.next(), NextCard::Wait(ids[0]));
        let mut surface = ScriptedSurface::new(vec![Decision::Approve; 3]);
        let outcome = machine.run(&mut surface).await?;
        assert_eq!(outcome, ReviewOutcome::Completed);
        assert_eq!(
            surface.shown,
            vec![
                shown("gato", None),
                shown("correr", None),
                shown("rojo", None)
            ]
        );
        assert!(machine.store().read(|s| s.all_approved()));
        assert_eq!(machine.next(), NextCard::Complete);
        Ok(())
    }

    #[tokio::test]
    async fn test_split_into_three_cloze_cards() -> Fallible<()> {
        let backend = Arc::new(MockBackend::new());
        let (mut machine, ids) = machine(&["correr"], backend)?;
        let mut surface = ScriptedSurface::new(vec![
            Decision::Split(vec![0, 5, 12]),
            Decision::Approve,
            Decision::Approve,
            Decision::Approve,
        ]);
        let outcome = machine.run(&mut surface).await?;
        assert_eq!(outcome, ReviewOutcome::Completed);
        assert_eq!(surface.notices, vec!["Split into 3 cloze cards.".to_string()]);
        assert_eq!(
            surface.shown,
            vec![
                shown("correr", None),
                shown("correr", Some("Por la mañana corro en el parque.")),
                shown("correr", Some("Por la mañana corrí en el parque.")),
                shown("correr", Some("Por la mañana correré en el parque.")),
            ]
        );
        let cards = machine.store().read(|s| s.cards().to_vec());
        assert_eq!(cards.len(), 3);
        assert_eq!(cards[0].id(), ids[0]);
        let analysis = cards[0].analysis().unwrap();
        let mut paths = Vec::new();
        for card in &cards {
            assert!(card.state().is_approved());
            assert!(Arc::ptr_eq(card.analysis().unwrap(), analysis));
            paths.push(card.image_path().unwrap().to_path_buf());
            paths.push(card.audio_path().unwrap().to_path_buf());
        }
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 6);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_media_must_be_acknowledged() -> Fallible<()> {
        let backend = Arc::new(MockBackend::new());
        backend.fail_images_for("gato");
        let (mut machine, ids) = machine(&["gato"], backend)?;
        let mut surface = ScriptedSurface::new(vec![
            Decision::Approve,
            Decision::RegenerateImage(Some("a black cat".to_string())),
            Decision::ApproveIncomplete,
        ]);
        machine.run(&mut surface).await?;
        assert_eq!(surface.shown.len(), 3);
        assert_eq!(surface.notices.len(), 2);
        assert!(surface.notices[0].starts_with("media missing: image."));
        assert!(surface.notices[1].contains("Kept the previous file"));
        let card = machine.store().card(ids[0])?;
        assert_eq!(
            card.state(),
            &CardState::Approved {
                incomplete_media: true
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_regenerated_image_then_approved() -> Fallible<()> {
        let backend = Arc::new(MockBackend::new());
        backend.fail_images_for("gato");
        let (mut machine, ids) = machine(&["gato"], backend.clone())?;
        machine.spawn_batch();
        assert_eq!(machine.next_ready().await?, Some(ids[0]));
        backend.restore_images_for("gato");
        let outcome = machine.request_image_regen(ids[0], None).await?;
        assert!(matches!(outcome, RegenOutcome::Replaced(_)));
        machine.approve(ids[0])?;
        assert!(machine.store().read(|s| s.all_approved()));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_cards_are_skipped() -> Fallible<()> {
        let backend = Arc::new(MockBackend::new());
        let (mut machine, ids) = machine(&["xyz123", "gato"], backend)?;
        let mut surface = ScriptedSurface::new(vec![Decision::Approve]);
        let outcome = machine.run(&mut surface).await?;
        assert_eq!(outcome, ReviewOutcome::Completed);
        assert_eq!(surface.shown, vec![shown("gato", None)]);
        let store = machine.store();
        assert!(store.read(|s| s.all_settled()));
        assert!(!store.read(|s| s.all_approved()));
        assert!(matches!(
            store.card(ids[0])?.state(),
            CardState::Failed { .. }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_abandon() -> Fallible<()> {
        let backend = Arc::new(MockBackend::new());
        let (mut machine, ids) = machine(&["gato", "correr"], backend)?;
        let mut surface = ScriptedSurface::new(vec![Decision::Approve]);
        let outcome = machine.run(&mut surface).await?;
        assert_eq!(outcome, ReviewOutcome::Abandoned);
        let store = machine.store();
        assert!(store.card(ids[0])?.state().is_approved());
        assert!(!store.card(ids[1])?.state().is_approved());
        Ok(())
    }

    #[tokio::test]
    async fn test_interrupt_lets_regeneration_finish() -> Fallible<()> {
        let backend = Arc::new(MockBackend::with_delay(Duration::from_millis(20)));
        let (mut machine, ids) = machine(&["gato", "correr"], backend.clone())?;
        let mut surface = ScriptedSurface::new(vec![
            Decision::RegenerateImage(Some("at night".to_string())),
            Decision::Approve,
        ]);
        // Fires while the regeneration is under way.
        let interrupt = surface.interrupt_after(1);
        let outcome = machine.run_until(&mut surface, interrupt).await?;
        assert_eq!(outcome, ReviewOutcome::Abandoned);
        assert_eq!(surface.shown, vec![shown("gato", None)]);
        let gato = machine.store().card(ids[0])?;
        assert_eq!(gato.state(), &CardState::AwaitingReview);
        let image = std::fs::read(gato.image_path().unwrap())?;
        assert!(String::from_utf8_lossy(&image).contains("at night"));
        let generating = machine
            .store()
            .read(|s| s.ids_where(|state| state == &CardState::Generating));
        assert!(generating.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_interrupt_while_waiting() -> Fallible<()> {
        let backend = Arc::new(MockBackend::with_delay(Duration::from_millis(20)));
        let (mut machine, _) = machine(&["gato", "correr", "rojo"], backend)?;
        let mut surface = ScriptedSurface::new(vec![Decision::Approve; 3]);
        let interrupt = until_generating(machine.store().clone(), 2);
        let outcome = machine.run_until(&mut surface, interrupt).await?;
        assert_eq!(outcome, ReviewOutcome::Abandoned);
        assert!(surface.shown.is_empty());
        // The two cards in flight finished; the third was never started.
        let states: Vec<CardState> = machine
            .store()
            .read(|s| s.cards().iter().map(|c| c.state().clone()).collect());
        assert_eq!(
            states,
            vec![
                CardState::AwaitingReview,
                CardState::AwaitingReview,
                CardState::Pending
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_regenerate_audio_with_chosen_voice() -> Fallible<()> {
        let backend = Arc::new(MockBackend::new());
        let (mut machine, ids) = machine(&["gato"], backend)?;
        let mut surface = ScriptedSurface::new(vec![
            Decision::RegenerateAudio("voice-b".to_string()),
            Decision::Approve,
        ]);
        machine.run(&mut surface).await?;
        let card = machine.store().card(ids[0])?;
        let audio = std::fs::read(card.audio_path().unwrap())?;
        assert_eq!(audio, b"audio: voice-b: gato");
        assert!(surface.notices.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_actions_require_review_state() -> Fallible<()> {
        let backend = Arc::new(MockBackend::new());
        let (mut machine, ids) = machine(&["gato"], backend)?;
        assert_eq!(
            machine.approve(ids[0]),
            Err(ReviewError::NotReviewable(CardState::Pending))
        );
        assert_eq!(
            machine.request_split(ids[0], &[0]),
            Err(ReviewError::NotReviewable(CardState::Pending))
        );
        assert!(matches!(
            machine.request_audio_regen(ids[0], "voice-a").await,
            Err(ReviewError::NotReviewable(CardState::Pending))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_split_is_reported() -> Fallible<()> {
        let backend = Arc::new(MockBackend::new());
        let (mut machine, _) = machine(&["gato"], backend)?;
        let mut surface = ScriptedSurface::new(vec![
            Decision::Split(vec![7]),
            Decision::Split(vec![]),
            Decision::Approve,
        ]);
        machine.run(&mut surface).await?;
        assert_eq!(
            surface.notices,
            vec![
                "cannot split: there is no sentence 8".to_string(),
                "cannot split: no sentences selected".to_string(),
            ]
        );
        assert!(machine.store().read(|s| s.all_approved()));
        Ok(())
    }
}
