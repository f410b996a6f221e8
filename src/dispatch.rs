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

//! Runs analysis, image, and audio generation for cards, a bounded number
//! of cards at a time.

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use rand::seq::IndexedRandom;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::backend::Backend;
use crate::backend::GenerationError;
use crate::backend::image_prompt;
use crate::backend::retry::RetryPolicy;
use crate::config::Config;
use crate::error::SessionError;
use crate::media::write_media;
use crate::mnemonic::find_existing;
use crate::mnemonic::mnemonic_filename;
use crate::mnemonic::mnemonic_prompt;
use crate::store::SharedStore;
use crate::types::card::Card;
use crate::types::card::CardState;
use crate::types::card::MissingMedia;
use crate::types::card_id::CardId;

pub struct Dispatcher<B: Backend> {
    backend: Arc<B>,
    /// One permit per card in flight. Shared by batches and single-card
    /// regeneration.
    limit: Arc<Semaphore>,
    retry: RetryPolicy,
    voices: Arc<[String]>,
    cancelled: Arc<AtomicBool>,
}

impl<B: Backend> Clone for Dispatcher<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            limit: self.limit.clone(),
            retry: self.retry,
            voices: self.voices.clone(),
            cancelled: self.cancelled.clone(),
        }
    }
}

/// How one card left a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum CardOutcome {
    Ready,
    Incomplete(MissingMedia),
    Failed(GenerationError),
    /// Not claimed: cancelled, or already claimed elsewhere.
    Skipped,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchReport {
    pub ready: Vec<CardId>,
    pub incomplete: Vec<CardId>,
    pub failed: Vec<CardId>,
    pub skipped: Vec<CardId>,
}

impl BatchReport {
    fn record(&mut self, id: CardId, outcome: &CardOutcome) {
        match outcome {
            CardOutcome::Ready => self.ready.push(id),
            CardOutcome::Incomplete(_) => self.incomplete.push(id),
            CardOutcome::Failed(_) => self.failed.push(id),
            CardOutcome::Skipped => self.skipped.push(id),
        }
    }

    pub fn processed(&self) -> usize {
        self.ready.len() + self.incomplete.len() + self.failed.len()
    }
}

/// The result of regenerating one medium.
#[derive(Debug, Clone, PartialEq)]
pub enum RegenOutcome {
    /// The new file replaced the old one.
    Replaced(PathBuf),
    /// Generation failed; the previous file and path are untouched.
    Kept(GenerationError),
}

impl<B: Backend> Dispatcher<B> {
    pub fn new(backend: Arc<B>, concurrency: usize, retry: RetryPolicy, voices: Vec<String>) -> Self {
        Self {
            backend,
            limit: Arc::new(Semaphore::new(concurrency.max(1))),
            retry,
            voices: Arc::from(voices),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn from_config(backend: Arc<B>, config: &Config) -> Self {
        Self::new(
            backend,
            config.concurrency,
            config.retry_policy(),
            config.voices.clone(),
        )
    }

    pub fn voices(&self) -> &[String] {
        &self.voices
    }

    /// Stop dispatching. Cards already in flight run to completion; cards
    /// not yet claimed stay pending.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            log::info!("Generation cancelled, no further cards will be dispatched.");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Generate everything for every pending card. Per-card failures are
    /// recorded on the cards; only session-fatal errors are returned.
    pub async fn run_batch(&self, store: &SharedStore) -> Result<BatchReport, SessionError> {
        let ids = store.read(|s| s.ids_where(|state| state == &CardState::Pending));
        log::info!("Dispatching {} cards.", ids.len());
        let mut tasks = JoinSet::new();
        for id in ids {
            let this = self.clone();
            let store = store.clone();
            tasks.spawn(async move {
                let outcome = this.process_card(&store, id).await?;
                Ok::<_, SessionError>((id, outcome))
            });
        }
        let mut report = BatchReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => {
                    let (id, outcome) = result?;
                    report.record(id, &outcome);
                }
                Err(err) => {
                    log::error!("Generation task aborted: {err}");
                }
            }
        }
        log::info!(
            "Batch done: {} ready, {} incomplete, {} failed, {} skipped.",
            report.ready.len(),
            report.incomplete.len(),
            report.failed.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    async fn process_card(&self, store: &SharedStore, id: CardId) -> Result<CardOutcome, SessionError> {
        let Ok(_permit) = self.limit.acquire().await else {
            return Ok(CardOutcome::Skipped);
        };
        if self.is_cancelled() {
            return Ok(CardOutcome::Skipped);
        }
        if !claim(store, id)? {
            return Ok(CardOutcome::Skipped);
        }
        let (directory, media_dir) = store.read(|s| {
            (
                s.output_directory().to_path_buf(),
                s.export_media_dir().map(Path::to_path_buf),
            )
        });
        let mut card = store.card(id)?;

        if card.analysis().is_none() {
            let label = format!("analysis of {:?}", card.word());
            let result = self
                .retry
                .run(&label, || {
                    self.backend.analyze(card.word(), card.personal_context())
                })
                .await;
            match result {
                Ok(analysis) => {
                    card = store.update(id, |c| {
                        c.set_analysis(Arc::new(analysis));
                        c.clone()
                    })?;
                }
                Err(err) => {
                    log::error!("{}: {err}", card.word());
                    store.transition(
                        id,
                        CardState::Failed {
                            reason: err.to_string(),
                        },
                    )?;
                    return Ok(CardOutcome::Failed(err));
                }
            }
        }

        match self.image_file(&card, None, &directory).await {
            Ok(path) => store.update(id, |c| c.set_image_path(path))?,
            Err(err) => log::error!("{} ({id}): {err}", card.word()),
        }

        // Cloze cards inherit the mnemonic image of the card they came from.
        let wants_mnemonic = !card.is_cloze() && card.mnemonic_path().is_none();
        if let Some(description) = card.mnemonic_description().filter(|_| wants_mnemonic) {
            let result = self
                .mnemonic_file(&card, description, media_dir.as_deref(), &directory)
                .await;
            match result {
                Ok(path) => store.update(id, |c| c.set_mnemonic_path(path))?,
                Err(err) => log::error!("Mnemonic image for {} ({id}): {err}", card.word()),
            }
        }

        let audio = match self.pick_voice() {
            Some(voice) => self.audio_file(&card, &voice, &directory).await,
            None => Err(GenerationError::Audio("no voices configured".to_string())),
        };
        match audio {
            Ok(path) => store.update(id, |c| c.set_audio_path(path))?,
            Err(err) => log::error!("{} ({id}): {err}", card.word()),
        }

        let missing = store.write(|s| {
            s.transition(id, CardState::AwaitingReview)?;
            Ok::<_, SessionError>(s.get(id)?.missing_media())
        })?;
        if missing.any() {
            log::warn!(
                "{} ({id}) is missing media (image: {}, audio: {}).",
                card.word(),
                missing.image,
                missing.audio
            );
            Ok(CardOutcome::Incomplete(missing))
        } else {
            Ok(CardOutcome::Ready)
        }
    }

    /// Regenerate the image of a card awaiting review. `extra` is added to
    /// the card's own image prompt.
    pub async fn regenerate_image(
        &self,
        store: &SharedStore,
        id: CardId,
        extra: Option<&str>,
    ) -> Result<RegenOutcome, SessionError> {
        let Ok(_permit) = self.limit.acquire().await else {
            return Ok(RegenOutcome::Kept(GenerationError::Image(
                "dispatcher shut down".to_string(),
            )));
        };
        claim_for_regeneration(store, id)?;
        let card = store.card(id)?;
        let directory = store.read(|s| s.output_directory().to_path_buf());
        let result = self.image_file(&card, extra, &directory).await;
        store.write(|s| {
            if let Ok(path) = &result {
                s.update(id, |c| c.set_image_path(path.clone()))?;
            }
            s.transition(id, CardState::AwaitingReview)
        })?;
        Ok(regen_outcome(result))
    }

    /// Regenerate the audio of a card awaiting review with the given voice.
    pub async fn regenerate_audio(
        &self,
        store: &SharedStore,
        id: CardId,
        voice_id: &str,
    ) -> Result<RegenOutcome, SessionError> {
        let Ok(_permit) = self.limit.acquire().await else {
            return Ok(RegenOutcome::Kept(GenerationError::Audio(
                "dispatcher shut down".to_string(),
            )));
        };
        claim_for_regeneration(store, id)?;
        let card = store.card(id)?;
        let directory = store.read(|s| s.output_directory().to_path_buf());
        let result = self.audio_file(&card, voice_id, &directory).await;
        store.write(|s| {
            if let Ok(path) = &result {
                s.update(id, |c| c.set_audio_path(path.clone()))?;
            }
            s.transition(id, CardState::AwaitingReview)
        })?;
        Ok(regen_outcome(result))
    }

    async fn image_file(
        &self,
        card: &Card,
        extra: Option<&str>,
        directory: &Path,
    ) -> Result<PathBuf, GenerationError> {
        let prompt = image_prompt(card, extra);
        let label = format!("image for {:?} ({})", card.word(), card.id());
        let bytes = self
            .retry
            .run(&label, || self.backend.generate_image(&prompt))
            .await?;
        write_media(directory, &card.image_filename(), bytes)
            .await
            .map_err(|err| GenerationError::Image(err.to_string()))
    }

    /// The word's mnemonic image: an existing one from an earlier session if
    /// there is one, else a fresh one in the output directory.
    async fn mnemonic_file(
        &self,
        card: &Card,
        description: &str,
        media_dir: Option<&Path>,
        directory: &Path,
    ) -> Result<PathBuf, GenerationError> {
        if let Some(path) = find_existing(card.word(), media_dir.into_iter().chain([directory])) {
            log::info!("Reusing mnemonic image {}.", path.display());
            return Ok(path);
        }
        let prompt = mnemonic_prompt(card.word(), description);
        let label = format!("mnemonic image for {:?}", card.word());
        let bytes = self
            .retry
            .run(&label, || self.backend.generate_image(&prompt))
            .await?;
        write_media(directory, &mnemonic_filename(card.word()), bytes)
            .await
            .map_err(|err| GenerationError::Image(err.to_string()))
    }

    async fn audio_file(
        &self,
        card: &Card,
        voice_id: &str,
        directory: &Path,
    ) -> Result<PathBuf, GenerationError> {
        let label = format!("audio for {:?} ({})", card.word(), card.id());
        let bytes = self
            .retry
            .run(&label, || {
                self.backend.generate_audio(card.audio_text(), voice_id)
            })
            .await?;
        write_media(directory, &card.audio_filename(), bytes)
            .await
            .map_err(|err| GenerationError::Audio(err.to_string()))
    }

    fn pick_voice(&self) -> Option<String> {
        self.voices.choose(&mut rand::rng()).cloned()
    }
}

/// Move a card from Pending to Generating. False if someone else got there
/// first.
fn claim(store: &SharedStore, id: CardId) -> Result<bool, SessionError> {
    store.write(|s| {
        if s.get(id)?.state() != &CardState::Pending {
            return Ok(false);
        }
        s.transition(id, CardState::Generating)?;
        Ok(true)
    })
}

/// Move a card awaiting review to Generating. Any other state is an
/// invalid transition: regeneration never stands in for a first pass.
fn claim_for_regeneration(store: &SharedStore, id: CardId) -> Result<(), SessionError> {
    store.write(|s| {
        let state = s.get(id)?.state().clone();
        if state != CardState::AwaitingReview {
            return Err(SessionError::InvalidTransition {
                id,
                from: state,
                to: CardState::Generating,
            });
        }
        s.transition(id, CardState::Generating)
    })
}

fn regen_outcome(result: Result<PathBuf, GenerationError>) -> RegenOutcome {
    match result {
        Ok(path) => RegenOutcome::Replaced(path),
        Err(err) => {
            log::error!("Regeneration failed, keeping previous media: {err}");
            RegenOutcome::Kept(err)
        }
    }
}
