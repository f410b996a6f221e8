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
use std::future::Future;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use crate::backend::Backend;
use crate::backend::RemoteBackend;
use crate::config::Config;
use crate::console::Console;
use crate::dispatch::Dispatcher;
use crate::error::Fallible;
use crate::error::fail;
use crate::export::ExportReport;
use crate::export::ExportTarget;
use crate::export::anki::AnkiExport;
use crate::export::is_incomplete;
use crate::input;
use crate::manifest::Manifest;
use crate::review::ReviewMachine;
use crate::review::ReviewOutcome;
use crate::review::ReviewSurface;
use crate::review::terminal::TerminalSurface;
use crate::store::CardStore;
use crate::store::SharedStore;
use crate::types::card::Card;
use crate::types::card::CardState;
use crate::types::timestamp::Timestamp;
use crate::types::word_input::WordInput;

pub struct CreateOptions {
    pub words: Vec<String>,
    pub file: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub anki_media: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub export: bool,
}

pub async fn create_cards(options: CreateOptions) -> Fallible<()> {
    let mut config = Config::load(options.config.as_deref())?;
    if let Some(output) = options.output {
        config.output_directory = output;
    }
    if let Some(media) = options.anki_media {
        config.anki_media_path = Some(media);
    }
    // Credentials are checked before any input is asked for.
    let backend = Arc::new(RemoteBackend::from_env(&config)?);
    let mut console = Console::stdin();
    let inputs = if let Some(file) = &options.file {
        input::from_file(file)?
    } else if !options.words.is_empty() {
        input::from_list(&options.words)
    } else {
        input::interactive(&mut console).await?
    };
    let mut surface = TerminalSurface::new(console);
    let summary = run_session(
        &config,
        inputs,
        backend,
        &mut surface,
        options.export,
        ctrl_c(),
    )
    .await?;
    println!("{summary}");
    Ok(())
}

/// Completes on the first Ctrl-C. Never completes if the signal cannot be
/// listened for.
async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("Cannot listen for Ctrl-C: {err}");
        std::future::pending::<()>().await;
    }
}

/// Run a whole session: create a card per word, generate media in the
/// background, review every card in input order, write the manifest, and
/// export the approved cards. Review is abandoned when `interrupt`
/// completes; the manifest and export still happen.
pub async fn run_session<B: Backend, S: ReviewSurface>(
    config: &Config,
    inputs: Vec<WordInput>,
    backend: Arc<B>,
    surface: &mut S,
    export: bool,
    interrupt: impl Future<Output = ()>,
) -> Fallible<Summary> {
    if inputs.is_empty() {
        return fail("no words given.");
    }
    let started_at = Timestamp::now();
    let output = config.output_directory.clone();
    let mut store = CardStore::new(output.clone(), config.resolve_anki_media_path());
    let ids = store.create_initial(&inputs)?;
    log::info!("Created {} cards in {}.", ids.len(), output.display());

    let store = SharedStore::new(store);
    let dispatcher = Dispatcher::from_config(backend, config);
    let mut machine = ReviewMachine::new(store.clone(), dispatcher);
    let outcome = machine.run_until(surface, interrupt).await?;

    let (cards, all_approved, media_dir) = store.read(|store| {
        (
            store.cards().to_vec(),
            store.all_approved(),
            store.export_media_dir().map(Path::to_path_buf),
        )
    });
    if all_approved {
        log::info!("Every card approved.");
    }
    Manifest::new(started_at, outcome, &output, &cards)
        .write()
        .await?;
    let report = if export {
        let target = AnkiExport::new(config, output.clone(), media_dir);
        Some(target.export(&cards)?)
    } else {
        log::info!("Skipping export.");
        None
    };
    Ok(Summary::new(outcome, &cards, output, report))
}

/// What happened to the session's cards.
#[derive(Debug)]
pub struct Summary {
    outcome: ReviewOutcome,
    total: usize,
    approved: usize,
    /// Cards approved without all their media, as `word (id)`.
    incomplete: Vec<String>,
    /// Words that failed, with the reason.
    failed: Vec<(String, String)>,
    unreviewed: usize,
    output_directory: PathBuf,
    export: Option<ExportReport>,
}

impl Summary {
    fn new(
        outcome: ReviewOutcome,
        cards: &[Card],
        output_directory: PathBuf,
        export: Option<ExportReport>,
    ) -> Self {
        let mut summary = Self {
            outcome,
            total: cards.len(),
            approved: 0,
            incomplete: Vec::new(),
            failed: Vec::new(),
            unreviewed: 0,
            output_directory,
            export,
        };
        for card in cards {
            match card.state() {
                CardState::Approved { .. } => {
                    summary.approved += 1;
                    if is_incomplete(card) {
                        summary
                            .incomplete
                            .push(format!("{} ({})", card.word(), card.id()));
                    }
                }
                CardState::Failed { reason } => {
                    summary
                        .failed
                        .push((card.word().to_string(), reason.clone()));
                }
                _ => summary.unreviewed += 1,
            }
        }
        summary
    }
}

impl Display for Summary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.outcome {
            ReviewOutcome::Completed => writeln!(f, "Session complete.")?,
            ReviewOutcome::Abandoned => writeln!(f, "Session abandoned.")?,
        }
        writeln!(f, "Cards: {}", self.total)?;
        writeln!(f, "Approved: {}", self.approved)?;
        if !self.incomplete.is_empty() {
            writeln!(f, "Approved with missing media:")?;
            for card in &self.incomplete {
                writeln!(f, "  {card}")?;
            }
        }
        if !self.failed.is_empty() {
            writeln!(f, "Failed (retry these in a new session):")?;
            for (word, reason) in &self.failed {
                writeln!(f, "  {word}: {reason}")?;
            }
        }
        if self.unreviewed > 0 {
            writeln!(f, "Not reviewed: {}", self.unreviewed)?;
        }
        if let Some(report) = &self.export {
            for file in &report.files {
                writeln!(f, "Wrote {}", file.display())?;
            }
            if !report.copied.is_empty() {
                writeln!(f, "Copied {} media files to Anki.", report.copied.len())?;
            }
        }
        write!(f, "Output: {}", self.output_directory.display())
    }
}
