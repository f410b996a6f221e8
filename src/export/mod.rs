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

//! Hands approved cards to the outside world.

pub mod anki;

use std::fs::File;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use crate::error::Fallible;
use crate::error::fail;
use crate::mnemonic::mnemonic_filename;
use crate::types::card::Card;
use crate::types::card::CardState;

pub trait ExportTarget {
    /// Export the approved cards among `cards`, in order.
    fn export(&self, cards: &[Card]) -> Fallible<ExportReport>;
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExportReport {
    pub vocabulary_cards: usize,
    pub cloze_cards: usize,
    /// The record files written.
    pub files: Vec<PathBuf>,
    /// Media copied into the target's media directory.
    pub copied: Vec<PathBuf>,
    /// Media not copied because a file of that name was already there.
    pub skipped_existing: Vec<PathBuf>,
    /// Exported cards approved without all their media, as `word (id)`.
    pub incomplete: Vec<String>,
}

/// The cards that go into an export: approved ones, in order.
pub fn exportable(cards: &[Card]) -> Vec<&Card> {
    cards
        .iter()
        .filter(|card| card.state().is_approved())
        .collect()
}

pub fn is_incomplete(card: &Card) -> bool {
    matches!(
        card.state(),
        CardState::Approved {
            incomplete_media: true
        }
    )
}

/// Copy a card's media into `media_dir`. Files already present there are
/// left alone. A mnemonic image reused from `media_dir` is not copied.
pub fn copy_media(card: &Card, media_dir: &Path, report: &mut ExportReport) -> Fallible<()> {
    if !media_dir.is_dir() {
        return fail(format!(
            "media directory {} does not exist.",
            media_dir.display()
        ));
    }
    let media = [
        (card.image_path(), card.image_filename()),
        (card.audio_path(), card.audio_filename()),
        (card.mnemonic_path(), mnemonic_filename(card.word())),
    ];
    for (source, filename) in media {
        let Some(source) = source else {
            continue;
        };
        let dest = media_dir.join(&filename);
        if source == dest {
            continue;
        }
        if copy_new(source, &dest)? {
            log::info!("Copied {} to {}.", filename, media_dir.display());
            report.copied.push(dest);
        } else {
            log::warn!("{} already exists, not overwriting.", dest.display());
            report.skipped_existing.push(dest);
        }
    }
    Ok(())
}

/// Copy `source` to `dest` unless `dest` exists. True if copied.
fn copy_new(source: &Path, dest: &Path) -> Fallible<bool> {
    let mut input = File::open(source)?;
    let mut output = match OpenOptions::new().write(true).create_new(true).open(dest) {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(err) => return Err(err.into()),
    };
    std::io::copy(&mut input, &mut output)?;
    output.sync_all()?;
    Ok(true)
}
