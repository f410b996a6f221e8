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
use std::path::PathBuf;

use uuid::Uuid;

use crate::error::SessionError;
use crate::types::card_id::CardId;

/// How many fresh tokens to draw before giving up.
pub const MAX_ATTEMPTS: usize = 5;

/// Hands out card identities whose short ids collide neither with each
/// other nor with media files already present in any of the watched
/// directories (the output directory and the export target).
pub struct IdAllocator {
    /// Directories whose existing files must not be shadowed.
    media_dirs: Vec<PathBuf>,
    /// Short ids issued during this session.
    issued: HashSet<String>,
    /// Source of fresh tokens.
    generator: Box<dyn FnMut() -> Uuid + Send>,
}

impl IdAllocator {
    pub fn new(media_dirs: Vec<PathBuf>) -> Self {
        Self::with_generator(media_dirs, Box::new(Uuid::new_v4))
    }

    pub fn with_generator(
        media_dirs: Vec<PathBuf>,
        generator: Box<dyn FnMut() -> Uuid + Send>,
    ) -> Self {
        Self {
            media_dirs,
            issued: HashSet::new(),
            generator,
        }
    }

    /// Allocate an identity for a card about `word`.
    pub fn allocate(&mut self, word: &str) -> Result<CardId, SessionError> {
        for attempt in 1..=MAX_ATTEMPTS {
            let id = CardId::new((self.generator)());
            let short = id.short();
            if self.issued.contains(&short) {
                log::warn!("Short id {short} already issued (attempt {attempt}), re-rolling.");
                continue;
            }
            if self.is_on_disk(&id, word) {
                log::warn!("Media for {short} already on disk (attempt {attempt}), re-rolling.");
                continue;
            }
            self.issued.insert(short);
            return Ok(id);
        }
        log::error!("Identity space exhausted for {word:?}.");
        Err(SessionError::IdentityExhausted {
            attempts: MAX_ATTEMPTS,
        })
    }

    fn is_on_disk(&self, id: &CardId, word: &str) -> bool {
        let names = [id.image_filename(word), id.audio_filename(word)];
        self.media_dirs
            .iter()
            .any(|dir| names.iter().any(|name| dir.join(name).exists()))
    }
}
