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

use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::Fallible;
use crate::media::write_media;
use crate::review::ReviewOutcome;
use crate::types::card::Card;
use crate::types::timestamp::Timestamp;

pub const MANIFEST_FILE: &str = "session.json";

/// A record of a session: every card with its state, media paths, and
/// analysis.
#[derive(Serialize)]
pub struct Manifest<'a> {
    started_at: Timestamp,
    finished_at: Timestamp,
    outcome: &'static str,
    output_directory: &'a Path,
    cards: &'a [Card],
}

impl<'a> Manifest<'a> {
    pub fn new(
        started_at: Timestamp,
        outcome: ReviewOutcome,
        output_directory: &'a Path,
        cards: &'a [Card],
    ) -> Self {
        Self {
            started_at,
            finished_at: Timestamp::now(),
            outcome: match outcome {
                ReviewOutcome::Completed => "completed",
                ReviewOutcome::Abandoned => "abandoned",
            },
            output_directory,
            cards,
        }
    }

    /// Write the manifest into the output directory, replacing any earlier
    /// one.
    pub async fn write(&self) -> Fallible<PathBuf> {
        let json = serde_json::to_string_pretty(self)?;
        let path = write_media(self.output_directory, MANIFEST_FILE, json.into_bytes()).await?;
        log::info!(
            "Wrote manifest for the session from {} to {} to {}.",
            self.started_at,
            self.finished_at,
            path.display()
        );
        Ok(path)
    }
}
