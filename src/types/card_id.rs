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

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::error::ErrorReport;
use crate::error::Fallible;

/// Length of the short identifier embedded in media filenames.
pub const SHORT_ID_LEN: usize = 8;

/// Extension of generated images.
pub const IMAGE_EXTENSION: &str = "jpg";

/// Extension of generated audio.
pub const AUDIO_EXTENSION: &str = "mp3";

/// A card's identity. Wraps a random v4 UUID; the first eight hex characters
/// form the short id used in media filenames.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId {
    inner: Uuid,
}

impl CardId {
    pub fn new(inner: Uuid) -> Self {
        Self { inner }
    }

    /// The full identifier, in hyphenated form. Used as the Anki guid.
    pub fn full(&self) -> String {
        self.inner.hyphenated().to_string()
    }

    pub fn short(&self) -> String {
        let simple = self.inner.simple().to_string();
        simple[..SHORT_ID_LEN].to_string()
    }

    #[cfg(test)]
    pub fn parse(s: &str) -> Fallible<Self> {
        let inner = Uuid::parse_str(s).map_err(|_| ErrorReport::new("invalid card id"))?;
        Ok(Self { inner })
    }

    pub fn image_filename(&self, word: &str) -> String {
        media_filename(word, &self.short(), IMAGE_EXTENSION)
    }

    pub fn audio_filename(&self, word: &str) -> String {
        media_filename(word, &self.short(), AUDIO_EXTENSION)
    }
}

impl Display for CardId {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{}", self.short())
    }
}

/// Turns a word into the stem of a media filename: lower case, with every
/// character other than a letter, digit, `_` or `-` replaced by an
/// underscore. The stem never contains a path separator or `..`.
pub fn filename_stem(word: &str) -> String {
    word.trim()
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn media_filename(word: &str, short_id: &str, extension: &str) -> String {
    format!("{}-{}.{}", filename_stem(word), short_id, extension)
}
