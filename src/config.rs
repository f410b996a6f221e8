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

use std::env;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::backend::retry::RetryPolicy;
use crate::error::Fallible;
use crate::error::fail;

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "palabras.toml";

pub const DEFAULT_DECK: &str = "Fluent Forever Spanish::2. Everything Else";

/// Mexican Spanish voices.
const DEFAULT_VOICES: [&str; 3] = [
    "CaJslL1xziwefCeTNzHv",
    "gbTn1bmCvNgk0QEAVyfM",
    "qXvyMc4erc4RzqXLpiiR",
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub output_directory: PathBuf,
    /// Anki's `collection.media` directory. Detected when absent.
    pub anki_media_path: Option<PathBuf>,
    pub deck_name: String,
    pub cloze_deck_name: String,
    pub test_spelling: bool,
    /// Cards generated at once.
    pub concurrency: usize,
    pub retry_attempts: usize,
    pub retry_base_delay_ms: u64,
    pub voices: Vec<String>,
    pub models: Models,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Models {
    pub analysis: String,
    pub image: String,
    pub audio: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("./output"),
            anki_media_path: None,
            deck_name: DEFAULT_DECK.to_string(),
            cloze_deck_name: DEFAULT_DECK.to_string(),
            test_spelling: false,
            concurrency: 2,
            retry_attempts: 3,
            retry_base_delay_ms: 500,
            voices: DEFAULT_VOICES.iter().map(ToString::to_string).collect(),
            models: Models::default(),
        }
    }
}

impl Default for Models {
    fn default() -> Self {
        Self {
            analysis: "gpt-4o".to_string(),
            image: "dall-e-3".to_string(),
            audio: "eleven_flash_v2_5".to_string(),
        }
    }
}

impl Config {
    /// Load the configuration from `path`, or from `palabras.toml` if it
    /// exists, or fall back to the defaults.
    pub fn load(path: Option<&Path>) -> Fallible<Self> {
        let config = match path {
            Some(path) => {
                if !path.exists() {
                    return fail(format!("config file {} does not exist.", path.display()));
                }
                Self::from_file(path)?
            }
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    log::debug!("No config file, using defaults.");
                    Self::default()
                }
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Fallible<Self> {
        log::debug!("Loading config from {}.", path.display());
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Fallible<Self> {
        let config: Config = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Fallible<()> {
        if self.concurrency == 0 {
            return fail("concurrency must be at least 1.");
        }
        if self.retry_attempts == 0 {
            return fail("retry_attempts must be at least 1.");
        }
        if self.voices.is_empty() {
            return fail("at least one voice must be configured.");
        }
        if self.deck_name.trim().is_empty() || self.cloze_deck_name.trim().is_empty() {
            return fail("deck names must not be empty.");
        }
        if self.concurrency > 2 {
            log::warn!(
                "Concurrency {} exceeds 2; expect rate limiting from the backends.",
                self.concurrency
            );
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }

    /// The configured Anki media directory, or the first standard location
    /// that exists.
    pub fn resolve_anki_media_path(&self) -> Option<PathBuf> {
        match &self.anki_media_path {
            Some(path) => Some(path.clone()),
            None => find_anki_collection_media(),
        }
    }
}

/// Look for Anki's `collection.media` folder in the usual places.
pub fn find_anki_collection_media() -> Option<PathBuf> {
    let found = anki_media_candidates()
        .into_iter()
        .find(|path| path.is_dir());
    match &found {
        Some(path) => log::info!("Found Anki media directory at {}.", path.display()),
        None => log::warn!("Could not find Anki's collection.media directory."),
    }
    found
}

fn anki_media_candidates() -> Vec<PathBuf> {
    let profile = Path::new("Anki2").join("User 1").join("collection.media");
    let mut candidates = Vec::new();
    if cfg!(windows) {
        if let Ok(appdata) = env::var("APPDATA") {
            candidates.push(PathBuf::from(appdata).join(&profile));
        }
    } else if let Ok(home) = env::var("HOME") {
        let home = PathBuf::from(home);
        candidates.push(home.join(".local").join("share").join(&profile));
        candidates.push(
            home.join("Library")
                .join("Application Support")
                .join(&profile),
        );
        candidates.push(home.join("Documents").join(&profile));
    }
    candidates
}
