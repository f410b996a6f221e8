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

use crate::console::Console;
use crate::error::Fallible;
use crate::error::fail;
use crate::types::word_input::WordInput;

/// Words given on the command line, without notes.
pub fn from_list(words: &[String]) -> Vec<WordInput> {
    words
        .iter()
        .filter(|word| !word.trim().is_empty())
        .map(|word| WordInput::new(word, None, None))
        .collect()
}

/// Read a word file: one `word | personal context | image prompt | mnemonic`
/// entry per line, where everything after the word is optional. Blank lines and lines starting with
/// `#` are ignored.
pub fn from_file(path: &Path) -> Fallible<Vec<WordInput>> {
    if !path.exists() {
        return fail(format!("word file {} does not exist.", path.display()));
    }
    let contents = std::fs::read_to_string(path)?;
    let inputs = parse_word_file(&contents);
    if inputs.is_empty() {
        return fail(format!("no words in {}.", path.display()));
    }
    log::info!("Read {} words from {}.", inputs.len(), path.display());
    Ok(inputs)
}

pub fn parse_word_file(contents: &str) -> Vec<WordInput> {
    let mut inputs = Vec::new();
    for (number, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.splitn(4, '|').map(str::trim);
        let word = parts.next().unwrap_or_default();
        if word.is_empty() {
            log::warn!("Line {}: no word, skipping.", number + 1);
            continue;
        }
        let context = parts.next();
        let prompt = parts.next();
        let mnemonic = parts.next();
        inputs.push(WordInput::new(word, context, prompt).with_mnemonic(mnemonic));
    }
    inputs
}

/// Ask for words on the terminal until an empty word. Each word may carry a
/// personal context, an extra image prompt, and a sound-alike description
/// for a mnemonic image.
pub async fn interactive(console: &mut Console) -> Fallible<Vec<WordInput>> {
    let mut inputs = Vec::new();
    loop {
        let Some(word) = console.ask("Spanish word (blank to finish): ").await? else {
            break;
        };
        if word.is_empty() {
            break;
        }
        let context = console.ask("  Personal context (optional): ").await?;
        let prompt = console.ask("  Extra image prompt (optional): ").await?;
        let mnemonic = console
            .ask("  What does it sound like? For a mnemonic image (optional): ")
            .await?;
        let input = WordInput::new(&word, context.as_deref(), prompt.as_deref())
            .with_mnemonic(mnemonic.as_deref());
        log::debug!("Added {:?}.", input.word());
        inputs.push(input);
    }
    log::info!("Collected {} words.", inputs.len());
    Ok(inputs)
}
