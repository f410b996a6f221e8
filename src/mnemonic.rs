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

//! Mnemonic priming images: one picture per word that sounds like the word,
//! shared by every card made from it and kept across sessions.

use std::path::Path;
use std::path::PathBuf;

use crate::types::card_id::IMAGE_EXTENSION;
use crate::types::card_id::filename_stem;

pub const MNEMONIC_PREFIX: &str = "mpi-";

/// The mnemonic image of a word has no short id: one per word.
pub fn mnemonic_filename(word: &str) -> String {
    format!("{MNEMONIC_PREFIX}{}.{IMAGE_EXTENSION}", filename_stem(word))
}

/// The first of `directories` already holding a mnemonic image for `word`.
pub fn find_existing<'a>(
    word: &str,
    directories: impl IntoIterator<Item = &'a Path>,
) -> Option<PathBuf> {
    let filename = mnemonic_filename(word);
    let found = directories
        .into_iter()
        .map(|dir| dir.join(&filename))
        .find(|path| path.is_file());
    log::debug!("Mnemonic image {filename} exists: {}", found.is_some());
    found
}

pub fn mnemonic_prompt(word: &str, description: &str) -> String {
    format!(
        "Create a memorable image that helps recall the Spanish word '{word}' through \
         phonetic similarity or sound association. The image should NOT contain any text \
         or words.\n\n\
         Focus on creating a visual that sounds similar to '{word}' or its parts, helping \
         memory through sound association rather than meaning.\n\n\
         User's description for phonetic association: {description}\n\n\
         Make the image clear, memorable, and directly related to the phonetic description \
         provided. The style should be photorealistic or illustrative, whichever best \
         serves the mnemonic purpose."
    )
}

#[cfg(test)]
mod tests {
    use std::fs::write;

    use super::*;
    use crate::error::Fallible;
    use crate::helper::create_tmp_directory;

    #[test]
    fn test_mnemonic_filename() {
        assert_eq!(mnemonic_filename("dormir"), "mpi-dormir.jpg");
        assert_eq!(mnemonic_filename("De Hecho"), "mpi-de_hecho.jpg");
        assert_eq!(mnemonic_filename("../x"), "mpi-___x.jpg");
    }

    #[test]
    fn test_find_existing() -> Fallible<()> {
        let output = create_tmp_directory()?;
        let media = create_tmp_directory()?;
        assert_eq!(find_existing("dormir", [output.as_path(), media.as_path()]), None);
        write(media.join("mpi-dormir.jpg"), b"jpg")?;
        assert_eq!(
            find_existing("dormir", [output.as_path(), media.as_path()]),
            Some(media.join("mpi-dormir.jpg"))
        );
        assert_eq!(find_existing("casa", [output.as_path(), media.as_path()]), None);
        Ok(())
    }

    #[test]
    fn test_mnemonic_prompt() {
        let prompt = mnemonic_prompt("dormir", "a college dorm with a deer");
        assert!(prompt.contains("'dormir'"));
        assert!(prompt.contains("NOT contain any text"));
        assert!(prompt.contains("phonetic association: a college dorm with a deer"));
    }
}
