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

/// A word as entered by the user, with its optional notes.
#[derive(Clone, Debug, PartialEq)]
pub struct WordInput {
    word: String,
    personal_context: Option<String>,
    extra_image_prompt: Option<String>,
    /// What the word sounds like, for a mnemonic priming image.
    mnemonic: Option<String>,
}

impl WordInput {
    pub fn new(
        word: &str,
        personal_context: Option<&str>,
        extra_image_prompt: Option<&str>,
    ) -> Self {
        Self {
            word: word.trim().to_lowercase(),
            personal_context: non_empty(personal_context),
            extra_image_prompt: non_empty(extra_image_prompt),
            mnemonic: None,
        }
    }

    pub fn with_mnemonic(mut self, description: Option<&str>) -> Self {
        self.mnemonic = non_empty(description);
        self
    }

    pub fn word(&self) -> &str {
        &self.word
    }

    pub fn personal_context(&self) -> Option<&str> {
        self.personal_context.as_deref()
    }

    pub fn extra_image_prompt(&self) -> Option<&str> {
        self.extra_image_prompt.as_deref()
    }

    pub fn mnemonic(&self) -> Option<&str> {
        self.mnemonic.as_deref()
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal() {
        let input = WordInput::new("hola", None, None);
        assert_eq!(input.word(), "hola");
        assert_eq!(input.personal_context(), None);
        assert_eq!(input.extra_image_prompt(), None);
    }

    #[test]
    fn test_normalization() {
        let input = WordInput::new("  Correr ", Some("I run every morning"), Some("   "));
        assert_eq!(input.word(), "correr");
        assert_eq!(input.personal_context(), Some("I run every morning"));
        assert_eq!(input.extra_image_prompt(), None);
    }

    #[test]
    fn test_mnemonic() {
        let input = WordInput::new("dormir", None, None).with_mnemonic(Some(" college dorm room "));
        assert_eq!(input.mnemonic(), Some("college dorm room"));
        let input = WordInput::new("dormir", None, None).with_mnemonic(Some(""));
        assert_eq!(input.mnemonic(), None);
    }
}
