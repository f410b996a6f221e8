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
use std::process::Stdio;

use tokio::process::Command;

use crate::console::Console;
use crate::error::Fallible;
use crate::error::fail;
use crate::review::Decision;
use crate::review::ReviewSurface;
use crate::types::card::Card;

const PLAYER: &str = "mpv";

/// Reviews cards on the terminal. Images open in the system viewer, audio
/// plays through `mpv`.
pub struct TerminalSurface {
    console: Console,
}

impl TerminalSurface {
    /// Review on `console`, the same one the words were typed on.
    pub fn new(console: Console) -> Self {
        Self { console }
    }

    async fn prompt(&mut self, question: &str) -> Fallible<String> {
        match self.console.ask(question).await? {
            Some(line) => Ok(line),
            None => fail("input closed."),
        }
    }

    async fn choose_voice(&mut self, voices: &[String]) -> Fallible<Option<String>> {
        for (i, voice) in voices.iter().enumerate() {
            println!("  {}. {voice}", i + 1);
        }
        let answer = self.prompt("Voice number (blank to cancel): ").await?;
        if answer.is_empty() {
            return Ok(None);
        }
        match answer.parse::<usize>() {
            Ok(n) if (1..=voices.len()).contains(&n) => Ok(Some(voices[n - 1].clone())),
            _ => {
                println!("No voice {answer:?}.");
                Ok(None)
            }
        }
    }

    async fn choose_sentences(&mut self, card: &Card) -> Fallible<Option<Vec<usize>>> {
        let Some(analysis) = card.analysis() else {
            println!("This card has no example sentences.");
            return Ok(None);
        };
        for (i, sentence) in analysis.example_sentences.iter().enumerate() {
            println!("  {:>2}. {} ({})", i + 1, sentence.text, sentence.tense);
        }
        let answer = self
            .prompt("Sentences to practise, e.g. 1,4,7 (blank to cancel): ")
            .await?;
        if answer.is_empty() {
            return Ok(None);
        }
        match parse_selection(&answer) {
            Ok(selection) => Ok(Some(selection)),
            Err(message) => {
                println!("{message}");
                Ok(None)
            }
        }
    }
}

impl ReviewSurface for TerminalSurface {
    async fn present(&mut self, card: &Card, voices: &[String]) -> Fallible<Decision> {
        println!();
        println!("{}", render(card));
        if let Some(image) = card.image_path() {
            show_image(image);
        }
        if let Some(audio) = card.audio_path() {
            play_audio(audio).await;
        }
        let missing = card.missing_media().any();
        loop {
            if missing {
                println!("[i] approve with missing media");
            } else {
                println!("[a] approve");
            }
            println!("[r] regenerate image  [v] regenerate audio  [p] replay audio");
            println!("[s] split into cloze cards  [q] quit");
            let answer = self.prompt("> ").await?;
            match answer.as_str() {
                "a" => return Ok(Decision::Approve),
                "i" if missing => return Ok(Decision::ApproveIncomplete),
                "r" => {
                    let extra = self
                        .prompt("Extra image prompt (blank for none): ")
                        .await?;
                    let extra = if extra.is_empty() { None } else { Some(extra) };
                    return Ok(Decision::RegenerateImage(extra));
                }
                "v" => {
                    if let Some(voice) = self.choose_voice(voices).await? {
                        return Ok(Decision::RegenerateAudio(voice));
                    }
                }
                "p" => match card.audio_path() {
                    Some(audio) => play_audio(audio).await,
                    None => println!("No audio to play."),
                },
                "s" => {
                    if let Some(selection) = self.choose_sentences(card).await? {
                        return Ok(Decision::Split(selection));
                    }
                }
                "q" => return Ok(Decision::Abandon),
                _ => println!("Unknown option {answer:?}."),
            }
        }
    }

    fn notify(&mut self, message: &str) {
        println!("! {message}");
    }
}

/// The text shown for a card.
pub fn render(card: &Card) -> String {
    let mut lines = vec![format!("== {} ==", card.word())];
    if let Some(analysis) = card.analysis() {
        lines.push(format!("IPA: {}", analysis.ipa));
        lines.push(format!(
            "{} ({})",
            analysis.grammar_label(),
            analysis.part_of_speech
        ));
    }
    if let Some(sentence) = card.sentence() {
        lines.push(format!("Sentence: {} [{}]", sentence.text, sentence.tense));
    }
    if let Some(context) = card.personal_context() {
        lines.push(format!("Context: {context}"));
    }
    if let Some(extra) = card.extra_image_prompt() {
        lines.push(format!("Image prompt: {extra}"));
    }
    if let Some(description) = card.mnemonic_description() {
        let image = card
            .mnemonic_path()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "MISSING".to_string());
        lines.push(format!("Mnemonic ({description}): {image}"));
    }
    let missing = card.missing_media();
    match card.image_path() {
        Some(path) => lines.push(format!("Image: {}", path.display())),
        None => lines.push("Image: MISSING".to_string()),
    }
    match card.audio_path() {
        Some(path) => lines.push(format!("Audio: {}", path.display())),
        None => lines.push("Audio: MISSING".to_string()),
    }
    if missing.any() {
        lines.push("Media missing: regenerate, or approve with missing media.".to_string());
    }
    lines.join("\n")
}

/// Parse a list of 1-based sentence numbers into 0-based indices.
pub fn parse_selection(input: &str) -> Result<Vec<usize>, String> {
    let mut selection = Vec::new();
    for token in input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        match token.parse::<usize>() {
            Ok(n) if n >= 1 => selection.push(n - 1),
            _ => return Err(format!("{token:?} is not a sentence number.")),
        }
    }
    if selection.is_empty() {
        return Err("No sentences selected.".to_string());
    }
    Ok(selection)
}

fn show_image(path: &Path) {
    if let Err(err) = open::that(path) {
        log::warn!("Could not open {}: {err}", path.display());
    }
}

async fn play_audio(path: &Path) {
    let status = Command::new(PLAYER)
        .arg("--really-quiet")
        .arg("--no-video")
        .arg(path)
        .stdin(Stdio::null())
        .status()
        .await;
    match status {
        Ok(status) if status.success() => {}
        Ok(status) => log::warn!("{PLAYER} exited with {status}."),
        Err(err) => log::warn!("Could not run {PLAYER}: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use crate::helper::canned_analysis;
    use crate::types::card::SentenceInfo;
    use crate::types::card_id::CardId;
    use crate::types::word_input::WordInput;

    #[tokio::test]
    async fn test_review_reads_after_word_entry() -> Fallible<()> {
        let typed: &[u8] = b"gato\n\n\n\n\nq\n";
        let mut console = Console::spawn(typed);
        let inputs = crate::input::interactive(&mut console).await?;
        assert_eq!(inputs.len(), 1);
        let mut surface = TerminalSurface::new(console);
        assert_eq!(surface.prompt("> ").await?, "q");
        assert!(surface.prompt("> ").await.is_err());
        Ok(())
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection("1,4, 7"), Ok(vec![0, 3, 6]));
        assert_eq!(parse_selection("2 3"), Ok(vec![1, 2]));
        assert!(parse_selection("0").is_err());
        assert!(parse_selection("one").is_err());
        assert!(parse_selection(" , ").is_err());
    }

    #[test]
    fn test_render() {
        let input = WordInput::new("gato", Some("my cat Tom"), None);
        let mut card = Card::new(CardId::new(Uuid::new_v4()), &input);
        card.set_analysis(Arc::new(canned_analysis("gato").unwrap()));
        card.set_image_path(PathBuf::from("/out/gato.jpg"));
        let text = render(&card);
        assert!(text.contains("== gato =="));
        assert!(text.contains("IPA: ˈga.to"));
        assert!(text.contains("Sustantivo masculino (noun)"));
        assert!(text.contains("Context: my cat Tom"));
        assert!(text.contains("Image: /out/gato.jpg"));
        assert!(text.contains("Audio: MISSING"));
        assert!(text.contains("Media missing"));

        let sentence = SentenceInfo {
            text: "El gato duerme.".to_string(),
            tense: "presente".to_string(),
            word_form: None,
        };
        card.retarget(sentence, card.id().short());
        let text = render(&card);
        assert!(text.contains("Sentence: El gato duerme. [presente]"));
        assert!(text.contains("Image: MISSING"));
    }
}
