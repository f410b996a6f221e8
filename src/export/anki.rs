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

use std::fs::File;
use std::io::BufWriter;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use csv::WriterBuilder;

use crate::cloze::blank_word_in_sentence;
use crate::config::Config;
use crate::error::Fallible;
use crate::export::ExportReport;
use crate::export::ExportTarget;
use crate::export::copy_media;
use crate::export::exportable;
use crate::export::is_incomplete;
use crate::mnemonic::mnemonic_filename;
use crate::types::card::Card;

pub const VOCABULARY_FILE: &str = "anki_import.csv";
pub const CLOZE_FILE: &str = "anki_import_cloze.csv";

const VOCABULARY_NOTE_TYPE: &str = "2. Picture Words";
const CLOZE_NOTE_TYPE: &str = "3. All-Purpose Card";

const VOCABULARY_FIELDS: [&str; 7] = [
    "Word",
    "Picture",
    "Gender, Personal Connection, Extra Info (Back side)",
    "Pronunciation (Recording and/or IPA)",
    "Test Spelling? (y = yes, blank = no)",
    "guid",
    "Mnemonic Priming Image",
];

/// Fields seven to nine of the cloze note type are left empty.
const CLOZE_FIELDS: [&str; 10] = [
    "Front (Example with word blanked out or missing)",
    "Front (Picture)",
    "Front (Definitions, base word, etc.)",
    "Back (a single word/phrase, no context)",
    "- The full sentence (no words blanked out)",
    "- Extra Info (Pronunciation, personal connections, conjugations, etc)",
    "Unused 1",
    "Unused 2",
    "Unused 3",
    "Mnemonic Priming Image",
];

/// Writes Anki import files into the output directory and copies media
/// into Anki's `collection.media`.
pub struct AnkiExport {
    output_directory: PathBuf,
    media_dir: Option<PathBuf>,
    deck_name: String,
    cloze_deck_name: String,
    test_spelling: bool,
}

impl AnkiExport {
    pub fn new(config: &Config, output_directory: PathBuf, media_dir: Option<PathBuf>) -> Self {
        Self {
            output_directory,
            media_dir,
            deck_name: config.deck_name.clone(),
            cloze_deck_name: config.cloze_deck_name.clone(),
            test_spelling: config.test_spelling,
        }
    }

    fn vocabulary_row(&self, card: &Card) -> Vec<String> {
        let grammar = card
            .analysis()
            .map(|analysis| analysis.grammar_label());
        let back: Vec<&str> = grammar
            .as_deref()
            .into_iter()
            .chain(card.personal_context())
            .collect();
        let back = if back.is_empty() {
            String::new()
        } else {
            format!("{}.", back.join(". "))
        };
        let mut pronunciation = Vec::new();
        if card.audio_path().is_some() {
            pronunciation.push(sound_tag(card));
        }
        if let Some(analysis) = card.analysis() {
            pronunciation.push(analysis.ipa.clone());
        }
        vec![
            card.word().to_string(),
            picture_tag(card),
            back,
            pronunciation.join(" "),
            if self.test_spelling { "y" } else { "" }.to_string(),
            card.id().full(),
            mnemonic_tag(card),
        ]
    }

    fn cloze_row(&self, card: &Card) -> Vec<String> {
        let (sentence, word_form) = match card.sentence() {
            Some(sentence) => (sentence.text.as_str(), sentence.word_form.as_deref()),
            None => ("", None),
        };
        let mut extra = Vec::new();
        if let Some(analysis) = card.analysis() {
            extra.push(analysis.ipa.clone());
        }
        if card.audio_path().is_some() {
            extra.push(sound_tag(card));
        }
        if let Some(context) = card.personal_context() {
            extra.push(context.to_string());
        }
        vec![
            blank_word_in_sentence(sentence, card.word(), word_form),
            picture_tag(card),
            card.analysis()
                .map(|analysis| analysis.grammar_label())
                .unwrap_or_default(),
            card.word().to_string(),
            sentence.to_string(),
            extra.join(" "),
            String::new(),
            String::new(),
            String::new(),
            mnemonic_tag(card),
        ]
    }
}

impl ExportTarget for AnkiExport {
    fn export(&self, cards: &[Card]) -> Fallible<ExportReport> {
        let approved = exportable(cards);
        let (cloze, vocabulary): (Vec<&Card>, Vec<&Card>) =
            approved.iter().copied().partition(|card| card.is_cloze());
        log::info!(
            "Exporting {} vocabulary and {} cloze cards.",
            vocabulary.len(),
            cloze.len()
        );
        let mut report = ExportReport {
            vocabulary_cards: vocabulary.len(),
            cloze_cards: cloze.len(),
            ..ExportReport::default()
        };
        if !vocabulary.is_empty() {
            let path = self.output_directory.join(VOCABULARY_FILE);
            let header = Header {
                note_type: VOCABULARY_NOTE_TYPE,
                deck: &self.deck_name,
                guid_column: Some(6),
                fields: &VOCABULARY_FIELDS,
            };
            let rows = vocabulary.iter().map(|card| self.vocabulary_row(card));
            write_import_file(&path, &header, rows)?;
            report.files.push(path);
        }
        if !cloze.is_empty() {
            let path = self.output_directory.join(CLOZE_FILE);
            let header = Header {
                note_type: CLOZE_NOTE_TYPE,
                deck: &self.cloze_deck_name,
                guid_column: None,
                fields: &CLOZE_FIELDS,
            };
            let rows = cloze.iter().map(|card| self.cloze_row(card));
            write_import_file(&path, &header, rows)?;
            report.files.push(path);
        }
        for card in &approved {
            if is_incomplete(card) {
                report
                    .incomplete
                    .push(format!("{} ({})", card.word(), card.id()));
            }
        }
        match &self.media_dir {
            Some(media_dir) => {
                for card in &approved {
                    copy_media(card, media_dir, &mut report)?;
                }
            }
            None => log::warn!("No Anki media directory, media not copied."),
        }
        Ok(report)
    }
}

/// The directives at the top of an Anki import file.
struct Header<'a> {
    note_type: &'a str,
    deck: &'a str,
    guid_column: Option<usize>,
    fields: &'a [&'a str],
}

fn write_import_file(
    path: &Path,
    header: &Header<'_>,
    rows: impl Iterator<Item = Vec<String>>,
) -> Fallible<()> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "#notetype:{}", header.note_type)?;
    writeln!(file, "#deck:{}", header.deck)?;
    writeln!(file, "#separator:tab")?;
    writeln!(file, "#html:true")?;
    if let Some(column) = header.guid_column {
        writeln!(file, "#guid column:{column}")?;
    }
    writeln!(file, "#fields:{}", header.fields.join("\t"))?;
    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(file);
    for row in rows {
        writer.write_record(&row)?;
    }
    writer.flush()?;
    log::info!("Wrote {}.", path.display());
    Ok(())
}

fn picture_tag(card: &Card) -> String {
    match card.image_path() {
        Some(_) => format!("<img src=\"{}\">", card.image_filename()),
        None => String::new(),
    }
}

fn mnemonic_tag(card: &Card) -> String {
    match card.mnemonic_path() {
        Some(_) => format!("<img src=\"{}\">", mnemonic_filename(card.word())),
        None => String::new(),
    }
}

fn sound_tag(card: &Card) -> String {
    format!("[sound:{}]", card.audio_filename())
}
