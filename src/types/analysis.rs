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

/// The maximum number of example sentences kept per word.
pub const MAX_EXAMPLE_SENTENCES: usize = 15;

/// The grammatical analysis of a word.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WordAnalysis {
    /// IPA transcription, syllables separated by dots, stress marked with `ˈ`.
    pub ipa: String,
    pub part_of_speech: PartOfSpeech,
    /// Only present for nouns.
    #[serde(default)]
    pub gender: Option<Gender>,
    /// Only present for verbs.
    #[serde(default)]
    pub verb_type: Option<VerbType>,
    #[serde(default)]
    pub example_sentences: Vec<ExampleSentence>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExampleSentence {
    pub text: String,
    /// Grammatical tense label, e.g. `presente` or `pretérito`.
    pub tense: String,
    /// The inflected form of the word as it appears in the sentence.
    #[serde(default)]
    pub word_form: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Adjective,
    Adverb,
    Pronoun,
    Preposition,
    Conjunction,
    Article,
    Interjection,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[serde(alias = "masculino")]
    Masculine,
    #[serde(alias = "femenino")]
    Feminine,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerbType {
    #[serde(alias = "transitivo")]
    Transitive,
    #[serde(alias = "intransitivo")]
    Intransitive,
    #[serde(alias = "reflexivo")]
    Reflexive,
    Pronominal,
}

/// Ways an analysis can be malformed.
#[derive(Debug, PartialEq)]
pub enum AnalysisDefect {
    EmptyIpa,
    GenderOnNonNoun,
    VerbTypeOnNonVerb,
    TooManySentences(usize),
    EmptySentence(usize),
}

impl Display for AnalysisDefect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisDefect::EmptyIpa => write!(f, "empty IPA transcription"),
            AnalysisDefect::GenderOnNonNoun => write!(f, "gender given for a non-noun"),
            AnalysisDefect::VerbTypeOnNonVerb => write!(f, "verb type given for a non-verb"),
            AnalysisDefect::TooManySentences(n) => {
                write!(f, "{n} example sentences, at most {MAX_EXAMPLE_SENTENCES} allowed")
            }
            AnalysisDefect::EmptySentence(i) => write!(f, "example sentence {i} is empty"),
        }
    }
}

impl WordAnalysis {
    /// Check the structural invariants of an analysis.
    pub fn validate(&self) -> Result<(), AnalysisDefect> {
        if self.ipa.trim().is_empty() {
            return Err(AnalysisDefect::EmptyIpa);
        }
        if self.gender.is_some() && self.part_of_speech != PartOfSpeech::Noun {
            return Err(AnalysisDefect::GenderOnNonNoun);
        }
        if self.verb_type.is_some() && self.part_of_speech != PartOfSpeech::Verb {
            return Err(AnalysisDefect::VerbTypeOnNonVerb);
        }
        if self.example_sentences.len() > MAX_EXAMPLE_SENTENCES {
            return Err(AnalysisDefect::TooManySentences(
                self.example_sentences.len(),
            ));
        }
        for (i, sentence) in self.example_sentences.iter().enumerate() {
            if sentence.text.trim().is_empty() {
                return Err(AnalysisDefect::EmptySentence(i));
            }
        }
        Ok(())
    }

    /// The grammatical description shown on the back of a card, e.g.
    /// `Sustantivo masculino` or `Verbo transitivo`.
    pub fn grammar_label(&self) -> String {
        let pos = self.part_of_speech.spanish();
        match (self.part_of_speech, self.gender, self.verb_type) {
            (PartOfSpeech::Noun, Some(gender), _) => format!("{pos} {}", gender.spanish()),
            (PartOfSpeech::Verb, _, Some(verb_type)) => {
                format!("{pos} {}", verb_type.spanish())
            }
            _ => pos.to_string(),
        }
    }
}

impl PartOfSpeech {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartOfSpeech::Noun => "noun",
            PartOfSpeech::Verb => "verb",
            PartOfSpeech::Adjective => "adjective",
            PartOfSpeech::Adverb => "adverb",
            PartOfSpeech::Pronoun => "pronoun",
            PartOfSpeech::Preposition => "preposition",
            PartOfSpeech::Conjunction => "conjunction",
            PartOfSpeech::Article => "article",
            PartOfSpeech::Interjection => "interjection",
        }
    }

    pub fn spanish(&self) -> &'static str {
        match self {
            PartOfSpeech::Noun => "Sustantivo",
            PartOfSpeech::Verb => "Verbo",
            PartOfSpeech::Adjective => "Adjetivo",
            PartOfSpeech::Adverb => "Adverbio",
            PartOfSpeech::Pronoun => "Pronombre",
            PartOfSpeech::Preposition => "Preposición",
            PartOfSpeech::Conjunction => "Conjunción",
            PartOfSpeech::Article => "Artículo",
            PartOfSpeech::Interjection => "Interjección",
        }
    }
}

impl Gender {
    pub fn spanish(&self) -> &'static str {
        match self {
            Gender::Masculine => "masculino",
            Gender::Feminine => "femenino",
        }
    }
}

impl VerbType {
    pub fn spanish(&self) -> &'static str {
        match self {
            VerbType::Transitive => "transitivo",
            VerbType::Intransitive => "intransitivo",
            VerbType::Reflexive => "reflexivo",
            VerbType::Pronominal => "pronominal",
        }
    }
}

impl Display for PartOfSpeech {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
