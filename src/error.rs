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

use std::error::Error;
use std::fmt::Display;
use std::fmt::Formatter;

use crate::types::card::CardState;
use crate::types::card_id::CardId;

/// A human-readable error that aborts the current command.
#[derive(Debug, PartialEq)]
pub struct ErrorReport {
    message: String,
}

pub type Fallible<T> = Result<T, ErrorReport>;

impl ErrorReport {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl Display for ErrorReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "error: {}", self.message)
    }
}

impl Error for ErrorReport {}

pub fn fail<T>(message: impl Into<String>) -> Fallible<T> {
    Err(ErrorReport {
        message: message.into(),
    })
}

/// Errors that abort the whole session. These indicate either an exhausted
/// filename space or a broken invariant in the session bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Every freshly drawn identifier collided with one already in use.
    IdentityExhausted { attempts: usize },
    /// A card id was looked up that the store never issued.
    UnknownCard(CardId),
    /// A card was asked to move along an edge the state machine forbids.
    InvalidTransition {
        id: CardId,
        from: CardState,
        to: CardState,
    },
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::IdentityExhausted { attempts } => write!(
                f,
                "could not allocate a collision-free card identifier after {attempts} attempts"
            ),
            SessionError::UnknownCard(id) => write!(f, "unknown card: {id}"),
            SessionError::InvalidTransition { id, from, to } => {
                write!(f, "card {id} cannot move from {from} to {to}")
            }
        }
    }
}

impl Error for SessionError {}

macro_rules! report_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ErrorReport {
                fn from(value: $ty) -> Self {
                    ErrorReport {
                        message: value.to_string(),
                    }
                }
            }
        )*
    };
}

report_from!(
    SessionError,
    crate::backend::GenerationError,
    crate::cloze::SplitError,
    crate::review::ReviewError,
    std::io::Error,
    serde_json::Error,
    toml::de::Error,
    reqwest::Error,
    csv::Error,
    tokio::task::JoinError,
    tempfile::PersistError,
);
