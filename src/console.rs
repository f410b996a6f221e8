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

//! Lines typed on the terminal. One reader for the whole session, running on
//! a thread of its own so a pending read never holds up the runtime.

use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;

use tokio::sync::mpsc;

use crate::error::Fallible;

/// Lines the reader thread may run ahead of the session.
const READ_AHEAD: usize = 16;

pub struct Console {
    lines: mpsc::Receiver<std::io::Result<String>>,
}

impl Console {
    pub fn stdin() -> Self {
        Self::spawn(BufReader::new(std::io::stdin()))
    }

    /// Read `reader` line by line on a background thread. The thread ends
    /// at end of input, on a read error, or once the console is dropped.
    pub fn spawn(reader: impl BufRead + Send + 'static) -> Self {
        let (sender, receiver) = mpsc::channel(READ_AHEAD);
        std::thread::spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if sender.blocking_send(line).is_err() || failed {
                    break;
                }
            }
            log::debug!("Console reader finished.");
        });
        Self { lines: receiver }
    }

    /// The next line, trimmed. `None` at end of input.
    pub async fn next_line(&mut self) -> Fallible<Option<String>> {
        match self.lines.recv().await {
            Some(line) => Ok(Some(line?.trim().to_string())),
            None => Ok(None),
        }
    }

    /// Print `question` and wait for the answer.
    pub async fn ask(&mut self, question: &str) -> Fallible<Option<String>> {
        print!("{question}");
        std::io::stdout().flush()?;
        self.next_line().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lines_in_order() -> Fallible<()> {
        let mut console = Console::spawn(&b"  gato \n\ncorrer"[..]);
        assert_eq!(console.next_line().await?, Some("gato".to_string()));
        assert_eq!(console.next_line().await?, Some(String::new()));
        assert_eq!(console.next_line().await?, Some("correr".to_string()));
        assert_eq!(console.next_line().await?, None);
        assert_eq!(console.next_line().await?, None);
        Ok(())
    }
}
