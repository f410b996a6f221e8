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

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::check::check_setup;
use crate::cmd::create::CreateOptions;
use crate::cmd::create::create_cards;
use crate::error::Fallible;

#[derive(Parser)]
#[command(version, about, long_about = None)]
enum Command {
    /// Generate, review, and export vocabulary cards.
    Create {
        /// Spanish words. If absent, and no word file is given, words are
        /// asked for interactively.
        words: Vec<String>,
        /// Read words from a file, one
        /// `word | context | image prompt | mnemonic` per line.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Directory to write media and records to.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Anki's `collection.media` directory.
        #[arg(long)]
        anki_media: Option<PathBuf>,
        /// Path to the configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Skip writing the Anki import files.
        #[arg(long)]
        no_export: bool,
    },
    /// Check the configuration, directories, and credentials.
    Check {
        /// Path to the configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

pub async fn entrypoint() -> Fallible<()> {
    let cli: Command = Command::parse();
    match cli {
        Command::Create {
            words,
            file,
            output,
            anki_media,
            config,
            no_export,
        } => {
            let options = CreateOptions {
                words,
                file,
                output,
                anki_media,
                config,
                export: !no_export,
            };
            create_cards(options).await
        }
        Command::Check { config } => check_setup(config.as_deref()),
    }
}
