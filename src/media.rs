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

use std::fs::create_dir_all;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use tempfile::NamedTempFile;

use crate::error::Fallible;
use crate::error::fail;

/// Write `bytes` to `directory/filename` atomically: the data goes to a
/// temporary file in the same directory which is then renamed over the
/// target. Readers see either the old file or the new one, never a torn
/// write.
pub async fn write_media(directory: &Path, filename: &str, bytes: Vec<u8>) -> Fallible<PathBuf> {
    if bytes.is_empty() {
        return fail(format!("refusing to write empty media file {filename}."));
    }
    let directory = directory.to_path_buf();
    let target = directory.join(filename);
    let result = tokio::task::spawn_blocking(move || write_atomic(&directory, &target, &bytes))
        .await??;
    Ok(result)
}

fn write_atomic(directory: &Path, target: &Path, bytes: &[u8]) -> Fallible<PathBuf> {
    create_dir_all(directory)?;
    let mut file = NamedTempFile::new_in(directory)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(target)?;
    log::debug!("Wrote {} ({} bytes).", target.display(), bytes.len());
    Ok(target.to_path_buf())
}
