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

use crate::backend::RemoteBackend;
use crate::config::Config;
use crate::error::Fallible;
use crate::error::fail;

pub fn check_setup(config: Option<&Path>) -> Fallible<()> {
    let config = Config::load(config)?;
    check_directories(&config)?;
    let _ = RemoteBackend::from_env(&config)?;
    println!("ok");
    Ok(())
}

fn check_directories(config: &Config) -> Fallible<()> {
    let output = &config.output_directory;
    if output.exists() && !output.is_dir() {
        return fail(format!("output path {} is not a directory.", output.display()));
    }
    match &config.anki_media_path {
        Some(media) if !media.is_dir() => {
            return fail(format!(
                "Anki media directory {} does not exist.",
                media.display()
            ));
        }
        Some(_) => {}
        None => {
            if config.resolve_anki_media_path().is_none() {
                log::warn!("No Anki media directory found; media will not be copied.");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs::write;
    use std::path::PathBuf;

    use super::*;
    use crate::helper::create_tmp_directory;

    #[test]
    fn test_non_existent_config() {
        assert!(check_setup(Some(Path::new("./derpherp.toml"))).is_err());
    }

    #[test]
    fn test_directories() -> Fallible<()> {
        let dir = create_tmp_directory()?;
        let config = Config {
            output_directory: dir.join("output"),
            anki_media_path: Some(dir.clone()),
            ..Config::default()
        };
        check_directories(&config)?;
        Ok(())
    }

    #[test]
    fn test_output_is_a_file() -> Fallible<()> {
        let dir = create_tmp_directory()?;
        let file = dir.join("output");
        write(&file, "")?;
        let config = Config {
            output_directory: file,
            anki_media_path: Some(dir),
            ..Config::default()
        };
        assert!(check_directories(&config).is_err());
        Ok(())
    }

    #[test]
    fn test_non_existent_media_directory() -> Fallible<()> {
        let dir = create_tmp_directory()?;
        let config = Config {
            output_directory: dir,
            anki_media_path: Some(PathBuf::from("./derpherp")),
            ..Config::default()
        };
        assert!(check_directories(&config).is_err());
        Ok(())
    }
}
