use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::warn;

use crate::error::{Error, Result};

pub fn to_millis(duration: Duration) -> u64 {
    (duration.as_secs() * 1_000) + (duration.subsec_nanos() / 1_000_000) as u64
}

/// Expands input locations into the files to read. A directory contributes the regular files
/// directly inside of it, sorted by name, skipping hidden (`.`) and marker (`_`) files.
pub fn input_files(locations: &[PathBuf]) -> Result<Vec<PathBuf>> {

    let mut files = Vec::with_capacity(locations.len());

    for location in locations {

        if !location.exists() {
            warn!("Input location {} does not exist, ignoring it", location.display());
            continue;
        }

        if !location.is_dir() {
            files.push(location.clone());
            continue;
        }

        let entries = fs::read_dir(location)
            .map_err(|source| Error::Read { path: location.clone(), source })?;

        let mut files_in_directory = Vec::new();

        for entry in entries {
            let path = entry
                .map_err(|source| Error::Read { path: location.clone(), source })?
                .path();

            if path.is_file() && !is_hidden(&path) {
                files_in_directory.push(path);
            }
        }

        files_in_directory.sort();
        files.extend(files_in_directory);
    }

    Ok(files)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.') || name.starts_with('_'))
        .unwrap_or(false)
}


#[cfg(test)]
mod tests {

    use std::fs;
    use std::time::Duration;

    use super::{input_files, to_millis};

    #[test]
    fn millis() {
        assert_eq!(to_millis(Duration::new(2, 5_000_000)), 2_005);
    }

    #[test]
    fn directories_are_expanded() {
        let dir = tempfile::tempdir().unwrap();

        fs::write(dir.path().join("part-1"), "b").unwrap();
        fs::write(dir.path().join("part-0"), "a").unwrap();
        fs::write(dir.path().join("_SUCCESS"), "").unwrap();
        fs::write(dir.path().join(".part-0.crc"), "").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let single = dir.path().join("part-1");
        let missing = dir.path().join("missing");

        let files = input_files(&[dir.path().to_path_buf(), single.clone(), missing]).unwrap();

        assert_eq!(files, vec![dir.path().join("part-0"), dir.path().join("part-1"), single]);
    }
}
