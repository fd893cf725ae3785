use crate::utils::Result;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// `reads.eventalign.tsv` -> `reads.eventalign.diffs.6` (`.train` appended when training).
pub fn default_output_path(alignment_path: &Path, k: usize, train: bool) -> PathBuf {
    let mut output = alignment_path.with_extension("").into_os_string();
    output.push(format!(".diffs.{}", k));
    if train {
        output.push(".train");
    }
    PathBuf::from(output)
}

pub fn part_path(output_path: &Path, index: usize) -> PathBuf {
    let mut part = output_path.as_os_str().to_owned();
    part.push(format!(".part{}", index));
    PathBuf::from(part)
}

pub fn create_appender(path: &Path) -> Result<BufWriter<File>> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(BufWriter::new)
        .map_err(|e| format!("Failed to open {} for writing: {}", path.display(), e))
}

pub fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(format!("Failed to remove {}: {}", path.display(), e)),
    }
}

/// Appends the part files to `output_path` in the given order and deletes them.
pub fn merge_parts(parts: &[PathBuf], output_path: &Path) -> Result<()> {
    let mut writer = create_appender(output_path)?;
    for part in parts {
        if !part.exists() {
            continue;
        }
        let mut reader =
            File::open(part).map_err(|e| format!("Failed to open {}: {}", part.display(), e))?;
        io::copy(&mut reader, &mut writer)
            .map_err(|e| format!("Failed to merge {}: {}", part.display(), e))?;
        remove_if_exists(part)?;
    }
    writer
        .flush()
        .map_err(|e| format!("Failed to write {}: {}", output_path.display(), e))
}
