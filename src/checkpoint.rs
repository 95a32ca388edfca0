//! Checkpoint directories
//!
//! A checkpoint directory holds parameter files named `<name>-<step>.<part>.ot` and a
//! `checkpoint.json` index naming the most recent checkpoints.
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const INDEX_FILE: &str = "checkpoint.json";

/// Parameters that can be written to and read from files sharing a path prefix.
pub trait ParameterFiles {
    /// Save every part as `<prefix>.<part>.ot`.
    fn save_parameters(&self, prefix: &Path) -> Result<(), CheckpointError>;

    /// Load every part from `<prefix>.<part>.ot`.
    fn load_parameters(&mut self, prefix: &Path) -> Result<(), CheckpointError>;
}

/// Path of a part file for a checkpoint prefix.
pub fn part_path(prefix: &Path, part: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(format!(".{}.ot", part));
    PathBuf::from(name)
}

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("checkpoint io error")]
    Io(#[from] io::Error),
    #[error("malformed checkpoint index")]
    Index(#[from] serde_json::Error),
    #[error("torch error reading or writing parameters")]
    Torch(#[from] tch::TchError),
    #[error("checkpoint part missing: {0}")]
    MissingPart(PathBuf),
}

/// Result of [`Checkpointer::load`].
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Whether parameters were restored.
    pub restored: bool,
    /// Step counter saved with the checkpoint; 0 if nothing was restored.
    pub step: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CheckpointIndex {
    /// Saved checkpoints, oldest first.
    checkpoints: Vec<IndexEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct IndexEntry {
    /// File name prefix within the directory.
    prefix: String,
    step: u64,
}

/// Saves and restores checkpoints in a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpointer {
    dir: PathBuf,
    /// Number of checkpoints to keep; 0 keeps all.
    pub keep_last_n: usize,
}

impl Checkpointer {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            keep_last_n: 5,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read_index(&self) -> Result<Option<CheckpointIndex>, CheckpointError> {
        match fs::read(self.dir.join(INDEX_FILE)) {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write_index(&self, index: &CheckpointIndex) -> Result<(), CheckpointError> {
        // Write then rename so a crash never leaves a truncated index
        let tmp = self.dir.join(format!("{}.tmp", INDEX_FILE));
        fs::write(&tmp, serde_json::to_vec_pretty(index)?)?;
        fs::rename(tmp, self.dir.join(INDEX_FILE))?;
        Ok(())
    }

    /// Restore the most recent checkpoint into `params`, if there is one.
    ///
    /// A missing or empty directory is not an error.
    pub fn load<P: ParameterFiles + ?Sized>(
        &self,
        params: &mut P,
    ) -> Result<LoadOutcome, CheckpointError> {
        let latest = self
            .read_index()?
            .and_then(|index| index.checkpoints.last().cloned());
        match latest {
            Some(entry) => {
                params.load_parameters(&self.dir.join(&entry.prefix))?;
                log::info!(
                    "restored checkpoint {} at step {}",
                    entry.prefix,
                    entry.step
                );
                Ok(LoadOutcome {
                    restored: true,
                    step: entry.step,
                })
            }
            None => {
                log::info!("no checkpoint in {}; starting fresh", self.dir.display());
                Ok(LoadOutcome::default())
            }
        }
    }

    /// Save `params` as checkpoint `<name>-<step>` and record it in the index.
    ///
    /// Returns the checkpoint path prefix.
    pub fn save<P: ParameterFiles + ?Sized>(
        &self,
        params: &P,
        name: &str,
        step: u64,
    ) -> Result<PathBuf, CheckpointError> {
        fs::create_dir_all(&self.dir)?;
        let prefix = format!("{}-{}", name, step);
        let path = self.dir.join(&prefix);
        params.save_parameters(&path)?;

        let mut index = self.read_index()?.unwrap_or_default();
        index.checkpoints.retain(|entry| entry.prefix != prefix);
        index.checkpoints.push(IndexEntry { prefix, step });
        if self.keep_last_n > 0 && index.checkpoints.len() > self.keep_last_n {
            let excess = index.checkpoints.len() - self.keep_last_n;
            for old in index.checkpoints.drain(..excess) {
                self.remove_parts(&old.prefix)?;
            }
        }
        self.write_index(&index)?;
        log::info!("saved checkpoint {}", path.display());
        Ok(path)
    }

    /// Remove every part file of a checkpoint prefix.
    fn remove_parts(&self, prefix: &str) -> Result<(), CheckpointError> {
        let start = format!("{}.", prefix);
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with(&start) && file_name.ends_with(".ot") {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Parameters saved as a single json part.
    #[derive(Debug, Default, PartialEq)]
    struct JsonParams(Vec<f64>);

    impl ParameterFiles for JsonParams {
        fn save_parameters(&self, prefix: &Path) -> Result<(), CheckpointError> {
            fs::write(part_path(prefix, "values"), serde_json::to_vec(&self.0)?)?;
            Ok(())
        }

        fn load_parameters(&mut self, prefix: &Path) -> Result<(), CheckpointError> {
            let path = part_path(prefix, "values");
            if !path.exists() {
                return Err(CheckpointError::MissingPart(path));
            }
            self.0 = serde_json::from_slice(&fs::read(path)?)?;
            Ok(())
        }
    }

    #[test]
    fn load_missing_dir_is_fresh() {
        let dir = TempDir::new().unwrap();
        let checkpointer = Checkpointer::new(dir.path().join("absent"));
        let mut params = JsonParams::default();
        assert_eq!(checkpointer.load(&mut params).unwrap(), LoadOutcome::default());
    }

    #[test]
    fn save_then_load_latest() {
        let dir = TempDir::new().unwrap();
        let checkpointer = Checkpointer::new(dir.path());
        checkpointer.save(&JsonParams(vec![1.0]), "DdpgModel", 10).unwrap();
        let prefix = checkpointer
            .save(&JsonParams(vec![2.0, 3.0]), "DdpgModel", 20)
            .unwrap();
        assert_eq!(prefix, dir.path().join("DdpgModel-20"));
        assert!(dir.path().join("DdpgModel-20.values.ot").exists());

        let mut params = JsonParams::default();
        let outcome = checkpointer.load(&mut params).unwrap();
        assert_eq!(
            outcome,
            LoadOutcome {
                restored: true,
                step: 20
            }
        );
        assert_eq!(params, JsonParams(vec![2.0, 3.0]));
    }

    #[test]
    fn keeps_last_n() {
        let dir = TempDir::new().unwrap();
        let mut checkpointer = Checkpointer::new(dir.path());
        checkpointer.keep_last_n = 2;
        for step in 1..=4 {
            checkpointer.save(&JsonParams(vec![0.0]), "m", step).unwrap();
        }
        assert!(!dir.path().join("m-1.values.ot").exists());
        assert!(!dir.path().join("m-2.values.ot").exists());
        assert!(dir.path().join("m-3.values.ot").exists());
        assert!(dir.path().join("m-4.values.ot").exists());
    }

    #[test]
    fn part_path_appends_suffix() {
        assert_eq!(
            part_path(Path::new("/tmp/run/DdpgModel-5"), "actor"),
            PathBuf::from("/tmp/run/DdpgModel-5.actor.ot")
        );
    }
}
