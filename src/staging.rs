//! Local staging of encoded batch files.
//!
//! A batch is written to the staging directory before upload so a failed
//! transfer leaves the payload on disk for inspection. File names follow
//! `{clientAcronym}1{ddMM}{shipment}.SD1`.

use crate::error::StagingError;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Extension of outbound batch files
pub const STAGED_EXTENSION: &str = "SD1";

/// File name of a batch created on `date` for `shipment`
pub fn staged_file_name(client_acronym: &str, date: NaiveDate, shipment: u32) -> String {
    format!(
        "{}1{}{}.{}",
        client_acronym.trim(),
        date.format("%d%m"),
        shipment,
        STAGED_EXTENSION
    )
}

/// A batch payload persisted in the staging directory
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StagedFile {
    /// Absolute or staging-relative path on disk
    pub path: PathBuf,
    /// Bare file name, reused as the remote file name
    pub file_name: String,
}

impl StagedFile {
    /// Write `payload` to `directory/file_name`, creating the directory if needed
    ///
    /// An existing file with the same name is overwritten.
    pub async fn write(
        directory: &Path,
        file_name: impl Into<String>,
        payload: &[u8],
    ) -> Result<Self, StagingError> {
        let file_name = file_name.into();

        tokio::fs::create_dir_all(directory)
            .await
            .map_err(|source| StagingError::CreateDir {
                path: directory.to_path_buf(),
                source,
            })?;

        let path = directory.join(&file_name);
        tokio::fs::write(&path, payload)
            .await
            .map_err(|source| StagingError::Write {
                path: path.clone(),
                source,
            })?;

        tracing::debug!(path = %path.display(), bytes = payload.len(), "staged batch file");

        Ok(Self { path, file_name })
    }

    /// Read the staged bytes back
    pub async fn read(&self) -> Result<Vec<u8>, StagingError> {
        tokio::fs::read(&self.path)
            .await
            .map_err(|source| StagingError::Read {
                path: self.path.clone(),
                source,
            })
    }
}
