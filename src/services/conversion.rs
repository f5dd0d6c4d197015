//! NetCDF conversion (simulated)
//!
//! Validates an upload, stages it under the upload directory, waits out the
//! simulated conversion time and reports what the CSV would be. No NetCDF
//! parsing happens; the file is only checked for a NetCDF/HDF5 signature.
//! Every attempt that gets past validation is written to the conversion log.

use crate::config::UploadConfig;
use crate::db::repositories::{LogRepository, NewConversionLog};
use crate::models::ConversionStatus;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Classic NetCDF and NetCDF-4 (HDF5) signatures
const NETCDF_MAGIC: &[&[u8]] = &[b"CDF\x01", b"CDF\x02", b"CDF\x05", b"\x89HDF\r\n\x1a\n"];

/// Error types for conversion operations
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("No file selected")]
    NoFile,

    #[error("File must be NetCDF format (.nc)")]
    NotNetcdf,

    #[error("File too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("Invalid file name")]
    InvalidFilename,

    #[error("Conversion failed: {0}")]
    Failed(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// An uploaded file
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Result of a successful conversion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionReport {
    pub original_file: String,
    pub csv_file: String,
    pub bytes: u64,
    pub status: ConversionStatus,
}

pub struct ConversionService {
    upload_dir: PathBuf,
    max_file_size: u64,
    delay: Duration,
    logs: Arc<dyn LogRepository>,
}

impl ConversionService {
    pub fn new(config: &UploadConfig, logs: Arc<dyn LogRepository>) -> Self {
        Self {
            upload_dir: config.path.clone(),
            max_file_size: config.max_file_size,
            delay: config.conversion_delay(),
            logs,
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Run a conversion for `username`.
    ///
    /// `None` or an empty file name is "no file selected" and does nothing else.
    pub async fn convert(
        &self,
        username: &str,
        upload: Option<Upload>,
    ) -> Result<ConversionReport, ConversionError> {
        let upload = upload
            .filter(|u| !u.filename.trim().is_empty())
            .ok_or(ConversionError::NoFile)?;

        if !upload.filename.to_lowercase().ends_with(".nc") {
            return Err(ConversionError::NotNetcdf);
        }

        let size = upload.data.len() as u64;
        if size > self.max_file_size {
            return Err(ConversionError::TooLarge {
                size,
                limit: self.max_file_size,
            });
        }

        let filename = sanitize_filename(&upload.filename).ok_or(ConversionError::InvalidFilename)?;
        let csv_file = format!("{}.csv", &filename[..filename.len() - 3]);

        tokio::fs::create_dir_all(&self.upload_dir)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to create upload directory: {}", e))?;
        let staged = self.upload_dir.join(format!("{}_{}", uuid::Uuid::new_v4().simple(), filename));
        tokio::fs::write(&staged, &upload.data)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to stage upload: {}", e))?;

        tokio::time::sleep(self.delay).await;
        let outcome = check_signature(&upload.data);

        if let Err(e) = tokio::fs::remove_file(&staged).await {
            tracing::warn!("Failed to remove staged upload {:?}: {}", staged, e);
        }

        match outcome {
            Ok(()) => {
                self.logs
                    .insert_conversion(NewConversionLog {
                        username,
                        original_file: &filename,
                        csv_file: Some(&csv_file),
                        bytes: size as i64,
                        status: ConversionStatus::Success,
                        error: None,
                    })
                    .await?;
                tracing::info!("Converted {} to {} for {}", filename, csv_file, username);

                Ok(ConversionReport {
                    original_file: filename,
                    csv_file,
                    bytes: size,
                    status: ConversionStatus::Success,
                })
            }
            Err(reason) => {
                self.logs
                    .insert_conversion(NewConversionLog {
                        username,
                        original_file: &filename,
                        csv_file: None,
                        bytes: size as i64,
                        status: ConversionStatus::Failed,
                        error: Some(&reason),
                    })
                    .await?;
                tracing::warn!("Conversion of {} failed: {}", filename, reason);

                Err(ConversionError::Failed(reason))
            }
        }
    }
}

fn check_signature(data: &[u8]) -> Result<(), String> {
    if NETCDF_MAGIC.iter().any(|magic| data.starts_with(magic)) {
        Ok(())
    } else {
        Err("not a NetCDF file".to_string())
    }
}

/// Reduce a client file name to a safe basename.
///
/// Directory parts are dropped, whitespace becomes `_`, and anything outside
/// `[A-Za-z0-9._-]` is removed. Returns `None` if nothing usable is left.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    let cleaned = cleaned.trim_start_matches(['.', '_']).to_string();

    // a bare ".nc" has no stem to name the CSV after
    if cleaned.len() <= 3 {
        None
    } else {
        Some(cleaned)
    }
}
