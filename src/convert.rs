//! Converters - turn a saved document into another format

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::debug;

use crate::config::ConverterConfig;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to convert document. Error code: {code:?}. {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("Converter produced no output at {0}")]
    MissingOutput(String),
}

pub trait Converter {
    /// Extension of converted files, without the dot
    fn extension(&self) -> &str;

    /// Converts the document at `source`, writing the result to `target`
    fn convert(&self, source: &Path, target: &Path) -> Result<(), ConvertError>;

    /// Converts the document at `source` and returns the converted bytes
    fn convert_to_bytes(&self, source: &Path) -> Result<Vec<u8>, ConvertError> {
        let workdir = tempfile::tempdir().map_err(|source| ConvertError::Io {
            operation: "create temporary directory for conversion".to_string(),
            source,
        })?;
        let target = workdir.path().join(format!("converted.{}", self.extension()));
        self.convert(source, &target)?;
        fs::read(&target).map_err(|source| ConvertError::Io {
            operation: format!("read {}", target.display()),
            source,
        })
    }
}

/// Converts with a headless LibreOffice/OpenOffice binary
pub struct SofficeConverter {
    binary: PathBuf,
    format: String,
}

impl SofficeConverter {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            format: "pdf".to_string(),
        }
    }

    pub fn from_config(config: &ConverterConfig) -> Self {
        Self {
            binary: PathBuf::from(&config.binary),
            format: config.format.clone(),
        }
    }
}

impl Default for SofficeConverter {
    fn default() -> Self {
        Self::new("soffice")
    }
}

impl Converter for SofficeConverter {
    fn extension(&self) -> &str {
        &self.format
    }

    fn convert(&self, source: &Path, target: &Path) -> Result<(), ConvertError> {
        // Dropping the TempDir removes the copy and the output on every path
        let workdir = tempfile::tempdir().map_err(|source| ConvertError::Io {
            operation: "create temporary directory for conversion".to_string(),
            source,
        })?;
        let import = workdir.path().join("document.docx");
        let export = workdir.path().join(format!("document.{}", self.format));

        fs::copy(source, &import).map_err(|source| ConvertError::Io {
            operation: format!("copy {} for conversion", import.display()),
            source,
        })?;

        debug!(binary = %self.binary.display(), format = %self.format, "converting document");
        let output = Command::new(&self.binary)
            .arg("--headless")
            .arg("--convert-to")
            .arg(&self.format)
            .arg(&import)
            .arg("--outdir")
            .arg(workdir.path())
            .output()
            .map_err(|source| ConvertError::Io {
                operation: format!("run {}", self.binary.display()),
                source,
            })?;

        if !output.status.success() {
            return Err(ConvertError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        if !export.exists() {
            return Err(ConvertError::MissingOutput(export.display().to_string()));
        }

        fs::copy(&export, target).map_err(|source| ConvertError::Io {
            operation: format!("move converted document to {}", target.display()),
            source,
        })?;
        Ok(())
    }
}
