//! Batch Packaging - one archive entry per generated document
//!
//! Documents are produced one at a time in a temporary working directory.
//! The archive is assembled in a temporary file next to the output and only
//! moved into place once the whole batch has been written.

use serde::Serialize;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{info, warn};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::FailurePolicy;
use crate::context::Context;
use crate::convert::{ConvertError, Converter};
use crate::document::{DocumentError, TemplateDocument};
use crate::error::ParseError;
use crate::generator::Generator;

/// Extension of unconverted entries
pub const DOCUMENT_EXTENSION: &str = "docx";

/// Why a single document of a batch could not be produced
#[derive(Debug, Error)]
pub enum ItemError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Convert(#[from] ConvertError),
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Document {index} failed: {source}")]
    Item {
        index: usize,
        #[source]
        source: ItemError,
    },

    #[error("Failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write archive: {0}")]
    Zip(#[from] ZipError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedItem {
    pub index: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Archive entry names, in input order
    pub entries: Vec<String>,
    pub skipped: Vec<SkippedItem>,
}

pub struct Batch<'a, D: TemplateDocument> {
    generator: &'a Generator,
    template: &'a D,
    converter: Option<&'a dyn Converter>,
    policy: FailurePolicy,
}

impl<'a, D: TemplateDocument> Batch<'a, D> {
    pub fn new(generator: &'a Generator, template: &'a D) -> Self {
        Self {
            generator,
            template,
            converter: None,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_converter(mut self, converter: &'a dyn Converter) -> Self {
        self.converter = Some(converter);
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Renders one document per context into a zip archive at `output`.
    ///
    /// Entries are named `document<index>.<ext>`, where `index` is the
    /// position in `contexts`. When the batch fails, nothing is left at
    /// `output` and all temporary files are removed.
    pub fn write(&self, contexts: &[Context], output: &Path) -> Result<BatchReport, BatchError> {
        let parent = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|source| BatchError::Io {
            operation: format!("create directory {}", parent.display()),
            source,
        })?;

        let workdir = tempfile::tempdir().map_err(|source| BatchError::Io {
            operation: "create temporary working directory".to_string(),
            source,
        })?;
        let mut archive = NamedTempFile::new_in(parent).map_err(|source| BatchError::Io {
            operation: format!("create temporary archive in {}", parent.display()),
            source,
        })?;

        let mut report = BatchReport::default();
        {
            let mut zip = ZipWriter::new(archive.as_file_mut());
            let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

            for (index, context) in contexts.iter().enumerate() {
                let (path, name) = match self.render_item(index, context, workdir.path()) {
                    Ok(rendered) => rendered,
                    Err(source) if self.policy == FailurePolicy::Skip => {
                        warn!(index, error = %source, "skipping document");
                        report.skipped.push(SkippedItem {
                            index,
                            reason: source.to_string(),
                        });
                        continue;
                    }
                    Err(source) => return Err(BatchError::Item { index, source }),
                };

                zip.start_file(name.as_str(), options)?;
                let mut file = File::open(&path).map_err(|source| BatchError::Io {
                    operation: format!("open {}", path.display()),
                    source,
                })?;
                io::copy(&mut file, &mut zip).map_err(|source| BatchError::Io {
                    operation: format!("add {} to archive", name),
                    source,
                })?;

                info!(index, entry = %name, "added document to archive");
                report.entries.push(name);
            }

            zip.finish()?;
        }

        archive.persist(output).map_err(|e| BatchError::Io {
            operation: format!("move archive to {}", output.display()),
            source: e.error,
        })?;
        Ok(report)
    }

    fn render_item(
        &self,
        index: usize,
        context: &Context,
        workdir: &Path,
    ) -> Result<(PathBuf, String), ItemError> {
        let tree = self.generator.expand(self.template.tree(), context)?;
        let document = self.template.with_tree(tree);

        let saved = workdir.join(format!("document{}.{}", index, DOCUMENT_EXTENSION));
        document.save(&saved)?;

        match self.converter {
            None => Ok((saved, format!("document{}.{}", index, DOCUMENT_EXTENSION))),
            Some(converter) => {
                let name = format!("document{}.{}", index, converter.extension());
                let target = workdir.join(format!("converted-{}", name));
                converter.convert(&saved, &target)?;
                Ok((target, name))
            }
        }
    }
}
