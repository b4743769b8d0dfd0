//! Output naming derived from the source path

use std::path::{Path, PathBuf};

use crate::error::{KnetError, KnetResult};

/// Suffix appended to the source base name for every output file
pub const OUTPUT_SUFFIX: &str = "_knet";

/// Identifies one output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// `<base>_knet<ext>`, used until splitting is enabled
    Default,
    /// `<base>_knet_<n><ext>`
    Split(usize),
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Split(index) => write!(f, "segment {}", index),
        }
    }
}

/// Immutable naming context for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    dir: PathBuf,
    base: String,
    extension: String,
}

impl RunContext {
    /// Derive the context from the source program path
    ///
    /// # Errors
    /// Returns error if the path has no file name
    pub fn from_source(source: impl AsRef<Path>) -> KnetResult<Self> {
        let source = source.as_ref();
        let base = source
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| KnetError::InvalidSourcePath(source.to_path_buf()))?
            .to_string();
        let extension = source
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        let dir = source.parent().map(Path::to_path_buf).unwrap_or_default();

        Ok(Self {
            dir,
            base,
            extension,
        })
    }

    /// Source base name without extension
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Source extension including the leading dot, or empty
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// File name for a segment, without directory
    pub fn file_name(&self, segment: Segment) -> String {
        match segment {
            Segment::Default => format!("{}{}{}", self.base, OUTPUT_SUFFIX, self.extension),
            Segment::Split(index) => format!(
                "{}{}_{}{}",
                self.base, OUTPUT_SUFFIX, index, self.extension
            ),
        }
    }

    /// Full output path for a segment, beside the source file
    pub fn output_path(&self, segment: Segment) -> PathBuf {
        self.dir.join(self.file_name(segment))
    }
}
