use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::transcript::domain::transcript_pair::TranscriptCollection;
use crate::transcript::domain::transcript_parser::{self, ParseError};

#[derive(Error, Debug)]
pub enum TranscriptFileError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

/// Reads and parses a transcript file. The separator follows the file name.
pub fn parse_file(path: &Path) -> Result<TranscriptCollection, TranscriptFileError> {
    let text = fs::read_to_string(path).map_err(|e| TranscriptFileError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    transcript_parser::parse(&filename, &text).map_err(|e| TranscriptFileError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}
