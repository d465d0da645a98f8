//! Error taxonomy for the pipeline.
//!
//! `ParseError` and `TemplateError` stop the step they occur in. `PhotoError`
//! is scoped to a single record: the caller logs it and moves on.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("missing mandatory column \"{0}\" in CSV header")]
    MissingColumn(String),
    #[error("column \"{photo}\" must come after column \"{name}\"")]
    ColumnOrder { name: String, photo: String },
    #[error("expected {expected} question columns between name and photo, found {found}")]
    QuestionCountMismatch { expected: usize, found: usize },
}

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("unrecognized share link format: {0}")]
    UnrecognizedLinkFormat(String),
    #[error("fetch failed for {url}: {reason}")]
    FetchFailure { url: String, reason: String },
    #[error("could not decode image: {0}")]
    DecodeFailure(#[source] image::ImageError),
    #[error("could not encode WebP: {0}")]
    EncodeFailure(String),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template region <!-- slam:{0} --> is missing")]
    MissingRegion(&'static str),
    #[error("template region <!-- slam:{0} --> is not closed")]
    UnclosedRegion(&'static str),
    #[error("template region <!-- slam:{0} --> appears more than once")]
    DuplicateRegion(&'static str),
    #[error("template is missing placeholder {{{{{0}}}}}")]
    MissingPlaceholder(&'static str),
    #[error("template has no <img> whose src is {{{{photo}}}}")]
    MissingPhotoSlot,
}
