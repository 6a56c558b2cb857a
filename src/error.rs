//! Error taxonomy shared by the public operations.
//!
//! The engine reports failures through `eyre` like every other layer, but
//! the conditions callers dispatch on carry a typed [`StoreError`] at the
//! root of the report. `StoreError::kind_of` recovers the kind from an
//! `eyre::Report` without string matching.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No live index entry for the given name.
    NotFound,
    /// A write targeted a name that is already indexed.
    AlreadyExists,
    /// Underlying storage failure; fatal for the current operation.
    Io,
    /// A record or chunk decoded to something the format forbids.
    Corruption,
}

#[derive(Debug, Clone)]
pub struct StoreError {
    kind: ErrorKind,
    detail: String,
}

impl StoreError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn not_found(name: &str) -> Self {
        Self::new(ErrorKind::NotFound, format!("no object named {:?}", name))
    }

    pub fn already_exists(name: &str) -> Self {
        Self::new(
            ErrorKind::AlreadyExists,
            format!("object {:?} already exists", name),
        )
    }

    pub fn io(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, detail)
    }

    pub fn corruption(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Corruption, detail)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Extracts the typed kind from an error report, if one is attached.
    pub fn kind_of(report: &eyre::Report) -> Option<ErrorKind> {
        report
            .chain()
            .find_map(|cause| cause.downcast_ref::<StoreError>())
            .map(StoreError::kind)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            ErrorKind::NotFound => "not found",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::Io => "io error",
            ErrorKind::Corruption => "corruption",
        };
        write!(f, "{}: {}", label, self.detail)
    }
}

impl std::error::Error for StoreError {}
