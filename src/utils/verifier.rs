//! Log-based job verification
//!
//! A job counts as failed when any line of its captured output contains one
//! of the failure markers for its job kind. This is a textual heuristic: a
//! tool that fails without printing a known marker passes verification, so
//! callers also look at the exit code when the backend reports one.

use crate::jobs::JobKind;
use serde::Serialize;

/// Substrings that flag a failed job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerSet {
    markers: Vec<String>,
}

impl MarkerSet {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers.into_iter().map(Into::into).collect(),
        }
    }

    /// Failure vocabulary of tar
    pub fn filesystem_defaults() -> Self {
        Self::new([
            "Cannot open",
            "Cannot stat",
            "Exiting with failure status",
            "Error is not recoverable",
            "Permission denied",
        ])
    }

    /// Failure vocabulary of pg_dump and libpq
    pub fn database_defaults() -> Self {
        Self::new([
            "refused",
            "terminated",
            "authentication failed",
            "not known",
            "does not exist",
        ])
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.markers.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }
}

/// Marker sets for both job kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    pub filesystem: MarkerSet,
    pub database: MarkerSet,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            filesystem: MarkerSet::filesystem_defaults(),
            database: MarkerSet::database_defaults(),
        }
    }
}

impl Markers {
    pub fn for_kind(&self, kind: JobKind) -> &MarkerSet {
        match kind {
            JobKind::Filesystem => &self.filesystem,
            JobKind::Database => &self.database,
        }
    }
}

/// Verdict of [`verify`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum VerifyResult {
    Ok,
    Failed { marker: String, line: String },
}

impl VerifyResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, VerifyResult::Ok)
    }
}

/// Scan every line for a failure marker.
///
/// Returns the first matching line (in input order) together with the
/// marker it matched.
pub fn verify<'a, I>(lines: I, markers: &MarkerSet) -> VerifyResult
where
    I: IntoIterator<Item = &'a str>,
{
    for line in lines {
        if let Some(marker) = markers.iter().find(|m| line.contains(m)) {
            return VerifyResult::Failed {
                marker: marker.to_string(),
                line: line.to_string(),
            };
        }
    }
    VerifyResult::Ok
}

/// [`verify`] over a whole captured log
pub fn verify_log(log: &str, markers: &MarkerSet) -> VerifyResult {
    verify(log.lines(), markers)
}
