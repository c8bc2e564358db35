use thiserror::Error;

/// Library error type for gallery operations.
///
/// Every variant is recoverable at the item or phase level. Probe-level
/// variants are normalized to an absent result before they cross a task
/// boundary; see [`crate::probe::ProbeOutcome`].
#[derive(Debug, Error)]
pub enum Error {
    /// The probe did not answer within its deadline.
    #[error("probe timed out: {locator}")]
    ProbeTimeout { locator: String },

    /// The asset does not exist (HTTP 404, missing file) or could not be decoded.
    #[error("asset not found: {locator} ({reason})")]
    ProbeNotFound { locator: String, reason: String },

    /// The transport failed before an answer about the asset was available.
    #[error("probe failed: {locator} ({reason})")]
    ProbeFailed { locator: String, reason: String },

    /// Discovery finished without a single existing asset.
    #[error("no assets found for {pattern}")]
    DiscoveryEmpty { pattern: String },

    /// Existence was confirmed during discovery but dimensions could not be fetched.
    #[error("could not resolve dimensions for index {index}: {reason}")]
    ResolutionFailed { index: u32, reason: String },

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn not_found(locator: &str, reason: impl ToString) -> Self {
        Self::ProbeNotFound {
            locator: locator.to_owned(),
            reason: reason.to_string(),
        }
    }
}
