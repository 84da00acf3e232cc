/// Result alias used across the crate.
pub type VitrineResult<T> = Result<T, VitrineError>;

#[derive(thiserror::Error, Debug)]
/// Error taxonomy shared by every engine operation.
pub enum VitrineError {
    /// A spec or settings field is missing, non-finite or out of range.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// An asset or template could not be loaded or instantiated.
    #[error("resource load failed: {0}")]
    ResourceLoadFailed(String),

    /// Cooperative cancellation was observed at a checkpoint.
    #[error("operation cancelled")]
    Cancelled,

    /// A bounded wait exceeded its deadline.
    #[error("timed out: {0}")]
    Timeout(String),

    /// Some leaves of a composite failed while their siblings were built.
    #[error("composite '{node}' is missing {} child(ren): {}", failed.len(), failed.join(", "))]
    PartialConstruction {
        /// Name of the composite root.
        node: String,
        /// Names of the children that failed, with their reason.
        failed: Vec<String>,
    },

    /// The engine was shut down; its cache and registry are gone.
    #[error("engine has been shut down")]
    ShutDown,

    /// Settings or layout JSON could not be decoded.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Any other failure, with its context chain.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VitrineError {
    /// Build a [`VitrineError::ConfigInvalid`].
    pub fn config_invalid(msg: impl Into<String>) -> Self {
        Self::ConfigInvalid(msg.into())
    }

    /// Build a [`VitrineError::ResourceLoadFailed`].
    pub fn resource_load_failed(msg: impl Into<String>) -> Self {
        Self::ResourceLoadFailed(msg.into())
    }

    /// Build a [`VitrineError::Timeout`].
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Build a [`VitrineError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// True for [`VitrineError::Cancelled`], which always propagates to the caller.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
