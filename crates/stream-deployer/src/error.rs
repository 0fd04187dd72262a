use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("no artifact received to be deployed")]
    NoArtifact,

    #[error("stream definition is not in a valid format: {reason}")]
    Malformed { reason: String },

    #[error(
        "stream {stream_id} already exists with a different definition (artifact {artifact_id})"
    )]
    ConflictingDefinition { stream_id: String, artifact_id: String },
}

impl DeployError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for DeployError {
    fn from(e: serde_json::Error) -> Self {
        Self::malformed(e.to_string())
    }
}
