use thiserror::Error;

/// Errors raised while building, validating or persisting n-gram models.
///
/// Generation never reports through this type: running out of candidates
/// is a normal outcome (`GenerationStatus::Stalled`), not a failure.
#[derive(Error, Debug)]
pub enum ModelError {
	/// The n-gram order must be at least 1.
	#[error("invalid n-gram order {0}, must be >= 1")]
	InvalidOrder(usize),

	#[error("invalid configuration: {0}")]
	InvalidConfig(String),

	/// The persisted payload is unreadable or does not match the expected
	/// configuration. Rebuilding from the corpus is the only recovery.
	#[error("corrupt model: {0}")]
	CorruptModel(String),

	/// The model could not be encoded into its stored form.
	#[error("serialization error: {0}")]
	Serialize(#[from] postcard::Error),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn encoding_failures_are_not_configuration_errors() {
		let error = ModelError::from(postcard::Error::SerializeBufferFull);
		assert!(matches!(error, ModelError::Serialize(_)));
		assert!(error.to_string().starts_with("serialization error: "));
	}
}
