use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::vocabulary::{Sentinels, Token};
use crate::error::{ModelError, Result};

/// Punctuation that may appear in contexts but is never counted as a follow
/// token. Sentence-final marks are left out so they can act as stop tokens.
const DEFAULT_SKIP_TOKENS: [&str; 9] = [",", ";", ":", "\"", "(", ")", "'", "--", "..."];

/// Configuration a `MultiGramModel` is built with.
///
/// The configuration is persisted alongside the tables so that a stored
/// model can be checked against the configuration a caller expects.
///
/// # Invariants (checked by `validate`)
/// - `max_order >= 1`
/// - Sentinels are non-empty, distinct and not part of `skip_tokens`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ModelConfig {
	/// Highest n-gram order; tables are built for every order in `1..=max_order`.
	pub max_order: usize,

	/// Boundary markers the corpus collaborator injected.
	pub sentinels: Sentinels,

	/// Tokens never counted as a follow token.
	///
	/// A `BTreeSet` keeps the persisted form stable across runs.
	pub skip_tokens: BTreeSet<Token>,

	/// Also build the mirrored tables used for backward generation.
	pub backward: bool,

	/// Build independent orders on worker threads.
	pub parallel: bool,
}

impl Default for ModelConfig {
	fn default() -> Self {
		Self {
			max_order: 3,
			sentinels: Sentinels::default(),
			skip_tokens: DEFAULT_SKIP_TOKENS.iter().map(|s| (*s).to_owned()).collect(),
			backward: false,
			parallel: true,
		}
	}
}

impl ModelConfig {
	/// Creates a default configuration with the given highest order.
	pub fn with_max_order(max_order: usize) -> Self {
		Self { max_order, ..Self::default() }
	}

	/// Checks the invariants listed on the type.
	///
	/// # Errors
	/// - `InvalidOrder` if `max_order < 1`
	/// - `InvalidConfig` for unusable sentinels
	pub fn validate(&self) -> Result<()> {
		if self.max_order < 1 {
			return Err(ModelError::InvalidOrder(self.max_order));
		}
		let Sentinels { start, end } = &self.sentinels;
		if start.is_empty() || end.is_empty() {
			return Err(ModelError::InvalidConfig("sentinels must not be empty".to_owned()));
		}
		if start == end {
			return Err(ModelError::InvalidConfig(format!(
				"start and end sentinels are both {start:?}"
			)));
		}
		if self.skip_tokens.contains(start) || self.skip_tokens.contains(end) {
			return Err(ModelError::InvalidConfig("sentinels cannot be skipped tokens".to_owned()));
		}
		Ok(())
	}

	/// Follow tokens excluded from forward tables: a START marker never
	/// follows anything within a sequence.
	pub(crate) fn forward_excluded(&self) -> BTreeSet<Token> {
		BTreeSet::from([self.sentinels.start.clone()])
	}

	/// Mirror of `forward_excluded` for the reversed stream.
	pub(crate) fn backward_excluded(&self) -> BTreeSet<Token> {
		BTreeSet::from([self.sentinels.end.clone()])
	}

	/// Compares the parts of two configurations that shape the stored tables.
	///
	/// `parallel` only affects how a model is built, not what it contains.
	pub fn is_compatible(&self, other: &Self) -> bool {
		self.max_order == other.max_order
			&& self.sentinels == other.sentinels
			&& self.skip_tokens == other.skip_tokens
			&& self.backward == other.backward
	}
}
