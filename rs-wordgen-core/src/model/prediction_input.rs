use std::collections::HashSet;

use super::multigram_model::Direction;
use super::vocabulary::Token;

/// Tokens ending a generated sentence unless configured otherwise.
const DEFAULT_STOP_TOKENS: [&str; 3] = [".", "!", "?"];

/// Strategy used to select the starting seed when generating a sequence.
///
/// # Variants
/// - `Random(usize)`: start from a random observed context of the given
///   order. `0` picks the order at random too.
/// - `Custom(Vec<Token>)`: start from the provided tokens, in reading order.
/// - `False`: do not use any explicit seed; generation starts from the
///   sequence boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StartSeed {
	Random(usize),
	Custom(Vec<Token>),
	False,
}

impl StartSeed {
	/// Builds a custom seed from whitespace separated words.
	pub fn words(text: &str) -> Self {
		StartSeed::Custom(text.split_whitespace().map(str::to_owned).collect())
	}
}

/// Input parameters for one generation request.
///
/// # Responsibilities
/// - Select the seed, direction and highest order to generate with
/// - Define when generation stops (`stop_tokens`, `max_length`)
///
/// A `PredictionInput` is plain data: it can be reused for any number of
/// generations against any model.
#[derive(Clone, Debug)]
pub struct PredictionInput {
	/// Highest n-gram order to consider. `0` (or anything larger than the
	/// model's order) uses the model's highest order.
	pub max_order: usize,

	/// Visible tokens that end the generation once emitted. The stop token
	/// itself is part of the output.
	pub stop_tokens: HashSet<Token>,

	/// Upper bound on visible tokens. `None` generates until a stop token,
	/// the end of the sequence or a stall.
	pub max_length: Option<usize>,

	/// Starting seed for generation.
	pub start_seed: StartSeed,

	/// Forward generation continues after the seed, backward generation
	/// writes what comes before it.
	pub direction: Direction,
}

impl Default for PredictionInput {
	fn default() -> Self {
		Self {
			max_order: 0,
			stop_tokens: DEFAULT_STOP_TOKENS.iter().map(|s| (*s).to_owned()).collect(),
			max_length: Some(64),
			start_seed: StartSeed::False,
			direction: Direction::Forward,
		}
	}
}

impl PredictionInput {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_seed(mut self, start_seed: StartSeed) -> Self {
		self.start_seed = start_seed;
		self
	}

	pub fn with_max_order(mut self, max_order: usize) -> Self {
		self.max_order = max_order;
		self
	}

	pub fn with_max_length(mut self, max_length: Option<usize>) -> Self {
		self.max_length = max_length;
		self
	}

	pub fn with_direction(mut self, direction: Direction) -> Self {
		self.direction = direction;
		self
	}

	/// Replaces the stop tokens.
	pub fn with_stop_tokens<I, S>(mut self, stop_tokens: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<Token>,
	{
		self.stop_tokens = stop_tokens.into_iter().map(Into::into).collect();
		self
	}

	/// Resolves the order to generate with against a model of order `model_order`.
	pub(crate) fn effective_order(&self, model_order: usize) -> usize {
		if self.max_order == 0 { model_order } else { self.max_order.min(model_order) }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults() {
		let input = PredictionInput::default();
		assert!(input.stop_tokens.contains("."));
		assert_eq!(input.start_seed, StartSeed::False);
		assert_eq!(input.direction, Direction::Forward);
		assert_eq!(input.max_length, Some(64));
	}

	#[test]
	fn effective_order_is_clamped() {
		let input = PredictionInput::new();
		assert_eq!(input.effective_order(3), 3);
		assert_eq!(input.clone().with_max_order(2).effective_order(3), 2);
		assert_eq!(input.with_max_order(5).effective_order(3), 3);
	}

	#[test]
	fn word_seed_splits_on_whitespace() {
		assert_eq!(
			StartSeed::words(" and  you "),
			StartSeed::Custom(vec!["and".to_owned(), "you".to_owned()])
		);
	}

	#[test]
	fn stop_tokens_are_replaced() {
		let input = PredictionInput::new().with_stop_tokens(["!"]);
		assert_eq!(input.stop_tokens.len(), 1);
		assert!(input.stop_tokens.contains("!"));
	}
}
