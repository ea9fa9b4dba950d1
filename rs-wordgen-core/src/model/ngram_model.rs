use std::collections::{BTreeSet, HashMap};

use log::debug;
use rand::prelude::IteratorRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::state::State;
use super::vocabulary::{Context, Token};
use crate::error::{ModelError, Result};

/// Frequency table of a single n-gram order over word tokens.
///
/// The `NGramModel` maps every observed context (the `n-1` tokens preceding
/// a follow token) to the `State` holding the follow token counts.
///
/// # Responsibilities
/// - Count transitions over a token stream, in reading order or reversed
/// - Look up the distribution of follow tokens for a context
///
/// # Invariants
/// - `n` is always >= 1
/// - Every context key has exactly `n-1` tokens (the empty context for unigrams)
/// - Every state is non-empty and all its counts are >= 1
/// - Immutable once built
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NGramModel {
	/// The order of the model (number of tokens in the n-gram)
	n: usize,

	/// Mapping from a context (length n-1) to its follow token counts
	states: HashMap<Context, State>,
}

impl NGramModel {
	/// Counts every window of `n` tokens in reading order.
	///
	/// For each window, the first `n-1` tokens are the context and the last
	/// one is the follow token. Windows whose follow token is in `skip_tokens`
	/// or `excluded_follow` are discarded.
	///
	/// # Errors
	/// Returns `InvalidOrder` if `n < 1`; no table is produced.
	pub fn build(
		tokens: &[Token],
		n: usize,
		skip_tokens: &BTreeSet<Token>,
		excluded_follow: &BTreeSet<Token>,
	) -> Result<Self> {
		Self::accumulate(tokens, n, skip_tokens, excluded_follow, false)
	}

	/// Same as `build`, but each window is reversed before counting so the
	/// table predicts the *preceding* token from the tokens that follow it.
	///
	/// The context of the window `[a, b, c]` is `[c, b]` and its follow is `a`.
	pub fn build_backward(
		tokens: &[Token],
		n: usize,
		skip_tokens: &BTreeSet<Token>,
		excluded_follow: &BTreeSet<Token>,
	) -> Result<Self> {
		Self::accumulate(tokens, n, skip_tokens, excluded_follow, true)
	}

	fn accumulate(
		tokens: &[Token],
		n: usize,
		skip_tokens: &BTreeSet<Token>,
		excluded_follow: &BTreeSet<Token>,
		reversed: bool,
	) -> Result<Self> {
		if n < 1 {
			return Err(ModelError::InvalidOrder(n));
		}

		let mut counts: HashMap<Context, HashMap<Token, u64>> = HashMap::new();
		let mut discarded = 0usize;

		// Too-short streams yield no window at all
		for window in tokens.windows(n) {
			let follow = if reversed { &window[0] } else { &window[n - 1] };
			if skip_tokens.contains(follow) || excluded_follow.contains(follow) {
				discarded += 1;
				continue;
			}

			let context: Context = if reversed {
				window[1..].iter().rev().cloned().collect()
			} else {
				window[..n - 1].to_vec()
			};
			*counts.entry(context).or_default().entry(follow.clone()).or_insert(0) += 1;
		}

		let states: HashMap<Context, State> = counts
			.into_iter()
			.map(|(context, follows)| (context, State::from_counts(follows)))
			.collect();

		debug!(
			"built order {} {} table: {} contexts, {} windows discarded",
			n,
			if reversed { "backward" } else { "forward" },
			states.len(),
			discarded
		);

		Ok(Self { n, states })
	}

	/// Returns the order of the model.
	pub fn order(&self) -> usize {
		self.n
	}

	/// Number of distinct contexts.
	pub fn len(&self) -> usize {
		self.states.len()
	}

	pub fn is_empty(&self) -> bool {
		self.states.is_empty()
	}

	/// Returns the follow token distribution for `context`.
	///
	/// `context` must hold exactly `n-1` tokens; any other length finds nothing.
	pub fn get(&self, context: &[Token]) -> Option<&State> {
		self.states.get(context).filter(|state| !state.is_empty())
	}

	/// Iterates over every `(context, state)` pair, in no particular order.
	pub fn iter(&self) -> impl Iterator<Item = (&Context, &State)> {
		self.states.iter()
	}

	/// Total number of counted transitions across all contexts.
	pub fn transition_count(&self) -> u64 {
		self.states.values().map(State::total).sum()
	}

	/// Returns a random context from the model.
	///
	/// Useful for starting a generation sequence.
	/// Returns `None` if no context satisfies `accept`.
	pub fn random_context<R, F>(&self, rng: &mut R, accept: F) -> Option<&Context>
	where
		R: Rng,
		F: Fn(&Context) -> bool,
	{
		self.states.keys().filter(|context| accept(context)).choose(rng)
	}

	/// Checks the invariants listed on the type.
	pub(crate) fn check(&self) -> std::result::Result<(), String> {
		if self.n < 1 {
			return Err("order 0 table".to_owned());
		}
		for (context, state) in &self.states {
			if context.len() != self.n - 1 {
				return Err(format!(
					"order {} table holds a context of {} tokens",
					self.n,
					context.len()
				));
			}
			state.check().map_err(|e| format!("order {} context {:?}: {}", self.n, context, e))?;
		}
		Ok(())
	}

	/// Replaces the state stored under `context`, bypassing every build check.
	#[cfg(test)]
	pub(crate) fn insert_state(&mut self, context: Context, state: State) {
		self.states.insert(context, state);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn tokens(words: &[&str]) -> Vec<Token> {
		words.iter().map(|w| (*w).to_owned()).collect()
	}

	fn ctx(words: &[&str]) -> Context {
		tokens(words)
	}

	fn none() -> BTreeSet<Token> {
		BTreeSet::new()
	}

	#[test]
	fn bigram_table_matches_windows() {
		let stream = tokens(&["the", "cat", "sat", "."]);
		let table = NGramModel::build(&stream, 2, &none(), &none()).unwrap();
		assert_eq!(table.order(), 2);
		assert_eq!(table.len(), 3);
		assert_eq!(table.get(&ctx(&["the"])).unwrap().count("cat"), 1);
		assert_eq!(table.get(&ctx(&["cat"])).unwrap().count("sat"), 1);
		assert_eq!(table.get(&ctx(&["sat"])).unwrap().count("."), 1);
		assert!(table.get(&ctx(&["."])).is_none());
	}

	#[test]
	fn unigram_table_uses_empty_context() {
		let table = NGramModel::build(&tokens(&["a", "b", "a"]), 1, &none(), &none()).unwrap();
		assert_eq!(table.len(), 1);
		let state = table.get(&[]).unwrap();
		assert_eq!(state.count("a"), 2);
		assert_eq!(state.count("b"), 1);
	}

	#[test]
	fn order_zero_is_invalid() {
		let result = NGramModel::build(&tokens(&["a"]), 0, &none(), &none());
		assert!(matches!(result, Err(ModelError::InvalidOrder(0))));
	}

	#[test]
	fn empty_and_short_streams_give_empty_tables() {
		assert!(NGramModel::build(&[], 2, &none(), &none()).unwrap().is_empty());
		assert!(NGramModel::build(&tokens(&["a", "b"]), 3, &none(), &none()).unwrap().is_empty());
	}

	#[test]
	fn skipped_follow_tokens_are_not_counted() {
		let skip: BTreeSet<Token> = [",".to_owned()].into();
		let stream = tokens(&["well", ",", "well", "done"]);
		let table = NGramModel::build(&stream, 2, &skip, &none()).unwrap();
		// "," may still be a context
		assert_eq!(table.get(&ctx(&[","])).unwrap().count("well"), 1);
		assert!(table.get(&ctx(&["well"])).unwrap().count(",") == 0);
		assert_eq!(table.get(&ctx(&["well"])).unwrap().total(), 1);
	}

	#[test]
	fn excluded_follow_tokens_are_not_counted() {
		let start: BTreeSet<Token> = ["<s>".to_owned()].into();
		let stream = tokens(&["<s>", "hi", "</s>", "<s>", "yo", "</s>"]);
		let table = NGramModel::build(&stream, 2, &none(), &start).unwrap();
		assert!(table.get(&ctx(&["</s>"])).is_none());
		assert_eq!(table.get(&ctx(&["<s>"])).unwrap().total(), 2);
	}

	#[test]
	fn counts_sum_to_non_skipped_windows() {
		let skip: BTreeSet<Token> = [",".to_owned()].into();
		let stream = tokens(&["a", "b", ",", "a", "b", "c", "a", "b", "c"]);
		let table = NGramModel::build(&stream, 3, &skip, &none()).unwrap();
		for (context, state) in table.iter() {
			let windows = stream
				.windows(3)
				.filter(|w| w[..2] == context[..] && !skip.contains(&w[2]))
				.count() as u64;
			assert_eq!(state.total(), windows, "context {context:?}");
		}
		assert_eq!(table.get(&ctx(&["a", "b"])).unwrap().count("c"), 2);
		assert_eq!(table.transition_count(), 6);
	}

	#[test]
	fn backward_table_predicts_preceding_token() {
		let stream = tokens(&["the", "cat", "sat"]);
		let table = NGramModel::build_backward(&stream, 3, &none(), &none()).unwrap();
		assert_eq!(table.len(), 1);
		assert_eq!(table.get(&ctx(&["sat", "cat"])).unwrap().count("the"), 1);

		let bigram = NGramModel::build_backward(&stream, 2, &none(), &none()).unwrap();
		assert_eq!(bigram.get(&ctx(&["cat"])).unwrap().count("the"), 1);
		assert_eq!(bigram.get(&ctx(&["sat"])).unwrap().count("cat"), 1);
	}

	#[test]
	fn random_context_respects_filter() {
		use rand::SeedableRng;
		let stream = tokens(&["<s>", "a", "b", "c"]);
		let table = NGramModel::build(&stream, 2, &none(), &none()).unwrap();
		let mut rng = rand::rngs::StdRng::seed_from_u64(3);
		for _ in 0..20 {
			let context = table.random_context(&mut rng, |c| c[0] != "<s>").unwrap();
			assert_ne!(context[0], "<s>");
		}
		assert!(table.random_context(&mut rng, |_| false).is_none());
	}

	#[test]
	fn check_accepts_built_tables() {
		let stream = tokens(&["a", "b", "c", "a", "b"]);
		let mut table = NGramModel::build(&stream, 2, &none(), &none()).unwrap();
		assert!(table.check().is_ok());

		let state = State::from_counts([("c".to_owned(), 1)].into());
		table.insert_state(ctx(&["a", "b"]), state);
		assert!(table.check().is_err());
	}

	#[test]
	fn backward_skipped_tokens_are_never_predicted() {
		let skip: BTreeSet<Token> = [",".to_owned()].into();
		let end: BTreeSet<Token> = ["</s>".to_owned()].into();
		let stream = tokens(&["</s>", "yes", ",", "sir", "</s>"]);
		let table = NGramModel::build_backward(&stream, 2, &skip, &end).unwrap();
		// Reversed windows: the preceding token is the follow
		assert_eq!(table.get(&ctx(&[","])).unwrap().count("yes"), 1);
		assert_eq!(table.get(&ctx(&["</s>"])).unwrap().count("sir"), 1);
		assert!(table.get(&ctx(&["sir"])).is_none());
		assert!(table.get(&ctx(&["yes"])).is_none());
		assert_eq!(table.transition_count(), 2);
	}
}
