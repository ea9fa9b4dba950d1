use std::collections::HashMap;

use rand::Rng;

use serde::{Deserialize, Serialize};

use super::vocabulary::Token;

/// Represents a state in an n-gram model.
///
/// A `State` holds every token observed after one fixed context, weighted by
/// how many times it was observed. Conceptually, this is a node in a Markov
/// chain where outgoing edges are weighted by their number of observations.
///
/// Counts are stored as running totals (`cumulative[i]` is the sum of the
/// counts of `followers[0..=i]`), which is both the sampling structure and a
/// lossless encoding of the raw counts.
///
/// ## Invariants
/// - `followers` and `cumulative` have the same length
/// - `followers` is sorted and free of duplicates
/// - `cumulative` is strictly increasing from a value >= 1 (every count >= 1)
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct State {
	/// Observed follow tokens, sorted so that a seeded rng is reproducible.
	followers: Vec<Token>,
	/// Running total of occurrences.
	/// Example: counts { "cat" => 2, "dog" => 3 } are stored as [2, 5]
	cumulative: Vec<u64>,
}

impl State {
	/// Freezes accumulated counts into a sampling-ready state.
	///
	/// Zero counts are dropped so they can never be drawn.
	pub(crate) fn from_counts(counts: HashMap<Token, u64>) -> Self {
		let mut transitions: Vec<(Token, u64)> =
			counts.into_iter().filter(|(_, count)| *count > 0).collect();
		transitions.sort_unstable_by(|a, b| a.0.cmp(&b.0));

		let mut total = 0;
		let mut followers = Vec::with_capacity(transitions.len());
		let mut cumulative = Vec::with_capacity(transitions.len());
		for (token, count) in transitions {
			total += count;
			followers.push(token);
			cumulative.push(total);
		}

		Self { followers, cumulative }
	}

	/// Returns `true` if no transition was ever recorded.
	pub fn is_empty(&self) -> bool {
		self.followers.is_empty()
	}

	/// Number of distinct follow tokens.
	pub fn len(&self) -> usize {
		self.followers.len()
	}

	/// Total number of observed transitions.
	pub fn total(&self) -> u64 {
		self.cumulative.last().copied().unwrap_or(0)
	}

	/// Returns the observed count of `token` after this context (0 if never seen).
	pub fn count(&self, token: &str) -> u64 {
		match self.followers.binary_search_by(|f| f.as_str().cmp(token)) {
			Ok(i) => self.count_at(i),
			Err(_) => 0,
		}
	}

	fn count_at(&self, i: usize) -> u64 {
		let previous = if i == 0 { 0 } else { self.cumulative[i - 1] };
		self.cumulative[i] - previous
	}

	/// Iterates over `(token, count)` pairs in token order.
	pub fn transitions(&self) -> impl Iterator<Item = (&str, u64)> {
		self.followers
			.iter()
			.enumerate()
			.map(|(i, token)| (token.as_str(), self.count_at(i)))
	}

	/// Draws the next token using exact weighted random sampling.
	///
	/// The probability of selecting a token is proportional to its count.
	/// A single uniform draw in `0..total` is located in the running totals
	/// with a binary search.
	///
	/// Returns `None` if the state has no transitions.
	pub fn predict<R: Rng>(&self, rng: &mut R) -> Option<&Token> {
		let total = self.total();
		if total == 0 {
			return None;
		}

		let r = rng.random_range(0..total);
		// First bucket whose running total exceeds the draw
		let index = self.cumulative.partition_point(|&c| c <= r);
		self.followers.get(index)
	}

	/// Checks the invariants listed on the type.
	///
	/// Used when loading a persisted model, where the structure comes from
	/// untrusted bytes.
	pub(crate) fn check(&self) -> Result<(), String> {
		if self.followers.len() != self.cumulative.len() {
			return Err(format!(
				"{} followers but {} weights",
				self.followers.len(),
				self.cumulative.len()
			));
		}
		if self.followers.is_empty() {
			return Err("empty state".to_owned());
		}
		if self.followers.windows(2).any(|w| w[0] >= w[1]) {
			return Err("followers are not sorted or contain duplicates".to_owned());
		}
		let mut previous = 0;
		for &c in &self.cumulative {
			if c <= previous {
				return Err("zero or negative count".to_owned());
			}
			previous = c;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	fn state(pairs: &[(&str, u64)]) -> State {
		State::from_counts(pairs.iter().map(|(t, c)| ((*t).to_owned(), *c)).collect())
	}

	#[test]
	fn counts_survive_freezing() {
		let s = state(&[("dog", 3), ("cat", 2)]);
		assert_eq!(s.count("cat"), 2);
		assert_eq!(s.count("dog"), 3);
		assert_eq!(s.count("cow"), 0);
		assert_eq!(s.total(), 5);
		assert_eq!(s.transitions().collect::<Vec<_>>(), vec![("cat", 2), ("dog", 3)]);
	}

	#[test]
	fn zero_counts_are_dropped() {
		let s = state(&[("cat", 0), ("dog", 1)]);
		assert_eq!(s.len(), 1);
		assert!(s.check().is_ok());
	}

	#[test]
	fn empty_state_predicts_nothing() {
		let s = state(&[]);
		let mut rng = StdRng::seed_from_u64(7);
		assert!(s.is_empty());
		assert_eq!(s.predict(&mut rng), None);
	}

	#[test]
	fn single_candidate_is_always_drawn() {
		let s = state(&[("sat", 4)]);
		let mut rng = StdRng::seed_from_u64(1);
		for _ in 0..50 {
			assert_eq!(s.predict(&mut rng).map(String::as_str), Some("sat"));
		}
	}

	#[test]
	fn sampling_follows_counts() {
		let s = state(&[("a", 1), ("b", 9)]);
		let mut rng = StdRng::seed_from_u64(42);
		let draws = 10_000;
		let b = (0..draws)
			.filter(|_| s.predict(&mut rng).map(String::as_str) == Some("b"))
			.count();
		// Expected 9000, generous bound
		assert!((8_600..=9_400).contains(&b), "drew b {b} times");
	}

	#[test]
	fn check_rejects_broken_weights() {
		let broken = State { followers: vec!["a".into(), "b".into()], cumulative: vec![2, 2] };
		assert!(broken.check().is_err());
		let unsorted = State { followers: vec!["b".into(), "a".into()], cumulative: vec![1, 2] };
		assert!(unsorted.check().is_err());
		let mismatched = State { followers: vec!["a".into()], cumulative: vec![1, 2] };
		assert!(mismatched.check().is_err());
	}
}
