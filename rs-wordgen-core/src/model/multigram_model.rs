use std::collections::BTreeSet;
use std::sync::mpsc;
use std::thread;

use log::info;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::config::ModelConfig;
use super::ngram_model::NGramModel;
use super::vocabulary::{Sentinels, Token};
use crate::error::{ModelError, Result};

/// Reading direction of a table set.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
	/// Predicts the next token from the tokens before it.
	Forward,
	/// Predicts the previous token from the tokens after it.
	Backward,
}

/// Size of one order's table, as reported by `MultiGramModel::stats`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrderStats {
	pub direction: Direction,
	pub order: usize,
	pub contexts: usize,
	pub transitions: u64,
}

/// The full set of n-gram tables, one per order from 1 to `max_order`.
///
/// This struct manages:
/// - `config`: the configuration the tables were built with
/// - `forward`: tables indexed by `order - 1`
/// - `backward`: mirrored tables, empty unless `config.backward` is set
///
/// A `MultiGramModel` is immutable once built (or loaded) and can be shared
/// by reference across any number of concurrent generations.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct MultiGramModel {
	config: ModelConfig,
	forward: Vec<NGramModel>,
	backward: Vec<NGramModel>,
}

/// One unit of work for the builder: a single table.
type Job = (Direction, usize);

impl MultiGramModel {
	/// Builds every table described by `config` from one token stream.
	///
	/// # Parameters
	/// - `tokens`: the corpus, already tokenized and framed with sentinels.
	/// - `config`: orders, sentinels and skip set to build with.
	///
	/// # Behavior
	/// - Builds one forward table per order in `max_order..=1`.
	/// - If `config.backward` is set, builds the mirrored tables too.
	/// - If `config.parallel` is set, tables are split across worker threads
	///   (bounded by the CPU count). Each worker owns the tables it builds and
	///   sends them back over a channel.
	///
	/// # Errors
	/// Returns the first builder or configuration error. No partially built
	/// model is ever returned.
	pub fn build(tokens: &[Token], config: ModelConfig) -> Result<Self> {
		config.validate()?;

		let mut jobs: Vec<Job> =
			(1..=config.max_order).rev().map(|n| (Direction::Forward, n)).collect();
		if config.backward {
			jobs.extend((1..=config.max_order).rev().map(|n| (Direction::Backward, n)));
		}

		let built = if config.parallel && jobs.len() > 1 {
			Self::build_parallel(tokens, &config, &jobs)?
		} else {
			jobs.iter()
				.map(|job| Self::build_table(tokens, &config, *job))
				.collect::<Result<Vec<_>>>()?
		};

		let mut forward: Vec<NGramModel> = Vec::with_capacity(config.max_order);
		let mut backward: Vec<NGramModel> = Vec::with_capacity(config.max_order);
		for (direction, table) in built {
			match direction {
				Direction::Forward => forward.push(table),
				Direction::Backward => backward.push(table),
			}
		}
		forward.sort_by_key(NGramModel::order);
		backward.sort_by_key(NGramModel::order);

		let model = Self { config, forward, backward };
		for stats in model.stats() {
			info!(
				"{:?} order {}: {} contexts, {} transitions",
				stats.direction, stats.order, stats.contexts, stats.transitions
			);
		}
		Ok(model)
	}

	fn build_table(
		tokens: &[Token],
		config: &ModelConfig,
		(direction, n): Job,
	) -> Result<(Direction, NGramModel)> {
		let skip = &config.skip_tokens;
		let table = match direction {
			Direction::Forward => NGramModel::build(tokens, n, skip, &config.forward_excluded())?,
			Direction::Backward => {
				NGramModel::build_backward(tokens, n, skip, &config.backward_excluded())?
			}
		};
		Ok((direction, table))
	}

	/// Spreads `jobs` over scoped worker threads.
	///
	/// # Notes
	/// - Uses MPSC channels to collect tables from threads.
	/// - Workers only read `tokens`; no table is shared between workers.
	fn build_parallel(
		tokens: &[Token],
		config: &ModelConfig,
		jobs: &[Job],
	) -> Result<Vec<(Direction, NGramModel)>> {
		let workers = num_cpus::get().clamp(1, jobs.len());

		let (tx, rx) = mpsc::channel();
		thread::scope(|scope| {
			for worker in 0..workers {
				let tx = tx.clone();
				scope.spawn(move || {
					// Round-robin, largest orders first
					for job in jobs.iter().skip(worker).step_by(workers) {
						if tx.send(Self::build_table(tokens, config, *job)).is_err() {
							return;
						}
					}
				});
			}
		});
		drop(tx);

		rx.into_iter().collect()
	}

	/// Returns the configuration the tables were built with.
	pub fn config(&self) -> &ModelConfig {
		&self.config
	}

	/// Highest order available.
	pub fn max_order(&self) -> usize {
		self.config.max_order
	}

	pub fn sentinels(&self) -> &Sentinels {
		&self.config.sentinels
	}

	/// Returns `true` if the mirrored tables were built.
	pub fn has_backward(&self) -> bool {
		self.config.backward
	}

	/// Returns every table of one direction, indexed by `order - 1`.
	///
	/// The backward slice is empty unless the model was built with it.
	pub fn tables(&self, direction: Direction) -> &[NGramModel] {
		match direction {
			Direction::Forward => &self.forward,
			Direction::Backward => &self.backward,
		}
	}

	/// Returns the table of order `n`, if built.
	pub fn table(&self, direction: Direction, n: usize) -> Option<&NGramModel> {
		self.tables(direction).get(n.checked_sub(1)?)
	}

	/// Picks a random observed context of order `n` that contains no
	/// sentinel, usable as a generation seed.
	///
	/// Returns `None` if the table is missing, is the context-free unigram
	/// table, or holds no sentinel-free context.
	pub fn random_seed<R: Rng>(
		&self,
		rng: &mut R,
		direction: Direction,
		n: usize,
	) -> Option<Vec<Token>> {
		if n < 2 {
			return None;
		}
		let sentinels = self.sentinels();
		let context = self
			.table(direction, n)?
			.random_context(rng, |context| !context.iter().any(|t| sentinels.is_sentinel(t)))?;

		let mut seed = context.clone();
		// Backward contexts are stored nearest-first
		if direction == Direction::Backward {
			seed.reverse();
		}
		Some(seed)
	}

	/// Per-table sizes, forward tables first, ascending order.
	pub fn stats(&self) -> Vec<OrderStats> {
		self.forward
			.iter()
			.map(|t| (Direction::Forward, t))
			.chain(self.backward.iter().map(|t| (Direction::Backward, t)))
			.map(|(direction, table)| OrderStats {
				direction,
				order: table.order(),
				contexts: table.len(),
				transitions: table.transition_count(),
			})
			.collect()
	}

	/// Checks that the tables are consistent with the configuration.
	///
	/// Used on freshly deserialized models.
	///
	/// # Errors
	/// Returns `CorruptModel` describing the first inconsistency found.
	pub(crate) fn check(&self) -> Result<()> {
		self.config
			.validate()
			.map_err(|e| ModelError::CorruptModel(format!("stored configuration: {e}")))?;

		let expected_backward = if self.config.backward { self.config.max_order } else { 0 };
		if self.forward.len() != self.config.max_order || self.backward.len() != expected_backward {
			return Err(ModelError::CorruptModel(format!(
				"expected {} forward and {} backward tables, found {} and {}",
				self.config.max_order,
				expected_backward,
				self.forward.len(),
				self.backward.len()
			)));
		}

		for (i, table) in self.forward.iter().chain(self.backward.iter()).enumerate() {
			let expected_order = i % self.config.max_order + 1;
			if table.order() != expected_order {
				return Err(ModelError::CorruptModel(format!(
					"table {} has order {}, expected {}",
					i,
					table.order(),
					expected_order
				)));
			}
			table.check().map_err(ModelError::CorruptModel)?;
		}
		Ok(())
	}

	/// Every distinct follow token of the unigram table.
	pub fn vocabulary(&self) -> BTreeSet<&str> {
		self.table(Direction::Forward, 1)
			.and_then(|t| t.get(&[]))
			.map(|state| state.transitions().map(|(token, _)| token).collect())
			.unwrap_or_default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::state::State;
	use crate::model::store;
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	fn corpus(config: &ModelConfig) -> Vec<Token> {
		let mut tokens = Vec::new();
		for line in ["the cat sat on the mat .", "the dog sat , then ran ."] {
			let framed = config.sentinels.frame_sequence(line.split_whitespace(), config.max_order);
			tokens.extend(framed);
		}
		tokens
	}

	/// Stores then reloads `model`, running the load-time checks.
	fn reload(model: &MultiGramModel) -> Result<MultiGramModel> {
		store::from_bytes(&store::to_bytes(model).unwrap())
	}

	#[test]
	fn builds_one_table_per_order() {
		let config = ModelConfig::default();
		let model = MultiGramModel::build(&corpus(&config), config).unwrap();
		assert_eq!(model.tables(Direction::Forward).len(), 3);
		assert!(model.tables(Direction::Backward).is_empty());
		for n in 1..=3 {
			assert_eq!(model.table(Direction::Forward, n).unwrap().order(), n);
		}
		assert!(model.table(Direction::Forward, 0).is_none());
		assert!(model.table(Direction::Forward, 4).is_none());
		assert!(model.check().is_ok());
	}

	#[test]
	fn parallel_and_sequential_builds_agree() {
		let parallel = ModelConfig { backward: true, ..ModelConfig::default() };
		let sequential = ModelConfig { parallel: false, ..parallel.clone() };
		let tokens = corpus(&parallel);
		let a = MultiGramModel::build(&tokens, parallel).unwrap();
		let b = MultiGramModel::build(&tokens, sequential).unwrap();
		assert_eq!(a.tables(Direction::Forward), b.tables(Direction::Forward));
		assert_eq!(a.tables(Direction::Backward), b.tables(Direction::Backward));
		assert_eq!(a.tables(Direction::Backward).len(), 3);
	}

	#[test]
	fn sentinels_and_skipped_tokens_never_follow() {
		let config = ModelConfig { backward: true, ..ModelConfig::default() };
		let model = MultiGramModel::build(&corpus(&config), config).unwrap();
		for table in model.tables(Direction::Forward) {
			for (_, state) in table.iter() {
				assert_eq!(state.count("<s>"), 0);
				assert_eq!(state.count(","), 0);
			}
		}
		for table in model.tables(Direction::Backward) {
			for (_, state) in table.iter() {
				assert_eq!(state.count("</s>"), 0);
			}
		}
	}

	#[test]
	fn invalid_config_builds_nothing() {
		let result = MultiGramModel::build(&[], ModelConfig::with_max_order(0));
		assert!(matches!(result, Err(ModelError::InvalidOrder(0))));
	}

	#[test]
	fn empty_corpus_gives_empty_tables() {
		let model = MultiGramModel::build(&[], ModelConfig::default()).unwrap();
		assert!(model.tables(Direction::Forward).iter().all(NGramModel::is_empty));
		assert!(model.vocabulary().is_empty());
	}

	#[test]
	fn random_seed_is_sentinel_free() {
		let config = ModelConfig { backward: true, ..ModelConfig::default() };
		let model = MultiGramModel::build(&corpus(&config), config).unwrap();
		let mut rng = StdRng::seed_from_u64(11);
		for _ in 0..20 {
			let seed = model.random_seed(&mut rng, Direction::Forward, 3).unwrap();
			assert_eq!(seed.len(), 2);
			assert!(seed.iter().all(|t| !model.sentinels().is_sentinel(t)));
		}
		let seed = model.random_seed(&mut rng, Direction::Backward, 3).unwrap();
		assert_eq!(seed.len(), 2);
		assert!(model.random_seed(&mut rng, Direction::Forward, 1).is_none());
	}

	#[test]
	fn stats_cover_every_table() {
		let config = ModelConfig::default();
		let model = MultiGramModel::build(&corpus(&config), config).unwrap();
		let stats = model.stats();
		assert_eq!(stats.len(), 3);
		assert_eq!(stats[0].order, 1);
		assert_eq!(stats[0].contexts, 1);
		assert!(stats.iter().all(|s| s.transitions > 0));
		assert!(model.vocabulary().contains("cat"));
		assert!(!model.vocabulary().contains("<s>"));
	}

	#[test]
	fn inconsistent_stored_tables_are_rejected() {
		let config = ModelConfig::default();
		let model = MultiGramModel::build(&corpus(&config), config).unwrap();
		assert_eq!(reload(&model).unwrap(), model);

		let mut fewer_orders = model.clone();
		fewer_orders.config.max_order = 2;
		assert!(matches!(reload(&fewer_orders), Err(ModelError::CorruptModel(_))));

		let mut swapped = model.clone();
		swapped.forward.swap(0, 1);
		assert!(matches!(reload(&swapped), Err(ModelError::CorruptModel(_))));

		let mut missing_backward = model.clone();
		missing_backward.config.backward = true;
		assert!(matches!(reload(&missing_backward), Err(ModelError::CorruptModel(_))));

		let mut stray_backward = model.clone();
		stray_backward.backward = stray_backward.forward.clone();
		assert!(matches!(reload(&stray_backward), Err(ModelError::CorruptModel(_))));

		let mut long_context = model.clone();
		let state = State::from_counts([("mat".to_owned(), 1)].into());
		long_context.forward[1].insert_state(vec!["on".to_owned(), "the".to_owned()], state);
		assert!(matches!(reload(&long_context), Err(ModelError::CorruptModel(_))));
	}
}
