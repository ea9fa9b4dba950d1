use std::collections::HashSet;

use rand::Rng;

use super::multigram_model::{Direction, MultiGramModel};
use super::ngram_model::NGramModel;
use super::prediction_input::{PredictionInput, StartSeed};
use super::vocabulary::{Sentinels, Token};
use crate::error::{ModelError, Result};

/// Why a generation stopped.
///
/// None of these is a failure: a short output is a normal outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationStatus {
	/// A stop token was emitted (and is the last visible token).
	StopToken,
	/// `max_length` visible tokens were emitted.
	MaxLength,
	/// Sentinels filled the context window: the sequence is over.
	EndOfSequence,
	/// No order holds a continuation for the current context.
	Stalled,
}

/// Result of a finished generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Generated {
	/// The visible seed tokens, in reading order.
	pub seed: Vec<Token>,
	/// Generated visible tokens, in reading order.
	pub tokens: Vec<Token>,
	pub status: GenerationStatus,
	pub direction: Direction,
}

impl Generated {
	/// Joins seed and generated tokens with single spaces, in reading order.
	pub fn text(&self) -> String {
		let (first, second) = match self.direction {
			Direction::Forward => (&self.seed, &self.tokens),
			Direction::Backward => (&self.tokens, &self.seed),
		};
		first
			.iter()
			.chain(second.iter())
			.map(String::as_str)
			.collect::<Vec<_>>()
			.join(" ")
	}
}

/// High-level generation interface over a shared `MultiGramModel`.
///
/// The model is only borrowed: several generators (on several threads)
/// can run against the same model at once.
#[derive(Clone, Copy, Debug)]
pub struct Generator<'m> {
	model: &'m MultiGramModel,
}

impl<'m> Generator<'m> {
	pub fn new(model: &'m MultiGramModel) -> Self {
		Self { model }
	}

	/// Starts a lazy generation.
	///
	/// # Errors
	/// Returns `InvalidConfig` if backward generation is requested from a
	/// model built without backward tables.
	pub fn stream<'r, R: Rng>(
		&self,
		input: &PredictionInput,
		rng: &'r mut R,
	) -> Result<Generation<'m, 'r, R>> {
		if input.direction == Direction::Backward && !self.model.has_backward() {
			return Err(ModelError::InvalidConfig(
				"backward generation requires a model built with backward tables".to_owned(),
			));
		}

		let max_order = input.effective_order(self.model.max_order());
		let seed = self.resolve_seed(&input.start_seed, input.direction, max_order, &mut *rng);
		Ok(Generation::new(self.model, input, max_order, seed, rng))
	}

	/// Generates a full sequence.
	///
	/// Drains `stream` and returns the visible tokens with the reason the
	/// generation stopped.
	pub fn generate<R: Rng>(&self, input: &PredictionInput, rng: &mut R) -> Result<Generated> {
		let mut generation = self.stream(input, rng)?;
		let mut tokens: Vec<Token> = generation.by_ref().collect();
		if input.direction == Direction::Backward {
			tokens.reverse();
		}

		let sentinels = self.model.sentinels();
		let seed = generation
			.seed
			.iter()
			.filter(|t| !sentinels.is_sentinel(t))
			.cloned()
			.collect();
		// A drained generation always carries a status
		let status = generation.status().unwrap_or(GenerationStatus::Stalled);

		Ok(Generated { seed, tokens, status, direction: input.direction })
	}

	/// Turns a `StartSeed` into seed tokens, in reading order.
	fn resolve_seed<R: Rng>(
		&self,
		start_seed: &StartSeed,
		direction: Direction,
		max_order: usize,
		rng: &mut R,
	) -> Vec<Token> {
		match start_seed {
			StartSeed::False => Vec::new(),
			StartSeed::Custom(tokens) => tokens.clone(),
			StartSeed::Random(n) => {
				if max_order < 2 {
					return Vec::new();
				}
				let n = match *n {
					0 => rng.random_range(2..=max_order),
					n => n.clamp(2, max_order),
				};
				self.model.random_seed(rng, direction, n).unwrap_or_default()
			}
		}
	}
}

/// Generation state of a single request.
///
/// Each call to `next` draws tokens until one is visible, or moves to a
/// terminal state and returns `None`. The state is owned by the iterator;
/// dropping it midway has no side effect on the model.
pub struct Generation<'m, 'r, R: Rng> {
	/// Tables of the chosen direction, indexed by `order - 1`.
	tables: &'m [NGramModel],
	sentinels: &'m Sentinels,
	max_order: usize,
	stop_tokens: HashSet<Token>,
	max_length: Option<usize>,
	rng: &'r mut R,

	/// Seed as given, in reading order.
	seed: Vec<Token>,
	/// The last `max_order - 1` consumed tokens, in generation order.
	window: Vec<Token>,
	produced: usize,
	hidden_run: usize,
	last_order: Option<usize>,
	status: Option<GenerationStatus>,
}

impl<'m, 'r, R: Rng> Generation<'m, 'r, R> {
	fn new(
		model: &'m MultiGramModel,
		input: &PredictionInput,
		max_order: usize,
		seed: Vec<Token>,
		rng: &'r mut R,
	) -> Self {
		let sentinels = model.sentinels();
		// Backward generation walks the reversed stream, which opens on END
		let opening = match input.direction {
			Direction::Forward => &sentinels.start,
			Direction::Backward => &sentinels.end,
		};

		let width = max_order.saturating_sub(1);
		let mut generation_order: Vec<&Token> = seed.iter().collect();
		if input.direction == Direction::Backward {
			generation_order.reverse();
		}
		// Keep the most recent tokens, pad the rest with the opening sentinel
		let kept = generation_order.len().min(width);
		let mut window: Vec<Token> = std::iter::repeat_n(opening.clone(), width - kept).collect();
		let recent = &generation_order[generation_order.len() - kept..];
		window.extend(recent.iter().map(|t| (*t).clone()));

		let mut generation = Self {
			tables: model.tables(input.direction),
			sentinels,
			max_order: max_order.min(model.tables(input.direction).len()),
			stop_tokens: input.stop_tokens.clone(),
			max_length: input.max_length,
			rng,
			seed,
			window,
			produced: 0,
			hidden_run: 0,
			last_order: None,
			status: None,
		};

		// Without a context window (unigrams only) the seed is not looked up
		let has_context = !generation.seed.is_empty() && !generation.window.is_empty();
		if has_context && !generation.seed_is_known() {
			generation.status = Some(GenerationStatus::Stalled);
		}
		generation
	}

	/// A seed is usable when some order >= 2 has seen its tail as a context.
	///
	/// The context-free unigram fallback does not count: it would accept any
	/// seed at all.
	fn seed_is_known(&self) -> bool {
		(2..=self.max_order).any(|k| self.tables[k - 1].get(self.context(k)).is_some())
	}

	/// The last `k - 1` tokens of the window.
	fn context(&self, k: usize) -> &[Token] {
		&self.window[self.window.len() - (k - 1)..]
	}

	/// Back-off search: draws from the highest order that knows the context.
	fn draw(&mut self) -> Option<Token> {
		let tables = self.tables;
		'backoff: for k in (1..=self.max_order).rev() {
			let Some(state) = tables[k - 1].get(self.context(k)) else {
				continue 'backoff;
			};
			if let Some(token) = state.predict(&mut *self.rng) {
				self.last_order = Some(k);
				return Some(token.clone());
			}
		}
		None
	}

	/// Drops the oldest token of the window and appends `token`.
	///
	/// The width never changes; a unigram window stays empty.
	fn slide(&mut self, token: Token) {
		self.window.rotate_left(1);
		if let Some(newest) = self.window.last_mut() {
			*newest = token;
		}
	}

	/// Terminal status, `None` while generation can continue.
	pub fn status(&self) -> Option<GenerationStatus> {
		self.status
	}

	/// Order used for the most recent draw.
	pub fn last_order(&self) -> Option<usize> {
		self.last_order
	}

	/// Number of visible tokens emitted so far.
	pub fn produced(&self) -> usize {
		self.produced
	}

	/// The current context window, in generation order.
	pub fn window(&self) -> &[Token] {
		&self.window
	}
}

impl<R: Rng> Iterator for Generation<'_, '_, R> {
	type Item = Token;

	fn next(&mut self) -> Option<Token> {
		loop {
			if self.status.is_some() {
				return None;
			}
			if self.max_length.is_some_and(|limit| self.produced >= limit) {
				self.status = Some(GenerationStatus::MaxLength);
				return None;
			}

			let Some(token) = self.draw() else {
				self.status = Some(GenerationStatus::Stalled);
				return None;
			};

			if self.sentinels.is_sentinel(&token) {
				self.slide(token);
				self.hidden_run += 1;
				// A window holding nothing but sentinels carries no more context
				if self.hidden_run >= self.window.len().max(1) {
					self.status = Some(GenerationStatus::EndOfSequence);
				}
				continue;
			}

			self.hidden_run = 0;
			self.produced += 1;
			if self.stop_tokens.contains(&token) {
				self.status = Some(GenerationStatus::StopToken);
			}
			self.slide(token.clone());
			return Some(token);
		}
	}
}
