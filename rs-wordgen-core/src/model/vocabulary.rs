use serde::{Deserialize, Serialize};

/// A normalized word unit (case-folded word, punctuation mark or sentinel).
pub type Token = String;

/// The `order - 1` tokens preceding a follow token.
///
/// Stored as an owned `Vec` so that lookups can borrow a `&[Token]` slice
/// of the generation window without allocating.
pub type Context = Vec<Token>;

/// Reserved boundary markers injected around every training sequence.
///
/// # Invariants
/// - `start` and `end` are non-empty and distinct
/// - Neither is ever emitted as visible generation output
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Sentinels {
	pub start: Token,
	pub end: Token,
}

impl Default for Sentinels {
	fn default() -> Self {
		Self { start: "<s>".to_owned(), end: "</s>".to_owned() }
	}
}

impl Sentinels {
	pub fn is_start(&self, token: &str) -> bool {
		token == self.start
	}

	pub fn is_end(&self, token: &str) -> bool {
		token == self.end
	}

	/// Returns `true` for either boundary marker.
	pub fn is_sentinel(&self, token: &str) -> bool {
		self.is_start(token) || self.is_end(token)
	}

	/// Wraps one logical sequence in boundary markers.
	///
	/// `width` START markers are prepended and `width` END markers appended,
	/// where `width` is the context width of the highest order (`max_order - 1`),
	/// never less than one. For a trigram model this gives the classic
	/// `<s> <s> ... </s> </s>` framing.
	///
	/// # Example
	/// `["the", "cat"]` with `max_order = 3` → `["<s>", "<s>", "the", "cat", "</s>", "</s>"]`
	pub fn frame_sequence<I, S>(&self, tokens: I, max_order: usize) -> Vec<Token>
	where
		I: IntoIterator<Item = S>,
		S: Into<Token>,
	{
		let width = max_order.saturating_sub(1).max(1);
		let mut framed: Vec<Token> = std::iter::repeat_n(self.start.clone(), width).collect();
		framed.extend(tokens.into_iter().map(Into::into));
		framed.extend(std::iter::repeat_n(self.end.clone(), width));
		framed
	}
}
