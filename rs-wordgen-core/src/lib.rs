//! Word-level n-gram text generation library.
//!
//! This crate provides a frequency-weighted Markov text generator:
//! - Frequency tables for every n-gram order up to a configured maximum
//! - Compact binary persistence, so tables are built once per corpus
//! - Generation with exact weighted sampling and order back-off
//!
//! Corpus reading and tokenization are left to the caller: the library
//! consumes a token stream already framed with boundary sentinels.

/// Core n-gram models and generation logic.
pub mod model;

/// Error type shared by building and persistence.
pub mod error;

/// I/O utilities (file loading, path helpers).
///
/// Not exposed
pub(crate) mod io;

pub use error::{ModelError, Result};
pub use model::config::ModelConfig;
pub use model::generator::{Generated, GenerationStatus, Generator};
pub use model::multigram_model::{Direction, MultiGramModel};
pub use model::prediction_input::{PredictionInput, StartSeed};
pub use model::vocabulary::{Sentinels, Token};
