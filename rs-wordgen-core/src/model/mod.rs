//! Top-level module for the word n-gram generation system.
//!
//! This module provides a back-off n-gram text generator, including:
//! - Token and sentinel definitions (`vocabulary`)
//! - Build configuration (`ModelConfig`)
//! - Fixed-order frequency tables (`NGramModel`)
//! - The full set of tables, one per order (`MultiGramModel`)
//! - Binary persistence of a built model (`store`)
//! - Generation requests (`PredictionInput`) and the generator itself (`Generator`)

/// Weighted back-off generation over a shared `MultiGramModel`.
pub mod generator;

/// The table of tables: one `NGramModel` per order, built together.
///
/// Supports sequential or parallel construction and random seed selection.
pub mod multigram_model;

/// Fixed-order frequency table (`n >= 1`).
///
/// Handles window counting over a token stream, forward or reversed.
pub mod ngram_model;

/// Internal representation of one context's follow-token counts.
///
/// Supports exact weighted random sampling.
pub mod state;

/// Parameters of a single generation request.
pub mod prediction_input;

/// Configuration a model is built with.
pub mod config;

/// Binary save/load of built models.
pub mod store;

/// Tokens, contexts and boundary sentinels.
pub mod vocabulary;
