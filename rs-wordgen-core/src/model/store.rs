//! Persistence of built models.
//!
//! Building tables costs one pass per order over the whole corpus, while
//! loading costs time proportional to the model size. A stored model is:
//!
//! ```text
//! "NGRM" | format version (1 byte) | postcard(MultiGramModel)
//! ```
//!
//! The payload embeds the `ModelConfig`, so a load can check the stored
//! orders and sentinels against what the caller expects.

use std::io::{Read, Write};
use std::path::Path;

use log::{info, warn};

use super::config::ModelConfig;
use super::multigram_model::MultiGramModel;
use super::vocabulary::Token;
use crate::error::{ModelError, Result};
use crate::io::{build_output_path, read_file, write_atomically};

const MAGIC: &[u8; 4] = b"NGRM";
const FORMAT_VERSION: u8 = 1;

/// Serializes `model` into its stored byte form.
pub fn to_bytes(model: &MultiGramModel) -> Result<Vec<u8>> {
	let payload = postcard::to_stdvec(model)?;

	let mut bytes = Vec::with_capacity(MAGIC.len() + 1 + payload.len());
	bytes.extend_from_slice(MAGIC);
	bytes.push(FORMAT_VERSION);
	bytes.extend_from_slice(&payload);
	Ok(bytes)
}

/// Deserializes and validates a stored model.
///
/// # Errors
/// Returns `CorruptModel` for a wrong header, an undecodable payload,
/// trailing bytes or tables inconsistent with the stored configuration.
pub fn from_bytes(bytes: &[u8]) -> Result<MultiGramModel> {
	let payload = match bytes {
		[m0, m1, m2, m3, version, payload @ ..] if [*m0, *m1, *m2, *m3] == *MAGIC => {
			if *version != FORMAT_VERSION {
				return Err(corrupt(format!("unsupported format version {version}")));
			}
			payload
		}
		_ => return Err(corrupt("missing model header".to_owned())),
	};

	let (model, rest): (MultiGramModel, &[u8]) = postcard::take_from_bytes(payload)
		.map_err(|e| corrupt(format!("undecodable payload: {e}")))?;
	if !rest.is_empty() {
		return Err(corrupt(format!("{} trailing bytes", rest.len())));
	}

	model.check().inspect_err(|e| warn!("rejected stored model: {e}"))?;
	Ok(model)
}

fn corrupt(reason: String) -> ModelError {
	warn!("rejected stored model: {reason}");
	ModelError::CorruptModel(reason)
}

/// Writes `model` to `destination`, returning the number of bytes written.
pub fn save<W: Write>(model: &MultiGramModel, mut destination: W) -> Result<usize> {
	let bytes = to_bytes(model)?;
	destination.write_all(&bytes)?;
	destination.flush()?;
	info!("saved model of order {} ({} bytes)", model.max_order(), bytes.len());
	Ok(bytes.len())
}

/// Reads a model of any configuration from `source`.
pub fn load<R: Read>(mut source: R) -> Result<MultiGramModel> {
	let mut bytes = Vec::new();
	source.read_to_end(&mut bytes)?;
	let model = from_bytes(&bytes)?;
	info!("loaded model of order {} ({} bytes)", model.max_order(), bytes.len());
	Ok(model)
}

/// Reads a model from `source` and checks it was built with a configuration
/// compatible with `expected`.
///
/// # Errors
/// Returns `CorruptModel` on any mismatch (orders, sentinels, skip set,
/// backward tables).
pub fn load_expecting<R: Read>(source: R, expected: &ModelConfig) -> Result<MultiGramModel> {
	let model = load(source)?;
	if !model.config().is_compatible(expected) {
		return Err(corrupt(format!(
			"stored configuration (order {}, backward {}) does not match \
			 the expected one (order {}, backward {})",
			model.config().max_order,
			model.config().backward,
			expected.max_order,
			expected.backward
		)));
	}
	Ok(model)
}

/// Saves `model` to `path`, replacing any previous file in one step.
pub fn save_to_path<P: AsRef<Path>>(model: &MultiGramModel, path: P) -> Result<usize> {
	let bytes = to_bytes(model)?;
	write_atomically(&path, &bytes)?;
	info!("saved model to {} ({} bytes)", path.as_ref().display(), bytes.len());
	Ok(bytes.len())
}

/// Loads the model stored at `path`, checking it against `expected`.
pub fn load_from_path<P: AsRef<Path>>(path: P, expected: &ModelConfig) -> Result<MultiGramModel> {
	let file = std::fs::File::open(&path)?;
	load_expecting(std::io::BufReader::new(file), expected)
}

/// Loads the model cached next to a corpus, or builds and caches it.
///
/// - `corpus_path` is the input text file; the model lives at the same path
///   with a `bin` extension.
/// - If the cached model exists it is loaded and checked against `config`.
///   A mismatching or corrupt cache is an error, not a silent rebuild.
/// - Otherwise every line of the corpus is handed to `tokenize`, the tables
///   are built and the result is cached.
pub fn load_or_build<P, F>(
	corpus_path: P,
	config: ModelConfig,
	tokenize: F,
) -> Result<MultiGramModel>
where
	P: AsRef<Path>,
	F: FnOnce(&[String], &ModelConfig) -> Vec<Token>,
{
	let binary_data_path = build_output_path(&corpus_path, "bin")?;
	if binary_data_path.exists() {
		return load_from_path(&binary_data_path, &config);
	}

	let lines = read_file(&corpus_path)?;
	let tokens = tokenize(&lines, &config);
	info!(
		"building model of order {} from {} ({} lines, {} tokens)",
		config.max_order,
		corpus_path.as_ref().display(),
		lines.len(),
		tokens.len()
	);

	let model = MultiGramModel::build(&tokens, config)?;
	save_to_path(&model, &binary_data_path)?;
	Ok(model)
}
