use std::env;

use log::info;
use rs_wordgen_core::model::store;
use rs_wordgen_core::{Direction, Generator, ModelConfig, PredictionInput, StartSeed, Token};

/// Splits a corpus line into lower-cased word and punctuation tokens.
///
/// `"Hello, world!"` → `["hello", ",", "world", "!"]`
fn tokenize_line(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    for c in line.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() || (c == '\'' && !word.is_empty()) {
            word.push(c);
            continue;
        }
        if !word.is_empty() {
            tokens.push(std::mem::take(&mut word));
        }
        if !c.is_whitespace() {
            tokens.push(c.to_string());
        }
    }
    if !word.is_empty() {
        tokens.push(word);
    }
    tokens
}

/// Frames every sentence of the corpus with boundary sentinels.
///
/// Sentences end on `.`, `!` or `?`; a line break also closes a sentence.
fn tokenize(lines: &[String], config: &ModelConfig) -> Vec<Token> {
    let mut tokens = Vec::new();
    for line in lines {
        let mut sentence = Vec::new();
        for token in tokenize_line(line) {
            let is_end = matches!(token.as_str(), "." | "!" | "?");
            sentence.push(token);
            if is_end {
                let framed = config.sentinels.frame_sequence(sentence.drain(..), config.max_order);
                tokens.extend(framed);
            }
        }
        if !sentence.is_empty() {
            tokens.extend(config.sentinels.frame_sequence(sentence, config.max_order));
        }
    }
    tokens
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = env::args().skip(1);
    // Cached as "./data/corpus.bin" after the first run
    let corpus = args.next().unwrap_or_else(|| "./data/corpus.txt".to_owned());
    let seed: Vec<Token> = args.flat_map(|arg| tokenize_line(&arg)).collect();

    let config = ModelConfig { backward: true, ..ModelConfig::default() };
    let model = store::load_or_build(&corpus, config, tokenize)?;
    for stats in model.stats() {
        info!("{:?} order {}: {} contexts", stats.direction, stats.order, stats.contexts);
    }

    let generator = Generator::new(&model);
    let mut rng = rand::rng();

    // Forward: continue the seed, or start from a random context
    let start_seed = if seed.is_empty() {
        StartSeed::Random(0)
    } else {
        StartSeed::Custom(seed.clone())
    };
    let input = PredictionInput::new().with_seed(start_seed).with_max_length(Some(40));
    for i in 0..5 {
        let generated = generator.generate(&input, &mut rng)?;
        println!("Generated sentence {} ({:?}): {}", i + 1, generated.status, generated.text());
    }

    // Backward: write what could come before the seed
    if !seed.is_empty() {
        let input = PredictionInput::new()
            .with_seed(StartSeed::Custom(seed))
            .with_direction(Direction::Backward)
            .with_max_length(Some(40));
        let generated = generator.generate(&input, &mut rng)?;
        println!("Backward ({:?}): {}", generated.status, generated.text());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_line_splits_punctuation() {
        assert_eq!(tokenize_line("Hello, World!"), vec!["hello", ",", "world", "!"]);
        assert_eq!(tokenize_line("don't stop"), vec!["don't", "stop"]);
        assert_eq!(tokenize_line("'quoted'"), vec!["'", "quoted'"]);
    }

    #[test]
    fn tokenize_frames_each_sentence() {
        let config = ModelConfig::default();
        let lines = vec!["Hi. Bye".to_owned()];
        assert_eq!(
            tokenize(&lines, &config),
            vec!["<s>", "<s>", "hi", ".", "</s>", "</s>", "<s>", "<s>", "bye", "</s>", "</s>"]
        );
    }
}
