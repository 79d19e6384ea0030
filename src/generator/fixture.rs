use async_trait::async_trait;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use super::{GenerationError, InterpretationGenerator};

/// Canned interpretations, picked at random. Keeps the game playable without a
/// model, and makes tests deterministic enough.
#[derive(Clone, Debug)]
pub struct FixtureGenerator {
  fixtures: Vec<String>,
}

impl FixtureGenerator {
  pub fn new(fixtures: Vec<String>) -> Self {
    Self { fixtures }
  }
}

/// Built-in fixture set used when configuration supplies none.
pub fn default_fixtures() -> Vec<String> {
  [
    "a quiet morning before everyone else wakes up",
    "the last day of a long summer holiday",
    "a memory from a trip I almost did not take",
    "what my grandmother's kitchen felt like",
    "the moment right after good news arrives",
    "a place I keep meaning to go back to",
  ]
  .into_iter()
  .map(String::from)
  .collect()
}

#[async_trait]
impl InterpretationGenerator for FixtureGenerator {
  async fn interpret(&self, _image: &[u8], author_text: &str) -> Result<String, GenerationError> {
    let candidates: Vec<&String> = self
      .fixtures
      .iter()
      .filter(|f| !f.trim().is_empty() && f.as_str() != author_text)
      .collect();
    let mut rng = StdRng::from_entropy();
    candidates
      .choose(&mut rng)
      .map(|s| s.to_string())
      .ok_or(GenerationError::NoFixture)
  }

  fn name(&self) -> &'static str {
    "fixture"
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn never_returns_the_author_text() {
    let g = FixtureGenerator::new(vec!["same".into(), "other".into()]);
    for _ in 0..50 {
      assert_eq!(g.interpret(b"", "same").await.unwrap(), "other");
    }
  }

  #[tokio::test]
  async fn empty_set_is_an_error() {
    let g = FixtureGenerator::new(vec!["only".into()]);
    assert!(matches!(g.interpret(b"", "only").await, Err(GenerationError::NoFixture)));
  }
}
