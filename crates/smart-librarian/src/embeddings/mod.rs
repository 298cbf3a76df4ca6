pub mod hashing;
pub mod openai;

use anyhow::Result;
use async_trait::async_trait;

pub use hashing::HashingEmbedder;
pub use openai::OpenAIEmbedder;

/// Turns text into a fixed-dimension vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embedding vector dimension
    fn dimension(&self) -> usize;

    fn name(&self) -> &str;
}

/// Checks a provider response before it reaches the store.
pub fn validate_embedding(vector: &[f32], dimension: usize) -> Result<()> {
    if vector.is_empty() {
        anyhow::bail!("embedding service returned an empty vector");
    }
    if vector.len() != dimension {
        anyhow::bail!(
            "embedding has {} dimensions, expected {}",
            vector.len(),
            dimension
        );
    }
    if vector.iter().any(|v| !v.is_finite()) {
        anyhow::bail!("embedding contains non-finite values");
    }
    Ok(())
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_embedding() {
        assert!(validate_embedding(&[0.1, 0.2], 2).is_ok());
        assert!(validate_embedding(&[], 2).is_err());
        assert!(validate_embedding(&[0.1], 2).is_err());
        assert!(validate_embedding(&[f32::NAN, 0.0], 2).is_err());
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }
}
