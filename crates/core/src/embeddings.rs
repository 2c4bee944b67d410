//! Embedding acquisition with a JSON file cache.

use crate::error::EmbeddingError;
use crate::models::EmbeddingMap;
use providers::{EmbeddingProvider, ProviderRegistry};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct EmbeddingRequest {
    pub texts: Vec<String>,
    pub provider: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    pub vectors: Vec<Vec<f32>>,
}

/// One-off embedding through a registered provider, bypassing the cache.
pub async fn embed(
    req: EmbeddingRequest,
    registry: &ProviderRegistry,
) -> anyhow::Result<EmbeddingResult> {
    let provider = registry.embedding(req.provider.as_deref())?;
    let texts: Vec<String> = req.texts.iter().map(|t| normalize(t)).collect();
    let resp = provider.embed(&texts).await?;
    Ok(EmbeddingResult {
        vectors: resp.vectors,
    })
}

/// Returns `key -> embedding` for `texts`, paired with `keys` by position.
///
/// When `cache_path` exists and `force_recompute` is false the cache is
/// returned as is, provided its key set equals the requested one. Otherwise
/// the texts are embedded in batches of `batch_size` and the cache is
/// rewritten.
pub async fn compute_or_load(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    keys: &[String],
    cache_path: &Path,
    force_recompute: bool,
    batch_size: usize,
) -> Result<EmbeddingMap, EmbeddingError> {
    if texts.len() != keys.len() {
        return Err(EmbeddingError::InputLengthMismatch {
            texts: texts.len(),
            keys: keys.len(),
        });
    }

    if !force_recompute && tokio::fs::try_exists(cache_path).await? {
        let cached = load_cache(cache_path).await?;
        check_keys(&cached, keys)?;
        info!(
            "Loaded {} embeddings from {}",
            cached.len(),
            cache_path.display()
        );
        return Ok(cached);
    }

    let normalized: Vec<String> = texts.iter().map(|t| normalize(t)).collect();
    let mut vectors = Vec::with_capacity(normalized.len());
    for (i, batch) in normalized.chunks(batch_size.max(1)).enumerate() {
        let resp = provider.embed(batch).await?;
        if resp.vectors.len() != batch.len() {
            return Err(EmbeddingError::ResponseLengthMismatch {
                expected: batch.len(),
                found: resp.vectors.len(),
            });
        }
        debug!("Embedded batch {} ({} texts)", i, batch.len());
        vectors.extend(resp.vectors);
    }

    let embeddings: EmbeddingMap = keys.iter().cloned().zip(vectors).collect();
    save_cache(cache_path, &embeddings).await?;
    info!(
        "Computed {} embeddings, cached at {}",
        embeddings.len(),
        cache_path.display()
    );
    Ok(embeddings)
}

pub async fn load_cache(path: &Path) -> Result<EmbeddingMap, EmbeddingError> {
    let data = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&data)?)
}

pub async fn save_cache(path: &Path, embeddings: &EmbeddingMap) -> Result<(), EmbeddingError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let data = serde_json::to_string(embeddings)?;
    tokio::fs::write(path, data).await?;
    Ok(())
}

fn check_keys(cached: &EmbeddingMap, keys: &[String]) -> Result<(), EmbeddingError> {
    let requested: BTreeSet<&str> = keys.iter().map(String::as_str).collect();
    let missing = requested
        .iter()
        .filter(|k| !cached.contains_key(**k))
        .count();
    let unexpected = cached
        .keys()
        .filter(|k| !requested.contains(k.as_str()))
        .count();
    if missing > 0 || unexpected > 0 {
        return Err(EmbeddingError::CacheKeyMismatch {
            missing,
            unexpected,
        });
    }
    Ok(())
}

/// Embedded line breaks are collapsed to single spaces.
pub fn normalize(text: &str) -> String {
    text.replace("\r\n", " ").replace(['\n', '\r'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use providers::{EmbedResponse, ProviderError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Embeds a text as `[len, index-in-call]` and records what it saw.
    #[derive(Default)]
    struct RecordingProvider {
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
        drop_last: bool,
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for RecordingProvider {
        async fn embed(&self, texts: &[String]) -> Result<EmbedResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().extend(texts.iter().cloned());
            let mut vectors: Vec<Vec<f32>> = texts
                .iter()
                .enumerate()
                .map(|(i, t)| vec![t.len() as f32, i as f32])
                .collect();
            if self.drop_last {
                vectors.pop();
            }
            Ok(EmbedResponse { vectors })
        }
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn computes_then_reuses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("nested").join("texts.json");
        let provider = RecordingProvider::default();
        let texts = strings(&["one\ntwo", "three"]);
        let keys = strings(&["a", "b"]);

        let first = compute_or_load(&provider, &texts, &keys, &cache, false, 1)
            .await
            .unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(first["a"], vec![7.0, 0.0]);
        assert_eq!(
            *provider.seen.lock().unwrap(),
            strings(&["one two", "three"])
        );
        assert!(cache.exists());

        let second = compute_or_load(&provider, &texts, &keys, &cache, false, 1)
            .await
            .unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn force_recompute_ignores_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("leaves.json");
        let provider = RecordingProvider::default();
        let texts = strings(&["x", "yy", "zzz"]);
        let keys = strings(&["x", "yy", "zzz"]);

        compute_or_load(&provider, &texts, &keys, &cache, false, 8)
            .await
            .unwrap();
        compute_or_load(&provider, &texts, &keys, &cache, true, 8)
            .await
            .unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cache_with_other_keys_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("texts.json");
        let mut stored = EmbeddingMap::new();
        stored.insert("a".into(), vec![1.0]);
        stored.insert("stale".into(), vec![2.0]);
        save_cache(&cache, &stored).await.unwrap();

        let provider = RecordingProvider::default();
        let err = compute_or_load(
            &provider,
            &strings(&["A", "B"]),
            &strings(&["a", "b"]),
            &cache,
            false,
            4,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::CacheKeyMismatch {
                missing: 1,
                unexpected: 1
            }
        ));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn length_mismatches_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("texts.json");
        let provider = RecordingProvider::default();
        let err = compute_or_load(&provider, &strings(&["a"]), &[], &cache, false, 4)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::InputLengthMismatch { texts: 1, keys: 0 }
        ));

        let short = RecordingProvider {
            drop_last: true,
            ..Default::default()
        };
        let err = compute_or_load(
            &short,
            &strings(&["a", "b"]),
            &strings(&["a", "b"]),
            &cache,
            false,
            4,
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::ResponseLengthMismatch {
                expected: 2,
                found: 1
            }
        ));
        assert!(!cache.exists());
    }

    #[tokio::test]
    async fn cache_file_is_a_plain_json_map() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("leaves.json");
        let provider = RecordingProvider::default();
        compute_or_load(
            &provider,
            &strings(&["Бронирование"]),
            &strings(&["Бронирование"]),
            &cache,
            false,
            4,
        )
        .await
        .unwrap();
        let raw = std::fs::read_to_string(&cache).unwrap();
        assert!(raw.contains("Бронирование"));
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(parsed["Бронирование"].is_array());
    }

    #[test]
    fn normalize_collapses_line_breaks() {
        assert_eq!(normalize("a\r\nb\nc\rd"), "a b c d");
    }
}
