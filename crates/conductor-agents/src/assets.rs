use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conductor_workflow::AssetMatch;

/// Raw hit from the external Assets Service, before local keyword ranking.
#[derive(Debug, Clone)]
pub struct AssetCandidate {
    pub asset_id: String,
    pub name: String,
    pub content: String,
    pub remark: String,
}

/// Tenant-scoped catalog lookup (§4.3: "query the external Assets Service
/// keyed by tenant"). Implementations own their own transport.
#[async_trait]
pub trait AssetsClient: Send + Sync {
    async fn list_assets(&self, tenant_id: &str) -> Result<Vec<AssetCandidate>, String>;
}

struct CacheEntry {
    fetched_at: DateTime<Utc>,
    assets: Vec<AssetCandidate>,
}

/// Wraps any `AssetsClient` with a 1-day tenant-scoped cache, the same
/// cache-then-fetch shape `MemoryManager` uses for its user-context cache.
pub struct CachedAssetsClient<C: AssetsClient> {
    inner: C,
    ttl: chrono::Duration,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl<C: AssetsClient> CachedAssetsClient<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            ttl: chrono::Duration::days(1),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn list_assets_cached(&self, tenant_id: &str) -> Result<Vec<AssetCandidate>, String> {
        if let Some(entry) = self.cache.lock().unwrap().get(tenant_id) {
            if Utc::now() - entry.fetched_at < self.ttl {
                return Ok(entry.assets.clone());
            }
        }
        let assets = self.inner.list_assets(tenant_id).await?;
        self.cache.lock().unwrap().insert(
            tenant_id.to_string(),
            CacheEntry {
                fetched_at: Utc::now(),
                assets: assets.clone(),
            },
        );
        Ok(assets)
    }
}

#[async_trait]
impl<C: AssetsClient> AssetsClient for CachedAssetsClient<C> {
    async fn list_assets(&self, tenant_id: &str) -> Result<Vec<AssetCandidate>, String> {
        self.list_assets_cached(tenant_id).await
    }
}

/// No-op client for deployments without an external Assets Service wired
/// up yet — the catalog is always empty, so `assets_intent.detected` never
/// yields a match, which is the correct degenerate behaviour (§4.3).
pub struct NullAssetsClient;

#[async_trait]
impl AssetsClient for NullAssetsClient {
    async fn list_assets(&self, _tenant_id: &str) -> Result<Vec<AssetCandidate>, String> {
        Ok(Vec::new())
    }
}

/// Ranks candidates by keyword overlap: name match +5, content match +4,
/// remark match +3 (§4.3), keeping the top `top_k`.
pub fn rank_assets(candidates: &[AssetCandidate], keywords: &[String], top_k: usize) -> Vec<AssetMatch> {
    let needles: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
    let mut scored: Vec<AssetMatch> = candidates
        .iter()
        .filter_map(|c| {
            let name = c.name.to_lowercase();
            let content = c.content.to_lowercase();
            let remark = c.remark.to_lowercase();
            let mut score = 0i32;
            for needle in &needles {
                if needle.is_empty() {
                    continue;
                }
                if name.contains(needle.as_str()) {
                    score += 5;
                }
                if content.contains(needle.as_str()) {
                    score += 4;
                }
                if remark.contains(needle.as_str()) {
                    score += 3;
                }
            }
            if score > 0 {
                Some(AssetMatch {
                    asset_id: c.asset_id.clone(),
                    name: c.name.clone(),
                    score,
                })
            } else {
                None
            }
        })
        .collect();
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> Vec<AssetCandidate> {
        vec![
            AssetCandidate {
                asset_id: "a1".into(),
                name: "Premium Facial Package".into(),
                content: "deep cleansing and hydration".into(),
                remark: "".into(),
            },
            AssetCandidate {
                asset_id: "a2".into(),
                name: "Basic Haircut".into(),
                content: "trim and style".into(),
                remark: "facial hair trimming included".into(),
            },
        ]
    }

    #[test]
    fn ranks_name_match_above_remark_match() {
        let ranked = rank_assets(&candidates(), &["facial".to_string()], 2);
        assert_eq!(ranked[0].asset_id, "a1");
        assert_eq!(ranked[0].score, 5);
        assert_eq!(ranked[1].asset_id, "a2");
        assert_eq!(ranked[1].score, 3);
    }

    #[test]
    fn top_k_truncates() {
        let ranked = rank_assets(&candidates(), &["facial".to_string()], 1);
        assert_eq!(ranked.len(), 1);
    }
}
