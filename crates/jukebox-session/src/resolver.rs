//! Media resolution: queries to tracks, stream references to playable URIs.

use async_trait::async_trait;
use jukebox_types::{RequesterId, TrackDescriptor};

use crate::config::CatalogEntry;
use crate::error::ResolveError;

/// Track metadata before a requester is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTrack {
    pub title: String,
    pub stream_reference: String,
    pub duration_secs: u64,
    pub thumbnail_uri: Option<String>,
}

impl ResolvedTrack {
    pub fn into_descriptor(self, requester: RequesterId) -> TrackDescriptor {
        TrackDescriptor {
            title: self.title,
            stream_reference: self.stream_reference,
            duration_secs: self.duration_secs,
            thumbnail_uri: self.thumbnail_uri,
            requester,
        }
    }
}

#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Find a single track for a free-text query or direct reference.
    async fn resolve(&self, query: &str) -> Result<ResolvedTrack, ResolveError>;

    /// Derive a fresh playable URI. URIs may expire, so callers re-derive on
    /// every start.
    async fn stream_uri(&self, stream_reference: &str) -> Result<String, ResolveError>;
}

/// Resolver over a fixed list of configured tracks.
pub struct CatalogResolver {
    entries: Vec<CatalogEntry>,
}

impl CatalogResolver {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn find(&self, query: &str) -> Option<&CatalogEntry> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        if let Some(entry) = self.entries.iter().find(|e| e.stream_reference == query) {
            return Some(entry);
        }
        let needle = query.to_lowercase();
        self.entries
            .iter()
            .find(|e| e.title.to_lowercase().contains(&needle))
    }
}

#[async_trait]
impl MediaResolver for CatalogResolver {
    async fn resolve(&self, query: &str) -> Result<ResolvedTrack, ResolveError> {
        let entry = self
            .find(query)
            .ok_or_else(|| ResolveError::NotFound(query.to_string()))?;
        tracing::debug!(query, title = %entry.title, "catalog match");
        Ok(ResolvedTrack {
            title: entry.title.clone(),
            stream_reference: entry.stream_reference.clone(),
            duration_secs: entry.duration_secs.unwrap_or(0),
            thumbnail_uri: entry.thumbnail_uri.clone(),
        })
    }

    async fn stream_uri(&self, stream_reference: &str) -> Result<String, ResolveError> {
        self.entries
            .iter()
            .find(|e| e.stream_reference == stream_reference)
            .map(|e| e.uri.clone())
            .ok_or_else(|| ResolveError::StreamUnavailable(stream_reference.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str, reference: &str) -> CatalogEntry {
        CatalogEntry {
            title: title.to_string(),
            stream_reference: reference.to_string(),
            uri: format!("loopback://{reference}"),
            duration_secs: Some(200),
            thumbnail_uri: None,
        }
    }

    fn resolver() -> CatalogResolver {
        CatalogResolver::new(vec![
            entry("Blue in Green", "blue"),
            entry("So What", "sowhat"),
        ])
    }

    #[tokio::test]
    async fn resolves_by_reference_then_title() {
        let resolver = resolver();
        assert_eq!(resolver.resolve("sowhat").await.unwrap().title, "So What");
        assert_eq!(
            resolver.resolve("green").await.unwrap().stream_reference,
            "blue"
        );
    }

    #[tokio::test]
    async fn unknown_query_is_not_found() {
        let err = resolver().resolve("giant steps").await.unwrap_err();
        assert_eq!(err, ResolveError::NotFound("giant steps".into()));
        assert!(resolver().resolve("   ").await.is_err());
    }

    #[tokio::test]
    async fn stream_uri_requires_known_reference() {
        let resolver = resolver();
        assert_eq!(resolver.stream_uri("blue").await.unwrap(), "loopback://blue");
        assert!(matches!(
            resolver.stream_uri("missing").await,
            Err(ResolveError::StreamUnavailable(_))
        ));
    }

    #[test]
    fn descriptor_carries_requester() {
        let track = ResolvedTrack {
            title: "t".into(),
            stream_reference: "r".into(),
            duration_secs: 0,
            thumbnail_uri: None,
        }
        .into_descriptor(RequesterId(5));
        assert_eq!(track.requester, RequesterId(5));
        assert!(!track.has_duration());
    }
}
