//! Sub-resource request filtering.
//!
//! Target pages embed ad, tracker and audio-stream endpoints that waste
//! bandwidth and slow challenge resolution. Requests whose URL contains a
//! blocklisted substring are aborted; everything else passes through
//! unmodified. This is traffic hygiene, not a security control.

use std::sync::Arc;

/// Immutable substring blocklist applied to outgoing sub-resource requests.
///
/// Cheap to clone; the fragment list is shared.
#[derive(Debug, Clone, Default)]
pub struct RequestFilterPolicy {
    fragments: Arc<[String]>,
}

impl RequestFilterPolicy {
    /// Build a policy from blocklist fragments.
    pub fn new(fragments: impl IntoIterator<Item = String>) -> Self {
        Self { fragments: fragments.into_iter().collect::<Vec<_>>().into() }
    }

    /// Whether a request URL matches any blocklisted fragment.
    pub fn is_blocked(&self, url: &str) -> bool {
        self.fragments.iter().any(|fragment| url.contains(fragment.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RequestFilterPolicy {
        RequestFilterPolicy::new(["stream.zeno.fm".to_string(), "disquscdn.com".to_string()])
    }

    #[test]
    fn test_blocked_fragment_matches_anywhere() {
        let policy = policy();
        assert!(policy.is_blocked("https://stream.zeno.fm/abc123"));
        assert!(policy.is_blocked("https://cdn.example.com/proxy?src=https://a.disquscdn.com/embed.js"));
    }

    #[test]
    fn test_unlisted_urls_pass() {
        let policy = policy();
        assert!(!policy.is_blocked("https://example.com/chapter/1"));
        assert!(!policy.is_blocked("https://challenges.cloudflare.com/turnstile/v0/api.js"));
    }

    #[test]
    fn test_empty_policy_blocks_nothing() {
        let policy = RequestFilterPolicy::default();
        assert!(!policy.is_blocked("https://stream.zeno.fm/abc123"));
    }
}
