//! Host rewriting applied to the outbound capture URL only.
//!
//! The original URL (as given by the caller) is what gets cached and signed;
//! this transform produces a second, internal URL that the browser actually
//! navigates to. Mapped hosts lose their `www.` prefix and drop to plain
//! `http`, matching the reverse-proxy setup the mapped internal hosts sit
//! behind; everything else (path, query, fragment) passes through unchanged.

use crate::config::TransformConfig;
use url::Url;

/// Rewrites `url`'s host according to `config.host_mappings`. Returns the
/// original URL string unchanged if it doesn't parse or its host has no
/// mapping.
pub fn rewrite_for_capture(url: &str, config: &TransformConfig) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };

    let Some(host) = parsed.host_str() else {
        return url.to_string();
    };

    let stripped = host.strip_prefix("www.").unwrap_or(host);
    let Some(internal_host) = config.host_mappings.get(stripped) else {
        return url.to_string();
    };

    if parsed.set_host(Some(internal_host)).is_err() {
        return url.to_string();
    }
    let _ = parsed.set_scheme("http");
    let _ = parsed.set_port(None);

    parsed.to_string()
}
