use sha2::{Digest as _, Sha256};
use url::Url;

pub const DEFAULT_MAX_LEN: usize = 50;

const HASH_LEN: usize = 8;

/// Derives a filesystem-safe name `{domain}_{last path segment}` from a URL.
///
/// Names longer than `max_len` are cut and suffixed with `_` plus the first
/// eight hex digits of a SHA-256 over the full input, so the result never
/// exceeds `max_len`.
#[must_use]
pub fn slug(url: &str, max_len: usize) -> String {
    let (domain, path) = match Url::parse(url) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or_default();
            let domain = match parsed.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_owned(),
            };
            (domain.replace('.', "_"), parsed.path().to_owned())
        }
        Err(_) => (String::new(), url.to_owned()),
    };

    let path = path.trim_end_matches('/');
    let segment = match path.rsplit('/').next() {
        Some(segment) if !segment.is_empty() => segment,
        _ => "homepage",
    };

    let safe: String = format!("{domain}_{segment}")
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
                ch
            } else {
                '_'
            }
        })
        .collect();

    if safe.len() <= max_len {
        return safe;
    }

    let hash = url_hash(url);
    let keep = max_len.saturating_sub(HASH_LEN + 1);
    if keep == 0 {
        return hash[..HASH_LEN.min(max_len)].to_owned();
    }
    format!("{}_{hash}", &safe[..keep])
}

fn url_hash(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    hex::encode(&digest[..HASH_LEN / 2])
}
