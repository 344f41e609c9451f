//! Shared secret handling for both HTTP routes. No `axum-extra`/typed
//! headers are in the dependency stack, so Basic/Bearer parsing is done by
//! hand against the raw `Authorization` header, the same way the teacher's
//! TSIG middleware hand-rolls its own key lookup rather than pulling in a
//! framework for it.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::backend::KeyInfo;
use crate::error::{Error, Result};

/// Authentication precedence for `POST /v1/update`: body `"key"`, then
/// `?key=`, then the `Authorization` header (`Bearer <token>` or a raw
/// token, with whitespace normalized to `+` the way a URL-decoded `+` in a
/// query string becomes a space).
pub fn resolve_update_key<'a>(
    body_key: Option<&'a str>,
    query_key: Option<&'a str>,
    auth_header: Option<&'a str>,
) -> Option<String> {
    if let Some(key) = body_key.filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }
    if let Some(key) = query_key.filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }
    let header = auth_header?;
    let token = header.strip_prefix("Bearer ").unwrap_or(header);
    let token = token.trim();
    if token.is_empty() {
        return None;
    }
    Some(token.replace(' ', "+"))
}

/// Checks a presented secret against `zone`'s keys, matching by secret
/// value (the body/query/bearer update key is the raw shared secret, not a
/// key name). Returns the matching key's name.
pub fn find_key_by_secret<'a>(keys: &'a [KeyInfo], secret: &str) -> Option<&'a KeyInfo> {
    keys.iter().find(|k| secret_matches(k, secret))
}

fn secret_matches(key: &KeyInfo, presented: &str) -> bool {
    match STANDARD.encode(&key.secret) {
        encoded if encoded == presented => true,
        _ => std::str::from_utf8(&key.secret).map(|raw| raw == presented).unwrap_or(false),
    }
}

/// Decode an HTTP Basic `Authorization` header into `(username, password)`.
pub fn parse_basic_auth(header: &str) -> Result<(String, String)> {
    let encoded = header
        .strip_prefix("Basic ")
        .ok_or_else(|| Error::unauthenticated("expected Basic authentication"))?;
    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| Error::unauthenticated("malformed basic auth payload"))?;
    let decoded = String::from_utf8(decoded).map_err(|_| Error::unauthenticated("basic auth payload is not utf-8"))?;
    let (user, pass) = decoded
        .split_once(':')
        .ok_or_else(|| Error::unauthenticated("basic auth payload missing ':'"))?;
    Ok((user.to_string(), pass.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_key_wins_over_query_and_header() {
        let key = resolve_update_key(Some("body-secret"), Some("query-secret"), Some("Bearer header-secret"));
        assert_eq!(key.as_deref(), Some("body-secret"));
    }

    #[test]
    fn bearer_prefix_is_stripped() {
        let key = resolve_update_key(None, None, Some("Bearer abc+def"));
        assert_eq!(key.as_deref(), Some("abc+def"));
    }

    #[test]
    fn raw_token_header_is_accepted_and_spaces_become_plus() {
        let key = resolve_update_key(None, None, Some("abc def"));
        assert_eq!(key.as_deref(), Some("abc+def"));
    }

    #[test]
    fn basic_auth_round_trips() {
        let header = format!("Basic {}", STANDARD.encode(b"example.org:s3cret"));
        let (user, pass) = parse_basic_auth(&header).unwrap();
        assert_eq!(user, "example.org");
        assert_eq!(pass, "s3cret");
    }

    #[test]
    fn find_key_matches_base64_secret() {
        let keys = vec![KeyInfo {
            name: "k1".to_string(),
            secret: b"rawsecretbytes12".to_vec(),
            algorithm: "hmac-sha256".to_string(),
            zones: vec!["example.org".to_string()],
        }];
        let presented = STANDARD.encode(b"rawsecretbytes12");
        assert!(find_key_by_secret(&keys, &presented).is_some());
    }
}
