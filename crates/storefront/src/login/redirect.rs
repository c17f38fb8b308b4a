//! Post-login destination.

/// Destination when neither an explicit nor a stored target is usable.
pub const DEFAULT_DESTINATION: &str = "/account";

/// Pick where to send the shopper after login.
///
/// Priority: the explicit `redirect_url` (percent-decoded once), then the
/// stored return-to path, then [`DEFAULT_DESTINATION`]. Values that are not
/// same-site paths are skipped.
#[must_use]
pub fn resolve(explicit: Option<&str>, stored: Option<&str>) -> String {
    explicit
        .and_then(decode)
        .filter(|path| is_same_site_path(path))
        .or_else(|| {
            stored
                .filter(|path| is_same_site_path(path))
                .map(String::from)
        })
        .unwrap_or_else(|| DEFAULT_DESTINATION.to_string())
}

/// Whether `path` is a path on this site.
///
/// Rejects absolute URLs, protocol-relative `//host` and backslash tricks
/// that browsers normalize into them.
#[must_use]
pub fn is_same_site_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.starts_with("//")
        && !path.contains('\\')
        && !path.chars().any(char::is_control)
}

fn decode(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    urlencoding::decode(raw).ok().map(|decoded| decoded.into_owned())
}
