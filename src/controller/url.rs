/// Schemes that are passed through untouched
const KNOWN_SCHEMES: &[&str] = &[
    "http://",
    "https://",
    "file://",
    "data:",
    "about:",
    "chrome://",
    "chrome-extension://",
];

/// Complete a URL the way a user would type it into the address bar
///
/// `localhost` and loopback addresses get `http://`, anything with a dot gets
/// `https://`, and a bare word is treated as a `.com` domain.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();

    if KNOWN_SCHEMES.iter().any(|scheme| trimmed.starts_with(scheme)) {
        return trimmed.to_string();
    }

    // Relative paths are resolved by the browser
    if trimmed.starts_with('/') || trimmed.starts_with("./") || trimmed.starts_with("../") {
        return trimmed.to_string();
    }

    if trimmed.starts_with("localhost") || trimmed.starts_with("127.0.0.1") {
        return format!("http://{}", trimmed);
    }

    if trimmed.contains('.') {
        return format!("https://{}", trimmed);
    }

    format!("https://www.{}.com", trimmed)
}
