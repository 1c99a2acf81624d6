//! Request target helpers.
//!
//! The registries key on the canonical path: the request target with any
//! query string and fragment removed. No other normalization happens, so
//! `/a` and `/A` are different keys, and so are `/a` and `/a/`.

/// Canonical path of a raw request target.
///
/// Returns the text up to the first `?`, `#` or the end of `target`,
/// whichever comes first. Never allocates.
///
/// ```
/// use qweb::path::canonical;
///
/// assert_eq!(canonical("/a/b?x=1#y"), "/a/b");
/// assert_eq!(canonical("/"), "/");
/// assert_eq!(canonical("?x=1"), "");
/// ```
pub fn canonical(target: &str) -> &str {
    let end = target.find(['?', '#']).unwrap_or(target.len());
    &target[..end]
}

/// Query string of a raw request target, without the leading `?`.
///
/// Stops at a fragment. `None` when there is no `?` before any `#`.
pub fn query(target: &str) -> Option<&str> {
    let start = target.find(['?', '#'])?;

    if target.as_bytes()[start] != b'?' {
        return None;
    }

    let rest = &target[start + 1..];
    let end = rest.find('#').unwrap_or(rest.len());

    Some(&rest[..end])
}

/// Raw value of the first `key=value` pair for `key` in the query string.
///
/// Values are returned as they appear on the wire, no percent decoding.
/// A key present without `=` yields an empty value.
pub fn query_value<'a>(target: &'a str, key: &str) -> Option<&'a str> {
    query(target)?
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k, v),
            None => (pair, ""),
        })
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}
