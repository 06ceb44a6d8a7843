//! Canonical symbol format handling.
//!
//! A symbol is 1-8 uppercase letters optionally followed by a dot and a
//! 1-4 letter exchange suffix (e.g. `AAPL`, `TD.TO`, `BP.L`). Inputs are
//! trimmed and upper-cased before any other check.

/// Normalize a raw user-supplied symbol: trim whitespace, uppercase.
pub fn normalize(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Check whether an already-normalized symbol matches the canonical format.
pub fn is_canonical(symbol: &str) -> bool {
    let (ticker, suffix) = match symbol.split_once('.') {
        Some((t, s)) => (t, Some(s)),
        None => (symbol, None),
    };

    if ticker.is_empty() || ticker.len() > 8 || !ticker.bytes().all(|b| b.is_ascii_uppercase()) {
        return false;
    }

    match suffix {
        None => true,
        Some(s) => !s.is_empty() && s.len() <= 4 && s.bytes().all(|b| b.is_ascii_uppercase()),
    }
}
