//! Placeholder tokens for files awaiting their first write.
//!
//! A freshly created file has no content yet, so its row carries a unique
//! monotonic token in place of a content hash until release or truncate
//! computes the real digest. Tokens name the empty blob the bridge creates
//! in the storage root.

/// Prefix shared by every placeholder token.
pub const PLACEHOLDER_PREFIX: &str = "TEMP";

/// Width of the decimal serial in a token.
const SERIAL_WIDTH: usize = 9;

/// Render the token for a serial number, e.g. `TEMP000000042`.
pub fn token(serial: u64) -> String {
    format!("{PLACEHOLDER_PREFIX}{serial:0width$}", width = SERIAL_WIDTH)
}

/// Extract the serial from a token, if it is one.
pub fn serial(token: &str) -> Option<u64> {
    let digits = token.strip_prefix(PLACEHOLDER_PREFIX)?;
    if digits.len() != SERIAL_WIDTH {
        return None;
    }
    digits.parse().ok()
}
