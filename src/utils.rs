//! Utility functions for the switchbot-rust-ble crate.

/// Compare two BLE addresses, ignoring case.
///
/// # Example
///
/// ```
/// use switchbot_rust_ble::addresses_match;
///
/// assert!(addresses_match("aa:bb:cc:dd:ee:ff", "AA:BB:CC:DD:EE:FF"));
/// ```
#[inline]
pub fn addresses_match(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addresses_match() {
        assert!(addresses_match("AA:BB:CC:DD:EE:FF", "AA:BB:CC:DD:EE:FF"));
        assert!(addresses_match("aa:bb:cc:dd:ee:ff", "AA:bb:CC:dd:EE:ff"));
        assert!(!addresses_match("AA:BB:CC:DD:EE:FF", "AA:BB:CC:DD:EE:00"));
    }
}
