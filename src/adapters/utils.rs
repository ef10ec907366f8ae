//! Field checks shared by the WiFi, NVS and portal validators.

/// `true` when `s` is 1 to `max` bytes of printable ASCII (`' '..='~'`).
/// Used for SSIDs and broker hostnames.
pub(super) fn is_printable_field(s: &str, max: usize) -> bool {
    !s.is_empty() && s.len() <= max && s.bytes().all(|b| (b' '..=b'~').contains(&b))
}
