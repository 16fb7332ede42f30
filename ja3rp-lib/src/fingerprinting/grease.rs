/// Check if a u16 value is a GREASE value (RFC 8701).
///
/// GREASE values follow the pattern 0x?A?A where both bytes are identical:
/// 0x0A0A, 0x1A1A, 0x2A2A, ..., 0xFAFA
pub fn is_grease(val: u16) -> bool {
    let [hi, lo] = val.to_be_bytes();
    hi == lo && (hi & 0x0F) == 0x0A
}

/// Keep only non-GREASE values, preserving their order.
pub fn strip_grease(values: impl IntoIterator<Item = u16>) -> Vec<u16> {
    values.into_iter().filter(|v| !is_grease(*v)).collect()
}
