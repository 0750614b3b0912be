//! Hex formatting and parsing for register data.

use std::fmt::Write;

use crate::errors::ValidationError;

/// Bytes per hexdump line.
pub const DUMP_WIDTH: usize = 16;

/// Classic hexdump, 16 bytes per line, with absolute addresses.
///
/// ```text
/// 0xFFFFFC18  C0 A8 0A 14                                       ....
/// ```
pub fn hexdump(bytes: &[u8], base_address: u32) -> String {
    let mut out = String::new();

    for (line, chunk) in bytes.chunks(DUMP_WIDTH).enumerate() {
        if line > 0 {
            out.push('\n');
        }

        let address = base_address.wrapping_add((line * DUMP_WIDTH) as u32);
        let hex_part =
            chunk.iter().map(|b| format!("{b:02X}")).collect::<Vec<_>>().join(" ");
        let ascii_part: String = chunk
            .iter()
            .map(|&b| if (0x20..=0x7E).contains(&b) { char::from(b) } else { '.' })
            .collect();

        let _ = write!(out, "0x{address:08X}  {hex_part:<47}  {ascii_part}");
    }

    out
}

/// Uppercase hex without separators.
pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// Parse hex bytes, ignoring `:`, `_` and whitespace separators.
///
/// Accepts `C0A80A14`, `C0:A8:0A:14`, `c0 a8 0a 14`.
pub fn parse_hex_bytes(input: &str) -> Result<Vec<u8>, ValidationError> {
    let cleaned: String =
        input.chars().filter(|c| !matches!(c, ':' | '_') && !c.is_whitespace()).collect();

    if cleaned.is_empty() || cleaned.len() % 2 != 0 {
        return Err(ValidationError::HexBytes(format!(
            "hex bytes must have even, non-zero length (got {:?})",
            input
        )));
    }

    hex::decode(&cleaned).map_err(|e| ValidationError::HexBytes(e.to_string()))
}
