//! Hex dump formatting for PDU diagnostics.

use crate::Direction;

/// Format `data` as a classic 16-bytes-per-line hex dump.
///
/// Each line is prefixed with the direction marker (`>` inbound, `<`
/// outbound) when one is given.
pub fn hexdump(direction: Option<Direction>, data: &[u8]) -> String {
    let mut out = String::new();
    for (i, chunk) in data.chunks(16).enumerate() {
        if let Some(direction) = direction {
            out.push(direction.marker());
            out.push(' ');
        }

        out.push_str(&format!("{:04x}  ", i * 16));

        for (j, byte) in chunk.iter().enumerate() {
            out.push_str(&format!("{:02x} ", byte));
            if j == 7 {
                out.push(' ');
            }
        }

        for j in chunk.len()..16 {
            out.push_str("   ");
            if j == 7 {
                out.push(' ');
            }
        }

        out.push_str(" |");
        for byte in chunk {
            if (0x20..0x7f).contains(byte) {
                out.push(*byte as char);
            } else {
                out.push('.');
            }
        }
        out.push_str("|\n");
    }
    out
}

/// Format bytes as a single-line hex string, eliding the middle of long PDUs.
pub fn hex_short(data: &[u8]) -> String {
    fn join(bytes: &[u8]) -> String {
        bytes
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ")
    }

    if data.len() <= 32 {
        join(data)
    } else {
        format!(
            "{} ... {} ({} bytes total)",
            join(&data[..16]),
            join(&data[data.len() - 8..]),
            data.len()
        )
    }
}
