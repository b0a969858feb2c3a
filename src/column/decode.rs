//! Column value decoders (spec.md §4.B).
//!
//! Each numeric/IP/time encoding has a `to*String` render function and a
//! matching `parse_*` that recovers the cell bytes from a string literal —
//! together they satisfy P4 (render round-trip): `parse(render(cell)) ==
//! cell`.
//!
//! Any cell whose byte length deviates from the declared width is a fatal
//! invariant break (spec.md §4.B) — the engine assumes blocks are
//! self-consistent, so these functions panic via [`crate::error::fatal_invariant`]
//! rather than returning a `Result`.

use crate::error::fatal_invariant;
use chrono::{DateTime, SecondsFormat, Utc};
use std::net::Ipv4Addr;

/// Slices `values` into fixed-width cells, checking the declared width
/// against the buffer length once for the whole column (spec.md: "Any cell
/// whose byte length deviates from the declared width is a FATAL invariant
/// break").
pub fn checked_cells<'a>(
    values: &'a [u8],
    width: usize,
    part_path: &str,
    field: &str,
) -> &'a [u8] {
    if values.len() % width != 0 {
        fatal_invariant(
            part_path,
            field,
            format!(
                "column buffer length {} is not a multiple of cell width {width}",
                values.len()
            ),
        );
    }
    values
}

#[inline]
pub fn cell_at(cells: &[u8], width: usize, i: usize) -> &[u8] {
    &cells[i * width..(i + 1) * width]
}

// --- Uint* ------------------------------------------------------------

pub fn decode_uint8(cell: &[u8]) -> u64 {
    cell[0] as u64
}

pub fn decode_uint16(cell: &[u8]) -> u64 {
    u16::from_le_bytes(cell.try_into().unwrap()) as u64
}

pub fn decode_uint32(cell: &[u8]) -> u64 {
    u32::from_le_bytes(cell.try_into().unwrap()) as u64
}

pub fn decode_uint64(cell: &[u8]) -> u64 {
    u64::from_le_bytes(cell.try_into().unwrap())
}

pub fn to_uint_string(value: u64) -> String {
    value.to_string()
}

/// Like [`to_uint_string`] but appends into a caller-owned, reusable buffer
/// instead of allocating (the hot-path render used by the filter evaluator).
pub fn write_uint_string(buf: &mut String, value: u64) {
    use std::fmt::Write;
    write!(buf, "{value}").expect("writing to a String cannot fail");
}

pub fn parse_uint(s: &str) -> Option<u64> {
    s.parse::<u64>().ok()
}

pub fn encode_uint8(value: u64) -> [u8; 1] {
    [value as u8]
}

pub fn encode_uint16(value: u64) -> [u8; 2] {
    (value as u16).to_le_bytes()
}

pub fn encode_uint32(value: u64) -> [u8; 4] {
    (value as u32).to_le_bytes()
}

pub fn encode_uint64(value: u64) -> [u8; 8] {
    value.to_le_bytes()
}

// --- Float64 ------------------------------------------------------------

pub fn decode_float64(cell: &[u8]) -> f64 {
    f64::from_le_bytes(cell.try_into().unwrap())
}

pub fn encode_float64(value: f64) -> [u8; 8] {
    value.to_le_bytes()
}

/// Canonical float repr: no trailing zeros beyond the value's own
/// precision (Rust's `Display` for `f64` already yields the shortest
/// round-trippable representation), with `-0` collapsed to `0`.
pub fn to_float_string(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else {
        format!("{value}")
    }
}

pub fn parse_float(s: &str) -> Option<f64> {
    s.parse::<f64>().ok()
}

/// Like [`to_float_string`] but appends into a caller-owned, reusable buffer.
pub fn write_float_string(buf: &mut String, value: f64) {
    use std::fmt::Write;
    if value == 0.0 {
        buf.push('0');
    } else {
        write!(buf, "{value}").expect("writing to a String cannot fail");
    }
}

// --- IPv4 -----------------------------------------------------------------

pub fn decode_ipv4(cell: &[u8]) -> u32 {
    u32::from_be_bytes(cell.try_into().unwrap())
}

pub fn encode_ipv4(value: u32) -> [u8; 4] {
    value.to_be_bytes()
}

pub fn to_ipv4_string(value: u32) -> String {
    Ipv4Addr::from(value.to_be_bytes()).to_string()
}

/// Like [`to_ipv4_string`] but appends into a caller-owned, reusable buffer.
pub fn write_ipv4_string(buf: &mut String, value: u32) {
    use std::fmt::Write;
    write!(buf, "{}", Ipv4Addr::from(value.to_be_bytes())).expect("writing to a String cannot fail");
}

pub fn parse_ipv4(s: &str) -> Option<u32> {
    s.parse::<Ipv4Addr>().ok().map(|a| u32::from_be_bytes(a.octets()))
}

// --- TimestampISO8601 ------------------------------------------------------

/// Cells store big-endian nanoseconds-since-epoch; big-endian keeps byte
/// comparison order consistent with numeric order, which downstream
/// min/max hints rely on.
pub fn decode_timestamp_nanos(cell: &[u8]) -> i64 {
    i64::from_be_bytes(cell.try_into().unwrap())
}

pub fn encode_timestamp_nanos(value: i64) -> [u8; 8] {
    value.to_be_bytes()
}

/// RFC3339-like ISO8601 string with nanosecond precision, uppercase `T`/`Z`.
pub fn to_timestamp_string(nanos: i64) -> String {
    let secs = nanos.div_euclid(1_000_000_000);
    let subsec_nanos = nanos.rem_euclid(1_000_000_000) as u32;
    let dt = DateTime::<Utc>::from_timestamp(secs, subsec_nanos)
        .unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).unwrap());
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Like [`to_timestamp_string`] but appends into a caller-owned, reusable
/// buffer.
pub fn write_timestamp_string(buf: &mut String, nanos: i64) {
    let secs = nanos.div_euclid(1_000_000_000);
    let subsec_nanos = nanos.rem_euclid(1_000_000_000) as u32;
    let dt = DateTime::<Utc>::from_timestamp(secs, subsec_nanos)
        .unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).unwrap());
    buf.push_str(&dt.to_rfc3339_opts(SecondsFormat::Nanos, true));
}

/// Parses a *full* ISO8601 timestamp back to nanoseconds. Returns `None` for
/// partial/prefix needles — callers fall back to prefix/phrase matching on
/// the rendered string in that case.
pub fn parse_timestamp_nanos(s: &str) -> Option<i64> {
    let dt = DateTime::parse_from_rfc3339(s).ok()?;
    let dt: DateTime<Utc> = dt.with_timezone(&Utc);
    Some(dt.timestamp_nanos_opt()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn uint_round_trip() {
        for v in [0u64, 1, 255, 65535, u32::MAX as u64, u64::MAX] {
            assert_eq!(parse_uint(&to_uint_string(v)), Some(v));
        }
    }

    #[test]
    fn float_collapses_negative_zero() {
        assert_eq!(to_float_string(-0.0), "0");
        assert_eq!(to_float_string(0.0), "0");
    }

    #[test]
    fn float_exact_phrase_has_interior_dot() {
        assert!(to_float_string(1.5).contains('.'));
        assert!(!to_float_string(3.0).contains('.'));
    }

    #[test]
    fn ipv4_round_trip() {
        let cases = ["10.0.0.1", "192.168.1.23", "255.255.255.255", "0.0.0.0"];
        for s in cases {
            let v = parse_ipv4(s).unwrap();
            assert_eq!(to_ipv4_string(v), s);
        }
    }

    #[test]
    fn timestamp_round_trip() {
        let s = "2023-01-02T03:04:05.123456789Z";
        let nanos = parse_timestamp_nanos(s).unwrap();
        assert_eq!(to_timestamp_string(nanos), s);
    }

    #[test]
    fn timestamp_uppercases_t_and_z() {
        let s = to_timestamp_string(0);
        assert!(s.contains('T'));
        assert!(s.ends_with('Z'));
    }

    proptest! {
        #[test]
        fn prop_uint_render_roundtrip(v in any::<u64>()) {
            prop_assert_eq!(parse_uint(&to_uint_string(v)), Some(v));
        }

        #[test]
        fn prop_ipv4_render_roundtrip(v in any::<u32>()) {
            prop_assert_eq!(parse_ipv4(&to_ipv4_string(v)), Some(v));
        }

        #[test]
        fn prop_timestamp_render_roundtrip(v in any::<i64>()) {
            let s = to_timestamp_string(v);
            prop_assert_eq!(parse_timestamp_nanos(&s), Some(v));
        }
    }
}
