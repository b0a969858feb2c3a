//! Group key encoding (spec.md §4.D "Key encoding").
//!
//! A canonical byte string produced by length-prefixing each `by`-column
//! value with a variable-length (LEB128, unsigned) length prefix. Equal keys
//! iff equal ordered value tuples; deterministic and reversible so `flush`
//! can recover the row's by-field values for the output block.
//!
//! The exact width/endianness of the prefix only matters for on-the-wire
//! determinism if shard merging ever crosses machine boundaries, which it
//! does not (spec.md §9 Open Questions) — LEB128 was chosen here purely
//! because it's compact for the common case of short field values.

fn write_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            break;
        }
        buf.push(byte | 0x80);
    }
}

fn read_varint(buf: &[u8], pos: &mut usize) -> u64 {
    let mut result = 0u64;
    let mut shift = 0u32;
    loop {
        let byte = buf[*pos];
        *pos += 1;
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    result
}

/// Encodes an ordered tuple of by-field values into a canonical group key.
pub fn encode_group_key<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<u8> {
    let mut buf = Vec::new();
    for v in values {
        write_varint(&mut buf, v.len() as u64);
        buf.extend_from_slice(v.as_bytes());
    }
    buf
}

/// Recovers the ordered value tuple from a key produced by
/// [`encode_group_key`]. Panics (fatal — corrupt aggregation state) if the
/// bytes don't round-trip, per spec.md §7 ("unmarshal failure in group-key
/// decode" is a fatal invariant break).
pub fn decode_group_key(key: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < key.len() {
        let len = read_varint(key, &mut pos) as usize;
        let end = pos + len;
        assert!(
            end <= key.len(),
            "corrupt group key: length prefix {len} exceeds remaining bytes"
        );
        let s = std::str::from_utf8(&key[pos..end])
            .expect("corrupt group key: value is not valid utf-8")
            .to_string();
        out.push(s);
        pos = end;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn round_trips_basic() {
        let key = encode_group_key(["info", "nginx"]);
        assert_eq!(decode_group_key(&key), vec!["info".to_string(), "nginx".to_string()]);
    }

    #[test]
    fn empty_tuple_round_trips() {
        let key = encode_group_key(std::iter::empty());
        assert!(key.is_empty());
        assert!(decode_group_key(&key).is_empty());
    }

    #[test]
    fn distinguishes_different_tuples() {
        let a = encode_group_key(["ab", "c"]);
        let b = encode_group_key(["a", "bc"]);
        assert_ne!(a, b);
    }

    proptest! {
        #[test]
        fn prop_roundtrip(values in proptest::collection::vec("[a-zA-Z0-9_ ]{0,12}", 0..6)) {
            let refs: Vec<&str> = values.iter().map(String::as_str).collect();
            let key = encode_group_key(refs);
            prop_assert_eq!(decode_group_key(&key), values);
        }
    }
}
