//! Per-encoding dispatch for `Phrase`/`Prefix`/`AnyCasePhrase` (spec.md
//! §4.C).

use crate::bitmap::RowBitmap;
use crate::block::{BlockSearch, CellValue, ColumnHeader, ColumnValues, ValueType};
use crate::bloom::match_bloom_filter_all_tokens;
use crate::column::decode;
use crate::error::fatal_invariant;
use crate::pool::BufferPool;
use crate::token::{match_any_case_phrase, match_phrase, match_prefix, tokenize, tokenize_skip_last};
use std::sync::OnceLock;

thread_local! {
    /// One render-scratch pool per thread, checked out by [`apply_string_like`]
    /// and friends for the duration of a single column's row visitor. A
    /// thread-local pool needs no cross-thread synchronisation beyond the
    /// (uncontended, since each thread has its own) `Mutex` already inside
    /// [`BufferPool`].
    static RENDER_POOL: BufferPool = BufferPool::new();
}

/// The three textual match kinds spec.md §3 names on the filter tree,
/// shared by [`PrefixFilter`], [`PhraseFilter`], and [`AnyCasePhraseFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Phrase,
    Prefix,
    AnyCasePhrase,
}

/// Holds a needle plus its memoised derived forms (tokens for bloom
/// queries, lowercased form). Each filter caches these on first use, per
/// the design notes' "memo of lazy singletons" — reimplemented here with
/// `OnceLock` rather than any source-specific sync primitive.
#[derive(Debug)]
pub struct TextMatch {
    kind: MatchKind,
    needle: String,
    tokens: OnceLock<Vec<String>>,
}

impl TextMatch {
    pub fn new(kind: MatchKind, needle: impl Into<String>) -> Self {
        let needle = needle.into();
        let needle = if kind == MatchKind::AnyCasePhrase {
            needle.to_lowercase()
        } else {
            needle
        };
        Self {
            kind,
            needle,
            tokens: OnceLock::new(),
        }
    }

    pub fn kind(&self) -> MatchKind {
        self.kind
    }

    pub fn needle(&self) -> &str {
        &self.needle
    }

    /// Tokens to probe the bloom filter with. `Prefix` trims the trailing
    /// (possibly partial) word; `Phrase`/`AnyCasePhrase` require every
    /// token, including the last.
    fn bloom_tokens(&self) -> &[String] {
        self.tokens.get_or_init(|| {
            let owned = match self.kind {
                MatchKind::Prefix => tokenize_skip_last(&self.needle),
                MatchKind::Phrase | MatchKind::AnyCasePhrase => tokenize(&self.needle),
            };
            owned.into_iter().map(str::to_owned).collect()
        })
    }

    fn bloom_tokens_ref<'a>(&'a self) -> Vec<&'a str> {
        self.bloom_tokens().iter().map(String::as_str).collect()
    }

    pub fn matches_str(&self, s: &str) -> bool {
        match self.kind {
            MatchKind::Phrase => match_phrase(s, &self.needle),
            MatchKind::Prefix => match_prefix(s, &self.needle),
            MatchKind::AnyCasePhrase => match_any_case_phrase(s, &self.needle),
        }
    }
}

/// Runs `match_` against a string-rendered column: bloom-filter
/// short-circuit, then a row-by-row visit (shared by `String` columns and
/// the render-and-match fallback for numeric/IP/time columns).
fn apply_string_like(
    block: &dyn BlockSearch,
    header: &ColumnHeader,
    match_: &TextMatch,
    bitmap: &mut RowBitmap,
    render: impl Fn(usize, &mut String),
) {
    let tokens = match_.bloom_tokens_ref();
    let bloom = block.get_bloom_filter_for_column(header);
    if !match_bloom_filter_all_tokens(bloom, &tokens) {
        tracing::trace!(field = %header.field_name, "bloom filter rejected all rows");
        bitmap.reset_all();
        return;
    }

    RENDER_POOL.with(|pool| {
        let mut buf = pool.get();
        let mut to_clear = Vec::new();
        bitmap.for_each_set_bit(|i| {
            buf.clear();
            render(i as usize, &mut buf);
            if !match_.matches_str(&buf) {
                to_clear.push(i);
            }
            true
        });
        bitmap.reset_bits(to_clear);
    });
}

fn apply_dict(block: &dyn BlockSearch, header: &ColumnHeader, match_: &TextMatch, bitmap: &mut RowBitmap) {
    let matching_codes: Vec<bool> = header
        .values_dict
        .iter()
        .map(|v| match_.matches_str(v))
        .collect();

    if !matching_codes.iter().any(|&m| m) {
        bitmap.reset_all();
        return;
    }

    let values = block.get_values_for_column(header);
    let codes = match values {
        ColumnValues::Dict(c) => c,
        other => fatal_invariant(
            block.part_path(),
            &header.field_name,
            format!("expected Dict column values, got {other:?}"),
        ),
    };

    let mut to_clear = Vec::new();
    bitmap.for_each_set_bit(|i| {
        let code = codes[i as usize] as usize;
        if !matching_codes.get(code).copied().unwrap_or(false) {
            to_clear.push(i);
        }
        true
    });
    bitmap.reset_bits(to_clear);
}

fn uint_max_for(value_type: ValueType) -> u64 {
    match value_type {
        ValueType::Uint8 => u8::MAX as u64,
        ValueType::Uint16 => u16::MAX as u64,
        ValueType::Uint32 => u32::MAX as u64,
        ValueType::Uint64 => u64::MAX,
        _ => unreachable!("uint_max_for called on non-uint column"),
    }
}

fn decode_uint_cell(value_type: ValueType, cell: &[u8]) -> u64 {
    match value_type {
        ValueType::Uint8 => decode::decode_uint8(cell),
        ValueType::Uint16 => decode::decode_uint16(cell),
        ValueType::Uint32 => decode::decode_uint32(cell),
        ValueType::Uint64 => decode::decode_uint64(cell),
        _ => unreachable!("decode_uint_cell called on non-uint column"),
    }
}

fn apply_fixed_uint(
    block: &dyn BlockSearch,
    header: &ColumnHeader,
    match_: &TextMatch,
    bitmap: &mut RowBitmap,
) {
    let width = header
        .value_type
        .cell_width()
        .expect("uint column always has fixed width");

    match match_.kind() {
        MatchKind::Phrase | MatchKind::AnyCasePhrase => {
            let Some(value) = decode::parse_uint(match_.needle()) else {
                bitmap.reset_all();
                return;
            };
            if value > uint_max_for(header.value_type) {
                bitmap.reset_all();
                return;
            }
            if let Some(CellValue::Uint(max)) = header.max_value {
                if value > max {
                    bitmap.reset_all();
                    return;
                }
            }
            if let Some(CellValue::Uint(min)) = header.min_value {
                if value < min {
                    bitmap.reset_all();
                    return;
                }
            }
            let decimal = decode::to_uint_string(value);
            let bloom = block.get_bloom_filter_for_column(header);
            if !match_bloom_filter_all_tokens(bloom, &[decimal.as_str()]) {
                bitmap.reset_all();
                return;
            }

            let cells = fixed_cells(block, header, width);
            let mut to_clear = Vec::new();
            bitmap.for_each_set_bit(|i| {
                let cell = decode::cell_at(cells, width, i as usize);
                if decode_uint_cell(header.value_type, cell) != value {
                    to_clear.push(i);
                }
                true
            });
            bitmap.reset_bits(to_clear);
        }
        MatchKind::Prefix => {
            let Some(value) = decode::parse_uint(match_.needle()) else {
                bitmap.reset_all();
                return;
            };
            if let Some(CellValue::Uint(max)) = header.max_value {
                if value > max {
                    bitmap.reset_all();
                    return;
                }
            }
            let value_type = header.value_type;
            apply_string_like(block, header, match_, bitmap, {
                let cells = fixed_cells(block, header, width);
                move |i, buf| decode::write_uint_string(buf, decode_uint_cell(value_type, decode::cell_at(cells, width, i)))
            });
        }
    }
}

fn fixed_cells<'a>(block: &'a dyn BlockSearch, header: &ColumnHeader, width: usize) -> &'a [u8] {
    let values = block.get_values_for_column(header);
    let cow: std::borrow::Cow<'a, [u8]> = match values {
        ColumnValues::Uint8(c)
        | ColumnValues::Uint16(c)
        | ColumnValues::Uint32(c)
        | ColumnValues::Uint64(c)
        | ColumnValues::Float64(c)
        | ColumnValues::IPv4(c)
        | ColumnValues::TimestampISO8601(c) => c,
        other => fatal_invariant(
            block.part_path(),
            &header.field_name,
            format!("expected fixed-width column values, got {other:?}"),
        ),
    };
    let bytes: &'a [u8] = match cow {
        std::borrow::Cow::Borrowed(b) => b,
        std::borrow::Cow::Owned(_) => fatal_invariant(
            block.part_path(),
            &header.field_name,
            "owned (non-borrowed) fixed-width column values are not supported by the hot filter path",
        ),
    };
    decode::checked_cells(bytes, width, block.part_path(), &header.field_name);
    bytes
}

/// True iff `s` contains a `.` with a digit immediately on each side —
/// spec.md §4.C's "interior `.`" requirement for the float exact-value fast
/// path. A leading or trailing dot (`.5`, `5.`) does not qualify: those are
/// meant to fall through to render-and-substring matching instead.
fn has_interior_dot(s: &str) -> bool {
    let bytes = s.as_bytes();
    match s.find('.') {
        Some(pos) if pos > 0 && pos + 1 < bytes.len() => {
            bytes[pos - 1].is_ascii_digit() && bytes[pos + 1].is_ascii_digit()
        }
        _ => false,
    }
}

fn apply_float(block: &dyn BlockSearch, header: &ColumnHeader, match_: &TextMatch, bitmap: &mut RowBitmap) {
    let width = header.value_type.cell_width().unwrap();

    if matches!(match_.kind(), MatchKind::Phrase | MatchKind::AnyCasePhrase) {
        if let Some(value) = decode::parse_float(match_.needle()) {
            if has_interior_dot(match_.needle()) {
                let cells = fixed_cells(block, header, width);
                let mut to_clear = Vec::new();
                bitmap.for_each_set_bit(|i| {
                    let cell = decode::cell_at(cells, width, i as usize);
                    if decode::decode_float64(cell) != value {
                        to_clear.push(i);
                    }
                    true
                });
                bitmap.reset_bits(to_clear);
                return;
            }
        }
    }

    // Prefix, or a Phrase/AnyCasePhrase that didn't qualify for the exact
    // path: render and phrase/prefix-match. Special prefix tokens like `.`,
    // `+`, `-`, `e*`, `E*` fall through here naturally since they're never
    // required to parse, and a leading/trailing dot falls through too since
    // it fails `has_interior_dot`.
    apply_string_like(block, header, match_, bitmap, {
        let cells = fixed_cells(block, header, width);
        move |i, buf| decode::write_float_string(buf, decode::decode_float64(decode::cell_at(cells, width, i)))
    });
}

fn apply_ipv4(block: &dyn BlockSearch, header: &ColumnHeader, match_: &TextMatch, bitmap: &mut RowBitmap) {
    let width = header.value_type.cell_width().unwrap();

    if matches!(match_.kind(), MatchKind::Phrase | MatchKind::AnyCasePhrase) {
        if let Some(value) = decode::parse_ipv4(match_.needle()) {
            let cells = fixed_cells(block, header, width);
            let mut to_clear = Vec::new();
            bitmap.for_each_set_bit(|i| {
                let cell = decode::cell_at(cells, width, i as usize);
                if decode::decode_ipv4(cell) != value {
                    to_clear.push(i);
                }
                true
            });
            bitmap.reset_bits(to_clear);
            return;
        }
    }

    apply_string_like(block, header, match_, bitmap, {
        let cells = fixed_cells(block, header, width);
        move |i, buf| decode::write_ipv4_string(buf, decode::decode_ipv4(decode::cell_at(cells, width, i)))
    });
}

fn apply_timestamp(block: &dyn BlockSearch, header: &ColumnHeader, match_: &TextMatch, bitmap: &mut RowBitmap) {
    let width = header.value_type.cell_width().unwrap();

    // The exact-value path tries the *original* (not lowercased) needle —
    // an AnyCasePhrase needle is already lowercased by `TextMatch::new`,
    // but a valid RFC3339 timestamp's only letters are `T`/`Z`, which are
    // case-normalised by `decode::parse_timestamp_nanos`'s underlying
    // parser regardless, so this is safe for all three match kinds.
    if let Some(value) = decode::parse_timestamp_nanos(match_.needle()) {
        let cells = fixed_cells(block, header, width);
        let mut to_clear = Vec::new();
        bitmap.for_each_set_bit(|i| {
            let cell = decode::cell_at(cells, width, i as usize);
            if decode::decode_timestamp_nanos(cell) != value {
                to_clear.push(i);
            }
            true
        });
        bitmap.reset_bits(to_clear);
        return;
    }

    // Render-and-match fallback. Per the resolved Open Question (spec.md
    // §9): only the any-case path upper-cases the needle before matching
    // the canonical (uppercase `T`/`Z`) rendered string; the plain
    // Phrase/Prefix paths match the needle's case as given.
    let cells = fixed_cells(block, header, width);
    let render = move |i: usize, buf: &mut String| {
        decode::write_timestamp_string(buf, decode::decode_timestamp_nanos(decode::cell_at(cells, width, i)))
    };
    match match_.kind() {
        MatchKind::AnyCasePhrase => {
            let upper = match_.needle().to_uppercase();
            apply_string_like_raw(block, header, &upper, bitmap, render);
        }
        MatchKind::Phrase => {
            apply_string_like_raw(block, header, match_.needle(), bitmap, render);
        }
        MatchKind::Prefix => {
            apply_prefix_raw(block, header, match_.needle(), bitmap, render);
        }
    }
}

/// Phrase/match against a literal needle without going through
/// [`TextMatch`]'s memoised bloom tokens (used by the timestamp any-case
/// path, which computes its own upper-cased needle at apply time).
fn apply_string_like_raw(
    block: &dyn BlockSearch,
    header: &ColumnHeader,
    needle: &str,
    bitmap: &mut RowBitmap,
    render: impl Fn(usize, &mut String),
) {
    let tokens = tokenize(needle);
    let tokens_ref: Vec<&str> = tokens.iter().copied().collect();
    let bloom = block.get_bloom_filter_for_column(header);
    if !match_bloom_filter_all_tokens(bloom, &tokens_ref) {
        bitmap.reset_all();
        return;
    }
    RENDER_POOL.with(|pool| {
        let mut buf = pool.get();
        let mut to_clear = Vec::new();
        bitmap.for_each_set_bit(|i| {
            buf.clear();
            render(i as usize, &mut buf);
            if !match_phrase(&buf, needle) {
                to_clear.push(i);
            }
            true
        });
        bitmap.reset_bits(to_clear);
    });
}

fn apply_prefix_raw(
    block: &dyn BlockSearch,
    header: &ColumnHeader,
    needle: &str,
    bitmap: &mut RowBitmap,
    render: impl Fn(usize, &mut String),
) {
    let tokens = tokenize_skip_last(needle);
    let tokens_ref: Vec<&str> = tokens.iter().copied().collect();
    let bloom = block.get_bloom_filter_for_column(header);
    if !match_bloom_filter_all_tokens(bloom, &tokens_ref) {
        bitmap.reset_all();
        return;
    }
    RENDER_POOL.with(|pool| {
        let mut buf = pool.get();
        let mut to_clear = Vec::new();
        bitmap.for_each_set_bit(|i| {
            buf.clear();
            render(i as usize, &mut buf);
            if !match_prefix(&buf, needle) {
                to_clear.push(i);
            }
            true
        });
        bitmap.reset_bits(to_clear);
    });
}

/// Shared implementation of `apply` for the three textual filter kinds:
/// tests the const-column fast path (P2), then dispatches per encoding.
pub(crate) fn apply_text(field: &str, match_: &TextMatch, block: &dyn BlockSearch, bitmap: &mut RowBitmap) {
    if bitmap.is_zero() {
        return;
    }

    if let Some(const_value) = block.get_const_column_value(field) {
        if !match_.matches_str(const_value) {
            bitmap.reset_all();
        }
        return;
    }

    let Some(header) = block.get_column_header(field) else {
        // Absent column: no row can satisfy any predicate on it, including
        // an empty phrase (spec.md §4.C edge cases).
        bitmap.reset_all();
        return;
    };

    match header.value_type {
        ValueType::String => {
            let values = block.get_values_for_column(header);
            let strings = match values {
                ColumnValues::String(s) => s,
                other => fatal_invariant(
                    block.part_path(),
                    field,
                    format!("expected String column values, got {other:?}"),
                ),
            };
            apply_string_like(block, header, match_, bitmap, move |i, buf| buf.push_str(&strings[i]));
        }
        ValueType::Dict => apply_dict(block, header, match_, bitmap),
        ValueType::Uint8 | ValueType::Uint16 | ValueType::Uint32 | ValueType::Uint64 => {
            apply_fixed_uint(block, header, match_, bitmap)
        }
        ValueType::Float64 => apply_float(block, header, match_, bitmap),
        ValueType::IPv4 => apply_ipv4(block, header, match_, bitmap),
        ValueType::TimestampISO8601 => apply_timestamp(block, header, match_, bitmap),
    }
}

macro_rules! text_filter {
    ($name:ident, $kind:expr) => {
        #[derive(Debug)]
        pub struct $name {
            field: String,
            match_: TextMatch,
        }

        impl $name {
            pub fn new(field: impl Into<String>, needle: impl Into<String>) -> Self {
                Self {
                    field: field.into(),
                    match_: TextMatch::new($kind, needle),
                }
            }
        }

        impl crate::filter::Filter for $name {
            fn apply(&self, block: &dyn BlockSearch, bitmap: &mut RowBitmap) {
                apply_text(&self.field, &self.match_, block, bitmap)
            }
        }
    };
}

text_filter!(PhraseFilter, MatchKind::Phrase);
text_filter!(PrefixFilter, MatchKind::Prefix);
text_filter!(AnyCasePhraseFilter, MatchKind::AnyCasePhrase);
