//! The block data model (spec.md §3) and the `BlockSearch` collaborator
//! interface (spec.md §6) that the filter evaluator consumes.
//!
//! The physical block store, index, and bloom-filter persistence are out of
//! scope for this crate (spec.md §1); this module only defines the shape of
//! what that collaborator must expose.

use std::borrow::Cow;

pub type StreamId = u64;

/// A column's physical encoding. Every numeric/IP/time type renders to a
/// canonical string form via `crate::column::decode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    String,
    Dict,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float64,
    IPv4,
    TimestampISO8601,
}

impl ValueType {
    /// Declared cell width in bytes for fixed-width encodings; `None` for
    /// the variable-width `String`/`Dict` (dict cells are always 1 byte,
    /// handled separately since the dictionary itself is variable width).
    pub fn cell_width(self) -> Option<usize> {
        match self {
            Self::String => None,
            Self::Dict => Some(1),
            Self::Uint8 => Some(1),
            Self::Uint16 => Some(2),
            Self::Uint32 => Some(4),
            Self::Uint64 => Some(8),
            Self::Float64 => Some(8),
            Self::IPv4 => Some(4),
            Self::TimestampISO8601 => Some(8),
        }
    }
}

/// A decoded numeric/IP/time value, used for a column's `min`/`max` hints
/// and for exact-value comparisons against a parsed query literal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellValue {
    Uint(u64),
    Float(f64),
    Ipv4(u32),
    TimestampNanos(i64),
}

/// Per-column header summary (spec.md §3).
#[derive(Debug, Clone)]
pub struct ColumnHeader {
    pub field_name: String,
    pub value_type: ValueType,
    /// Populated only for `ValueType::Dict`: the per-block values
    /// dictionary, indexed by the 1-byte cell code. At most 256 entries.
    pub values_dict: Vec<String>,
    pub min_value: Option<CellValue>,
    pub max_value: Option<CellValue>,
}

impl ColumnHeader {
    pub fn new(field_name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            field_name: field_name.into(),
            value_type,
            values_dict: Vec::new(),
            min_value: None,
            max_value: None,
        }
    }
}

/// The N cells of one column, in physical form. Fixed-width encodings carry
/// their raw little-endian bytes (`N * width` long); `Dict` carries 1-byte
/// codes plus a reference to the header's dictionary; `String` carries
/// decoded strings directly.
#[derive(Debug, Clone)]
pub enum ColumnValues<'a> {
    String(Cow<'a, [String]>),
    Dict(Cow<'a, [u8]>),
    Uint8(Cow<'a, [u8]>),
    Uint16(Cow<'a, [u8]>),
    Uint32(Cow<'a, [u8]>),
    Uint64(Cow<'a, [u8]>),
    Float64(Cow<'a, [u8]>),
    IPv4(Cow<'a, [u8]>),
    TimestampISO8601(Cow<'a, [u8]>),
}

/// A per-column approximate membership sketch over tokens (spec.md §6).
pub trait BloomFilter {
    /// Returns true iff every token in `tokens` is present in the filter. An
    /// empty token list returns true — no information, so the filter cannot
    /// reject (spec.md §4.C).
    fn contains_all(&self, tokens: &[&str]) -> bool;
}

/// Everything the filter evaluator needs from the block store for one
/// block (spec.md §6). The physical storage behind this trait is out of
/// scope for this crate.
pub trait BlockSearch {
    fn row_count(&self) -> u32;
    fn stream_id(&self) -> StreamId;

    /// A column's const value if the block advertises one for `field`, i.e.
    /// every row has the same value. `None` if the column is absent or not
    /// const.
    fn get_const_column_value(&self, field: &str) -> Option<&str>;

    fn get_column_header(&self, field: &str) -> Option<&ColumnHeader>;

    /// The column's N cells in physical form. Panics (fatal) if called with
    /// a header from a different block.
    fn get_values_for_column(&self, header: &ColumnHeader) -> ColumnValues<'_>;

    fn get_bloom_filter_for_column(&self, header: &ColumnHeader) -> Option<&dyn BloomFilter>;

    /// Diagnostic path of the storage part backing this block, used only in
    /// fatal-invariant messages.
    fn part_path(&self) -> &str;
}
