//! Minimal [`BlockSearch`] implementations used by unit and property tests
//! throughout the crate. Not part of the public API.

use crate::block::{BlockSearch, BloomFilter, CellValue, ColumnHeader, ColumnValues, StreamId, ValueType};
use crate::column::decode;
use hashbrown::HashMap;

pub struct TestBlock {
    pub stream_id: StreamId,
    pub row_count: u32,
    headers: HashMap<String, ColumnHeader>,
    strings: HashMap<String, Vec<String>>,
    bytes: HashMap<String, Vec<u8>>,
    consts: HashMap<String, String>,
    part_path: String,
}

impl TestBlock {
    fn empty(row_count: u32) -> Self {
        Self {
            stream_id: 0,
            row_count,
            headers: HashMap::new(),
            strings: HashMap::new(),
            bytes: HashMap::new(),
            consts: HashMap::new(),
            part_path: "test://block".to_string(),
        }
    }

    pub fn with_stream_id(mut self, id: StreamId) -> Self {
        self.stream_id = id;
        self
    }

    pub fn with_const(mut self, field: &str, value: &str) -> Self {
        self.consts.insert(field.to_string(), value.to_string());
        self
    }
}

impl BlockSearch for TestBlock {
    fn row_count(&self) -> u32 {
        self.row_count
    }

    fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    fn get_const_column_value(&self, field: &str) -> Option<&str> {
        self.consts.get(field).map(String::as_str)
    }

    fn get_column_header(&self, field: &str) -> Option<&ColumnHeader> {
        self.headers.get(field)
    }

    fn get_values_for_column(&self, header: &ColumnHeader) -> ColumnValues<'_> {
        match header.value_type {
            ValueType::String => {
                ColumnValues::String(std::borrow::Cow::Borrowed(&self.strings[&header.field_name]))
            }
            ValueType::Dict => ColumnValues::Dict(std::borrow::Cow::Borrowed(&self.bytes[&header.field_name])),
            ValueType::Uint8 => ColumnValues::Uint8(std::borrow::Cow::Borrowed(&self.bytes[&header.field_name])),
            ValueType::Uint16 => ColumnValues::Uint16(std::borrow::Cow::Borrowed(&self.bytes[&header.field_name])),
            ValueType::Uint32 => ColumnValues::Uint32(std::borrow::Cow::Borrowed(&self.bytes[&header.field_name])),
            ValueType::Uint64 => ColumnValues::Uint64(std::borrow::Cow::Borrowed(&self.bytes[&header.field_name])),
            ValueType::Float64 => {
                ColumnValues::Float64(std::borrow::Cow::Borrowed(&self.bytes[&header.field_name]))
            }
            ValueType::IPv4 => ColumnValues::IPv4(std::borrow::Cow::Borrowed(&self.bytes[&header.field_name])),
            ValueType::TimestampISO8601 => {
                ColumnValues::TimestampISO8601(std::borrow::Cow::Borrowed(&self.bytes[&header.field_name]))
            }
        }
    }

    fn get_bloom_filter_for_column(&self, _header: &ColumnHeader) -> Option<&dyn BloomFilter> {
        None
    }

    fn part_path(&self) -> &str {
        &self.part_path
    }
}

pub struct StringBlock(TestBlock);

impl StringBlock {
    pub fn new(field: &str, values: Vec<&str>) -> Self {
        let mut b = TestBlock::empty(values.len() as u32);
        b.headers
            .insert(field.to_string(), ColumnHeader::new(field, ValueType::String));
        b.strings
            .insert(field.to_string(), values.into_iter().map(str::to_owned).collect());
        Self(b)
    }

    pub fn with_stream_id(mut self, id: StreamId) -> Self {
        self.0 = self.0.with_stream_id(id);
        self
    }
}

impl BlockSearch for StringBlock {
    fn row_count(&self) -> u32 {
        self.0.row_count()
    }
    fn stream_id(&self) -> StreamId {
        self.0.stream_id()
    }
    fn get_const_column_value(&self, field: &str) -> Option<&str> {
        self.0.get_const_column_value(field)
    }
    fn get_column_header(&self, field: &str) -> Option<&ColumnHeader> {
        self.0.get_column_header(field)
    }
    fn get_values_for_column(&self, header: &ColumnHeader) -> ColumnValues<'_> {
        self.0.get_values_for_column(header)
    }
    fn get_bloom_filter_for_column(&self, header: &ColumnHeader) -> Option<&dyn BloomFilter> {
        self.0.get_bloom_filter_for_column(header)
    }
    fn part_path(&self) -> &str {
        self.0.part_path()
    }
}

pub struct DictBlock(TestBlock);

impl DictBlock {
    pub fn new(field: &str, dict: Vec<&str>, codes: Vec<u8>) -> Self {
        let mut b = TestBlock::empty(codes.len() as u32);
        let mut header = ColumnHeader::new(field, ValueType::Dict);
        header.values_dict = dict.into_iter().map(str::to_owned).collect();
        b.headers.insert(field.to_string(), header);
        b.bytes.insert(field.to_string(), codes);
        Self(b)
    }
}

impl BlockSearch for DictBlock {
    fn row_count(&self) -> u32 {
        self.0.row_count()
    }
    fn stream_id(&self) -> StreamId {
        self.0.stream_id()
    }
    fn get_const_column_value(&self, field: &str) -> Option<&str> {
        self.0.get_const_column_value(field)
    }
    fn get_column_header(&self, field: &str) -> Option<&ColumnHeader> {
        self.0.get_column_header(field)
    }
    fn get_values_for_column(&self, header: &ColumnHeader) -> ColumnValues<'_> {
        self.0.get_values_for_column(header)
    }
    fn get_bloom_filter_for_column(&self, header: &ColumnHeader) -> Option<&dyn BloomFilter> {
        self.0.get_bloom_filter_for_column(header)
    }
    fn part_path(&self) -> &str {
        self.0.part_path()
    }
}

pub struct UintBlock(TestBlock);

impl UintBlock {
    pub fn new(field: &str, value_type: ValueType, values: Vec<u64>) -> Self {
        let width = value_type.cell_width().unwrap();
        let mut bytes = Vec::with_capacity(values.len() * width);
        for &v in &values {
            match value_type {
                ValueType::Uint8 => bytes.extend_from_slice(&decode::encode_uint8(v)),
                ValueType::Uint16 => bytes.extend_from_slice(&decode::encode_uint16(v)),
                ValueType::Uint32 => bytes.extend_from_slice(&decode::encode_uint32(v)),
                ValueType::Uint64 => bytes.extend_from_slice(&decode::encode_uint64(v)),
                _ => panic!("not a uint type"),
            }
        }
        let mut header = ColumnHeader::new(field, value_type);
        header.min_value = values.iter().min().copied().map(CellValue::Uint);
        header.max_value = values.iter().max().copied().map(CellValue::Uint);

        let mut b = TestBlock::empty(values.len() as u32);
        b.headers.insert(field.to_string(), header);
        b.bytes.insert(field.to_string(), bytes);
        Self(b)
    }
}

impl BlockSearch for UintBlock {
    fn row_count(&self) -> u32 {
        self.0.row_count()
    }
    fn stream_id(&self) -> StreamId {
        self.0.stream_id()
    }
    fn get_const_column_value(&self, field: &str) -> Option<&str> {
        self.0.get_const_column_value(field)
    }
    fn get_column_header(&self, field: &str) -> Option<&ColumnHeader> {
        self.0.get_column_header(field)
    }
    fn get_values_for_column(&self, header: &ColumnHeader) -> ColumnValues<'_> {
        self.0.get_values_for_column(header)
    }
    fn get_bloom_filter_for_column(&self, header: &ColumnHeader) -> Option<&dyn BloomFilter> {
        self.0.get_bloom_filter_for_column(header)
    }
    fn part_path(&self) -> &str {
        self.0.part_path()
    }
}

pub struct Ipv4Block(TestBlock);

impl Ipv4Block {
    pub fn new(field: &str, dotted: Vec<&str>) -> Self {
        let mut bytes = Vec::with_capacity(dotted.len() * 4);
        let mut values = Vec::with_capacity(dotted.len());
        for s in &dotted {
            let v = decode::parse_ipv4(s).expect("valid ipv4 literal in test fixture");
            values.push(v);
            bytes.extend_from_slice(&decode::encode_ipv4(v));
        }
        let mut header = ColumnHeader::new(field, ValueType::IPv4);
        header.min_value = values.iter().min().copied().map(CellValue::Ipv4);
        header.max_value = values.iter().max().copied().map(CellValue::Ipv4);

        let mut b = TestBlock::empty(dotted.len() as u32);
        b.headers.insert(field.to_string(), header);
        b.bytes.insert(field.to_string(), bytes);
        Self(b)
    }
}

impl BlockSearch for Ipv4Block {
    fn row_count(&self) -> u32 {
        self.0.row_count()
    }
    fn stream_id(&self) -> StreamId {
        self.0.stream_id()
    }
    fn get_const_column_value(&self, field: &str) -> Option<&str> {
        self.0.get_const_column_value(field)
    }
    fn get_column_header(&self, field: &str) -> Option<&ColumnHeader> {
        self.0.get_column_header(field)
    }
    fn get_values_for_column(&self, header: &ColumnHeader) -> ColumnValues<'_> {
        self.0.get_values_for_column(header)
    }
    fn get_bloom_filter_for_column(&self, header: &ColumnHeader) -> Option<&dyn BloomFilter> {
        self.0.get_bloom_filter_for_column(header)
    }
    fn part_path(&self) -> &str {
        self.0.part_path()
    }
}

pub struct TimestampBlock(TestBlock);

impl TimestampBlock {
    pub fn new(field: &str, rfc3339: Vec<&str>) -> Self {
        let mut bytes = Vec::with_capacity(rfc3339.len() * 8);
        let mut values = Vec::with_capacity(rfc3339.len());
        for s in &rfc3339 {
            let v = decode::parse_timestamp_nanos(s).expect("valid timestamp literal in test fixture");
            values.push(v);
            bytes.extend_from_slice(&decode::encode_timestamp_nanos(v));
        }
        let mut header = ColumnHeader::new(field, ValueType::TimestampISO8601);
        header.min_value = values.iter().min().copied().map(CellValue::TimestampNanos);
        header.max_value = values.iter().max().copied().map(CellValue::TimestampNanos);

        let mut b = TestBlock::empty(rfc3339.len() as u32);
        b.headers.insert(field.to_string(), header);
        b.bytes.insert(field.to_string(), bytes);
        Self(b)
    }
}

impl BlockSearch for TimestampBlock {
    fn row_count(&self) -> u32 {
        self.0.row_count()
    }
    fn stream_id(&self) -> StreamId {
        self.0.stream_id()
    }
    fn get_const_column_value(&self, field: &str) -> Option<&str> {
        self.0.get_const_column_value(field)
    }
    fn get_column_header(&self, field: &str) -> Option<&ColumnHeader> {
        self.0.get_column_header(field)
    }
    fn get_values_for_column(&self, header: &ColumnHeader) -> ColumnValues<'_> {
        self.0.get_values_for_column(header)
    }
    fn get_bloom_filter_for_column(&self, header: &ColumnHeader) -> Option<&dyn BloomFilter> {
        self.0.get_bloom_filter_for_column(header)
    }
    fn part_path(&self) -> &str {
        self.0.part_path()
    }
}

pub struct FloatBlock(TestBlock);

impl FloatBlock {
    pub fn new(field: &str, values: Vec<f64>) -> Self {
        let mut bytes = Vec::with_capacity(values.len() * 8);
        for &v in &values {
            bytes.extend_from_slice(&decode::encode_float64(v));
        }
        let header = ColumnHeader::new(field, ValueType::Float64);
        let mut b = TestBlock::empty(values.len() as u32);
        b.headers.insert(field.to_string(), header);
        b.bytes.insert(field.to_string(), bytes);
        Self(b)
    }
}

impl BlockSearch for FloatBlock {
    fn row_count(&self) -> u32 {
        self.0.row_count()
    }
    fn stream_id(&self) -> StreamId {
        self.0.stream_id()
    }
    fn get_const_column_value(&self, field: &str) -> Option<&str> {
        self.0.get_const_column_value(field)
    }
    fn get_column_header(&self, field: &str) -> Option<&ColumnHeader> {
        self.0.get_column_header(field)
    }
    fn get_values_for_column(&self, header: &ColumnHeader) -> ColumnValues<'_> {
        self.0.get_values_for_column(header)
    }
    fn get_bloom_filter_for_column(&self, header: &ColumnHeader) -> Option<&dyn BloomFilter> {
        self.0.get_bloom_filter_for_column(header)
    }
    fn part_path(&self) -> &str {
        self.0.part_path()
    }
}
