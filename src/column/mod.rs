//! Column value decoders (spec.md §4.B).

pub mod decode;
