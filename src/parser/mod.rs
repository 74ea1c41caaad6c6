//! Parser module for document text handling

mod json;

pub use json::{decode, duplicate_keys, encode, escape_pointer_segment, DecodeError};
