//! Typed record codecs layered over the raw [`crate::framer`] (§4.B).

pub mod metadata_record;
pub mod numeric;
pub mod sets_codec;
pub mod strings;

pub use metadata_record::{read_metadata_record, write_metadata_record, RawHeader, Storage};
pub use sets_codec::SetDictionary;
