//! Reader, writer, and converter for GEMPACK Header Array (HAR), Solution
//! (SL4), and HARX files.
//!
//! ```text
//! bytes -> framer -> typed record codec -> indexed dictionary -> HeaderArrayFile -> (SL4 decode) -> caller
//! ```
//!
//! The three formats share one in-memory model, [`array::HeaderArray`]: an
//! SL4 file is read as an ordinary HAR file and then walked by [`sl4`] to
//! reconstruct dense result arrays; a HARX file is a ZIP-of-JSON
//! re-encoding of the same model, bridged by [`harx`].

pub mod array;
pub mod codec;
pub mod error;
pub mod file;
pub mod framer;
pub mod harx;
pub mod label;
pub mod sets;
pub mod sl4;

#[cfg(feature = "async")]
pub mod async_io;

pub use array::{ArrayKind, HeaderArray, HeaderMeta, IndexedDict};
pub use error::{HarError, Result};
pub use file::{HarReader, HeaderArrayFile};
pub use label::{KeySequence, Label};
pub use sets::SetDef;
