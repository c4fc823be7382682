//! Constituent universes.
//!
//! Each index segment draws its universe from a reference file (see
//! [`reference`]).

pub mod reference;

pub use reference::{ReferenceColumns, ReferenceError, ReferenceSpec, load_reference, read_reference};
