#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod bucket;
mod probe;

pub mod map;
pub mod table;

pub use map::FlatMap56;
pub use table::AllocError;
pub use table::RawTable;
