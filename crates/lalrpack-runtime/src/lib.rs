//! Runtime support for the parse tables generated by `lalrpack`.

pub mod codec;
pub mod definition;
pub mod tables;

pub use crate::{
    codec::DecodeError,
    definition::{ParseAction, ParseActionError, ParseTable},
    tables::{ParseTables, ProductionInfo, EMPTY, EOF},
};
