//! Data types for field extraction.

pub mod config;
pub mod field;
pub mod fragment;
pub mod page;
pub mod result;
