//! File format parsers.
//!
//! Only TIFF and BigTIFF are supported; see [`tiff`].

pub mod tiff;
