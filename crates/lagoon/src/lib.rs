#![forbid(unsafe_code)]

//! `lagoon` drives a live Mermaid preview headlessly.
//!
//! Everything in [`lagoon_core`] is re-exported. This crate adds concrete implementations of the
//! host seams:
//!
//! # Features
//!
//! - `raster`: [`raster::ResvgRasterizer`], a pure-Rust PNG/JPG exporter (resvg + tiny-skia)
//! - `process`: [`process::ProcessCompiler`], compiling diagrams with an external CLI such as
//!   `mmdc`

pub use lagoon_core::*;

pub mod download;

#[cfg(feature = "process")]
pub mod process;

#[cfg(feature = "raster")]
pub mod raster;
