//! Pipeline stages after rendering.
//!
//! Each submodule implements exactly one transformation step and reads or
//! writes files in the work directory, so every stage can be rerun or tested
//! on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ ocr ──▶ assemble
//! (path)    (tiff)     (jpeg)     (tsv)   (pdf)
//! ```
//!
//! 1. [`input`]    — validate the user-supplied path
//! 2. [`crate::render`] — rasterise selected pages to TIFF
//! 3. [`encode`]   — downscale each TIFF to the preview JPEG
//! 4. [`crate::ocr`] — recognise words into a TSV dump
//! 5. [`assemble`] — JPEG background plus invisible text, one page each

pub mod assemble;
pub mod encode;
pub mod input;
