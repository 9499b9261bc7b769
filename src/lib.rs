//! Vellum: a versioned document-rendering service.
//!
//! Markdown or HTML goes in, a paginated A4 PDF comes out, and every edit is
//! kept as an immutable version with both its source markup and rendered PDF
//! on disk.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
