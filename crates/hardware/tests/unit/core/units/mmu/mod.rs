//! # Memory Management Unit
//!
//! Tests for physical memory protection, the page-table walker and the
//! reference translation cache.
