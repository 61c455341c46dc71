//! # Architectural Components
//!
//! This module provides tests for the architectural building blocks of the hart:
//! privilege encodings, the CSR file and trap cause naming.
