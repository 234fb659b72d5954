//! Pipeline stages for transcript extraction.
//!
//! Each submodule implements exactly one step. The two collaborators sit
//! behind traits ([`analysis::DocumentAnalyzer`],
//! [`oracle::ClassificationOracle`]) so the deterministic parts can be
//! tested without network access.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ analysis ──▶ tables ──▶ oracle ──▶ gates
//! (URL/path)  (layout)    (grid)     (LLM)     (fail-closed)
//! ```
//!
//! 1. [`input`]    : resolve a path or URL to a [`input::DocumentSource`],
//!    or load a saved analysis
//! 2. [`analysis`] : submit to the layout service and poll for the result;
//!    network I/O
//! 3. [`tables`]   : reconstruct every table with [`grid`], in document order
//! 4. [`oracle`]   : structured LLM calls with retry/backoff; network I/O
//! 5. [`gates`]    : pure accept/reject decisions on the oracle's verdicts

pub mod analysis;
pub mod gates;
pub mod grid;
pub mod input;
pub mod oracle;
pub mod tables;
