//! Pipeline stages for licence-field extraction.
//!
//! Each submodule implements exactly one transformation step, so each can
//! be tested on its own and swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ prompt ──▶ llm ──▶ postprocess ──▶ parse
//! (list)    (base64)   (request)  (VLM)   (cleanup)       (record)
//! ```
//!
//! 1. [`input`]: list the image files of a directory, sorted by name
//! 2. [`encode`]: read one file and wrap it as a base64 [`encode::ImageDocument`]
//! 3. [`prompt`]: combine system role, instruction and image into a request
//! 4. [`llm`]: drive one file end to end, with retry/backoff; the only
//!    stage with network I/O
//! 5. [`postprocess`]: strip fences, bullets and emphasis the model adds
//! 6. [`parse`]: turn `label: value` lines into a [`crate::record::FieldRecord`]

pub mod encode;
pub mod input;
pub mod llm;
pub mod parse;
pub mod postprocess;
pub mod prompt;
