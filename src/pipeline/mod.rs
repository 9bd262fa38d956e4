//! Pipeline stages for attachment upload.
//!
//! Each submodule implements exactly one step, so each is independently
//! testable and only [`chunk`] touches the network.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ thumbnail          (at selection time, display only)
//!   │
//!   └────▶ classify ──▶ chunk  (at submit time)
//! (path)   (bundled /   (chunk requests + merge)
//!           chunked)
//! ```
//!
//! 1. [`input`]    : read a local path into a [`crate::output::PendingFile`]
//! 2. [`thumbnail`]: decode, downscale and re-encode a preview; runs in
//!    `spawn_blocking` because image codecs are CPU-bound
//! 3. [`classify`] : pure size-based routing into bundled vs. chunked
//! 4. [`chunk`]    : one sequential chunked upload session per large file

pub mod chunk;
pub mod classify;
pub mod input;
pub mod thumbnail;
