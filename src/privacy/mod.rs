//! Privacy helpers applied to displayed evaluation text.

pub mod obfuscator;

pub use obfuscator::{obfuscate, obfuscate_value, redact};
