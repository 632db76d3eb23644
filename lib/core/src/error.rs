//! Error handling foundation for chatflow.
//!
//! Only the `Result` alias lives here. Each crate defines its own error enums
//! and wraps them in rootcause reports, adding context as errors move up a
//! layer.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
