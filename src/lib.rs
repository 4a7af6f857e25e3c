//! Finds Chinese natural-language literals in Vue single-file components,
//! TypeScript and JavaScript, rewrites them into lookup calls (`$t('…')`) and
//! collects the key -> text mapping for translators.

pub mod classify;
pub mod commands;
pub mod config;
pub mod discover;
pub mod error;
pub mod fs;
pub mod json_sync;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod registry;
pub mod rewrite;
pub mod sfc;
pub mod template;
pub mod terms;

pub use error::{Result, RewriteError};
pub use pipeline::{transform_source, Dialect};
pub use registry::KeyRegistry;
