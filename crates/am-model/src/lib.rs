//! Running the `am` atmospheric model and reading back its results.
//!
//! The model is an external program fed a configuration on stdin. It reports
//! the spectrum on stdout and the column totals on stderr; both streams are
//! needed to build a [`ModelResult`].

pub mod error;
pub mod header;
pub mod invoker;
pub mod parser;

pub use error::{AmError, AmResult};
pub use header::AmHeader;
pub use invoker::{AmInvoker, EngineOutput, ModelEngine, DEFAULT_AM_TIMEOUT};
pub use parser::{parse_output, ModelResult};
