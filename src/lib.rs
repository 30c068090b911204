//! A logic-bearing text template engine: scan, nest, and render named
//! templates against a dynamic data view.
//!
//! The pipeline is three stages, leaves first: [`scanner`] walks the raw
//! text, [`parser`] turns that walk into a nested token tree, and
//! [`writer`]/[`context`] render that tree against a caller-supplied
//! [`value::Value`] view, dispatching each token kind through a
//! [`handlers::HandlerTable`] that callers can extend at runtime. [`facade`]
//! wraps a single default [`writer::Writer`] behind thread-local state for
//! callers that just want `parse`/`render` without managing an instance.

mod context;
mod error;
mod escape;
pub mod facade;
mod handlers;
mod host;
mod name;
mod parser;
mod scanner;
mod token;
mod value;
mod writer;

pub use context::Context;
pub use error::{Error, Result};
pub use escape::{default_escape, EscapeFn};
pub use handlers::{HandlerFn, HandlerTable};
pub use host::{Deferred, DomSink, HostEnv, RecordingDomSink};
pub use token::{Kind, Token};
pub use value::{HostFn, Value};
pub use writer::Writer;
