//! Process configuration from the command line, the environment and a
//! persisted settings file.
//!
//! - [`Words`] interns strings into stable [`Word`] handles.
//! - [`scan`] splits a captured argument list against a table of
//!   [`Command`] descriptors.
//! - [`Registry`] is the guarded settings [`Document`], bootstrapped once
//!   from `<program>.ini`.
//! - [`Context`] ties them together and answers option queries with
//!   argument > environment > registry precedence.

pub mod context;
pub mod error;
pub mod ini;
pub mod path;
pub mod registry;
pub mod scan;
pub mod word;

pub use context::{Context, ContextBuilder, APPLICATION, COMMAND_LINE};
pub use error::{Error, Result};
pub use ini::{Document, Pair};
pub use registry::Registry;
pub use scan::{Command, Scanner, PRESENT};
pub use word::{Word, Words};
