//! guardtext — injection-safe templating for YAML and shell.
//!
//! A conventional template engine happily lets untrusted data rewrite the
//! *structure* of its output: a YAML value containing `, admin: true`
//! mints a new key, a shell argument containing `` `cmd` `` runs a
//! command. This crate renders [tera] templates (and `printf`-style
//! format strings) destined for YAML documents or shell scripts, and
//! rejects any execution in which data substitutions would have altered
//! the parse structure of the output rather than just its scalar values.
//!
//! Detection is differential rather than escape-based: each execution
//! renders the template several times — honestly, with a fixed
//! placeholder at every data-access site, and (where needed) with every
//! data string code-point-doubled — parses all renderings with the target
//! format's grammar, and compares the parse trees under a structural
//! equivalence relation. If the check passes, the honest rendering is
//! emitted byte-for-byte; nothing is escaped or rewritten.
//!
//! # Modules
//!
//! - [`yaml`] — templating for YAML document streams.
//! - [`shell`] — templating and `printf`-style formatting for shell
//!   scripts.
//!
//! # Quick start
//!
//! ```
//! use guardtext::yaml::Template;
//! use serde_json::json;
//!
//! let mut tmpl = Template::new("config");
//! tmpl.parse("{ hello: {{ addressee }} }")?;
//!
//! assert_eq!(tmpl.render(&json!({ "addressee": "world" }))?, "{ hello: world }");
//! assert!(tmpl.render(&json!({ "addressee": "world, oops: true" })).is_err());
//! # Ok::<(), guardtext::Error>(())
//! ```
//!
//! # Scope and caveats
//!
//! - Templates are re-executed several times per call; registered filters
//!   and functions must be pure.
//! - Values produced by filters/functions (and their arguments) bypass
//!   detection unless wrapped in `ApplyInjectionDetection`.
//! - Data not reachable through serde serialization is out of scope.
//! - No escaping or sanitization is performed; rejected executions return
//!   an error and emit nothing.
//!
//! [tera]: https://keats.github.io/tera/

#![warn(missing_docs)]

mod data;
mod engine;
mod error;
mod files;

pub mod shell;
pub mod yaml;

pub use error::{Error, Result};

// HTML escaping forwarded from the engine for callers replacing plain
// tera usage.
pub use tera::escape_html;
