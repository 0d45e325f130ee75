//! Error types for guardtext.
//!
//! Callers distinguish four outcomes per format: the template itself is
//! unusable (its placeholder rendering does not parse in the target
//! grammar), or the supplied data changed the structure of the output.
//! Engine, serialization, formatting and writer errors pass through
//! unchanged.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors returned by the YAML and shell façades.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The template's placeholder rendering is not a valid YAML document
    /// stream, or it violates YAML well-formedness rules the judge
    /// enforces (non-scalar mapping keys, duplicate keys).
    #[error("invalid YAML template")]
    InvalidYamlTemplate,

    /// The supplied data altered the YAML structure of the output: new
    /// keys or nodes, a changed node kind, an introduced alias, or a
    /// rendering that no longer parses.
    #[error("YAML injection detected")]
    YamlInjection,

    /// The template's placeholder rendering is not a valid shell script
    /// under the supported grammar.
    #[error("invalid shell template")]
    InvalidShTemplate,

    /// The supplied data altered the shell structure of the output: new
    /// commands, arguments, flags, glob characters, or a rendering that
    /// no longer parses.
    #[error("shell injection detected")]
    ShInjection,

    /// Error from the underlying template engine (syntax errors, missing
    /// variables, failing user filters). Surfaced unchanged.
    #[error("template engine error")]
    Engine(#[source] Box<tera::Error>),

    /// The data binding could not be serialized into the engine's value
    /// model.
    #[error("failed to serialize template data")]
    Data(#[source] serde_json::Error),

    /// A format string could not be expanded (unknown verb, argument
    /// count or type mismatch).
    #[error("invalid format string: {0}")]
    Format(String),

    /// Template files could not be loaded (empty file list, bad glob
    /// pattern, unknown associated template name).
    #[error("template loading failed: {0}")]
    Load(String),

    /// Writer error while emitting an approved rendering.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<tera::Error> for Error {
    fn from(err: tera::Error) -> Self {
        Error::Engine(Box::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Data(err)
    }
}
