//! Injection-safe templating and formatting for shell scripts.
//!
//! Two façades share the same detection machinery:
//!
//! - [`Template`] renders tera templates whose output is a shell script
//!   and rejects executions where the supplied data introduces new
//!   commands, arguments, flags or glob characters (a 3-way differential
//!   check, like the YAML façade);
//! - [`sprintf`] substitutes arguments into a trusted `printf`-style
//!   format string and performs a 2-way check of the result against a
//!   placeholder rendering.
//!
//! # Examples
//!
//! ```
//! use guardtext::shell::Template;
//! use serde_json::json;
//!
//! let mut tmpl = Template::new("run");
//! tmpl.parse("echo {{ x }}")?;
//!
//! assert_eq!(tmpl.render(&json!({ "x": "hello" }))?, "echo hello");
//!
//! let err = tmpl.render(&json!({ "x": "`./c`" })).unwrap_err();
//! assert!(matches!(err, guardtext::Error::ShInjection));
//! # Ok::<(), guardtext::Error>(())
//! ```
//!
//! Flags must be permitted explicitly: `cat {{ x }}` rejects data starting
//! with `-`, `cat {{ x | AllowFlags }}` accepts it. `StructuralData` and
//! `ApplyInjectionDetection` behave as in the YAML façade.
//!
//! # Grammar scope
//!
//! Renderings are parsed with a POSIX shell grammar. Bash-only constructs
//! (C-style `for (( ))`, `[[ ]]`, arrays, process substitution, extended
//! globs) are not accepted; a template relying on them fails with
//! [`Error::InvalidShTemplate`].

use std::io::Write;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use conch_parser::lexer::Lexer;
use conch_parser::parse::DefaultParser;
use serde::Serialize;
use serde_json::Value;

use crate::engine::{RenderPolicy, TemplateSet};
use crate::error::{Error, Result};
use crate::files;

mod judge;
mod sprintf;

#[cfg(test)]
mod template_tests;

pub use sprintf::{escape_default_context, must_sprintf, sprintf, sprintf_lang, Lang};

use judge::{scripts_match, ShellCommand, TemplateRelation};

/// Parses `source` as a shell script.
pub(crate) fn parse_script(source: &str) -> Result<Vec<ShellCommand>, String> {
    let lexer = Lexer::new(source.chars());
    DefaultParser::new(lexer)
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())
}

/// A parsed shell-producing template with automatic injection detection.
///
/// The construction and execution surface matches [`crate::yaml::Template`];
/// see there for the concurrency contract and the purity requirement on
/// registered filters and functions.
#[derive(Debug, Clone)]
pub struct Template {
    set: TemplateSet,
}

impl Template {
    /// Allocates a new, undefined template with the given name.
    pub fn new(name: &str) -> Self {
        Self { set: TemplateSet::new(name) }
    }

    /// Parses `text` as the body of this template.
    pub fn parse(&mut self, text: &str) -> Result<()> {
        self.set.parse(text)
    }

    /// Parses `text` as an associated template, reachable via
    /// `{% include %}` and [`Template::execute_template`].
    pub fn add_template(&mut self, name: &str, text: &str) -> Result<()> {
        self.set.add_template(name, text)
    }

    /// Creates a template from the named files; see
    /// [`crate::yaml::Template::from_files`].
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let first = paths
            .first()
            .ok_or_else(|| Error::Load("no files named".to_string()))?;
        let mut tmpl = Self::new(&files::base_name(first.as_ref()));
        tmpl.add_files(paths)?;
        Ok(tmpl)
    }

    /// Adds every named file as an associated template under its base
    /// name.
    pub fn add_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<()> {
        for path in paths {
            let path = path.as_ref();
            let text = std::fs::read_to_string(path)?;
            self.set.add_template(&files::base_name(path), &text)?;
        }
        Ok(())
    }

    /// Creates a template from the files matching `pattern`, like
    /// [`Template::from_files`] over the sorted match list.
    pub fn from_glob(pattern: &str) -> Result<Self> {
        Self::from_files(&files::glob_paths(pattern)?)
    }

    /// Adds the files matching `pattern` as associated templates.
    pub fn add_glob(&mut self, pattern: &str) -> Result<()> {
        self.add_files(&files::glob_paths(pattern)?)
    }

    /// Registers a user filter; it must be pure.
    pub fn register_filter<F: tera::Filter + 'static>(&mut self, name: &str, filter: F) {
        self.set.register_filter(name, filter);
    }

    /// Registers a user function; it must be pure.
    pub fn register_function<F: tera::Function + 'static>(&mut self, name: &str, function: F) {
        self.set.register_function(name, function);
    }

    /// The name of the template.
    pub fn name(&self) -> &str {
        self.set.name()
    }

    /// Returns the associated template with the given name.
    pub fn lookup(&self, name: &str) -> Option<Template> {
        self.set.with_primary(name).map(|set| Template { set })
    }

    /// Names of all templates defined in this set.
    pub fn templates(&self) -> Vec<&str> {
        self.set.template_names().collect()
    }

    /// A listing of the defined templates, for error messages. Empty if
    /// none are defined.
    pub fn defined_templates(&self) -> String {
        let names: Vec<String> = self.set.template_names().map(|n| format!("{n:?}")).collect();
        if names.is_empty() {
            String::new()
        } else {
            format!("; defined templates are: {}", names.join(", "))
        }
    }

    /// Applies the template to `data` and writes the output to `writer`.
    /// Nothing is written unless the rendering passes the injection check.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidShTemplate`] if the placeholder rendering is not
    ///   a valid script under the supported grammar.
    /// - [`Error::ShInjection`] if the data changed the structure of the
    ///   script.
    /// - Engine and I/O errors are surfaced unchanged.
    pub fn execute<W: Write, D: Serialize>(&self, writer: &mut W, data: &D) -> Result<()> {
        let output = self.render(data)?;
        writer.write_all(output.as_bytes())?;
        Ok(())
    }

    /// Applies the associated template `name` to `data`, as
    /// [`Template::execute`].
    pub fn execute_template<W: Write, D: Serialize>(
        &self,
        writer: &mut W,
        name: &str,
        data: &D,
    ) -> Result<()> {
        let tmpl = self.lookup(name).ok_or_else(|| {
            Error::Load(format!(
                "no template {:?} associated with template {:?}",
                name,
                self.name()
            ))
        })?;
        tmpl.execute(writer, data)
    }

    /// Applies the template to `data` and returns the output, subject to
    /// the same checks as [`Template::execute`].
    pub fn render<D: Serialize>(&self, data: &D) -> Result<String> {
        let value = serde_json::to_value(data)?;
        if value.is_null() {
            return self.set.render_raw(&value);
        }

        match catch_unwind(AssertUnwindSafe(|| self.render_checked(&value))) {
            Ok(result) => result,
            Err(_) => Err(Error::ShInjection),
        }
    }

    fn render_checked(&self, value: &Value) -> Result<String> {
        let requested = self.set.render_guarded(RenderPolicy::Identity, value)?;
        let baseline = self.set.render_guarded(RenderPolicy::Baseline, value)?;

        let parsed_baseline = parse_script(&baseline).map_err(|err| {
            tracing::debug!(template = self.name(), %err, "baseline rendering is not a valid script");
            Error::InvalidShTemplate
        })?;

        let parsed_requested = parse_script(&requested).map_err(|err| {
            tracing::debug!(template = self.name(), %err, "requested rendering is not a valid script");
            Error::ShInjection
        })?;

        let mutated = self.set.render_guarded(RenderPolicy::Mutate, value)?;
        let parsed_mutated = parse_script(&mutated).map_err(|err| {
            tracing::debug!(template = self.name(), %err, "mutated rendering is not a valid script");
            Error::ShInjection
        })?;

        let rel = TemplateRelation;
        if !scripts_match(&parsed_baseline, &parsed_requested, &rel)
            || !scripts_match(&parsed_baseline, &parsed_mutated, &rel)
        {
            return Err(Error::ShInjection);
        }

        Ok(requested)
    }
}
