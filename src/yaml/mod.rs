//! Injection-safe templating for YAML documents.
//!
//! [`Template`] renders tera templates whose output is a YAML document
//! stream, and rejects any execution in which the supplied data would
//! change the *structure* of that stream — new keys or nodes, changed node
//! kinds, introduced anchors/aliases — rather than just its scalar values.
//!
//! Detection is differential: the template is rendered honestly, once with
//! a fixed placeholder at every data-access site, and once with every data
//! string code-point-doubled; the three renderings are parsed and compared
//! in lock-step. Data that only fills scalar slots leaves the three parse
//! trees congruent; data that contributes structure cannot survive all
//! three passes.
//!
//! # Examples
//!
//! ```
//! use guardtext::yaml::Template;
//! use serde_json::json;
//!
//! let mut tmpl = Template::new("greeting");
//! tmpl.parse("{ hello: {{ addressee }} }")?;
//!
//! assert_eq!(tmpl.render(&json!({ "addressee": "world" }))?, "{ hello: world }");
//!
//! let err = tmpl.render(&json!({ "addressee": "world, oops: true" })).unwrap_err();
//! assert!(matches!(err, guardtext::Error::YamlInjection));
//! # Ok::<(), guardtext::Error>(())
//! ```
//!
//! # Annotation markers
//!
//! - `{{ x | StructuralData }}` opts a substitution out of detection: the
//!   value is trusted to shape the document (e.g. data-derived keys).
//! - `{{ f(v=x) | ApplyInjectionDetection }}` opts a function result in.
//!   Function and filter-function results are otherwise outside detection,
//!   as are function call arguments; values reaching the output through
//!   helpers are only checked on request.
//!
//! # Caveats
//!
//! The template is executed several times per [`Template::execute`] call.
//! User filters and functions with observable side effects break the
//! detection guarantee and must not be registered. Data reachable only
//! through non-serialized fields never enters the engine and is therefore
//! out of scope.

use std::io::Write;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::data::contains_special_strings;
use crate::engine::{RenderPolicy, TemplateSet};
use crate::error::{Error, Result};
use crate::files;

mod judge;
mod node;


/// Characters that can carry structure in a YAML document. Data whose
/// strings avoid all of them cannot alter the parse shape, and execution
/// takes a single-pass fast path.
const YAML_SPECIAL_CHARACTERS: &str = "{}[]:,&*#?|-<>=!%@`\"'\\\n\t";

/// A parsed YAML-producing template with automatic injection detection.
///
/// Construction (parsing sources, registering filters and functions) takes
/// `&mut self` and is not thread-safe; a fully-constructed template may be
/// executed from multiple threads concurrently, since every execution
/// builds its own engine state and buffers.
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
    ///
    /// Syntax errors are reported immediately; the rendered output is only
    /// checked against the YAML grammar at execution time.
    pub fn parse(&mut self, text: &str) -> Result<()> {
        self.set.parse(text)
    }

    /// Parses `text` as an associated template, reachable from template
    /// bodies via `{% include %}` and from [`Template::execute_template`].
    /// Associated templates share this template's filters and functions.
    pub fn add_template(&mut self, name: &str, text: &str) -> Result<()> {
        self.set.add_template(name, text)
    }

    /// Creates a template from the named files. The template takes the
    /// base name and contents of the first file; every file is also added
    /// as an associated template under its own base name.
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

    /// Registers a user filter, available in every template of this set.
    ///
    /// Filters must be pure: the template is rendered several times per
    /// execution and a side-effecting filter voids the detection
    /// guarantee.
    pub fn register_filter<F: tera::Filter + 'static>(&mut self, name: &str, filter: F) {
        self.set.register_filter(name, filter);
    }

    /// Registers a user function. The same purity requirement as
    /// [`Template::register_filter`] applies.
    pub fn register_function<F: tera::Function + 'static>(&mut self, name: &str, function: F) {
        self.set.register_function(name, function);
    }

    /// The name of the template.
    pub fn name(&self) -> &str {
        self.set.name()
    }

    /// Returns the associated template with the given name, or `None` if
    /// no template of that name has been defined.
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
    ///
    /// Nothing is written unless the rendering passes the injection check:
    /// the output is buffered, judged, and only then emitted. On failure
    /// the writer is untouched.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidYamlTemplate`] if the template's placeholder
    ///   rendering is not valid YAML (or has non-scalar/duplicate mapping
    ///   keys).
    /// - [`Error::YamlInjection`] if the data changed the structure of the
    ///   output.
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
                "no template {:?} associated with template {:?}{}",
                name,
                self.name(),
                self.defined_templates()
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

        if !contains_special_strings(&value, YAML_SPECIAL_CHARACTERS) {
            tracing::debug!(
                template = self.name(),
                "data carries no YAML-significant characters; single-pass render"
            );
            return self.set.render_raw(&value);
        }

        // Adversarial data may be able to turn comparison or parsing
        // faults into a panic; treat every such fault as an injection.
        match catch_unwind(AssertUnwindSafe(|| self.render_checked(&value))) {
            Ok(result) => result,
            Err(_) => Err(Error::YamlInjection),
        }
    }

    fn render_checked(&self, value: &Value) -> Result<String> {
        let requested = self.set.render_guarded(RenderPolicy::Identity, value)?;
        let baseline = self.set.render_guarded(RenderPolicy::Baseline, value)?;

        let baseline_docs = node::parse_documents(&baseline).map_err(|err| {
            tracing::debug!(template = self.name(), %err, "baseline rendering is not valid YAML");
            Error::InvalidYamlTemplate
        })?;
        judge::validate_documents(&baseline_docs).map_err(|_| Error::InvalidYamlTemplate)?;

        // If the baseline was valid, the honest rendering must also be
        // valid for no injection to have occurred.
        let requested_docs = node::parse_documents(&requested).map_err(|err| {
            tracing::debug!(template = self.name(), %err, "requested rendering is not valid YAML");
            Error::YamlInjection
        })?;

        let mutated = self.set.render_guarded(RenderPolicy::Mutate, value)?;
        let mutated_docs = node::parse_documents(&mutated).map_err(|err| {
            tracing::debug!(template = self.name(), %err, "mutated rendering is not valid YAML");
            Error::YamlInjection
        })?;

        judge::documents_match(&baseline_docs, &requested_docs, &mutated_docs).map_err(
            |mismatch| match mismatch {
                judge::Mismatch::InvalidTemplate => Error::InvalidYamlTemplate,
                judge::Mismatch::Injection => Error::YamlInjection,
            },
        )?;

        Ok(requested)
    }
}
