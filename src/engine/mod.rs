//! Marked expansion driving for the detection passes.
//!
//! A [`TemplateSet`] owns the raw sources of a primary template and its
//! associated templates, the user-registered filters and functions, and a
//! freshly minted token that keys the engine-private guard filters. Each
//! execution pass builds its own engine instance: the decorated sources
//! plus a guard filter carrying that pass's policy. Nothing in the set is
//! mutated by rendering, which is what makes concurrent execution of a
//! fully-constructed template safe.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tera::{Context, Filter, Function, Tera};
use uuid::Uuid;

use crate::error::Result;

mod markers;
pub(crate) mod scanner;

pub(crate) use markers::PLACEHOLDER;

use markers::{register_markers, Guard, SharedFilter, SharedFunction};

/// Per-string behavior of one rendering pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenderPolicy {
    /// Every data-access site yields its original value.
    Identity,
    /// Every data-access site yields the fixed placeholder.
    Baseline,
    /// Every data-access site yields its value with each string
    /// code-point-doubled.
    Mutate,
}

/// Raw template sources plus the registries needed to rebuild the engine
/// for each pass.
pub(crate) struct TemplateSet {
    name: String,
    sources: BTreeMap<String, String>,
    token: String,
    filters: BTreeMap<String, Arc<dyn Filter>>,
    functions: BTreeMap<String, Arc<dyn Function>>,
}

impl Clone for TemplateSet {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            sources: self.sources.clone(),
            token: self.token.clone(),
            filters: self.filters.clone(),
            functions: self.functions.clone(),
        }
    }
}

impl fmt::Debug for TemplateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateSet")
            .field("name", &self.name)
            .field("templates", &self.sources.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl TemplateSet {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sources: BTreeMap::new(),
            token: Uuid::new_v4().simple().to_string(),
            filters: BTreeMap::new(),
            functions: BTreeMap::new(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Parses `text` as the body of the primary template.
    pub(crate) fn parse(&mut self, text: &str) -> Result<()> {
        self.add_source(self.name.clone(), text)
    }

    /// Parses `text` as an associated template reachable by `name` (via
    /// `{% include %}` or macro imports) and by `execute_template`.
    pub(crate) fn add_template(&mut self, name: &str, text: &str) -> Result<()> {
        self.add_source(name.to_string(), text)
    }

    fn add_source(&mut self, name: String, text: &str) -> Result<()> {
        // Surface syntax errors at construction time, like the engine's
        // own loading path would.
        let mut probe = Tera::default();
        probe.add_raw_template(&name, text)?;
        self.sources.insert(name, text.to_string());
        Ok(())
    }

    /// A copy of this set whose primary template is `name`.
    pub(crate) fn with_primary(&self, name: &str) -> Option<TemplateSet> {
        if !self.sources.contains_key(name) {
            return None;
        }
        let mut copy = self.clone();
        copy.name = name.to_string();
        Some(copy)
    }

    pub(crate) fn template_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.sources.keys().map(String::as_str)
    }

    pub(crate) fn register_filter<F: Filter + 'static>(&mut self, name: &str, filter: F) {
        self.filters.insert(name.to_string(), Arc::new(filter));
    }

    pub(crate) fn register_function<F: Function + 'static>(&mut self, name: &str, function: F) {
        self.functions.insert(name.to_string(), Arc::new(function));
    }

    /// Renders the decorated template under `policy`.
    pub(crate) fn render_guarded(&self, policy: RenderPolicy, data: &Value) -> Result<String> {
        let tera = self.build_engine(true, policy)?;
        let context = self.context_for(data)?;
        Ok(tera.render(&self.name, &context)?)
    }

    /// Renders the undecorated template: the unsafe engine's own output.
    pub(crate) fn render_raw(&self, data: &Value) -> Result<String> {
        let tera = self.build_engine(false, RenderPolicy::Identity)?;
        let context = self.context_for(data)?;
        Ok(tera.render(&self.name, &context)?)
    }

    fn context_for(&self, data: &Value) -> Result<Context> {
        if data.is_null() {
            return Ok(Context::new());
        }
        Ok(Context::from_value(data.clone())?)
    }

    fn build_engine(&self, decorated: bool, policy: RenderPolicy) -> Result<Tera> {
        let guard_name = format!("__guard_{}", self.token);
        let flag_guard_name = format!("__guard_flags_{}", self.token);

        let mut tera = Tera::default();
        tera.autoescape_on(Vec::new());

        if decorated {
            let sources: Vec<(String, String)> = self
                .sources
                .iter()
                .map(|(name, text)| {
                    let rewritten = scanner::decorate(text, &guard_name, &flag_guard_name);
                    tracing::trace!(template = %name, %rewritten, "decorated template source");
                    (name.clone(), rewritten)
                })
                .collect();
            tera.add_raw_templates(sources)?;
        } else {
            tera.add_raw_templates(
                self.sources
                    .iter()
                    .map(|(name, text)| (name.clone(), text.clone())),
            )?;
        }

        register_markers(&mut tera);
        tera.register_filter(&guard_name, Guard::new(policy, false));
        tera.register_filter(&flag_guard_name, Guard::new(policy, true));

        for (name, filter) in &self.filters {
            tera.register_filter(name, SharedFilter(Arc::clone(filter)));
        }
        for (name, function) in &self.functions {
            tera.register_function(name, SharedFunction(Arc::clone(function)));
        }

        Ok(tera)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn policies_disagree_only_on_data() -> anyhow::Result<()> {
        let mut set = TemplateSet::new("t");
        set.parse("hello {{ name }} end")?;

        let data = json!({ "name": "world" });
        assert_eq!(set.render_guarded(RenderPolicy::Identity, &data)?, "hello world end");
        assert_eq!(
            set.render_guarded(RenderPolicy::Baseline, &data)?,
            format!("hello {PLACEHOLDER} end")
        );
        assert_eq!(set.render_guarded(RenderPolicy::Mutate, &data)?, "hello wwoorrlldd end");
        assert_eq!(set.render_raw(&data)?, "hello world end");
        Ok(())
    }

    #[test]
    fn numbers_are_stable_across_policies() -> anyhow::Result<()> {
        let mut set = TemplateSet::new("t");
        set.parse("n={{ n }}")?;

        let data = json!({ "n": 42 });
        assert_eq!(set.render_guarded(RenderPolicy::Baseline, &data)?, "n=42");
        assert_eq!(set.render_guarded(RenderPolicy::Mutate, &data)?, "n=42");
        Ok(())
    }

    #[test]
    fn structural_data_sites_are_stable() -> anyhow::Result<()> {
        let mut set = TemplateSet::new("t");
        set.parse("k-{{ name | StructuralData }}: {{ age }}")?;

        let data = json!({ "name": "bla", "age": 7 });
        assert_eq!(set.render_guarded(RenderPolicy::Baseline, &data)?, "k-bla: 7");
        Ok(())
    }

    #[test]
    fn flag_guard_prefixes_dash_in_probe_passes() -> anyhow::Result<()> {
        let mut set = TemplateSet::new("t");
        set.parse("cat {{ p | AllowFlags }}")?;

        let data = json!({ "p": "-r" });
        assert_eq!(
            set.render_guarded(RenderPolicy::Baseline, &data)?,
            format!("cat -{PLACEHOLDER}")
        );
        assert_eq!(set.render_guarded(RenderPolicy::Identity, &data)?, "cat -r");
        Ok(())
    }

    #[test]
    fn associated_templates_render_through_include() -> anyhow::Result<()> {
        let mut set = TemplateSet::new("outer");
        set.add_template("inner", "[{{ x }}]")?;
        set.parse("pre {% include \"inner\" %} post")?;

        let data = json!({ "x": "v" });
        assert_eq!(set.render_guarded(RenderPolicy::Baseline, &data)?, format!("pre [{PLACEHOLDER}] post"));
        Ok(())
    }

    #[test]
    fn syntax_errors_surface_at_parse() {
        let mut set = TemplateSet::new("t");
        assert!(set.parse("{{ unclosed").is_err());
    }
}
