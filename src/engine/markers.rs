//! Annotation-marker filters and the pass-policy guard filters.
//!
//! The markers (`StructuralData`, `AllowFlags`, `ApplyInjectionDetection`)
//! are registered into every engine instance and are pure identities at
//! render time; their meaning is consumed by the decoration pass in
//! [`super::scanner`]. The guard filters carry the per-pass policy: they
//! are what actually substitutes the placeholder or the mutated string at
//! each data-access site.

use std::collections::HashMap;
use std::sync::Arc;

use tera::{Filter, Function, Tera, Value};

use super::RenderPolicy;
use crate::data::{double_runes, transform_strings};

/// Fixed placeholder substituted at every data-access site during the
/// baseline pass.
pub(crate) const PLACEHOLDER: &str = "baseline";

/// The engine-private guard filter. Applies the pass policy to the value
/// flowing through a data-access site; non-string scalars pass through
/// unchanged, containers are transformed deeply.
pub(crate) struct Guard {
    policy: RenderPolicy,
    /// Prefix `-` to string results under non-identity policies. Installed
    /// at `AllowFlags` sites: a baseline argument that already starts with
    /// `-` disables the flag-injection rule at exactly that position.
    probe_flags: bool,
}

impl Guard {
    pub(crate) fn new(policy: RenderPolicy, probe_flags: bool) -> Self {
        Self { policy, probe_flags }
    }
}

impl Filter for Guard {
    fn filter(&self, value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        let transformed = match self.policy {
            RenderPolicy::Identity => value.clone(),
            RenderPolicy::Baseline => transform_strings(value, &|_| PLACEHOLDER.to_string()),
            RenderPolicy::Mutate => transform_strings(value, &double_runes),
        };

        if self.probe_flags && self.policy != RenderPolicy::Identity {
            if let Value::String(s) = &transformed {
                return Ok(Value::String(format!("-{s}")));
            }
        }
        Ok(transformed)
    }
}

/// Identity filter backing the user-visible annotation markers.
struct Passthrough;

impl Filter for Passthrough {
    fn filter(&self, value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        Ok(value.clone())
    }
}

/// Registers the three annotation markers into `tera`.
pub(crate) fn register_markers(tera: &mut Tera) {
    tera.register_filter("StructuralData", Passthrough);
    tera.register_filter("AllowFlags", Passthrough);
    tera.register_filter("ApplyInjectionDetection", Passthrough);
}

/// Adapter installing a shared user filter into a per-pass engine.
pub(crate) struct SharedFilter(pub(crate) Arc<dyn Filter>);

impl Filter for SharedFilter {
    fn filter(&self, value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
        self.0.filter(value, args)
    }
}

/// Adapter installing a shared user function into a per-pass engine.
pub(crate) struct SharedFunction(pub(crate) Arc<dyn Function>);

impl Function for SharedFunction {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        self.0.call(args)
    }
}
