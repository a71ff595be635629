//! Jinja rendering of snapshot definition files
//!
//! Definition files are rendered before YAML parsing so any field can be
//! driven by `var()`:
//!
//! ```yaml
//! snapshots:
//!   - name: customers_snapshot
//!     source: "{{ var('seed_name', 'seed') }}"
//!     invalidate_hard_deletes: {{ var('invalidate_hard_deletes', false) }}
//! ```

use crate::error::{CoreError, CoreResult};
use minijinja::{Environment, Error, ErrorKind, Value};
use std::collections::HashMap;
use std::path::Path;

/// Renders definition files with a fixed set of variables
pub struct TemplateRenderer {
    env: Environment<'static>,
}

impl TemplateRenderer {
    /// Create a renderer exposing `vars` through `var(name, default)`
    pub fn new(vars: &HashMap<String, serde_yaml::Value>) -> Self {
        let mut env = Environment::new();
        let values: HashMap<String, Value> = vars
            .iter()
            .map(|(k, v)| (k.clone(), Value::from_serialize(v)))
            .collect();
        env.add_function("var", make_var_fn(values));
        Self { env }
    }

    /// Render a template, attributing failures to `path`
    pub fn render(&self, template: &str, path: &Path) -> CoreResult<String> {
        self.env
            .render_str(template, ())
            .map_err(|e| CoreError::TemplateError {
                path: path.display().to_string(),
                message: e.to_string(),
            })
    }
}

/// Create the var() function
///
/// ```jinja
/// {{ var('seed_name') }}
/// {{ var('missing', 'default_value') }}
/// ```
fn make_var_fn(
    vars: HashMap<String, Value>,
) -> impl Fn(&str, Option<Value>) -> Result<Value, Error> + Send + Sync + Clone + 'static {
    move |name: &str, default: Option<Value>| {
        if let Some(value) = vars.get(name) {
            Ok(value.clone())
        } else if let Some(default_val) = default {
            Ok(default_val)
        } else {
            Err(Error::new(
                ErrorKind::UndefinedError,
                format!("Variable '{}' is not defined and no default provided", name),
            ))
        }
    }
}
