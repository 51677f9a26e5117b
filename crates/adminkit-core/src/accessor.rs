// ── Field accessors ──
//
// How a display value is read off a record: a field path, an arbitrary
// function, or a text template. Resolved once at configuration time --
// widgets hold a concrete variant, not a dynamically-shaped prop.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::record::Record;

/// Strategy for deriving a display value from a record.
#[derive(Clone)]
pub enum FieldAccessor {
    /// Read a dot-separated field path (`"author.name"`).
    Path(String),
    /// Compute the value with an arbitrary function.
    Compute(Arc<dyn Fn(&Record) -> Option<Value> + Send + Sync>),
    /// Interpolate `{field}` placeholders (`"{last_name}, {first_name}"`).
    /// Unresolvable placeholders render empty.
    Template(String),
}

impl FieldAccessor {
    pub fn path(path: impl Into<String>) -> Self {
        Self::Path(path.into())
    }

    pub fn compute(f: impl Fn(&Record) -> Option<Value> + Send + Sync + 'static) -> Self {
        Self::Compute(Arc::new(f))
    }

    pub fn template(template: impl Into<String>) -> Self {
        Self::Template(template.into())
    }

    /// Resolve against a record.
    pub fn resolve(&self, record: &Record) -> Option<Value> {
        match self {
            Self::Path(path) => record.get_path(path).cloned(),
            Self::Compute(f) => f(record),
            Self::Template(template) => Some(Value::from(render_template(template, record))),
        }
    }

    /// Resolve to display text. JSON strings render bare (no quotes);
    /// other scalars render via their JSON form.
    pub fn resolve_text(&self, record: &Record) -> Option<String> {
        self.resolve(record).map(|value| match value {
            Value::String(s) => s,
            other => other.to_string(),
        })
    }
}

impl fmt::Debug for FieldAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Compute(_) => f.debug_tuple("Compute").field(&"<fn>").finish(),
            Self::Template(template) => f.debug_tuple("Template").field(template).finish(),
        }
    }
}

fn render_template(template: &str, record: &Record) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                let path = &after[..close];
                if let Some(value) = record.get_path(path) {
                    match value {
                        Value::String(s) => out.push_str(s),
                        other => out.push_str(&other.to_string()),
                    }
                }
                rest = &after[close + 1..];
            }
            None => {
                // Unclosed brace: emit literally and stop scanning.
                out.push_str(&rest[open..]);
                return out;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn book() -> Record {
        Record::from_value(json!({
            "id": 1,
            "title": "Dune",
            "year": 1965,
            "author": {"name": "Frank Herbert"}
        }))
        .unwrap()
    }

    #[test]
    fn path_accessor_reads_nested_fields() {
        let accessor = FieldAccessor::path("author.name");
        assert_eq!(accessor.resolve_text(&book()), Some("Frank Herbert".into()));
    }

    #[test]
    fn compute_accessor_runs_the_function() {
        let accessor = FieldAccessor::compute(|record| {
            let title = record.get("title")?.as_str()?;
            let year = record.get("year")?.as_i64()?;
            Some(Value::from(format!("{title} ({year})")))
        });
        assert_eq!(accessor.resolve_text(&book()), Some("Dune (1965)".into()));
    }

    #[test]
    fn template_accessor_interpolates_placeholders() {
        let accessor = FieldAccessor::template("{title} by {author.name}");
        assert_eq!(
            accessor.resolve_text(&book()),
            Some("Dune by Frank Herbert".into())
        );
    }

    #[test]
    fn template_renders_missing_placeholders_empty() {
        let accessor = FieldAccessor::template("{title}{missing}");
        assert_eq!(accessor.resolve_text(&book()), Some("Dune".into()));
    }

    #[test]
    fn template_leaves_unclosed_braces_literal() {
        let accessor = FieldAccessor::template("{title} {oops");
        assert_eq!(accessor.resolve_text(&book()), Some("Dune {oops".into()));
    }

    #[test]
    fn non_string_values_render_via_json() {
        let accessor = FieldAccessor::path("year");
        assert_eq!(accessor.resolve_text(&book()), Some("1965".into()));
    }
}
