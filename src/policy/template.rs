use std::path::Path;

use serde_json::Value;

use super::PolicyError;

/// Values substituted into policy resources.
///
/// Templates written for Zappa deployments use `{zappa_bucket}` and
/// `{AWS_ACCOUNT_ID}`; both are accepted alongside `{bucket}` and `{account_id}`.
#[derive(Debug, Clone, Copy)]
pub struct Placeholders<'a> {
    pub bucket: &'a str,
    pub role_name: &'a str,
    pub account_id: &'a str,
}

impl Placeholders<'_> {
    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            "bucket" | "zappa_bucket" => Some(self.bucket),
            "role_name" => Some(self.role_name),
            "account_id" | "AWS_ACCOUNT_ID" => Some(self.account_id),
            _ => None,
        }
    }
}

/// A policy document whose statement resources may contain `{placeholder}`s.
#[derive(Debug, Clone)]
pub struct PolicyTemplate {
    document: Value,
}

impl PolicyTemplate {
    pub fn from_file(path: &Path) -> Result<Self, PolicyError> {
        let content = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, PolicyError> {
        Self::from_value(serde_json::from_str(content)?)
    }

    /// Requires an object with a `Statement` array of objects.
    pub fn from_value(document: Value) -> Result<Self, PolicyError> {
        let statements = document
            .get("Statement")
            .and_then(Value::as_array)
            .ok_or_else(|| PolicyError::Template("missing 'Statement' array".to_string()))?;

        if let Some(index) = statements.iter().position(|s| !s.is_object()) {
            return Err(PolicyError::Template(format!(
                "statement {index} is not an object"
            )));
        }

        Ok(Self { document })
    }

    /// Render the document, substituting placeholders in every `Resource`.
    ///
    /// Everything outside `Statement[].Resource` is copied unchanged.
    pub fn render(&self, placeholders: &Placeholders<'_>) -> Value {
        let mut document = self.document.clone();

        let statements = document
            .get_mut("Statement")
            .and_then(Value::as_array_mut)
            .into_iter()
            .flatten();

        for statement in statements {
            match statement.get_mut("Resource") {
                Some(Value::Array(resources)) => {
                    for resource in resources {
                        if let Value::String(s) = resource {
                            *s = render_resource(s, placeholders);
                        }
                    }
                }
                Some(Value::String(s)) => *s = render_resource(s, placeholders),
                _ => {}
            }
        }

        document
    }
}

/// Substitute placeholders in a single resource string.
///
/// `{{` and `}}` produce literal braces. A resource referencing an unknown
/// placeholder, or with unbalanced braces, is returned verbatim.
pub fn render_resource(resource: &str, placeholders: &Placeholders<'_>) -> String {
    match substitute(resource, placeholders) {
        Some(rendered) => rendered,
        None => {
            tracing::debug!(resource, "Leaving resource with unresolved placeholder unchanged");
            resource.to_string()
        }
    }
}

fn substitute(resource: &str, placeholders: &Placeholders<'_>) -> Option<String> {
    let mut out = String::with_capacity(resource.len());
    let mut chars = resource.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next()? {
                        '}' => break,
                        c => name.push(c),
                    }
                }
                out.push_str(placeholders.lookup(&name)?);
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return None,
            c => out.push(c),
        }
    }

    Some(out)
}
