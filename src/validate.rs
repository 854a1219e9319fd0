//! Bridge to the `validator` crate (feature `validator`).
//!
//! An options type deriving `validator::Validate` can forward its
//! [`Options::validate`](crate::Options::validate) to [`run`]:
//!
//! ```ignore
//! #[derive(Validate, Serialize, Deserialize, Default, Clone)]
//! struct ServeOptions {
//!     #[validate(range(min = 1))]
//!     port: u16,
//! }
//!
//! impl Options for ServeOptions {
//!     fn schema() -> Schema { /* ... */ }
//!     fn validate(&self, _: &Directives) -> Vec<BoxError> {
//!         structcli::validate::run(self)
//!     }
//! }
//! ```
//!
//! Each failed rule becomes one [`FieldError`], so every violation ends up in
//! the aggregated [`ValidationError`](crate::ValidationError).

use std::fmt;

use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::error::BoxError;

/// One failed validation rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted path of the field, with list indices as `tags[2]`.
    pub field: String,
    /// Rule code, e.g. `range` or `email`.
    pub code: String,
    pub message: String,
    /// Rule parameters other than the offending value, as `key: value` pairs.
    pub params: Option<String>,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field `{}` failed validation: {}", self.field, self.message)?;
        if let Some(params) = &self.params {
            write!(f, " ({params})")?;
        }
        Ok(())
    }
}

impl std::error::Error for FieldError {}

#[cfg(feature = "rich-errors")]
impl miette::Diagnostic for FieldError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new("structcli::field_validation"))
    }
}

impl FieldError {
    fn from_rule(field: String, error: &validator::ValidationError) -> Self {
        let message = error
            .message
            .as_ref()
            .map_or_else(|| format!("validation failed: {}", error.code), |m| m.to_string());
        let mut params: Vec<String> = error
            .params
            .iter()
            .filter(|(k, _)| *k != "value")
            .map(|(k, v)| format!("{k}: {v}"))
            .collect();
        params.sort();
        Self {
            field,
            code: error.code.to_string(),
            message,
            params: (!params.is_empty()).then(|| params.join(", ")),
        }
    }
}

/// Flatten `errors` into field errors, sorted by field path.
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut out = Vec::new();
    collect(errors, "", &mut out);
    out.sort_by(|a, b| a.field.cmp(&b.field));
    out
}

fn collect(errors: &ValidationErrors, prefix: &str, out: &mut Vec<FieldError>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(rules) => {
                out.extend(rules.iter().map(|e| FieldError::from_rule(path.clone(), e)));
            }
            ValidationErrorsKind::Struct(nested) => collect(nested, &path, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect(nested, &format!("{path}[{index}]"), out);
                }
            }
        }
    }
}

/// Run `value`'s `validator` rules, one boxed error per failed rule.
pub fn run<T: Validate>(value: &T) -> Vec<BoxError> {
    match value.validate() {
        Ok(()) => Vec::new(),
        Err(errors) => field_errors(&errors)
            .into_iter()
            .map(|e| Box::new(e) as BoxError)
            .collect(),
    }
}
