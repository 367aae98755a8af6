use std::fmt;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures surfaced by the catalog and identity layers.
///
/// Every variant is recovered at the request boundary; none is allowed to
/// take the process down.
#[derive(Debug, Error)]
pub enum Error {
    /// Input rejected before anything was written.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// The record does not exist, or an owner-scoped lookup hid it from
    /// this actor.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Authenticated actor without mutation rights on the record.
    #[error("permission denied: {0}")]
    PermissionDenied(&'static str),

    /// The operation requires a signed-in user.
    #[error("authentication required")]
    Unauthenticated,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-field messages plus whole-form messages, the way an HTML form
/// reports them. The duplicate-book rejection is a form-level error; a
/// missing title is a field-level one.
#[derive(Debug, Clone, Default)]
pub struct ValidationErrors {
    pub fields: Vec<(&'static str, String)>,
    pub form: Vec<String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_field(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.push((field, message.into()));
    }

    pub fn add_form(&mut self, message: impl Into<String>) {
        self.form.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.form.is_empty()
    }

    pub fn field_messages(&self, field: &str) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(move |(name, _)| *name == field)
            .map(|(_, msg)| msg.as_str())
    }

    /// Wrap into an error if anything was recorded.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for message in &self.form {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{message}")?;
            first = false;
        }
        for (field, message) in &self.fields {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{field}: {message}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_errors_pass_through() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }

    #[test]
    fn field_and_form_errors_render() {
        let mut errors = ValidationErrors::new();
        errors.add_form("a book with these authors already exists");
        errors.add_field("title", "this field is required");

        let err = errors.into_result().unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.contains("already exists"));
        assert!(rendered.contains("title: this field is required"));
    }

    #[test]
    fn field_messages_filter_by_name() {
        let mut errors = ValidationErrors::new();
        errors.add_field("title", "too long");
        errors.add_field("description", "this field is required");

        let titles: Vec<&str> = errors.field_messages("title").collect();
        assert_eq!(titles, vec!["too long"]);
    }
}
