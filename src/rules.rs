//! Validation rule vocabulary.
//!
//! Observed validation rules arrive as flat token lists such as
//! `["required", "min:2", "regex:/[0-9]+/"]`. This module answers the questions
//! the schema compiler asks about such a list: which scalar type it implies,
//! whether the field may be null, which bounds and format it carries.
//!
//! Unknown tokens are never an error; they simply match nothing and the
//! defaults (a nullable `string`) apply.

use crate::schema_generator::{Bound, SchemaType};

/// The data types a rule list can imply, in the order they are tested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Integer,
    /// Fixed two-decimal number (`digits:2`)
    Double,
    Float,
    DateTime,
    FormattedDateTime,
    Boolean,
    Array,
    Object,
    Password,
    String,
}

impl DataType {
    /// The OpenAPI type this data type is rendered as.
    pub fn schema_type(self) -> SchemaType {
        match self {
            DataType::Integer => SchemaType::Integer,
            DataType::Double | DataType::Float => SchemaType::Number,
            DataType::Boolean => SchemaType::Boolean,
            DataType::Array => SchemaType::Array,
            DataType::Object => SchemaType::Object,
            DataType::DateTime
            | DataType::FormattedDateTime
            | DataType::Password
            | DataType::String => SchemaType::String,
        }
    }
}

/// Read-only view over the rule tokens of one property path.
#[derive(Debug, Clone, Copy)]
pub struct RuleSet<'a> {
    tokens: &'a [String],
}

impl<'a> RuleSet<'a> {
    pub fn new(tokens: &'a [String]) -> Self {
        Self { tokens }
    }

    /// Whether any token matches `pattern`.
    ///
    /// Patterns without `*` match a token exactly; `*` matches any run of
    /// characters, so `required*` matches `required_if:foo,bar`.
    pub fn has(&self, pattern: &str) -> bool {
        self.find(pattern).is_some()
    }

    /// The first token matching `pattern`.
    pub fn find(&self, pattern: &str) -> Option<&'a str> {
        self.tokens
            .iter()
            .map(String::as_str)
            .find(|token| matches_pattern(pattern, token))
    }

    /// Classifies the rule list; the first matching rule wins.
    pub fn data_type(&self) -> DataType {
        if self.has("int") || self.has("integer") || self.has("digits:0") {
            DataType::Integer
        } else if self.has("digits:2") {
            DataType::Double
        } else if self.has("numeric") {
            DataType::Float
        } else if self.has("date") {
            DataType::DateTime
        } else if self.has("date_format:*") {
            DataType::FormattedDateTime
        } else if self.has("bool") || self.has("boolean") {
            DataType::Boolean
        } else if self.has("array") {
            DataType::Array
        } else if self.has("json") {
            DataType::Object
        } else if self.has("password") {
            DataType::Password
        } else {
            DataType::String
        }
    }

    /// A field is nullable when marked so, or when nothing requires it.
    pub fn is_nullable(&self) -> bool {
        self.has("nullable") || (!self.has("required*") && !self.has("exclude*"))
    }

    pub fn is_required(&self) -> bool {
        !self.is_nullable()
    }

    pub fn is_array(&self) -> bool {
        self.has("array")
    }

    pub fn is_email(&self) -> bool {
        self.has("email*")
    }

    /// Value of the first `min:<n>` token.
    pub fn min(&self) -> Option<Bound> {
        self.bound("min:")
    }

    /// Value of the first `max:<n>` token.
    pub fn max(&self) -> Option<Bound> {
        self.bound("max:")
    }

    /// Bounds are lengths (integers) for strings and arrays, magnitudes otherwise.
    /// A zero bound carries no constraint and is dropped.
    fn bound(&self, prefix: &str) -> Option<Bound> {
        let raw = self
            .tokens
            .iter()
            .find_map(|token| token.strip_prefix(prefix))?
            .trim();

        match self.data_type().schema_type() {
            SchemaType::String | SchemaType::Array => raw
                .parse::<i64>()
                .ok()
                .or_else(|| {
                    raw.parse::<f64>()
                        .ok()
                        .filter(|value| value.is_finite())
                        .map(|value| value.trunc() as i64)
                })
                .filter(|value| *value != 0)
                .map(Bound::Integer),
            _ => raw
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite() && *value != 0.0)
                .map(Bound::Float),
        }
    }

    /// `email` when an email rule is present, otherwise the inner regex pattern.
    pub fn format(&self) -> Option<String> {
        if self.is_email() {
            return Some("email".to_string());
        }

        self.regex_pattern()
    }

    /// The pattern of a `regex:<d>pattern<d>` rule with its delimiters removed.
    pub fn regex_pattern(&self) -> Option<String> {
        let expression = self.find("regex:*")?.split_once(':')?.1;
        let delimiter = expression.chars().next()?;
        let body = &expression[delimiter.len_utf8()..];

        // Anything after the closing delimiter is a modifier list and is dropped.
        let pattern = match body.rfind(delimiter) {
            Some(end) => &body[..end],
            None => body,
        };

        if pattern.is_empty() {
            None
        } else {
            Some(pattern.to_string())
        }
    }
}

/// Token match where a trailing `*` accepts any suffix: `required*`, `date_format:*`.
pub fn matches_pattern(pattern: &str, value: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => value.starts_with(prefix),
        None => pattern == value,
    }
}
