//! Configuration validation utilities.
//!
//! Backends receive their settings as raw TOML tables. Each one declares a
//! [`Schema`] describing required and optional fields and checks its table
//! before constructing anything, so a typo in a config file is reported with
//! the offending field path instead of surfacing later as a connection error.

use thiserror::Error;

/// Errors that can occur during configuration validation.
#[derive(Debug, Error)]
pub enum ValidationError {
	/// Error that occurs when a required field is missing.
	#[error("Missing required field: {0}")]
	MissingField(String),
	/// Error that occurs when a field has an invalid value.
	#[error("Invalid value for field '{field}': {message}")]
	InvalidValue { field: String, message: String },
	/// Error that occurs when field type is incorrect.
	#[error("Type mismatch for field '{field}': expected {expected}, got {actual}")]
	TypeMismatch {
		field: String,
		expected: String,
		actual: String,
	},
	/// Error that occurs when deserialization fails.
	#[error("Failed to deserialize config: {0}")]
	DeserializationError(String),
}

impl ValidationError {
	/// Prefixes the field path with `parent`, used when descending into tables.
	fn nested_under(self, parent: &str) -> Self {
		match self {
			ValidationError::MissingField(f) => {
				ValidationError::MissingField(format!("{}.{}", parent, f))
			},
			ValidationError::InvalidValue { field, message } => ValidationError::InvalidValue {
				field: format!("{}.{}", parent, field),
				message,
			},
			ValidationError::TypeMismatch {
				field,
				expected,
				actual,
			} => ValidationError::TypeMismatch {
				field: format!("{}.{}", parent, field),
				expected,
				actual,
			},
			other => other,
		}
	}
}

/// The expected type of a configuration field.
#[derive(Debug)]
pub enum FieldType {
	String,
	/// An integer value with optional inclusive bounds.
	Integer { min: Option<i64>, max: Option<i64> },
	/// A number written either as an integer or a float literal.
	Number,
	Boolean,
	/// An array of values, all of the same type.
	Array(Box<FieldType>),
	/// A nested table with its own schema.
	Table(Schema),
}

impl FieldType {
	fn name(&self) -> &'static str {
		match self {
			FieldType::String => "string",
			FieldType::Integer { .. } => "integer",
			FieldType::Number => "number",
			FieldType::Boolean => "boolean",
			FieldType::Array(_) => "array",
			FieldType::Table(_) => "table",
		}
	}
}

/// Custom check run after the type check succeeds.
pub type FieldValidator = Box<dyn Fn(&toml::Value) -> Result<(), String> + Send + Sync>;

/// A named field in a configuration schema.
pub struct Field {
	pub name: String,
	pub field_type: FieldType,
	pub validator: Option<FieldValidator>,
}

impl std::fmt::Debug for Field {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Field")
			.field("name", &self.name)
			.field("field_type", &self.field_type)
			.field("validator", &self.validator.is_some())
			.finish()
	}
}

impl Field {
	/// Creates a new field with the given name and type.
	pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			name: name.into(),
			field_type,
			validator: None,
		}
	}

	/// Adds a custom validator to this field.
	///
	/// The closure receives the field's value and returns an error message
	/// if the value is unacceptable.
	pub fn with_validator<F>(mut self, validator: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<(), String> + Send + Sync + 'static,
	{
		self.validator = Some(Box::new(validator));
		self
	}

	fn check(&self, value: &toml::Value) -> Result<(), ValidationError> {
		validate_field_type(&self.name, value, &self.field_type)?;
		if let Some(validator) = &self.validator {
			validator(value).map_err(|message| ValidationError::InvalidValue {
				field: self.name.clone(),
				message,
			})?;
		}
		Ok(())
	}
}

/// Validation schema for a TOML table.
#[derive(Debug)]
pub struct Schema {
	pub required: Vec<Field>,
	pub optional: Vec<Field>,
}

impl Schema {
	/// Creates a new schema with required and optional fields.
	pub fn new(required: Vec<Field>, optional: Vec<Field>) -> Self {
		Self { required, optional }
	}

	/// Validates a TOML value against this schema.
	///
	/// Required fields must be present. Optional fields are checked only when
	/// present. Unknown keys are ignored.
	///
	/// # Errors
	///
	/// Returns the first missing field, type mismatch or failed custom
	/// validator, with nested field paths joined by `.`.
	pub fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let table = config
			.as_table()
			.ok_or_else(|| ValidationError::TypeMismatch {
				field: "root".to_string(),
				expected: "table".to_string(),
				actual: config.type_str().to_string(),
			})?;

		for field in &self.required {
			let value = table
				.get(&field.name)
				.ok_or_else(|| ValidationError::MissingField(field.name.clone()))?;
			field.check(value)?;
		}

		for field in &self.optional {
			if let Some(value) = table.get(&field.name) {
				field.check(value)?;
			}
		}

		Ok(())
	}
}

fn type_mismatch(field_name: &str, expected: &FieldType, value: &toml::Value) -> ValidationError {
	ValidationError::TypeMismatch {
		field: field_name.to_string(),
		expected: expected.name().to_string(),
		actual: value.type_str().to_string(),
	}
}

/// Validates that a value matches the expected field type, recursing into
/// arrays and nested tables.
fn validate_field_type(
	field_name: &str,
	value: &toml::Value,
	expected_type: &FieldType,
) -> Result<(), ValidationError> {
	match expected_type {
		FieldType::String if !value.is_str() => {
			return Err(type_mismatch(field_name, expected_type, value));
		},
		FieldType::Boolean if !value.is_bool() => {
			return Err(type_mismatch(field_name, expected_type, value));
		},
		FieldType::Number if !(value.is_integer() || value.is_float()) => {
			return Err(type_mismatch(field_name, expected_type, value));
		},
		FieldType::Integer { min, max } => {
			let int_val = value
				.as_integer()
				.ok_or_else(|| type_mismatch(field_name, expected_type, value))?;

			if let Some(min_val) = min.filter(|m| int_val < *m) {
				return Err(ValidationError::InvalidValue {
					field: field_name.to_string(),
					message: format!("Value {} is less than minimum {}", int_val, min_val),
				});
			}
			if let Some(max_val) = max.filter(|m| int_val > *m) {
				return Err(ValidationError::InvalidValue {
					field: field_name.to_string(),
					message: format!("Value {} is greater than maximum {}", int_val, max_val),
				});
			}
		},
		FieldType::Array(inner_type) => {
			let array = value
				.as_array()
				.ok_or_else(|| type_mismatch(field_name, expected_type, value))?;

			for (i, item) in array.iter().enumerate() {
				validate_field_type(&format!("{}[{}]", field_name, i), item, inner_type)?;
			}
		},
		FieldType::Table(schema) => {
			schema
				.validate(value)
				.map_err(|e| e.nested_under(field_name))?;
		},
		_ => {},
	}

	Ok(())
}

/// Reusable field validators.
pub mod validators {
	/// Rejects empty or whitespace-only strings.
	pub fn non_empty(value: &toml::Value) -> Result<(), String> {
		match value.as_str() {
			Some(s) if !s.trim().is_empty() => Ok(()),
			_ => Err("must not be empty".to_string()),
		}
	}

	/// Accepts only `http://` and `https://` URLs.
	pub fn http_url(value: &toml::Value) -> Result<(), String> {
		let s = value.as_str().unwrap_or_default();
		if s.starts_with("http://") || s.starts_with("https://") {
			Ok(())
		} else {
			Err(format!("'{}' is not an http(s) URL", s))
		}
	}

	/// Accepts only `postgres://` and `postgresql://` connection strings.
	pub fn postgres_url(value: &toml::Value) -> Result<(), String> {
		let s = value.as_str().unwrap_or_default();
		if s.starts_with("postgres://") || s.starts_with("postgresql://") {
			Ok(())
		} else {
			Err("must be a postgres:// connection string".to_string())
		}
	}

	/// Accepts plain SQL identifiers (`[A-Za-z_][A-Za-z0-9_]*`).
	///
	/// Table names are interpolated into SQL text, so nothing else may pass.
	pub fn sql_identifier(value: &toml::Value) -> Result<(), String> {
		let s = value.as_str().unwrap_or_default();
		let mut chars = s.chars();
		let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
			&& chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
		if valid {
			Ok(())
		} else {
			Err(format!("'{}' is not a valid identifier", s))
		}
	}
}

/// A configuration schema that can validate TOML values.
///
/// Each backend returns one from its `config_schema()` so callers can
/// validate a table before handing it to the factory.
pub trait ConfigSchema: Send + Sync {
	/// Validates a TOML configuration value against this schema.
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError>;
}
