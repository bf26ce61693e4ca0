//! JSON Schema validation of backend documents.
//!
//! The backend publishes a Draft 4 schema covering every document kind it
//! emits or accepts. The schema is compiled once per [`crate::entity::Context`]
//! and consulted on every read from, and write-through to, the backend.

use serde_json::Value;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Error type for schema operations.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema document itself does not compile.
    #[error("invalid schema document: {0}")]
    Compile(String),

    /// A document failed validation against the compiled schema.
    #[error("schema violation: {}", violations.join("; "))]
    Violation { violations: Vec<String> },

    /// The schema document could not be obtained.
    #[error("failed to initialize schema validator: {0}")]
    Load(String),
}

/// Result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;

// =============================================================================
// SchemaValidator
// =============================================================================

/// A compiled JSON Schema (Draft 4) validator.
pub struct SchemaValidator {
    validator: jsonschema::Validator,
}

impl SchemaValidator {
    /// Compile a schema document.
    pub fn new(schema: &Value) -> Result<Self> {
        let validator =
            jsonschema::draft4::new(schema).map_err(|e| SchemaError::Compile(e.to_string()))?;
        Ok(Self { validator })
    }

    /// Validate a document, collecting every violation.
    pub fn validate(&self, document: &Value) -> Result<()> {
        let violations = self
            .validator
            .iter_errors(document)
            .map(|e| format!("{}: {}", e.instance_path(), e))
            .collect::<Vec<_>>();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::Violation { violations })
        }
    }

    /// Cheap validity check without violation details.
    pub fn is_valid(&self, document: &Value) -> bool {
        self.validator.is_valid(document)
    }
}
