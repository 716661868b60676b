//! Builder API for declaring LLM-backed interfaces
//!
//! Declarations are plain data: nothing is parsed or checked until the
//! binding registry resolves a method for the first time.

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

use crate::core::types::TypeDescriptor;

/// Where a parameter or return type description comes from
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSource {
    /// A schemars root schema, serialized to JSON
    Schema(Value),
    /// A hand-built descriptor
    Descriptor(TypeDescriptor),
}

impl TypeSource {
    /// Generate the source for a Rust type
    pub fn of<T: JsonSchema + ?Sized>() -> Self {
        // RootSchema is plain data; serializing it cannot fail
        let schema = serde_json::to_value(schema_for!(T)).unwrap_or(Value::Null);
        TypeSource::Schema(schema)
    }
}

/// A declared method parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDeclaration {
    /// Name used by template placeholders
    pub name: String,
    /// Declared type
    pub ty: TypeSource,
}

/// A method whose calls are served by a model
///
/// # Example
///
/// ```rust
/// use llm_mapper::MethodDeclaration;
///
/// let method = MethodDeclaration::new("summarize")
///     .param::<String>("text")
///     .user_message("Summarize: {text}")
///     .returns::<String>();
/// assert_eq!(method.name, "summarize");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDeclaration {
    /// Method name, unique within the interface
    pub name: String,
    /// Parameters in declaration order
    pub params: Vec<ParamDeclaration>,
    /// User message template
    pub user_message: Option<String>,
    /// Overrides the interface-level system message
    pub system_message: Option<String>,
    /// Declared return type
    pub returns: TypeSource,
}

impl MethodDeclaration {
    /// Create a method returning text, with no parameters
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            user_message: None,
            system_message: None,
            returns: TypeSource::Descriptor(TypeDescriptor::String),
        }
    }

    /// Set the user message template
    pub fn user_message(mut self, template: impl Into<String>) -> Self {
        self.user_message = Some(template.into());
        self
    }

    /// Set a method-specific system message
    pub fn system_message(mut self, message: impl Into<String>) -> Self {
        self.system_message = Some(message.into());
        self
    }

    /// Append a parameter typed by a Rust type
    pub fn param<T: JsonSchema + ?Sized>(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamDeclaration {
            name: name.into(),
            ty: TypeSource::of::<T>(),
        });
        self
    }

    /// Append a parameter with an explicit descriptor
    pub fn param_descriptor(mut self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.params.push(ParamDeclaration {
            name: name.into(),
            ty: TypeSource::Descriptor(ty),
        });
        self
    }

    /// Set the return type from a Rust type
    pub fn returns<T: JsonSchema + ?Sized>(mut self) -> Self {
        self.returns = TypeSource::of::<T>();
        self
    }

    /// Set the return type from an explicit descriptor
    pub fn returns_descriptor(mut self, ty: TypeDescriptor) -> Self {
        self.returns = TypeSource::Descriptor(ty);
        self
    }
}

/// An interface grouping LLM-backed methods
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDeclaration {
    /// Interface identity; bindings are cached per (interface, method)
    pub name: String,
    /// System message sent with every method of the interface
    pub system_message: Option<String>,
    /// Default model for every method of the interface
    pub model: Option<String>,
    /// Declared methods
    pub methods: Vec<MethodDeclaration>,
}

impl InterfaceDeclaration {
    /// Create an empty interface
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            system_message: None,
            model: None,
            methods: Vec::new(),
        }
    }

    /// Set the system message
    pub fn system_message(mut self, message: impl Into<String>) -> Self {
        self.system_message = Some(message.into());
        self
    }

    /// Set the default model
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Add a method
    pub fn method(mut self, method: MethodDeclaration) -> Self {
        self.methods.push(method);
        self
    }

    /// Interface name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All declarations with the given method name
    pub fn methods_named<'a>(
        &'a self,
        method: &'a str,
    ) -> impl Iterator<Item = &'a MethodDeclaration> + 'a {
        self.methods.iter().filter(move |m| m.name == method)
    }
}
