//! Argument binder: render a binding's template with call arguments

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::registry::MethodBinding;
use super::template::Segment;
use crate::core::{error::BindingArgumentError, types::RenderedRequest};
use crate::decode::{codec::Codec, decoder::conform};

/// Serialize a call argument into the value the binder consumes
pub fn to_argument<T: Serialize + ?Sized>(
    parameter: &str,
    value: &T,
) -> Result<Value, BindingArgumentError> {
    serde_json::to_value(value).map_err(|e| BindingArgumentError::Serialization {
        parameter: parameter.to_string(),
        message: e.to_string(),
    })
}

/// Renders [`MethodBinding`] templates into [`RenderedRequest`]s
#[derive(Clone)]
pub struct ArgumentBinder {
    codec: Arc<dyn Codec>,
}

impl ArgumentBinder {
    /// Create a binder that serializes composite arguments with `codec`
    pub fn new(codec: Arc<dyn Codec>) -> Self {
        Self { codec }
    }

    /// Render the request for one call
    ///
    /// Arguments are positional, in parameter declaration order. Scalars and
    /// strings render as plain text; arrays and objects go through the codec.
    /// Placeholders are substituted in template order and a parameter used
    /// twice renders identically both times. An absent optional argument
    /// renders as `null`, and enumeration members are matched
    /// case-insensitively but rendered as declared.
    pub fn render(
        &self,
        binding: &MethodBinding,
        arguments: &[Value],
    ) -> Result<RenderedRequest, BindingArgumentError> {
        if arguments.len() != binding.params.len() {
            return Err(BindingArgumentError::CountMismatch {
                method: binding.method.clone(),
                expected: binding.params.len(),
                actual: arguments.len(),
            });
        }

        let mut rendered = Vec::with_capacity(arguments.len());
        for (param, argument) in binding.params.iter().zip(arguments) {
            if !param.ty.accepts(argument) {
                return Err(BindingArgumentError::TypeMismatch {
                    method: binding.method.clone(),
                    parameter: param.name.clone(),
                    expected: param.ty.to_string(),
                    actual: json_kind(argument).to_string(),
                });
            }
            // Enumeration members render in their declared spelling
            let canonical = conform(argument.clone(), &param.ty, &param.name)
                .unwrap_or_else(|_| argument.clone());
            rendered.push(self.render_value(&param.name, &canonical)?);
        }

        let mut user = String::with_capacity(binding.template.source().len());
        for segment in binding.template.segments() {
            match segment {
                Segment::Literal(text) => user.push_str(text),
                Segment::Placeholder(name) => {
                    // Resolution guarantees every placeholder names a parameter
                    if let Some(index) = binding.param_index(name) {
                        user.push_str(&rendered[index]);
                    }
                }
            }
        }
        if let Some(instructions) = &binding.format_instructions {
            user.push_str("\n\n");
            user.push_str(instructions);
        }

        Ok(RenderedRequest {
            interface: binding.interface.clone(),
            method: binding.method.clone(),
            system: binding.system.clone(),
            user,
            output_schema: binding.output_schema.clone(),
        })
    }

    fn render_value(&self, parameter: &str, value: &Value) -> Result<String, BindingArgumentError> {
        match value {
            Value::String(text) => Ok(text.clone()),
            Value::Number(number) => Ok(number.to_string()),
            Value::Bool(flag) => Ok(flag.to_string()),
            Value::Null => Ok("null".to_string()),
            Value::Array(_) | Value::Object(_) => self.codec.serialize(value).map_err(|e| {
                BindingArgumentError::Serialization {
                    parameter: parameter.to_string(),
                    message: e.to_string(),
                }
            }),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
