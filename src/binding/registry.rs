//! Binding registry: resolve method declarations once, share them forever

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock, RwLock};

use serde_json::Value;
use tracing::{debug, warn};

use super::declaration::{InterfaceDeclaration, MethodDeclaration, TypeSource};
use super::schema::describe_schema;
use super::template::RequestTemplate;
use crate::core::{
    config::ResolveOptions,
    error::BindingError,
    types::{DecodeStrategy, TypeDescriptor},
};

/// A resolved parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamBinding {
    /// Name used by template placeholders
    pub name: String,
    /// Declared shape
    pub ty: TypeDescriptor,
}

/// Immutable, shareable description of one LLM-backed method
#[derive(Debug, Clone, PartialEq)]
pub struct MethodBinding {
    /// Owning interface
    pub interface: String,
    /// Method name
    pub method: String,
    /// Parameters in declaration order
    pub params: Vec<ParamBinding>,
    /// Parsed user message template
    pub template: RequestTemplate,
    /// Effective system message
    pub system: Option<String>,
    /// Interface-level default model
    pub model: Option<String>,
    /// Declared return shape
    pub return_type: TypeDescriptor,
    /// Decoding strategy for the return shape
    pub strategy: DecodeStrategy,
    /// JSON Schema of the return type, for structured returns
    pub output_schema: Option<Value>,
    /// Text appended to the user message to steer the output format
    pub format_instructions: Option<String>,
}

impl MethodBinding {
    /// Index of a parameter by name
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }
}

/// Key of a cached binding
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingKey {
    /// Interface name
    pub interface: String,
    /// Method name
    pub method: String,
}

impl BindingKey {
    /// Create a key
    pub fn new(interface: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            method: method.into(),
        }
    }
}

/// The declaration a cached binding was built from
#[derive(Debug)]
struct DeclarationOrigin {
    system_message: Option<String>,
    model: Option<String>,
    methods: Vec<MethodDeclaration>,
}

impl DeclarationOrigin {
    fn capture(interface: &InterfaceDeclaration, method: &str) -> Self {
        Self {
            system_message: interface.system_message.clone(),
            model: interface.model.clone(),
            methods: interface.methods_named(method).cloned().collect(),
        }
    }

    fn matches(&self, interface: &InterfaceDeclaration, method: &str) -> bool {
        self.system_message == interface.system_message
            && self.model == interface.model
            && self.methods.iter().eq(interface.methods_named(method))
    }
}

struct CachedBinding {
    origin: DeclarationOrigin,
    result: Result<Arc<MethodBinding>, BindingError>,
}

type BindingCell = Arc<OnceLock<CachedBinding>>;

/// Process-wide cache of resolved method bindings
///
/// Each key is parsed at most once: concurrent first resolutions of the same
/// key wait on a single initializer and all observe the same `Arc`. The map
/// lock is only held to look up or insert the per-key cell, never while
/// parsing. Failed resolutions are cached as well.
///
/// Keys are `(interface name, method name)`. A later declaration that reuses
/// a cached key but differs from the one it was resolved from is rejected
/// with [`BindingError::ConflictingDeclaration`].
pub struct BindingRegistry {
    options: ResolveOptions,
    cells: RwLock<HashMap<BindingKey, BindingCell>>,
}

impl BindingRegistry {
    /// Create a registry with default resolution policy
    pub fn new() -> Self {
        Self::with_options(ResolveOptions::default())
    }

    /// Create a registry with a specific resolution policy
    pub fn with_options(options: ResolveOptions) -> Self {
        Self {
            options,
            cells: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry
    pub fn global() -> Arc<BindingRegistry> {
        static GLOBAL: OnceLock<Arc<BindingRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(BindingRegistry::new())).clone()
    }

    /// Resolution policy in effect
    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Resolve `method` of `interface`, parsing it on first use
    pub fn resolve(
        &self,
        interface: &InterfaceDeclaration,
        method: &str,
    ) -> Result<Arc<MethodBinding>, BindingError> {
        let key = BindingKey::new(interface.name(), method);
        let cell = self.cell(&key);
        let cached = cell.get_or_init(|| {
            debug!(interface = %key.interface, method = %key.method, "resolving method binding");
            let result = build_binding(interface, method, &self.options).map(Arc::new);
            if let Err(err) = &result {
                warn!(error = %err, "method binding rejected");
            }
            CachedBinding {
                origin: DeclarationOrigin::capture(interface, method),
                result,
            }
        });
        if !cached.origin.matches(interface, method) {
            warn!(
                interface = %key.interface,
                method = %key.method,
                "a different declaration was already resolved under this name"
            );
            return Err(BindingError::ConflictingDeclaration {
                interface: key.interface,
                method: key.method,
            });
        }
        cached.result.clone()
    }

    /// Whether a key has been resolved (successfully or not)
    pub fn contains(&self, interface: &str, method: &str) -> bool {
        let key = BindingKey::new(interface, method);
        let cells = self.cells.read().unwrap_or_else(|e| e.into_inner());
        cells.get(&key).is_some_and(|cell| cell.get().is_some())
    }

    /// Number of cached keys
    pub fn len(&self) -> usize {
        self.cells.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cell(&self, key: &BindingKey) -> BindingCell {
        if let Some(cell) = self
            .cells
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
        {
            return cell.clone();
        }
        self.cells
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(key.clone())
            .or_default()
            .clone()
    }
}

impl Default for BindingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn build_binding(
    interface: &InterfaceDeclaration,
    method: &str,
    options: &ResolveOptions,
) -> Result<MethodBinding, BindingError> {
    let iface = interface.name().to_string();
    let ctx = |m: &str| (iface.clone(), m.to_string());

    let mut candidates = interface.methods_named(method);
    let declaration = candidates.next().ok_or_else(|| BindingError::UnknownMethod {
        interface: iface.clone(),
        method: method.to_string(),
    })?;
    if candidates.next().is_some() {
        let (interface, method) = ctx(method);
        return Err(BindingError::AmbiguousMethod { interface, method });
    }

    let source = declaration.user_message.as_deref().ok_or_else(|| {
        let (interface, method) = ctx(method);
        BindingError::MissingTemplate { interface, method }
    })?;
    let template = RequestTemplate::parse(source).map_err(|err| {
        let (interface, method) = ctx(method);
        BindingError::MalformedTemplate {
            interface,
            method,
            position: err.position,
            reason: err.reason,
        }
    })?;

    let params = resolve_params(&iface, declaration, options)?;
    check_placeholders(&iface, method, &template, &params, options)?;

    let (return_type, schema) = resolve_type(&declaration.returns, options.max_type_depth)
        .map_err(|reason| {
            let (interface, method) = ctx(method);
            BindingError::UnsupportedType {
                interface,
                method,
                target: "return value".to_string(),
                reason,
            }
        })?;

    let strategy = return_type.strategy();
    let output_schema = match strategy {
        DecodeStrategy::Structured => Some(schema),
        _ => None,
    };
    let format_instructions = if options.format_instructions {
        format_instructions(&return_type, output_schema.as_ref())
    } else {
        None
    };

    Ok(MethodBinding {
        interface: iface,
        method: method.to_string(),
        params,
        template,
        system: declaration
            .system_message
            .clone()
            .or_else(|| interface.system_message.clone()),
        model: interface.model.clone(),
        return_type,
        strategy,
        output_schema,
        format_instructions,
    })
}

fn resolve_params(
    iface: &str,
    declaration: &MethodDeclaration,
    options: &ResolveOptions,
) -> Result<Vec<ParamBinding>, BindingError> {
    let mut seen = HashSet::new();
    let mut params = Vec::with_capacity(declaration.params.len());
    for param in &declaration.params {
        if !seen.insert(param.name.as_str()) {
            return Err(BindingError::DuplicateParameter {
                interface: iface.to_string(),
                method: declaration.name.clone(),
                parameter: param.name.clone(),
            });
        }
        let (ty, _) = resolve_type(&param.ty, options.max_type_depth).map_err(|reason| {
            BindingError::UnsupportedType {
                interface: iface.to_string(),
                method: declaration.name.clone(),
                target: format!("parameter {}", param.name),
                reason,
            }
        })?;
        params.push(ParamBinding {
            name: param.name.clone(),
            ty,
        });
    }
    Ok(params)
}

fn check_placeholders(
    iface: &str,
    method: &str,
    template: &RequestTemplate,
    params: &[ParamBinding],
    options: &ResolveOptions,
) -> Result<(), BindingError> {
    let referenced = template.placeholder_names();

    if let Some(unknown) = referenced
        .iter()
        .find(|name| !params.iter().any(|p| p.name == **name))
    {
        return Err(BindingError::UnknownPlaceholder {
            interface: iface.to_string(),
            method: method.to_string(),
            placeholder: unknown.to_string(),
        });
    }

    for param in params.iter().filter(|p| !referenced.contains(p.name.as_str())) {
        if options.strict_parameters {
            return Err(BindingError::UnreferencedParameter {
                interface: iface.to_string(),
                method: method.to_string(),
                parameter: param.name.clone(),
            });
        }
        warn!(
            interface = iface,
            method,
            parameter = %param.name,
            "parameter is not referenced by the template and will be ignored"
        );
    }
    Ok(())
}

/// Turn a declared type into a descriptor plus the schema describing it
fn resolve_type(source: &TypeSource, max_depth: usize) -> Result<(TypeDescriptor, Value), String> {
    match source {
        TypeSource::Schema(schema) => Ok((describe_schema(schema, max_depth)?, schema.clone())),
        TypeSource::Descriptor(descriptor) => {
            descriptor.validate(max_depth)?;
            Ok((descriptor.clone(), descriptor.json_schema()))
        }
    }
}

fn format_instructions(return_type: &TypeDescriptor, schema: Option<&Value>) -> Option<String> {
    match return_type {
        TypeDescriptor::Optional { inner } => format_instructions(inner, schema),
        TypeDescriptor::Enumeration { members, .. } => Some(format!(
            "Answer with exactly one of the following values and nothing else: {}",
            members.join(", ")
        )),
        TypeDescriptor::Object { .. }
        | TypeDescriptor::Sequence { .. }
        | TypeDescriptor::Mapping { .. } => {
            let schema = schema.map(strip_schema_meta)?;
            let pretty = serde_json::to_string_pretty(&schema).ok()?;
            Some(format!(
                "Your response must be a single RFC 8259 compliant JSON document and nothing else.\n\
                 Do not add explanations and do not wrap the JSON in Markdown code fences.\n\
                 The JSON must conform to this JSON Schema:\n{}",
                pretty
            ))
        }
        _ => None,
    }
}

fn strip_schema_meta(schema: &Value) -> Value {
    let mut schema = schema.clone();
    if let Some(map) = schema.as_object_mut() {
        map.remove("$schema");
    }
    schema
}
