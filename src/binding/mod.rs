//! Method bindings
//!
//! This module turns declared interfaces into resolved, cached
//! [`MethodBinding`]s and renders them into requests:
//! - `declaration` - builder API describing interfaces and methods
//! - `template` - `{placeholder}` template parsing
//! - `schema` - JSON Schema to [`TypeDescriptor`](crate::TypeDescriptor) mapping
//! - `registry` - publish-once binding cache
//! - `render` - argument binding

pub mod declaration;
pub mod registry;
pub mod render;
pub mod schema;
pub mod template;

pub use declaration::{InterfaceDeclaration, MethodDeclaration, ParamDeclaration, TypeSource};
pub use registry::{BindingKey, BindingRegistry, MethodBinding, ParamBinding};
pub use render::{to_argument, ArgumentBinder};
pub use template::{RequestTemplate, Segment, TemplateError};
