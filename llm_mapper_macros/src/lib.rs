//! Procedural macros for declaring LLM-backed interfaces

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, punctuated::Punctuated, token::Comma, Attribute, Expr, ExprLit, FnArg,
    GenericArgument, Ident, ItemTrait, Lit, LitStr, Meta, Pat, PathArguments, ReturnType,
    Signature, TraitItem, TraitItemFn, Type,
};

/// Attribute macro turning a trait into an LLM-backed client
///
/// # Example
///
/// ```ignore
/// #[llm_client(model = "gpt-4o-mini", system = "You are a film expert")]
/// pub trait ActorService {
///     #[user_message("Generate the filmography of {actor}")]
///     async fn filmography(&self, actor: &str) -> InvocationResult<ActorFilms>;
///
///     #[user_message("Summarize: {text}")]
///     #[system_message("Answer in one sentence")]
///     async fn summarize(&self, #[param("text")] input: String) -> InvocationResult<String>;
/// }
/// ```
///
/// This keeps the trait (made object safe through `async_trait`) and generates:
/// - `ActorServiceClient`: a struct holding an `Arc<CallDispatcher>`
/// - `ActorServiceClient::declaration()`: the lazily built `InterfaceDeclaration`,
///   named by the trait's full module path so same-named traits never share bindings
/// - `impl ActorService for ActorServiceClient`, delegating every method to the dispatcher
///
/// # Attributes
///
/// - `model`: (optional) default model for every method
/// - `system`: (optional) system message for every method without its own
/// - `client`: (optional) name of the generated struct (defaults to `<Trait>Client`)
///
/// Every method must be `async fn name(&self, ..) -> InvocationResult<T>` (or
/// `Result<T, E>` with `E: From<InvocationError>`) and carry a
/// `#[user_message("..")]` template. Parameters are referenced in templates by
/// their binding name unless renamed with `#[param("..")]`.
#[proc_macro_attribute]
pub fn llm_client(attr: TokenStream, item: TokenStream) -> TokenStream {
    // Parse the attribute arguments
    let attr_args = parse_macro_input!(attr with Punctuated::<Meta, Comma>::parse_terminated);

    // Parse the trait
    let item_trait = parse_macro_input!(item as ItemTrait);

    match expand(attr_args, item_trait) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct ClientArgs {
    model: Option<LitStr>,
    system: Option<LitStr>,
    client: Option<LitStr>,
}

struct ClientParam {
    binding: Ident,
    name: String,
    ty: Type,
}

struct ClientMethod {
    sig: Signature,
    user_message: LitStr,
    system_message: Option<LitStr>,
    params: Vec<ClientParam>,
    output: Type,
}

fn expand(args: Punctuated<Meta, Comma>, mut item_trait: ItemTrait) -> syn::Result<TokenStream2> {
    let args = parse_client_args(args)?;

    if !item_trait.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &item_trait.generics,
            "llm_client traits cannot be generic",
        ));
    }

    let trait_ident = item_trait.ident.clone();
    let trait_name = trait_ident.to_string();
    let vis = item_trait.vis.clone();
    let client_ident = match &args.client {
        Some(lit) => lit.parse::<Ident>()?,
        None => format_ident!("{}Client", trait_ident),
    };

    // Collect methods, stripping the helper attributes from the trait as we go
    let mut methods = Vec::new();
    for item in item_trait.items.iter_mut() {
        if let TraitItem::Fn(method) = item {
            methods.push(client_method(method)?);
        }
    }

    let model = args.model.as_ref().map(|m| quote!(.model(#m)));
    let system = args.system.as_ref().map(|s| quote!(.system_message(#s)));

    let method_declarations = methods.iter().map(|method| {
        let name = method.sig.ident.to_string();
        let user_message = &method.user_message;
        let system_message = method
            .system_message
            .as_ref()
            .map(|s| quote!(.system_message(#s)));
        let output = &method.output;
        let params = method.params.iter().map(|param| {
            let name = &param.name;
            let ty = &param.ty;
            quote!(.param::<#ty>(#name))
        });
        quote! {
            .method(
                ::llm_mapper::MethodDeclaration::new(#name)
                    #(#params)*
                    .user_message(#user_message)
                    #system_message
                    .returns::<#output>()
            )
        }
    });

    let method_impls = methods.iter().map(|method| {
        let sig = &method.sig;
        let name = method.sig.ident.to_string();
        let output = &method.output;
        let arguments = method.params.iter().map(|param| {
            let binding = &param.binding;
            let name = &param.name;
            quote! {
                ::llm_mapper::to_argument(#name, &#binding)
                    .map_err(::llm_mapper::InvocationError::from)?
            }
        });
        quote! {
            #sig {
                let arguments = ::std::vec![#(#arguments),*];
                self.dispatcher
                    .call::<#output>(Self::declaration(), #name, arguments)
                    .await
                    .map_err(::core::convert::Into::into)
            }
        }
    });

    let output = quote! {
        #[::llm_mapper::__private::async_trait]
        #item_trait

        /// Generated client dispatching every method through a `CallDispatcher`
        #[derive(Clone)]
        #vis struct #client_ident {
            dispatcher: ::std::sync::Arc<::llm_mapper::CallDispatcher>,
        }

        impl #client_ident {
            /// Create a client backed by `dispatcher`
            pub fn new(dispatcher: ::std::sync::Arc<::llm_mapper::CallDispatcher>) -> Self {
                Self { dispatcher }
            }

            /// The interface declaration, built on first use
            pub fn declaration() -> &'static ::llm_mapper::InterfaceDeclaration {
                static DECLARATION: ::std::sync::OnceLock<::llm_mapper::InterfaceDeclaration> =
                    ::std::sync::OnceLock::new();
                DECLARATION.get_or_init(|| {
                    ::llm_mapper::InterfaceDeclaration::new(
                        ::core::concat!(::core::module_path!(), "::", #trait_name)
                    )
                        #model
                        #system
                        #(#method_declarations)*
                })
            }

            /// The dispatcher this client calls through
            pub fn dispatcher(&self) -> &::std::sync::Arc<::llm_mapper::CallDispatcher> {
                &self.dispatcher
            }
        }

        #[::llm_mapper::__private::async_trait]
        impl #trait_ident for #client_ident {
            #(#method_impls)*
        }
    };

    Ok(output)
}

fn parse_client_args(args: Punctuated<Meta, Comma>) -> syn::Result<ClientArgs> {
    let mut parsed = ClientArgs::default();
    for arg in args {
        let Meta::NameValue(nv) = &arg else {
            return Err(syn::Error::new_spanned(&arg, "expected `key = \"value\"`"));
        };
        let value = match &nv.value {
            Expr::Lit(ExprLit {
                lit: Lit::Str(lit), ..
            }) => lit.clone(),
            other => return Err(syn::Error::new_spanned(other, "expected a string literal")),
        };
        if nv.path.is_ident("model") {
            parsed.model = Some(value);
        } else if nv.path.is_ident("system") {
            parsed.system = Some(value);
        } else if nv.path.is_ident("client") {
            parsed.client = Some(value);
        } else {
            return Err(syn::Error::new_spanned(
                &nv.path,
                "unknown llm_client option, expected `model`, `system` or `client`",
            ));
        }
    }
    Ok(parsed)
}

fn client_method(method: &mut TraitItemFn) -> syn::Result<ClientMethod> {
    let sig = &mut method.sig;
    if sig.asyncness.is_none() {
        return Err(syn::Error::new_spanned(&sig.fn_token, "llm_client methods must be async"));
    }
    match sig.receiver() {
        Some(receiver) if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => {
            return Err(syn::Error::new_spanned(
                &sig.ident,
                "llm_client methods must take `&self`",
            ))
        }
    }
    if method.default.is_some() {
        return Err(syn::Error::new_spanned(
            &sig.ident,
            "llm_client methods cannot have a default body",
        ));
    }

    let user_message = take_message_attr(&mut method.attrs, "user_message")?.ok_or_else(|| {
        syn::Error::new_spanned(&sig.ident, "missing #[user_message(\"...\")] template")
    })?;
    let system_message = take_message_attr(&mut method.attrs, "system_message")?;

    let mut params = Vec::new();
    for input in sig.inputs.iter_mut() {
        let FnArg::Typed(pat_type) = input else {
            continue;
        };
        let binding = match pat_type.pat.as_ref() {
            Pat::Ident(pat) => pat.ident.clone(),
            other => {
                return Err(syn::Error::new_spanned(
                    other,
                    "llm_client parameters must be plain identifiers",
                ))
            }
        };
        let name = take_message_attr(&mut pat_type.attrs, "param")?
            .map(|lit| lit.value())
            .unwrap_or_else(|| binding.to_string());
        params.push(ClientParam {
            binding,
            name,
            ty: strip_type_modifiers(&pat_type.ty).clone(),
        });
    }

    let output = output_type(sig)?;
    Ok(ClientMethod {
        sig: sig.clone(),
        user_message,
        system_message,
        params,
        output,
    })
}

/// Remove `#[name("...")]` from `attrs` and return its string
fn take_message_attr(attrs: &mut Vec<Attribute>, name: &str) -> syn::Result<Option<LitStr>> {
    let mut found = None;
    let mut error = None;
    attrs.retain(|attr| {
        if !attr.path().is_ident(name) {
            return true;
        }
        match attr.parse_args::<LitStr>() {
            Ok(lit) if found.is_none() => found = Some(lit),
            Ok(_) => {
                error = Some(syn::Error::new_spanned(
                    attr,
                    format!("duplicate #[{}] attribute", name),
                ))
            }
            Err(err) => error = Some(err),
        }
        false
    });
    match error {
        Some(err) => Err(err),
        None => Ok(found),
    }
}

/// `T` out of `InvocationResult<T>` or `Result<T, E>`
fn output_type(sig: &Signature) -> syn::Result<Type> {
    if let ReturnType::Type(_, ty) = &sig.output {
        if let Type::Path(path) = ty.as_ref() {
            if let Some(segment) = path.path.segments.last() {
                if segment.ident == "InvocationResult" || segment.ident == "Result" {
                    if let PathArguments::AngleBracketed(args) = &segment.arguments {
                        if let Some(GenericArgument::Type(inner)) = args.args.first() {
                            return Ok(inner.clone());
                        }
                    }
                }
            }
        }
    }
    Err(syn::Error::new_spanned(
        &sig.output,
        "llm_client methods must return InvocationResult<T>",
    ))
}

/// Strip reference and other modifiers from a type to get the base type
fn strip_type_modifiers(ty: &Type) -> &Type {
    match ty {
        Type::Reference(type_ref) => strip_type_modifiers(&type_ref.elem),
        Type::Paren(inner) => strip_type_modifiers(&inner.elem),
        _ => ty,
    }
}
