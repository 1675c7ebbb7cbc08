//! Procedural macros for tollgate
//!
//! This crate provides the `#[protected]` attribute macro, which attaches an
//! access declaration to a handler function and registers it in the static
//! declaration table at compile time.

use darling::{FromMeta, ast::NestedMeta};
use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{ItemFn, parse_macro_input};

/// Arguments for the `#[protected]` attribute
#[derive(Debug, FromMeta)]
struct ProtectedArgs {
    /// Controller (handler group) the operation belongs to, e.g. "access_control"
    controller: String,
    /// Optional: method name override (defaults to the function name)
    #[darling(default)]
    method: Option<String>,
    /// Required permission slugs (all-of). Repeat for several.
    #[darling(multiple, rename = "permission")]
    permissions: Vec<String>,
    /// Required role slugs (any-of). Repeat for several.
    #[darling(multiple, rename = "role")]
    roles: Vec<String>,
}

/// Declare the access requirements of a handler.
///
/// This macro generates:
/// - a `<FN_NAME>_ACCESS` constant holding the `OperationDeclaration`
/// - an `inventory::submit!` entry so the declaration scanner discovers it
/// - the original function, unchanged
///
/// # Example
///
/// ```ignore
/// #[protected(
///     controller = "access_control",
///     role = "admin",
///     permission = "roles.create"
/// )]
/// async fn create_role(State(state): State<AdminState>, Json(body): Json<CreateRole>) -> ApiResult<Json<Role>> {
///     // ...
/// }
///
/// // Route wiring reads the generated constant:
/// post(create_role).route_layer(guard(&state, &CREATE_ROLE_ACCESS))
/// ```
#[proc_macro_attribute]
pub fn protected(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attr_args = match NestedMeta::parse_meta_list(attr.into()) {
        Ok(v) => v,
        Err(e) => return TokenStream::from(e.to_compile_error()),
    };

    let args = match ProtectedArgs::from_list(&attr_args) {
        Ok(v) => v,
        Err(e) => return TokenStream::from(e.write_errors()),
    };

    let input = parse_macro_input!(item as ItemFn);
    let expanded = impl_protected(&args, &input);

    TokenStream::from(expanded)
}

fn impl_protected(args: &ProtectedArgs, input: &ItemFn) -> TokenStream2 {
    let fn_ident = &input.sig.ident;
    let vis = &input.vis;
    let controller = &args.controller;
    let method = args
        .method
        .clone()
        .unwrap_or_else(|| fn_ident.to_string());

    for slug in &args.permissions {
        if !is_declarable_permission(slug) {
            return syn::Error::new_spanned(
                &input.sig,
                format!(
                    "Invalid permission slug '{}'. Use 'resource.action' with [a-z0-9-*] segments, or '*'",
                    slug
                ),
            )
            .to_compile_error();
        }
    }

    for slug in &args.roles {
        if slug.is_empty() {
            return syn::Error::new_spanned(&input.sig, "Role slugs must not be empty")
                .to_compile_error();
        }
    }

    let const_ident = format_ident!("{}_ACCESS", fn_ident.to_string().to_uppercase());
    let permissions = &args.permissions;
    let roles = &args.roles;

    quote! {
        #[doc = concat!("Access declaration for `", stringify!(#fn_ident), "`")]
        #vis const #const_ident: crate::declarations::OperationDeclaration =
            crate::declarations::OperationDeclaration::new(
                #controller,
                #method,
                &[#(#permissions),*],
                &[#(#roles),*],
            );

        ::inventory::submit! { #const_ident }

        #input
    }
}

/// Compile-time counterpart of the runtime slug validity check.
fn is_declarable_permission(slug: &str) -> bool {
    if slug == "*" {
        return true;
    }

    let mut parts = slug.split('.');
    let (Some(resource), Some(action), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };

    let valid_segment = |s: &str| {
        !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '*')
    };

    valid_segment(resource) && valid_segment(action)
}
