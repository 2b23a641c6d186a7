//! Attribute parsing shared by the derives.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Attribute, Expr, ExprLit, Field, GenericArgument, Lit, LitStr, PathArguments, Type};

/// `#[neontology(...)]` field tags.
#[derive(Default)]
pub struct FieldAttrs {
    pub set_on_create: bool,
    pub set_on_match: bool,
    pub never_set: bool,
    pub merge_on: bool,
    pub extends: bool,
}

impl FieldAttrs {
    pub fn parse(field: &Field) -> syn::Result<Self> {
        let mut out = FieldAttrs::default();
        for attr in field.attrs.iter().filter(|a| a.path().is_ident("neontology")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("set_on_create") {
                    out.set_on_create = true;
                } else if meta.path.is_ident("set_on_match") {
                    out.set_on_match = true;
                } else if meta.path.is_ident("never_set") {
                    out.never_set = true;
                } else if meta.path.is_ident("merge_on") {
                    out.merge_on = true;
                } else if meta.path.is_ident("extends") {
                    out.extends = true;
                } else {
                    return Err(meta.error(
                        "expected one of: set_on_create, set_on_match, never_set, merge_on, extends",
                    ));
                }
                Ok(())
            })?;
        }

        let roles = [out.set_on_create, out.set_on_match, out.never_set];
        if roles.iter().filter(|r| **r).count() > 1 {
            return Err(syn::Error::new_spanned(
                field,
                "a field can carry only one of set_on_create, set_on_match, never_set",
            ));
        }
        Ok(out)
    }

    pub fn tag_tokens(&self) -> TokenStream {
        let mut tags = Vec::new();
        if self.set_on_create {
            tags.push(quote!(neontology_core::fields::FieldTag::SetOnCreate));
        }
        if self.set_on_match {
            tags.push(quote!(neontology_core::fields::FieldTag::SetOnMatch));
        }
        if self.never_set {
            tags.push(quote!(neontology_core::fields::FieldTag::NeverSet));
        }
        if self.merge_on {
            tags.push(quote!(neontology_core::fields::FieldTag::MergeOn));
        }
        quote!(&[#(#tags),*])
    }
}

/// What `#[serde(...)]` says about a field.
#[derive(Default)]
pub struct SerdeField {
    pub rename: Option<String>,
    pub default: bool,
    pub flatten: bool,
    pub skip: bool,
}

impl SerdeField {
    pub fn parse(field: &Field) -> Self {
        let mut out = SerdeField::default();
        for attr in field.attrs.iter().filter(|a| a.path().is_ident("serde")) {
            // Unknown serde options are serde's business; ignore parse errors.
            let _ = attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("rename") {
                    if let Ok(value) = meta.value() {
                        if let Ok(s) = value.parse::<LitStr>() {
                            out.rename = Some(s.value());
                        }
                    }
                } else if meta.path.is_ident("default") {
                    out.default = true;
                    if let Ok(value) = meta.value() {
                        let _: Expr = value.parse()?;
                    }
                } else if meta.path.is_ident("flatten") {
                    out.flatten = true;
                } else if meta.path.is_ident("skip") || meta.path.is_ident("skip_serializing") {
                    out.skip = true;
                } else if let Ok(value) = meta.value() {
                    let _: Expr = value.parse()?;
                }
                Ok(())
            });
        }
        out
    }
}

/// The string value of `key = "..."` inside a struct-level
/// `#[neontology(...)]`, plus any `secondary_labels(...)` list.
#[derive(Default)]
pub struct ContainerAttrs {
    pub label: Option<String>,
    pub primary_property: Option<String>,
    pub secondary_labels: Vec<String>,
    pub rel_type: Option<String>,
}

impl ContainerAttrs {
    pub fn parse(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut out = ContainerAttrs::default();
        for attr in attrs.iter().filter(|a| a.path().is_ident("neontology")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("label") {
                    out.label = Some(lit_str(meta.value()?.parse()?)?);
                } else if meta.path.is_ident("primary_property") {
                    out.primary_property = Some(lit_str(meta.value()?.parse()?)?);
                } else if meta.path.is_ident("type") {
                    out.rel_type = Some(lit_str(meta.value()?.parse()?)?);
                } else if meta.path.is_ident("secondary_labels") {
                    meta.parse_nested_meta(|inner| {
                        let name = inner
                            .path
                            .get_ident()
                            .map(|i| i.to_string())
                            .ok_or_else(|| inner.error("expected a label name"))?;
                        out.secondary_labels.push(name);
                        Ok(())
                    })?;
                } else {
                    return Err(meta.error(
                        "expected one of: label, primary_property, secondary_labels, type",
                    ));
                }
                Ok(())
            })?;
        }
        Ok(out)
    }
}

fn lit_str(expr: Expr) -> syn::Result<String> {
    match expr {
        Expr::Lit(ExprLit { lit: Lit::Str(s), .. }) => Ok(s.value()),
        other => Err(syn::Error::new_spanned(other, "expected a string literal")),
    }
}

/// Whether `ty` is `Option<_>`.
pub fn is_option(ty: &Type) -> bool {
    option_inner(ty).is_some()
}

fn option_inner(ty: &Type) -> Option<&Type> {
    let Type::Path(path) = ty else { return None };
    let segment = path.path.segments.last()?;
    if segment.ident != "Option" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner),
        _ => None,
    }
}

/// A compact rendering of a type, e.g. `Option<Vec<String>>`.
pub fn type_repr(ty: &Type) -> String {
    quote!(#ty).to_string().replace(' ', "").replace(',', ", ")
}

/// Serde attributes to copy onto a generated mirror type.
pub fn serde_attrs(attrs: &[Attribute]) -> Vec<&Attribute> {
    attrs.iter().filter(|a| a.path().is_ident("serde")).collect()
}

/// One `FieldSpec` literal.
pub fn field_spec(field: &Field, attrs: &FieldAttrs, serde: &SerdeField) -> TokenStream {
    let name = field.ident.as_ref().map(|i| i.to_string()).unwrap_or_default();
    let wire = serde.rename.clone().unwrap_or_else(|| name.clone());
    let repr = type_repr(&field.ty);
    let optional = is_option(&field.ty);
    let required = !optional && !serde.default;
    let tags = attrs.tag_tokens();
    quote! {
        neontology_core::fields::FieldSpec {
            name: #name,
            wire_name: #wire,
            type_repr: #repr,
            optional: #optional,
            required: #required,
            tags: #tags,
        }
    }
}
