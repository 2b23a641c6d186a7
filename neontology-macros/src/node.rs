use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

use crate::attrs::{field_spec, ContainerAttrs, FieldAttrs, SerdeField};

pub fn expand(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    match expand_node(&ast) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand_node(ast: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &ast.ident;
    let type_name = name.to_string();

    if !ast.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(&ast.generics, "Node cannot be derived for generic types"));
    }

    let fields = match &ast.data {
        Data::Struct(s) => match &s.fields {
            Fields::Named(named) => named.named.iter().collect::<Vec<_>>(),
            _ => {
                return Err(syn::Error::new_spanned(ast, "Node only supports structs with named fields"));
            }
        },
        _ => return Err(syn::Error::new_spanned(ast, "Node only supports structs")),
    };

    let container = ContainerAttrs::parse(&ast.attrs)?;
    if container.rel_type.is_some() {
        return Err(syn::Error::new_spanned(ast, "`type` belongs on #[derive(Relationship)]"));
    }

    let mut specs = Vec::new();
    let mut wire_names = Vec::new();
    let mut parent = None;

    for f in &fields {
        let attrs = FieldAttrs::parse(f)?;
        let serde = SerdeField::parse(f);

        if attrs.extends {
            if !serde.flatten {
                return Err(syn::Error::new_spanned(f, "an `extends` field must also be #[serde(flatten)]"));
            }
            if parent.is_some() {
                return Err(syn::Error::new_spanned(f, "a node can extend only one parent"));
            }
            parent = Some(&f.ty);
            continue;
        }
        if attrs.merge_on {
            return Err(syn::Error::new_spanned(f, "merge_on only applies to relationship fields"));
        }
        if serde.skip {
            continue;
        }

        let ident = f.ident.as_ref().map(|i| i.to_string()).unwrap_or_default();
        wire_names.push(serde.rename.clone().unwrap_or(ident));
        specs.push(field_spec(f, &attrs, &serde));
    }

    if container.label.is_some() && container.primary_property.is_none() {
        return Err(syn::Error::new_spanned(
            ast,
            "a node with a `label` needs a `primary_property`",
        ));
    }
    if container.label.is_none() && container.primary_property.is_some() {
        return Err(syn::Error::new_spanned(
            ast,
            "`primary_property` needs a `label`; abstract nodes declare neither",
        ));
    }
    if let Some(pp) = &container.primary_property {
        if parent.is_none() && !wire_names.contains(pp) {
            return Err(syn::Error::new_spanned(
                ast,
                format!("primary_property `{pp}` is not a field of {type_name}"),
            ));
        }
    }

    let inherited_fields = parent.map(|p| {
        quote! { fields.extend(<#p as neontology_core::entity::Entity>::field_specs()); }
    });
    let parent_descriptor = match parent {
        Some(p) => quote! { Some(<#p as neontology_core::node::NodeClass>::node_descriptor()) },
        None => quote! { None },
    };
    let secondary = &container.secondary_labels;

    let (label_tokens, pp_tokens, hydrate_tokens) = match (&container.label, &container.primary_property) {
        (Some(label), Some(pp)) => (
            quote! { Some(#label) },
            quote! { Some(#pp) },
            quote! { Some(neontology_core::node::hydrate_node::<#name>) },
        ),
        _ => (quote! { None }, quote! { None }, quote! { None }),
    };

    let concrete = match (&container.label, &container.primary_property) {
        (Some(label), Some(pp)) => quote! {
            impl neontology_core::node::NodeType for #name {
                const PRIMARY_LABEL: &'static str = #label;
                const PRIMARY_PROPERTY: &'static str = #pp;
            }

            impl neontology_core::node::NodeRef for #name {
                fn declared_type() -> &'static str {
                    #type_name
                }

                fn concrete_types() -> Vec<&'static neontology_core::node::NodeDescriptor> {
                    vec![<Self as neontology_core::node::NodeClass>::node_descriptor()]
                }

                fn endpoint_descriptor(&self) -> &'static neontology_core::node::NodeDescriptor {
                    <Self as neontology_core::node::NodeClass>::node_descriptor()
                }

                fn endpoint_value(&self) -> neontology_core::error::Result<neontology_core::__private::serde_json::Value> {
                    <Self as neontology_core::node::NodeType>::primary_value(self)
                }

                fn from_graph_node(
                    node: &std::sync::Arc<dyn neontology_core::node::GraphNode>,
                ) -> Option<Self> {
                    node.downcast_ref::<Self>().cloned()
                }
            }
        },
        _ => quote! {},
    };

    Ok(quote! {
        impl neontology_core::entity::Entity for #name {
            fn type_name() -> &'static str {
                #type_name
            }

            fn field_specs() -> Vec<neontology_core::fields::FieldSpec> {
                #[allow(unused_mut)]
                let mut fields = vec![#(#specs),*];
                #inherited_fields
                fields
            }

            fn field_usage() -> &'static neontology_core::fields::FieldUsage {
                static USAGE: std::sync::OnceLock<neontology_core::fields::FieldUsage> = std::sync::OnceLock::new();
                USAGE.get_or_init(|| {
                    neontology_core::fields::FieldUsage::classify(&<Self as neontology_core::entity::Entity>::field_specs())
                })
            }
        }

        impl neontology_core::node::NodeClass for #name {
            fn node_descriptor() -> &'static neontology_core::node::NodeDescriptor {
                static DESCRIPTOR: std::sync::OnceLock<neontology_core::node::NodeDescriptor> = std::sync::OnceLock::new();
                DESCRIPTOR.get_or_init(|| {
                    neontology_core::node::NodeDescriptor::new(
                        #type_name,
                        #label_tokens,
                        #pp_tokens,
                        &[#(#secondary),*],
                        #parent_descriptor,
                        <Self as neontology_core::entity::Entity>::field_specs(),
                        #hydrate_tokens,
                    )
                })
            }
        }

        #concrete
    })
}
