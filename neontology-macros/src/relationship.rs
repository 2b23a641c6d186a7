use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{parse_macro_input, Data, DeriveInput, Fields};

use crate::attrs::{field_spec, serde_attrs, ContainerAttrs, FieldAttrs, SerdeField};

pub fn expand(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    match expand_relationship(&ast) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand_relationship(ast: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &ast.ident;
    let type_name = name.to_string();

    if !ast.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(&ast.generics, "Relationship cannot be derived for generic types"));
    }

    let fields = match &ast.data {
        Data::Struct(s) => match &s.fields {
            Fields::Named(named) => named.named.iter().collect::<Vec<_>>(),
            _ => {
                return Err(syn::Error::new_spanned(ast, "Relationship only supports structs with named fields"));
            }
        },
        _ => return Err(syn::Error::new_spanned(ast, "Relationship only supports structs")),
    };

    let container = ContainerAttrs::parse(&ast.attrs)?;
    let rel_type = container
        .rel_type
        .ok_or_else(|| syn::Error::new_spanned(ast, "missing #[neontology(type = \"...\")]"))?;
    if container.label.is_some() || container.primary_property.is_some() || !container.secondary_labels.is_empty() {
        return Err(syn::Error::new_spanned(ast, "labels belong on #[derive(Node)]"));
    }

    let endpoint = |which: &str| {
        fields
            .iter()
            .find(|f| f.ident.as_ref().map_or(false, |i| i == which))
            .copied()
            .ok_or_else(|| syn::Error::new_spanned(ast, format!("a relationship needs a `{which}` field")))
    };
    let source = endpoint("source")?;
    let target = endpoint("target")?;
    let source_ty = &source.ty;
    let target_ty = &target.ty;

    let mut specs = Vec::new();
    let mut mirror_fields = Vec::new();
    let mut moves = Vec::new();

    for f in &fields {
        let attrs = FieldAttrs::parse(f)?;
        let serde = SerdeField::parse(f);
        if attrs.extends {
            return Err(syn::Error::new_spanned(f, "`extends` only applies to node fields"));
        }
        specs.push(field_spec(f, &attrs, &serde));

        let Some(ident) = f.ident.as_ref() else { continue };
        if ident == "source" || ident == "target" {
            continue;
        }
        let ty = &f.ty;
        let copied = serde_attrs(&f.attrs);
        mirror_fields.push(quote! { #(#copied)* #ident: #ty });
        moves.push(quote! { #ident: props.#ident });
    }

    let mirror = format_ident!("__{}Properties", name);
    let container_serde = serde_attrs(&ast.attrs);

    Ok(quote! {
        #[doc(hidden)]
        #[allow(non_camel_case_types)]
        #[derive(neontology_core::__private::serde::Serialize, neontology_core::__private::serde::Deserialize)]
        #[serde(crate = "neontology_core::__private::serde")]
        #(#container_serde)*
        struct #mirror {
            #(#mirror_fields,)*
        }

        impl neontology_core::entity::Entity for #name {
            fn type_name() -> &'static str {
                #type_name
            }

            fn field_specs() -> Vec<neontology_core::fields::FieldSpec> {
                vec![#(#specs),*]
            }

            fn field_usage() -> &'static neontology_core::fields::FieldUsage {
                &<Self as neontology_core::relationship::RelationshipType>::relationship_descriptor().usage
            }
        }

        impl neontology_core::relationship::RelationshipType for #name {
            const RELATIONSHIP_TYPE: &'static str = #rel_type;

            type Source = #source_ty;
            type Target = #target_ty;

            fn source(&self) -> &Self::Source {
                &self.source
            }

            fn target(&self) -> &Self::Target {
                &self.target
            }

            fn from_parts(
                props: neontology_core::value::Properties,
                source: Self::Source,
                target: Self::Target,
            ) -> neontology_core::error::Result<Self> {
                let props: #mirror = neontology_core::entity::from_properties(props, #type_name)?;
                Ok(Self {
                    source,
                    target,
                    #(#moves,)*
                })
            }

            fn validate_properties(
                props: neontology_core::value::Properties,
            ) -> neontology_core::error::Result<neontology_core::value::Properties> {
                let props: #mirror = neontology_core::entity::from_properties(props, #type_name)?;
                neontology_core::entity::engine_dict(&props, &Default::default())
            }

            fn relationship_descriptor() -> &'static neontology_core::relationship::RelationshipDescriptor {
                static DESCRIPTOR: std::sync::OnceLock<neontology_core::relationship::RelationshipDescriptor> =
                    std::sync::OnceLock::new();
                DESCRIPTOR.get_or_init(|| {
                    neontology_core::relationship::RelationshipDescriptor::new(
                        #type_name,
                        #rel_type,
                        <#source_ty as neontology_core::node::NodeRef>::declared_type(),
                        <#target_ty as neontology_core::node::NodeRef>::declared_type(),
                        <#source_ty as neontology_core::node::NodeRef>::concrete_types(),
                        <#target_ty as neontology_core::node::NodeRef>::concrete_types(),
                        <Self as neontology_core::entity::Entity>::field_specs(),
                        neontology_core::relationship::hydrate_relationship::<#name>,
                        neontology_core::relationship::validate_relationship::<#name>,
                    )
                })
            }
        }
    })
}
