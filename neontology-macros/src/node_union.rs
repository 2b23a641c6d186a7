use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

pub fn expand(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    match expand_union(&ast) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand_union(ast: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let name = &ast.ident;
    let type_name = name.to_string();

    let Data::Enum(data) = &ast.data else {
        return Err(syn::Error::new_spanned(ast, "NodeUnion only supports enums"));
    };
    if data.variants.is_empty() {
        return Err(syn::Error::new_spanned(ast, "NodeUnion needs at least one variant"));
    }

    let mut variants = Vec::new();
    let mut types = Vec::new();
    for v in &data.variants {
        match &v.fields {
            Fields::Unnamed(f) if f.unnamed.len() == 1 => {
                variants.push(&v.ident);
                types.push(&f.unnamed[0].ty);
            }
            _ => {
                return Err(syn::Error::new_spanned(
                    v,
                    "NodeUnion variants must hold exactly one node type, e.g. `Person(Person)`",
                ));
            }
        }
    }

    Ok(quote! {
        impl neontology_core::__private::serde::Serialize for #name {
            fn serialize<S>(&self, serializer: S) -> ::core::result::Result<S::Ok, S::Error>
            where
                S: neontology_core::__private::serde::Serializer,
            {
                match self {
                    #(Self::#variants(node) => neontology_core::__private::serde::Serialize::serialize(node, serializer),)*
                }
            }
        }

        impl neontology_core::node::NodeRef for #name {
            fn declared_type() -> &'static str {
                #type_name
            }

            fn concrete_types() -> Vec<&'static neontology_core::node::NodeDescriptor> {
                vec![#(<#types as neontology_core::node::NodeClass>::node_descriptor()),*]
            }

            fn endpoint_descriptor(&self) -> &'static neontology_core::node::NodeDescriptor {
                match self {
                    #(Self::#variants(node) => neontology_core::node::NodeRef::endpoint_descriptor(node),)*
                }
            }

            fn endpoint_value(&self) -> neontology_core::error::Result<neontology_core::__private::serde_json::Value> {
                match self {
                    #(Self::#variants(node) => neontology_core::node::NodeRef::endpoint_value(node),)*
                }
            }

            fn from_graph_node(
                node: &std::sync::Arc<dyn neontology_core::node::GraphNode>,
            ) -> Option<Self> {
                #(
                    if let Some(n) = <#types as neontology_core::node::NodeRef>::from_graph_node(node) {
                        return Some(Self::#variants(n));
                    }
                )*
                None
            }
        }

        #(
            impl From<#types> for #name {
                fn from(node: #types) -> Self {
                    Self::#variants(node)
                }
            }
        )*
    })
}
