use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, FnArg, ImplItemFn, ReturnType, Type};

/// What a rewritten method hands back.
pub enum Output {
    Nodes,
    Property,
}

pub fn expand(attr: TokenStream, item: TokenStream, output: Output) -> TokenStream {
    let typed = if attr.is_empty() {
        None
    } else {
        Some(parse_macro_input!(attr as Type))
    };
    let method = parse_macro_input!(item as ImplItemFn);
    match expand_method(typed, method, output) {
        Ok(tokens) => tokens.into(),
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand_method(typed: Option<Type>, method: ImplItemFn, output: Output) -> syn::Result<proc_macro2::TokenStream> {
    let ImplItemFn { attrs, vis, sig, block, .. } = method;

    if sig.asyncness.is_some() {
        return Err(syn::Error::new_spanned(&sig, "write the method without `async`; the macro makes it async"));
    }
    match sig.inputs.first() {
        Some(FnArg::Receiver(r)) if r.reference.is_some() && r.mutability.is_none() => {}
        _ => return Err(syn::Error::new_spanned(&sig, "a related query method must take `&self`")),
    }
    let query_ty = match &sig.output {
        ReturnType::Type(_, ty) => ty.clone(),
        ReturnType::Default => {
            return Err(syn::Error::new_spanned(&sig, "a related query method must return a RelatedQuery"));
        }
    };

    let name = &sig.ident;
    let generics = &sig.generics;
    let where_clause = &generics.where_clause;
    let args = sig.inputs.iter().skip(1);

    let (ret, call) = match (output, typed) {
        (Output::Nodes, None) => (
            quote! { Vec<std::sync::Arc<dyn neontology_core::node::GraphNode>> },
            quote! { ::neontology::related::related_nodes(self, graph, query) },
        ),
        (Output::Nodes, Some(ty)) => (
            quote! { Vec<#ty> },
            quote! { ::neontology::related::related_nodes_as::<_, #ty>(self, graph, query) },
        ),
        (Output::Property, None) => (
            quote! { Option<neontology_core::__private::serde_json::Value> },
            quote! { ::neontology::related::related_property(self, graph, query) },
        ),
        (Output::Property, Some(ty)) => (
            quote! { Option<#ty> },
            quote! { ::neontology::related::related_property_as::<_, #ty>(self, graph, query) },
        ),
    };

    Ok(quote! {
        #(#attrs)*
        #vis async fn #name #generics (
            &self,
            graph: &::neontology::GraphConnection,
            #(#args),*
        ) -> neontology_core::error::Result<#ret> #where_clause {
            #[allow(clippy::redundant_closure_call)]
            let query: #query_ty = (|| -> #query_ty #block)();
            #call.await
        }
    })
}
