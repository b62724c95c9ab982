use proc_macro::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{Attribute, Data, Error, Field, Fields, Meta, Type};

/// Implements `HasRendererData` by returning a field of type `RendererData`.
///
/// The field is found by its type. If a struct has more than one, mark the
/// one to use with `#[renderer_data]`.
#[proc_macro_derive(HasRendererData, attributes(renderer_data))]
pub fn has_renderer_data(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as syn::DeriveInput);

    let type_ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let Data::Struct(data) = &input.data else {
        return Error::new(
            input.ident.span(),
            "HasRendererData can only be derived for structs",
        )
        .to_compile_error()
        .into();
    };

    let field = match find_data_field(&data.fields) {
        Ok(field) => field,
        Err(e) => return e.to_compile_error().into(),
    };

    quote! {
        impl #impl_generics ::gp1_render::HasRendererData for #type_ident #ty_generics #where_clause {
            #[inline]
            fn renderer_data(&self) -> &::gp1_render::RendererData {
                &self.#field
            }
        }
    }
    .into()
}

fn find_data_field(fields: &Fields) -> Result<proc_macro2::TokenStream, Error> {
    let candidates: Vec<(usize, &Field)> = fields.iter().enumerate().collect();

    let marked: Vec<_> = candidates
        .iter()
        .filter(|(_, field)| has_attr(&field.attrs, "renderer_data"))
        .collect();
    let typed: Vec<_> = candidates
        .iter()
        .filter(|(_, field)| is_renderer_data(&field.ty))
        .collect();

    let chosen = match (marked.as_slice(), typed.as_slice()) {
        ([one], _) => one,
        ([], [one]) => one,
        ([], []) => {
            return Err(Error::new(
                fields.span(),
                "no field of type RendererData found, mark one with #[renderer_data]",
            ));
        }
        ([], _) => {
            return Err(Error::new(
                fields.span(),
                "multiple RendererData fields, mark the one to use with #[renderer_data]",
            ));
        }
        (_, _) => {
            return Err(Error::new(
                fields.span(),
                "only one field may be marked with #[renderer_data]",
            ));
        }
    };

    let (index, field) = chosen;
    Ok(match &field.ident {
        Some(ident) => quote!(#ident),
        None => {
            let index = syn::Index::from(*index);
            quote!(#index)
        }
    })
}

fn is_renderer_data(ty: &Type) -> bool {
    let Type::Path(path) = ty else {
        return false;
    };
    path.path
        .segments
        .last()
        .is_some_and(|segment| segment.ident == "RendererData")
}

fn has_attr(attrs: &[Attribute], name: &str) -> bool {
    for attr in attrs {
        if let Meta::Path(path) = &attr.meta
            && path.segments.iter().any(|s| s.ident == name)
        {
            return true;
        }
    }
    false
}
