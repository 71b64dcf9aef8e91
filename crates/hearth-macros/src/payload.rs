//! `#[derive(Payload)]` implementation.
//!
//! The derive maps the payload contract onto the standard traits the type
//! already carries: `reset` is `Default`, `clone_boxed` is `Clone`, and the
//! `Any` upcasts are mechanical. Types with a hand-written neutral state
//! (one that is not `Default::default()`) should implement the trait
//! manually instead.

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, spanned::Spanned};

pub fn derive_payload(input: &DeriveInput) -> syn::Result<TokenStream> {
    if let Data::Union(_) = input.data {
        return Err(syn::Error::new(
            input.span(),
            "Payload cannot be derived for unions",
        ));
    }

    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::hearth_core::Payload for #name #ty_generics #where_clause {
            fn reset(&mut self) {
                *self = <Self as ::std::default::Default>::default();
            }

            fn clone_boxed(&self) -> ::std::boxed::Box<dyn ::hearth_core::Payload> {
                ::std::boxed::Box::new(::std::clone::Clone::clone(self))
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }

            fn into_any(self: ::std::boxed::Box<Self>) -> ::std::boxed::Box<dyn ::std::any::Any> {
                self
            }
        }
    })
}
