//! `#[derive(Event)]`.
//!
//! Field attributes:
//! - `#[event(parent)]`: the embedded supertype. Generates `parent` and `parent_type`.
//! - `#[event(cancel)]`: a `Cancellable` field. Generates `cancellation`.
//!
//! Without a `cancel` field, a struct with a parent inherits the parent's cancellation.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{Data, DeriveInput, Field, Fields, Index, Member, Type, parse_macro_input, spanned::Spanned};

struct Marked<'a> {
    member: Member,
    ty: &'a Type,
}

#[derive(Default)]
struct EventFields<'a> {
    parent: Option<Marked<'a>>,
    cancel: Option<Marked<'a>>,
}

fn member_of(index: usize, field: &Field) -> Member {
    match &field.ident {
        Some(ident) => Member::Named(ident.clone()),
        None => Member::Unnamed(Index {
            index: index as u32,
            span: field.span(),
        }),
    }
}

fn collect_fields(fields: &Fields) -> syn::Result<EventFields<'_>> {
    let mut found = EventFields::default();

    for (index, field) in fields.iter().enumerate() {
        for attr in field.attrs.iter().filter(|a| a.path().is_ident("event")) {
            attr.parse_nested_meta(|meta| {
                let slot = if meta.path.is_ident("parent") {
                    &mut found.parent
                } else if meta.path.is_ident("cancel") {
                    &mut found.cancel
                } else {
                    return Err(meta.error("expected `parent` or `cancel`"));
                };
                if slot.is_some() {
                    return Err(meta.error("only one field may carry this attribute"));
                }
                *slot = Some(Marked {
                    member: member_of(index, field),
                    ty: &field.ty,
                });
                Ok(())
            })?;
        }
    }

    Ok(found)
}

fn reject_field_attrs(fields: &Fields) -> syn::Result<()> {
    for field in fields {
        if let Some(attr) = field.attrs.iter().find(|a| a.path().is_ident("event")) {
            return Err(syn::Error::new_spanned(
                attr,
                "`#[event(...)]` is only supported on struct fields",
            ));
        }
    }
    Ok(())
}

/// Implementation of `#[derive(Event)]`.
pub fn derive_event_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => collect_fields(&data.fields)?,
        Data::Enum(data) => {
            for variant in &data.variants {
                reject_field_attrs(&variant.fields)?;
            }
            EventFields::default()
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "#[derive(Event)] can only be used on structs and enums",
            ));
        }
    };

    let parent_impl = fields.parent.as_ref().map(|Marked { member, ty }| {
        quote! {
            fn parent(&self) -> ::core::option::Option<&dyn ::herald::Event> {
                ::core::option::Option::Some(&self.#member)
            }

            fn parent_type() -> ::core::option::Option<::herald::EventType> {
                ::core::option::Option::Some(::herald::EventType::of::<#ty>())
            }
        }
    });

    let cancel_impl = fields.cancel.as_ref().map(|Marked { member, .. }| {
        quote! {
            fn cancellation(&self) -> ::core::option::Option<&dyn ::herald::Cancellable> {
                ::core::option::Option::Some(&self.#member)
            }
        }
    });

    Ok(quote! {
        impl #impl_generics ::herald::Event for #name #ty_generics #where_clause {
            #parent_impl
            #cancel_impl
        }
    })
}
