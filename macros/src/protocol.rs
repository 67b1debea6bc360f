//! Derives for the wire `Encode` and `Decode` traits.
//!
//! Fields go on the wire in declaration order. An enum is written as its
//! variant id, in the width picked by `#[encoding(discriminant = "...")]`,
//! followed by the fields of that variant.

use darling::{FromDeriveInput, FromField, FromMeta, FromVariant};
use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};
use std::collections::HashSet;
use syn::{spanned::Spanned, Data, DeriveInput, Fields, Ident};

/// `#[encoding(...)]` on a field.
#[derive(Default, Debug, FromField)]
#[darling(attributes(encoding))]
#[darling(default)]
struct FieldAttrs {
    /// Integer written as a VarInt instead of at fixed width.
    varint: bool,
    /// `Option` preceded by a presence flag.
    bool_prefixed: bool,
    /// `Vec` preceded by its element count.
    length_prefix: Option<LengthPrefix>,
}

#[derive(Debug, FromMeta)]
enum LengthPrefix {
    #[darling(rename = "varint")]
    VarInt,
}

/// `#[encoding(...)]` on an enum.
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(encoding))]
struct EnumAttrs {
    discriminant: Discriminant,
}

/// `#[encoding(...)]` on an enum variant.
#[derive(Debug, FromVariant)]
#[darling(attributes(encoding))]
struct VariantAttrs {
    id: i64,
}

#[derive(Debug, Clone, Copy, FromMeta)]
enum Discriminant {
    #[darling(rename = "varint")]
    VarInt,
    #[darling(rename = "byte")]
    Byte,
    #[darling(rename = "int")]
    Int,
}

impl Discriminant {
    fn write(self, id: i64, span: Span) -> syn::Result<TokenStream> {
        let out_of_range =
            |_| syn::Error::new(span, "variant id does not fit in the discriminant type");
        Ok(match self {
            Self::VarInt => {
                let id = i32::try_from(id).map_err(out_of_range)?;
                quote! { encoder.write_var_int(#id); }
            }
            Self::Byte => {
                let id = u8::try_from(id).map_err(out_of_range)?;
                quote! { encoder.write_u8(#id); }
            }
            Self::Int => {
                let id = i32::try_from(id).map_err(out_of_range)?;
                quote! { encoder.write_i32(#id); }
            }
        })
    }

    fn read(self) -> TokenStream {
        match self {
            Self::VarInt => quote! { decoder.read_var_int()? },
            Self::Byte => quote! { decoder.read_u8()? },
            Self::Int => quote! { decoder.read_i32()? },
        }
    }
}

/// How a single field is laid out.
#[derive(Debug, Clone, Copy)]
enum Codec {
    /// The field type's own `Encode`/`Decode` impl.
    Plain,
    VarInt,
    Optional,
    VarIntList,
}

impl Codec {
    fn of(field: &syn::Field) -> syn::Result<Self> {
        let attrs = FieldAttrs::from_field(field)?;
        let mut chosen = Vec::new();
        if attrs.varint {
            chosen.push(Self::VarInt);
        }
        if attrs.bool_prefixed {
            chosen.push(Self::Optional);
        }
        if let Some(LengthPrefix::VarInt) = attrs.length_prefix {
            chosen.push(Self::VarIntList);
        }

        match chosen[..] {
            [] => Ok(Self::Plain),
            [codec] => Ok(codec),
            _ => Err(syn::Error::new(
                field.span(),
                "at most one encoding option can be set",
            )),
        }
    }

    /// Writes the field that `value` refers to.
    fn encode(self, value: &Ident) -> TokenStream {
        match self {
            Self::Plain => quote! {
                crate::protocol::Encode::encode(#value, encoder);
            },
            Self::VarInt => quote! {
                encoder.write_var_int(crate::protocol::VarIntField::to_var_int(*#value));
            },
            Self::Optional => quote! {
                encoder.write_bool(#value.is_some());
                if let Some(value) = #value {
                    crate::protocol::Encode::encode(value, encoder);
                }
            },
            Self::VarIntList => quote! {
                encoder.write_var_int(#value.len().try_into().unwrap_or(i32::MAX));
                for item in #value {
                    crate::protocol::Encode::encode(item, encoder);
                }
            },
        }
    }

    /// Expression reading the field.
    fn decode(self) -> TokenStream {
        match self {
            Self::Plain => quote! { crate::protocol::Decode::decode(decoder)? },
            Self::VarInt => quote! {
                crate::protocol::VarIntField::from_var_int(decoder.read_var_int()?)?
            },
            Self::Optional => quote! {
                if decoder.read_bool()? {
                    Some(crate::protocol::Decode::decode(decoder)?)
                } else {
                    None
                }
            },
            Self::VarIntList => quote! {
                {
                    let length = decoder.read_length()?;
                    let mut items = Vec::with_capacity(length);
                    for _ in 0..length {
                        items.push(crate::protocol::Decode::decode(decoder)?);
                    }
                    items
                }
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Style {
    Named,
    Tuple,
    Unit,
}

#[derive(Debug)]
struct Field {
    name: Option<Ident>,
    /// Local the field is bound to in generated code.
    binding: Ident,
    codec: Codec,
}

/// Fields of a struct or of one enum variant.
#[derive(Debug)]
struct FieldSet {
    style: Style,
    fields: Vec<Field>,
}

impl FieldSet {
    fn new(fields: &Fields) -> syn::Result<Self> {
        let style = match fields {
            Fields::Named(_) => Style::Named,
            Fields::Unnamed(_) => Style::Tuple,
            Fields::Unit => Style::Unit,
        };
        let fields = fields
            .iter()
            .enumerate()
            .map(|(i, field)| {
                Ok(Field {
                    name: field.ident.clone(),
                    binding: format_ident!("__field{}", i),
                    codec: Codec::of(field)?,
                })
            })
            .collect::<syn::Result<Vec<_>>>()?;
        Ok(Self { style, fields })
    }

    fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Binds every field to its local. Serves both as the pattern when
    /// encoding and as the constructor when decoding.
    fn bindings(&self) -> TokenStream {
        let bindings = self.fields.iter().map(|field| &field.binding);
        match self.style {
            Style::Unit => quote! {},
            Style::Tuple => quote! { (#(#bindings),*) },
            Style::Named => {
                let names = self.fields.iter().filter_map(|field| field.name.as_ref());
                quote! { { #(#names: #bindings),* } }
            }
        }
    }

    fn encode(&self) -> TokenStream {
        let writes = self
            .fields
            .iter()
            .map(|field| field.codec.encode(&field.binding));
        quote! { #(#writes)* }
    }

    fn decode(&self) -> TokenStream {
        let reads = self.fields.iter().map(|field| {
            let binding = &field.binding;
            let read = field.codec.decode();
            quote! { let #binding = #read; }
        });
        quote! { #(#reads)* }
    }
}

#[derive(Debug)]
struct Variant {
    ident: Ident,
    id: i64,
    fields: FieldSet,
}

#[derive(Debug)]
enum Shape {
    Struct(FieldSet),
    Enum {
        discriminant: Discriminant,
        variants: Vec<Variant>,
    },
}

impl Shape {
    fn parse(input: &DeriveInput, derive: &str) -> syn::Result<Self> {
        match &input.data {
            Data::Struct(data) => FieldSet::new(&data.fields).map(Self::Struct),
            Data::Enum(data) => {
                let discriminant = EnumAttrs::from_derive_input(input)?.discriminant;
                let mut seen = HashSet::new();
                let mut variants = Vec::with_capacity(data.variants.len());
                for variant in &data.variants {
                    let id = VariantAttrs::from_variant(variant)?.id;
                    if !seen.insert(id) {
                        return Err(syn::Error::new_spanned(
                            &variant.ident,
                            format!("variant id {id} is used more than once"),
                        ));
                    }
                    variants.push(Variant {
                        ident: variant.ident.clone(),
                        id,
                        fields: FieldSet::new(&variant.fields)?,
                    });
                }
                Ok(Self::Enum {
                    discriminant,
                    variants,
                })
            }
            Data::Union(data) => Err(syn::Error::new_spanned(
                data.union_token,
                format!("cannot derive {derive} on a union"),
            )),
        }
    }

    fn encode(&self) -> syn::Result<TokenStream> {
        match self {
            Self::Struct(fields) if fields.is_empty() => Ok(quote! {}),
            Self::Struct(fields) => {
                let pattern = fields.bindings();
                let writes = fields.encode();
                Ok(quote! {
                    let Self #pattern = self;
                    #writes
                })
            }
            Self::Enum { variants, .. } if variants.is_empty() => Ok(quote! { match *self {} }),
            Self::Enum {
                discriminant,
                variants,
            } => {
                let arms = variants
                    .iter()
                    .map(|variant| {
                        let ident = &variant.ident;
                        let pattern = variant.fields.bindings();
                        let write_id = discriminant.write(variant.id, ident.span())?;
                        let writes = variant.fields.encode();
                        Ok(quote! {
                            Self::#ident #pattern => {
                                #write_id
                                #writes
                            }
                        })
                    })
                    .collect::<syn::Result<Vec<_>>>()?;
                Ok(quote! {
                    match self {
                        #(#arms)*
                    }
                })
            }
        }
    }

    fn decode(&self) -> TokenStream {
        match self {
            Self::Struct(fields) => {
                let reads = fields.decode();
                let construct = fields.bindings();
                quote! {
                    #reads
                    Ok(Self #construct)
                }
            }
            Self::Enum {
                discriminant,
                variants,
            } => {
                let read_id = discriminant.read();
                let arms = variants.iter().map(|variant| {
                    let ident = &variant.ident;
                    let id = variant.id;
                    let reads = variant.fields.decode();
                    let construct = variant.fields.bindings();
                    quote! {
                        #id => {
                            #reads
                            Ok(Self::#ident #construct)
                        }
                    }
                });
                quote! {
                    let discriminant = i64::from(#read_id);
                    match discriminant {
                        #(#arms)*
                        _ => Err(crate::protocol::DecodeError::InvalidDiscriminant(discriminant)),
                    }
                }
            }
        }
    }
}

pub fn derive_encode_on(input: &DeriveInput) -> syn::Result<TokenStream> {
    let ident = &input.ident;
    let body = Shape::parse(input, "Encode")?.encode()?;
    Ok(quote! {
        impl crate::protocol::Encode for #ident {
            #[allow(unused_variables)]
            fn encode(&self, encoder: &mut crate::protocol::Encoder) {
                #body
            }
        }
    })
}

pub fn derive_decode_on(input: &DeriveInput) -> syn::Result<TokenStream> {
    let ident = &input.ident;
    let body = Shape::parse(input, "Decode")?.decode();
    Ok(quote! {
        impl crate::protocol::Decode for #ident {
            #[allow(unused_variables)]
            fn decode(
                decoder: &mut crate::protocol::Decoder,
            ) -> ::std::result::Result<Self, crate::protocol::DecodeError> {
                #body
            }
        }
    })
}
