//! Implements the derive for the `Packet` trait.

use darling::{FromDeriveInput, FromMeta};
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, LitStr};

/// Options attached to a packet type.
#[derive(Debug, FromDeriveInput)]
#[darling(attributes(packet))]
struct PacketOptions {
    /// Protocol identifier of the packet type.
    id: u32,
    /// Logical channel the packet travels on.
    direction: Direction,
    /// Name used in logs. Defaults to the type name.
    #[darling(default)]
    name: Option<String>,
}

#[derive(Debug, FromMeta)]
enum Direction {
    #[darling(rename = "client_to_server")]
    ClientToServer,
    #[darling(rename = "server_to_client")]
    ServerToClient,
    #[darling(rename = "internal")]
    Internal,
}

pub fn derive_packet_on(input: &DeriveInput) -> syn::Result<TokenStream> {
    if let Data::Union(u) = &input.data {
        return Err(syn::Error::new_spanned(
            u.union_token,
            "cannot derive Packet on a union",
        ));
    }

    let options = PacketOptions::from_derive_input(input)?;
    let ident = &input.ident;
    let id = options.id;
    let direction = match options.direction {
        Direction::ClientToServer => quote! { ClientToServer },
        Direction::ServerToClient => quote! { ServerToClient },
        Direction::Internal => quote! { Internal },
    };
    let name = LitStr::new(
        &options.name.unwrap_or_else(|| ident.to_string()),
        ident.span(),
    );

    Ok(quote! {
        impl crate::protocol::packet::Packet for #ident {
            const ID: crate::protocol::packet::PacketId = crate::protocol::packet::PacketId(#id);
            const DIRECTION: crate::protocol::packet::Direction =
                crate::protocol::packet::Direction::#direction;
            const NAME: &'static str = #name;
        }
    })
}
