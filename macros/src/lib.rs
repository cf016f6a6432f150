use proc_macro::{self, TokenStream};
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Expr, Lit};

///
/// A derive macro which implements TryFrom<u8> for an enum.
///
/// Variants may carry explicit integer discriminants (they do not need to
/// start at zero or be contiguous); a variant without one takes the previous
/// discriminant plus one, as the compiler does.
///
/// usage:
/// ```rust
/// #[derive(TryFromByte)]
/// ```
///
#[proc_macro_derive(TryFromByte)]
pub fn try_from_byte(input: TokenStream) -> TokenStream {
    // parse the code into DeriveInput
    let DeriveInput { ident, data, .. } = parse_macro_input!(input);
    let variants = match data {
        Data::Enum(enum_item) => enum_item.variants,
        _ => panic!("TryFromByte only works on Enums"),
    };
    // build one match arm per variant, tracking the running discriminant
    let mut next_discriminant: u8 = 0;
    let mut arms = Vec::new();
    for variant in variants {
        let variant_ident = &variant.ident;
        let discriminant = match &variant.discriminant {
            Some((_, Expr::Lit(expr_lit))) => match &expr_lit.lit {
                Lit::Int(int) => int
                    .base10_parse::<u8>()
                    .expect("TryFromByte discriminants must fit in a u8"),
                _ => panic!("TryFromByte requires integer discriminants"),
            },
            Some(_) => panic!("TryFromByte requires literal discriminants"),
            None => next_discriminant,
        };
        next_discriminant = discriminant.wrapping_add(1);
        arms.push(quote! {
            #discriminant => Ok(#ident::#variant_ident),
        });
    }
    // use the arms to implement TryFrom for the enum
    let output = quote! {
        impl std::convert::TryFrom<u8> for #ident {
            type Error = &'static str;
            fn try_from(x: u8) -> Result<Self, Self::Error> {
                match x {
                    #(#arms)*
                    _ => Err(concat!("invalid ", stringify!(#ident), " value")),
                }
            }
        }
    };
    output.into()
}
