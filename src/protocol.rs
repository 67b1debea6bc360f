//! Wire primitives, framing and the packet contract.

mod decoder;
mod encoder;
pub mod frame_codec;
pub mod packet;

pub use decoder::{Decode, DecodeError, Decoder};
pub use encoder::{var_int_size, Encode, Encoder};

/// Limit to avoid out-of-memory DOS.
pub const BUFFER_LIMIT: usize = 1024 * 1024; // 1 MiB

/// Integer types allowed behind `#[encoding(varint)]`.
///
/// Every value of the type survives a round trip. `u32` goes through its
/// bit pattern, so values above `i32::MAX` take five bytes. Narrower types
/// are range-checked when decoding.
pub trait VarIntField: Sized {
    fn to_var_int(self) -> i32;

    fn from_var_int(x: i32) -> Result<Self, DecodeError>;
}

impl VarIntField for i32 {
    fn to_var_int(self) -> i32 {
        self
    }

    fn from_var_int(x: i32) -> Result<Self, DecodeError> {
        Ok(x)
    }
}

impl VarIntField for u32 {
    fn to_var_int(self) -> i32 {
        bytemuck::cast(self)
    }

    fn from_var_int(x: i32) -> Result<Self, DecodeError> {
        Ok(bytemuck::cast(x))
    }
}

macro_rules! narrow_var_int_fields {
    ($($ty:ty),*) => {
        $(
            impl VarIntField for $ty {
                fn to_var_int(self) -> i32 {
                    i32::from(self)
                }

                fn from_var_int(x: i32) -> Result<Self, DecodeError> {
                    Ok(Self::try_from(x)?)
                }
            }
        )*
    };
}

narrow_var_int_fields!(u8, u16);

#[cfg(test)]
mod tests {
    use super::*;
    use backend_protocol_macros::{Decode, Encode};

    #[derive(Debug, Clone, PartialEq, Encode, Decode)]
    struct Coordinates(u16, u16);

    #[derive(Debug, Clone, PartialEq, Encode, Decode)]
    #[encoding(discriminant = "varint")]
    enum Command {
        #[encoding(id = 0)]
        Stop,
        #[encoding(id = 200)]
        Move(Coordinates, #[encoding(varint)] u32),
        #[encoding(id = 3)]
        Say {
            #[encoding(bool_prefixed)]
            target: Option<String>,
            text: String,
        },
    }

    fn encode(value: &impl Encode) -> Vec<u8> {
        let mut buf = Vec::new();
        value.encode(&mut Encoder::new(&mut buf));
        buf
    }

    fn decode<T: Decode>(bytes: &[u8]) -> Result<T, DecodeError> {
        let mut decoder = Decoder::new(bytes);
        let value = T::decode(&mut decoder)?;
        decoder.finish()?;
        Ok(value)
    }

    #[test]
    fn tuple_fields_in_declaration_order() {
        assert_eq!(encode(&Coordinates(1, 0xfffe)), [0x00, 0x01, 0xff, 0xfe]);
    }

    #[test]
    fn varint_discriminant_precedes_fields() {
        let command = Command::Move(Coordinates(0, 2), 300);
        let bytes = encode(&command);
        assert_eq!(bytes, [0xc8, 0x01, 0x00, 0x00, 0x00, 0x02, 0xac, 0x02]);
        assert_eq!(decode::<Command>(&bytes).unwrap(), command);

        assert_eq!(encode(&Command::Stop), [0x00]);
    }

    #[test]
    fn named_variant_fields() {
        let command = Command::Say {
            target: None,
            text: "hi".to_owned(),
        };
        let bytes = encode(&command);
        assert_eq!(bytes, [0x03, 0x00, 0x02, b'h', b'i']);
        assert_eq!(decode::<Command>(&bytes).unwrap(), command);
    }

    #[test]
    fn unknown_variant_id() {
        assert!(matches!(
            decode::<Command>(&[0x05]),
            Err(DecodeError::InvalidDiscriminant(5))
        ));
    }

    #[derive(Debug, PartialEq, Encode, Decode)]
    struct Counter(#[encoding(varint)] u16);

    #[test]
    fn unsigned_varint_uses_full_range() {
        for value in [0, 1, i32::MAX as u32, i32::MAX as u32 + 1, u32::MAX] {
            let command = Command::Move(Coordinates(0, 0), value);
            assert_eq!(decode::<Command>(&encode(&command)).unwrap(), command);
        }

        let bytes = [0xc8, 0x01, 0, 0, 0, 0, 0xff, 0xff, 0xff, 0xff, 0x0f];
        assert_eq!(
            decode::<Command>(&bytes).unwrap(),
            Command::Move(Coordinates(0, 0), u32::MAX)
        );
    }

    #[test]
    fn narrow_varint_is_range_checked() {
        assert_eq!(encode(&Counter(u16::MAX)), [0xff, 0xff, 0x03]);
        assert_eq!(decode::<Counter>(&[0xff, 0xff, 0x03]).unwrap(), Counter(u16::MAX));
        // 65536
        assert!(matches!(
            decode::<Counter>(&[0x80, 0x80, 0x04]),
            Err(DecodeError::IntConversion(_))
        ));
    }
}
