macro_rules! big_endian_writers {
    ($($write:ident($ty:ty)),* $(,)?) => {
        $(
            #[doc = concat!("Writes a big-endian `", stringify!($ty), "`.")]
            pub fn $write(&mut self, x: $ty) {
                self.buffer.extend_from_slice(&x.to_be_bytes());
            }
        )*
    };
}

/// A raw encoder that appends packet payload bytes to a buffer.
#[derive(Debug)]
pub struct Encoder<'a> {
    buffer: &'a mut Vec<u8>,
}

impl<'a> Encoder<'a> {
    /// Creates an encoder that will append to the provided
    /// byte buffer.
    ///
    /// Any existing contents of `buffer` are left untouched.
    pub fn new(buffer: &'a mut Vec<u8>) -> Self {
        Self { buffer }
    }

    big_endian_writers! {
        write_u8(u8),
        write_u16(u16),
        write_u32(u32),
        write_i32(i32),
        write_u64(u64),
    }

    /// Writes a boolean as a single `0` or `1` byte.
    pub fn write_bool(&mut self, x: bool) {
        self.write_u8(u8::from(x));
    }

    /// Writes a VarInt: seven bits per byte, least significant group
    /// first, high bit set on every byte but the last. Negative values
    /// always take five bytes. Returns the number of bytes written.
    pub fn write_var_int(&mut self, x: i32) -> usize {
        let mut rest: u32 = bytemuck::cast(x);
        let start = self.buffer.len();
        while rest >= 0x80 {
            self.buffer.push(rest as u8 & 0x7f | 0x80);
            rest >>= 7;
        }
        self.buffer.push(rest as u8);
        self.buffer.len() - start
    }

    /// Writes a varint-prefixed string to the stream.
    pub fn write_string(&mut self, x: &str) {
        self.write_var_int(x.len().try_into().unwrap_or(i32::MAX));
        self.buffer.extend_from_slice(x.as_bytes());
    }
}

/// Number of bytes `x` occupies when written as a VarInt.
pub fn var_int_size(x: i32) -> usize {
    let bits = u32::BITS - bytemuck::cast::<i32, u32>(x).leading_zeros();
    (bits.max(1) as usize).div_ceil(7)
}

/// A type that can be written to an [`Encoder`].
pub trait Encode {
    fn encode(&self, encoder: &mut Encoder);
}

macro_rules! encode_primitives {
    ($($ty:ty => $write:ident),* $(,)?) => {
        $(
            impl Encode for $ty {
                fn encode(&self, encoder: &mut Encoder) {
                    encoder.$write(*self);
                }
            }
        )*
    };
}

encode_primitives! {
    u8 => write_u8,
    u16 => write_u16,
    u32 => write_u32,
    i32 => write_i32,
    u64 => write_u64,
    bool => write_bool,
}

impl Encode for String {
    fn encode(&self, encoder: &mut Encoder) {
        encoder.write_string(self);
    }
}
