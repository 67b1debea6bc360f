use std::{num::TryFromIntError, str::Utf8Error};

/// An error while decoding a packet payload.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("need at least {0} more bytes")]
    EndOfStream(usize),
    #[error("invalid boolean pattern {0} - expected either 0 or 1")]
    InvalidBool(u8),
    #[error("varint is too long")]
    VarIntTooLong,
    #[error("declared length {length} exceeds the {remaining} remaining bytes")]
    LengthExceedsRemaining { length: usize, remaining: usize },
    #[error("invalid discriminant '{0}'")]
    InvalidDiscriminant(i64),
    #[error("{0} unread bytes left after the last field")]
    TrailingBytes(usize),
    #[error(transparent)]
    Utf8(#[from] Utf8Error),
    #[error(transparent)]
    IntConversion(#[from] TryFromIntError),
}

pub type Result<T, E = DecodeError> = std::result::Result<T, E>;

const MAX_VAR_INT_SIZE: usize = 5;

macro_rules! big_endian_readers {
    ($($read:ident -> $ty:ty),* $(,)?) => {
        $(
            #[doc = concat!("Reads a big-endian `", stringify!($ty), "`.")]
            pub fn $read(&mut self) -> Result<$ty> {
                self.consume().map(<$ty>::from_be_bytes)
            }
        )*
    };
}

/// A raw decoder over one packet payload.
#[derive(Debug)]
pub struct Decoder<'a> {
    buffer: &'a [u8],
}

impl<'a> Decoder<'a> {
    /// Creates a decoder from the buffer it will read from.
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer }
    }

    /// Bytes not read yet.
    pub fn buffer(&self) -> &'a [u8] {
        self.buffer
    }

    pub fn is_finished(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Fails with `TrailingBytes` unless the whole buffer was consumed.
    pub fn finish(&self) -> Result<()> {
        if self.is_finished() {
            Ok(())
        } else {
            Err(DecodeError::TrailingBytes(self.buffer.len()))
        }
    }

    /// Consumes `n` bytes from the buffer, returning them as a slice.
    pub fn consume_slice(&mut self, n: usize) -> Result<&'a [u8]> {
        if n <= self.buffer.len() {
            let (data, buffer) = self.buffer.split_at(n);
            self.buffer = buffer;
            Ok(data)
        } else {
            Err(DecodeError::EndOfStream(n - self.buffer.len()))
        }
    }

    /// Consumes `N` bytes into an array.
    pub fn consume<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut array = [0u8; N];
        array.copy_from_slice(self.consume_slice(N)?);
        Ok(array)
    }

    big_endian_readers! {
        read_u8 -> u8,
        read_u16 -> u16,
        read_u32 -> u32,
        read_i32 -> i32,
        read_u64 -> u64,
    }

    /// Reads a boolean. Any byte other than `0` or `1` is an error.
    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            x => Err(DecodeError::InvalidBool(x)),
        }
    }

    pub fn read_var_int(&mut self) -> Result<i32> {
        self.read_var_int_with_size().map(|(x, _)| x)
    }

    /// Reads a VarInt, also returning how many bytes it took.
    pub fn read_var_int_with_size(&mut self) -> Result<(i32, usize)> {
        let mut value: u32 = 0;
        for i in 0..MAX_VAR_INT_SIZE {
            let byte = self.read_u8()?;
            value |= u32::from(byte & 0x7f) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok((bytemuck::cast(value), i + 1));
            }
        }
        Err(DecodeError::VarIntTooLong)
    }

    /// Reads a VarInt length prefix, rejecting lengths
    /// that cannot fit in the rest of the buffer.
    pub fn read_length(&mut self) -> Result<usize> {
        let length = usize::try_from(self.read_var_int()?)?;
        let remaining = self.buffer.len();
        if length > remaining {
            return Err(DecodeError::LengthExceedsRemaining { length, remaining });
        }
        Ok(length)
    }

    /// Reads a VarInt-prefixed UTF-8 string, borrowing from the buffer.
    ///
    /// The only bound on its length is the payload itself.
    pub fn read_string(&mut self) -> Result<&'a str> {
        let length = self.read_length()?;
        Ok(std::str::from_utf8(self.consume_slice(length)?)?)
    }
}

/// A type that can be read from a [`Decoder`].
pub trait Decode: Sized {
    fn decode(decoder: &mut Decoder) -> Result<Self>;
}

macro_rules! decode_primitives {
    ($($ty:ty => $read:ident),* $(,)?) => {
        $(
            impl Decode for $ty {
                fn decode(decoder: &mut Decoder) -> Result<Self> {
                    decoder.$read()
                }
            }
        )*
    };
}

decode_primitives! {
    u8 => read_u8,
    u16 => read_u16,
    u32 => read_u32,
    i32 => read_i32,
    u64 => read_u64,
    bool => read_bool,
}

impl Decode for String {
    fn decode(decoder: &mut Decoder) -> Result<Self> {
        decoder.read_string().map(str::to_owned)
    }
}
