use core::fmt;

#[derive(thiserror_no_std::Error, Clone, Debug, PartialEq)]
pub enum ParseKeyError {
    #[error("keystr did not match the size requested")]
    LengthMismatch {
        requested_key_len: usize,
        actual_key_len: usize,
    },

    #[error("keystr is not valid hex")]
    InvalidHex(#[from] hex::FromHexError),
}

pub fn hex_str_to_array<const N: usize>(s: &str) -> Result<[u8; N], ParseKeyError> {
    let mut buf = [0; N];

    if s.len() != buf.len() * 2 {
        return Err(ParseKeyError::LengthMismatch {
            requested_key_len: N,
            actual_key_len: s.len() / 2,
        });
    }

    hex::decode_to_slice(s, &mut buf)?;

    Ok(buf)
}

#[binrw::binrw]
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct HexArray<const N: usize>(pub [u8; N]);

impl<const N: usize> fmt::Debug for HexArray<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        <Self as fmt::Display>::fmt(self, f)?;
        write!(f, "]")
    }
}

impl<const N: usize> fmt::Display for HexArray<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
