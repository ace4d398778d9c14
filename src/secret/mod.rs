use data_encoding::BASE32;

use crate::store::EmptySecret;

/// Errors produced while turning user-entered text into key bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("secret is not valid base32")]
    InvalidEncoding,
    #[error("secret decodes to an empty key")]
    Empty,
}

impl From<EmptySecret> for DecodeError {
    fn from(_: EmptySecret) -> Self {
        DecodeError::Empty
    }
}

/// Decode a human-entered secret into raw key bytes.
///
/// Spaces are removed and the text is upper-cased before it is decoded
/// as RFC 4648 base32. Padding is not added: `MFRGG` is rejected, only
/// `MFRGG===` decodes.
pub fn decode(text: &str) -> Result<Vec<u8>, DecodeError> {
    let s: String = text
        .chars()
        .filter(|c| *c != ' ')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    BASE32
        .decode(s.as_bytes())
        .map_err(|_| DecodeError::InvalidEncoding)
}

/// Decode `text` and apply the accept policy: a key must not be empty.
pub fn accept(text: &str) -> Result<Vec<u8>, DecodeError> {
    let key = decode(text)?;
    if key.is_empty() {
        return Err(DecodeError::Empty);
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_rfc_seed() {
        // base32 of the ASCII seed "12345678901234567890"
        let key = decode("GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ").unwrap();
        assert_eq!(key, b"12345678901234567890".to_vec());
    }

    #[test]
    fn decode_ignores_case_and_spaces() {
        let plain = decode("JBSWY3DPEHPK3PXP").unwrap();
        assert_eq!(decode("jbsw y3dp ehpk 3pxp").unwrap(), plain);
        assert_eq!(decode("  JbSwY3dPeHpK3pXp ").unwrap(), plain);
    }

    #[test]
    fn decode_round_trips_arbitrary_bytes() {
        let samples: [&[u8]; 5] = [b"a", b"ab", b"\x00\xff\x10", b"hello world", &[0u8; 20]];
        for bytes in samples.iter() {
            let encoded = BASE32.encode(bytes).to_lowercase();
            let spaced: String = encoded
                .chars()
                .enumerate()
                .flat_map(|(i, c)| {
                    if i % 4 == 3 {
                        vec![c, ' ']
                    } else {
                        vec![c]
                    }
                })
                .collect();
            assert_eq!(decode(&spaced).unwrap(), bytes.to_vec());
        }
    }

    #[test]
    fn decode_requires_full_padding() {
        assert_eq!(decode("MFRGG===").unwrap(), b"abc".to_vec());
        assert_eq!(decode("mfrg g===").unwrap(), b"abc".to_vec());
        for short in ["MFRGG", "MFRGG=", "MFRGG==", "JBSWY3DPEHPK3PX"].iter() {
            assert_eq!(decode(short), Err(DecodeError::InvalidEncoding), "{}", short);
        }
        assert_eq!(accept("MFRGG"), Err(DecodeError::InvalidEncoding));
    }

    #[test]
    fn decode_rejects_outside_alphabet() {
        let samples = [
            "JBSWY3DP0HPK3PXP",
            "JBSWY3DP1HPK3PXP",
            "JBSWY3DP8HPK3PXP",
            "JBSWY3DP9HPK3PXP",
            "JBSW-3DPEHPK3PXP",
            "JBSW!",
        ];
        for bad in samples.iter() {
            assert_eq!(decode(bad), Err(DecodeError::InvalidEncoding), "{}", bad);
        }
    }

    #[test]
    fn decode_rejects_impossible_length() {
        assert_eq!(decode("A"), Err(DecodeError::InvalidEncoding));
    }

    #[test]
    fn accept_rejects_empty_key() {
        assert_eq!(decode("   ").unwrap(), Vec::<u8>::new());
        assert_eq!(accept("   "), Err(DecodeError::Empty));
        assert_eq!(accept(""), Err(DecodeError::Empty));
        assert_eq!(DecodeError::from(EmptySecret), DecodeError::Empty);
    }
}
