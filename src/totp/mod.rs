use ring::hmac;

/// Length of a time step in seconds (RFC 6238 default).
pub const PERIOD: u64 = 30;

/// Number of decimal digits in a code.
pub const DIGITS: usize = 6;

const MODULUS: u32 = 1_000_000;

/// Compute the HOTP value for `secret` at `counter`.
///
/// The result is always in `0..=999_999`; use [`format_code`] to get the
/// zero padded text shown to the user.
pub fn compute(secret: &[u8], counter: u64) -> u32 {
    // HMAC-SHA1 is the RFC 6238 default and the only algorithm used here.
    let key = hmac::Key::new(hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY, secret);
    // The counter is hashed as 8 big endian bytes.
    let tag = hmac::sign(&key, &counter.to_be_bytes());
    let digest = tag.as_ref();

    // The offset is the low-order 4 bits of the last byte of the
    // 160 bit signature.
    let offset = (digest[19] & 0x0f) as usize;

    let number = u32::from_be_bytes([
        digest[offset] & 0x7f,
        digest[offset + 1],
        digest[offset + 2],
        digest[offset + 3],
    ]);

    number % MODULUS
}

/// Format a code with left padding to exactly [`DIGITS`] characters.
pub fn format_code(code: u32) -> String {
    format!("{:0w$}", code, w = DIGITS)
}

/// Position of a unix timestamp within the 30 second TOTP schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeStep {
    pub epoch: u64,
    pub counter: u64,
    pub remaining: u64,
}

impl TimeStep {
    pub fn at(epoch: u64) -> Self {
        TimeStep {
            epoch,
            counter: epoch / PERIOD,
            remaining: PERIOD - epoch % PERIOD,
        }
    }

    /// Share of the current step that has already elapsed, in `[0, 1)`.
    pub fn progress(&self) -> f64 {
        (self.epoch % PERIOD) as f64 / PERIOD as f64
    }

    /// Current zero padded code for `secret` in this step.
    pub fn code_for(&self, secret: &[u8]) -> String {
        format_code(compute(secret, self.counter))
    }
}
