//! EAN-13 symbology: check digit and module pattern.
//!
//! A symbol is 95 modules wide: start guard `101`, six left-hand digits
//! whose L/G parity encodes the leading digit, centre guard `01010`, six
//! right-hand digits in R encoding, end guard `101`.

use crate::error::{Error, Result};

/// Total width of an EAN-13 symbol in modules, without quiet zones.
pub const MODULE_COUNT: usize = 95;

const START_GUARD: [bool; 3] = [true, false, true];
const CENTRE_GUARD: [bool; 5] = [false, true, false, true, false];
const END_GUARD: [bool; 3] = [true, false, true];

/// L-code patterns; R codes are their complement, G codes their reversed complement.
const L_CODES: [u8; 10] = [
    0b0001101, 0b0011001, 0b0010011, 0b0111101, 0b0100011, 0b0110001, 0b0101111, 0b0111011,
    0b0110111, 0b0001011,
];

/// Parity of the six left-hand digits per leading digit (`true` = G).
const PARITY: [[bool; 6]; 10] = [
    [false, false, false, false, false, false],
    [false, false, true, false, true, true],
    [false, false, true, true, false, true],
    [false, false, true, true, true, false],
    [false, true, false, false, true, true],
    [false, true, true, false, false, true],
    [false, true, true, true, false, false],
    [false, true, false, true, false, true],
    [false, true, false, true, true, false],
    [false, true, true, false, true, false],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    L,
    G,
    R,
}

/// A validated 13-digit EAN code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ean13 {
    digits: [u8; 13],
}

/// Compute the EAN-13 check digit for the first twelve digits.
pub fn checksum(digits: &[u8; 12]) -> u8 {
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, &d)| u32::from(d) * if i % 2 == 0 { 1 } else { 3 })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

impl Ean13 {
    /// Parse a 12-digit (check digit appended) or 13-digit (check digit
    /// verified) code.
    pub fn parse(code: &str) -> Result<Self> {
        let len = code.len();
        if !(len == 12 || len == 13) || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::invalid_format(code));
        }

        let mut digits = [0u8; 13];
        for (slot, b) in digits.iter_mut().zip(code.bytes()) {
            *slot = b - b'0';
        }

        let mut payload = [0u8; 12];
        payload.copy_from_slice(&digits[..12]);
        let expected = checksum(&payload);

        if len == 13 && digits[12] != expected {
            return Err(Error::ChecksumMismatch {
                code: code.to_string(),
                expected,
            });
        }
        digits[12] = expected;

        Ok(Self { digits })
    }

    pub fn check_digit(&self) -> u8 {
        self.digits[12]
    }

    pub fn digits(&self) -> &[u8; 13] {
        &self.digits
    }

    /// The bar pattern, `true` for a dark module.
    pub fn modules(&self) -> Vec<bool> {
        let mut out = Vec::with_capacity(MODULE_COUNT);
        out.extend_from_slice(&START_GUARD);

        let parity = PARITY[usize::from(self.digits[0])];
        for (i, &digit) in self.digits[1..7].iter().enumerate() {
            let encoding = if parity[i] {
                Encoding::G
            } else {
                Encoding::L
            };
            push_digit(&mut out, digit, encoding);
        }

        out.extend_from_slice(&CENTRE_GUARD);

        for &digit in &self.digits[7..] {
            push_digit(&mut out, digit, Encoding::R);
        }

        out.extend_from_slice(&END_GUARD);
        out
    }

    /// Whether module `index` belongs to a guard pattern (drawn taller).
    pub fn is_guard_module(index: usize) -> bool {
        index < 3 || (45..50).contains(&index) || index >= MODULE_COUNT - 3
    }
}

impl std::fmt::Display for Ean13 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for d in self.digits {
            write!(f, "{d}")?;
        }
        Ok(())
    }
}

fn push_digit(out: &mut Vec<bool>, digit: u8, encoding: Encoding) {
    let l = L_CODES[usize::from(digit)];
    let pattern = match encoding {
        Encoding::L => l,
        Encoding::R => !l & 0b111_1111,
        Encoding::G => (!l & 0b111_1111).reverse_bits() >> 1,
    };
    for bit in (0..7).rev() {
        out.push(pattern & (1 << bit) != 0);
    }
}
