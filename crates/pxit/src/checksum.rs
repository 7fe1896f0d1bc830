//! Polynomial-remainder checksum over GF(256).
//!
//! A packet is read as a polynomial whose coefficients are its bytes, highest
//! power first. The checksum is the remainder of `m(x) * x^4` divided by a
//! fixed degree-4 generator `p(x)`, so a packet carrying its own checksum is
//! an exact multiple of `p(x)`.

use crate::geometry::CHECKSUM_SIZE;
use crate::gf256::GF256;

/// Roots of the generator polynomial. Encoder and decoder must agree on them.
pub const GENERATOR_ROOTS: [u8; 4] = [0x09, 0x11, 0x20, 0x01];

/// Builds `(x + e1)(x + e2)(x + e3)(x + e4)`.
///
/// Returns the coefficients of x^0 through x^3; the leading x^4 term is
/// implicit.
pub fn generator_polynomial(roots: [u8; 4]) -> [GF256; CHECKSUM_SIZE] {
    // Ascending powers of x
    let mut coefficients = vec![GF256::ONE];

    for root in roots.into_iter().map(GF256) {
        let mut next = vec![GF256::ZERO; coefficients.len() + 1];
        for (power, &coefficient) in coefficients.iter().enumerate() {
            next[power + 1] = next[power + 1] + coefficient;
            next[power] = next[power] + coefficient * root;
        }
        coefficients = next;
    }

    debug_assert_eq!(coefficients[CHECKSUM_SIZE], GF256::ONE);
    [
        coefficients[0],
        coefficients[1],
        coefficients[2],
        coefficients[3],
    ]
}

/// Computes and verifies packet checksums.
///
/// Holds `lut[s][i] = p[i] * s` for every possible leading byte `s`, so the
/// division loop is four XORs per byte.
#[derive(Clone)]
pub struct Checksum {
    generator: [GF256; CHECKSUM_SIZE],
    lut: [[u8; CHECKSUM_SIZE]; 256],
}

impl Checksum {
    /// Creates a codec for the standard generator polynomial.
    pub fn new() -> Self {
        Self::with_roots(GENERATOR_ROOTS)
    }

    /// Creates a codec for the generator with the given roots.
    pub fn with_roots(roots: [u8; 4]) -> Self {
        let generator = generator_polynomial(roots);
        let mut lut = [[0u8; CHECKSUM_SIZE]; 256];

        for (msb, row) in lut.iter_mut().enumerate() {
            for (entry, coefficient) in row.iter_mut().zip(generator) {
                *entry = (coefficient * GF256(msb as u8)).value();
            }
        }

        Self { generator, lut }
    }

    /// Coefficients of x^0 through x^3 of the generator polynomial.
    pub fn generator(&self) -> [GF256; CHECKSUM_SIZE] {
        self.generator
    }

    /// Writes the checksum of `packet` into its last four bytes.
    ///
    /// Whatever the checksum region held before is ignored. A buffer with no
    /// room for data ahead of the checksum is left untouched.
    pub fn compute(&self, packet: &mut [u8]) {
        if packet.len() <= CHECKSUM_SIZE {
            return;
        }
        let data_len = packet.len() - CHECKSUM_SIZE;

        let mut scratch = packet.to_vec();
        scratch[data_len..].fill(0);
        self.reduce(&mut scratch);

        packet[data_len..].copy_from_slice(&scratch[data_len..]);
    }

    /// Returns true if `packet` is a multiple of the generator polynomial.
    ///
    /// A packet whose bytes are all identical never verifies: blank footage
    /// can reduce to a zero remainder without carrying any data.
    pub fn verify(&self, packet: &[u8]) -> bool {
        if packet.len() <= CHECKSUM_SIZE {
            return false;
        }
        if packet.windows(2).all(|pair| pair[0] == pair[1]) {
            return false;
        }

        let mut scratch = packet.to_vec();
        self.reduce(&mut scratch);

        scratch[packet.len() - CHECKSUM_SIZE..]
            .iter()
            .all(|&byte| byte == 0)
    }

    /// Long division by `p(x)`, one leading byte per step. The remainder is
    /// left in the last four bytes.
    fn reduce(&self, buffer: &mut [u8]) {
        for ndx in 0..buffer.len() - CHECKSUM_SIZE {
            let row = &self.lut[buffer[ndx] as usize];
            buffer[ndx + 1] ^= row[3];
            buffer[ndx + 2] ^= row[2];
            buffer[ndx + 3] ^= row[1];
            buffer[ndx + 4] ^= row[0];
        }
    }
}

impl Default for Checksum {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checksum")
            .field("generator", &self.generator)
            .finish_non_exhaustive()
    }
}
