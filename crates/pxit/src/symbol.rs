//! Packet bytes to 2-bit symbols, and symbols to cell colors.
//!
//! Each byte becomes four symbols, most significant pair first, so the byte
//! `0b10_01_11_00` is painted blue, white, green, red.

use crate::geometry::SYMBOLS_PER_BYTE;

/// A 2-bit value carried by one grid cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Symbol(u8);

impl Symbol {
    /// Symbol painted into cells that carry no packet data.
    pub const PADDING: Self = Self(0);

    /// Creates a symbol from the low two bits of `bits`.
    #[inline]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits & 0b11)
    }

    /// Returns the 2-bit value.
    #[inline]
    pub const fn value(self) -> u8 {
        self.0
    }
}

/// The four cell colors.
///
/// The mapping to symbols is fixed and must be identical on both ends:
/// red = 0, white = 1, blue = 2, green = 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellColor {
    Red,
    White,
    Blue,
    Green,
}

impl CellColor {
    /// All colors, indexed by symbol value.
    pub const ALL: [CellColor; 4] = [Self::Red, Self::White, Self::Blue, Self::Green];

    /// The color that paints `symbol`.
    #[inline]
    pub fn from_symbol(symbol: Symbol) -> Self {
        Self::ALL[symbol.value() as usize]
    }

    /// The symbol this color carries.
    #[inline]
    pub fn symbol(self) -> Symbol {
        match self {
            Self::Red => Symbol(0),
            Self::White => Symbol(1),
            Self::Blue => Symbol(2),
            Self::Green => Symbol(3),
        }
    }

    /// Fully saturated ARGB pixel value for this color.
    pub fn argb(self) -> u32 {
        match self {
            Self::Red => 0xFFFF_0000,
            Self::White => 0xFFFF_FFFF,
            Self::Blue => 0xFF00_00FF,
            Self::Green => 0xFF00_FF00,
        }
    }
}

impl std::fmt::Display for CellColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Red => "red",
            Self::White => "white",
            Self::Blue => "blue",
            Self::Green => "green",
        };
        f.pad(name)
    }
}

/// Expands each byte into four symbols, most significant bits first.
pub fn bytes_to_symbols(bytes: &[u8]) -> Vec<Symbol> {
    let mut symbols = Vec::with_capacity(bytes.len() * SYMBOLS_PER_BYTE);
    for &byte in bytes {
        // place values 64, 16, 4, 1
        symbols.push(Symbol::from_bits(byte >> 6));
        symbols.push(Symbol::from_bits(byte >> 4));
        symbols.push(Symbol::from_bits(byte >> 2));
        symbols.push(Symbol::from_bits(byte));
    }
    symbols
}

/// Packs every run of four symbols back into a byte.
///
/// `symbols.len()` must be a multiple of four; a trailing partial run is
/// ignored.
pub fn symbols_to_bytes(symbols: &[Symbol]) -> Vec<u8> {
    debug_assert_eq!(symbols.len() % SYMBOLS_PER_BYTE, 0);
    symbols
        .chunks_exact(SYMBOLS_PER_BYTE)
        .map(|run| {
            run.iter()
                .fold(0u8, |byte, symbol| (byte << 2) | symbol.value())
        })
        .collect()
}
