//! Squares, files and ranks. A1 = 0, H8 = 63.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::piece::Color;

/// Board file, `a` = 0 through `h` = 7.
pub type File = u8;

/// Board rank, rank 1 = 0 through rank 8 = 7.
pub type Rank = u8;

/// A board square indexed 0..64 with A1 = 0 and H8 = 63.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Square(u8);

#[rustfmt::skip]
impl Square {
    pub const A1: Square = Square(0);
    pub const B1: Square = Square(1);
    pub const C1: Square = Square(2);
    pub const D1: Square = Square(3);
    pub const E1: Square = Square(4);
    pub const F1: Square = Square(5);
    pub const G1: Square = Square(6);
    pub const H1: Square = Square(7);
    pub const A8: Square = Square(56);
    pub const C8: Square = Square(58);
    pub const D8: Square = Square(59);
    pub const E8: Square = Square(60);
    pub const F8: Square = Square(61);
    pub const G8: Square = Square(62);
    pub const H8: Square = Square(63);
}

impl Square {
    pub const COUNT: usize = 64;

    #[inline]
    #[must_use]
    pub const fn from_index(idx: usize) -> Self {
        debug_assert!(idx < 64);
        Square(idx as u8)
    }

    #[inline]
    #[must_use]
    pub const fn make(file: File, rank: Rank) -> Self {
        Square(rank * 8 + file)
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    #[must_use]
    pub const fn file(self) -> File {
        self.0 & 7
    }

    #[inline]
    #[must_use]
    pub const fn rank(self) -> Rank {
        self.0 >> 3
    }

    /// Mirror vertically (A1 <-> A8).
    #[inline]
    #[must_use]
    pub const fn flip_rank(self) -> Self {
        Square(self.0 ^ 56)
    }

    /// Mirror horizontally (A1 <-> H1).
    #[inline]
    #[must_use]
    pub const fn flip_file(self) -> Self {
        Square(self.0 ^ 7)
    }

    /// The square as seen from `color`'s side of the board: identity for
    /// white, vertical mirror for black.
    #[inline]
    #[must_use]
    pub const fn relative(self, color: Color) -> Self {
        match color {
            Color::White => self,
            Color::Black => self.flip_rank(),
        }
    }

    /// Rank as seen from `color`'s side (0 = own back rank).
    #[inline]
    #[must_use]
    pub const fn relative_rank(self, color: Color) -> Rank {
        self.relative(color).rank()
    }

    /// Offset by a signed step. The caller guarantees the result stays on
    /// the board; this is only used for pawn-push arithmetic where the
    /// geometry has already been checked.
    #[inline]
    #[must_use]
    pub const fn offset(self, step: i8) -> Self {
        Square((self.0 as i8 + step) as u8)
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            (b'a' + self.file()) as char,
            (b'1' + self.rank()) as char
        )
    }
}

impl FromStr for Square {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return Err(());
        }
        let file = bytes[0].wrapping_sub(b'a');
        let rank = bytes[1].wrapping_sub(b'1');
        if file > 7 || rank > 7 {
            return Err(());
        }
        Ok(Square::make(file, rank))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_coordinates() {
        assert_eq!(Square::A1.index(), 0);
        assert_eq!(Square::H8.index(), 63);
        assert_eq!(Square::E1.file(), 4);
        assert_eq!(Square::E1.rank(), 0);
        assert_eq!(Square::E1.flip_rank(), Square::E8);
        assert_eq!(Square::A1.flip_file(), Square::H1);
    }

    #[test]
    fn square_parsing() {
        assert_eq!("e4".parse::<Square>(), Ok(Square::make(4, 3)));
        assert_eq!(Square::make(4, 3).to_string(), "e4");
        assert!("i9".parse::<Square>().is_err());
        assert!("e".parse::<Square>().is_err());
    }

    #[test]
    fn relative_squares() {
        assert_eq!(Square::E1.relative(Color::Black), Square::E8);
        assert_eq!(Square::E8.relative_rank(Color::Black), 0);
    }
}
