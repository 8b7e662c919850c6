//! Definition of the [`Side`] structure.

use std::ops::Not;

/// Enumeration symbolizing the two sides of the court : left or right.
///
/// Player 1 always defends the left goal and player 2 the right one - the tag is assigned when the
/// match is registered, independently of join order.
///
/// The [`Not`] trait is implemented to support inversion using `!s` syntax.
///
/// The conversion to [`u8`] lives in [`crate::protocol`] and follows the wire encoding.
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Array index for per-side storage : [`Side::Left`] is 0, [`Side::Right`] is 1.
    pub fn index(self) -> usize {
        match self {
            Side::Left => 0,
            Side::Right => 1,
        }
    }
}

impl Not for Side {
    type Output = Side;
    fn not(self) -> Self::Output {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}
