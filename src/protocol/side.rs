//! Wire-compliant serialization for [`Side`].

use crate::game::Side;

impl From<Side> for u8 {
    fn from(value: Side) -> Self {
        match value {
            Side::Left => 0,
            Side::Right => 1,
        }
    }
}
