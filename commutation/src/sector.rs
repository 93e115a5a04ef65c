//! Electrical sector of six-step commutation

/// One of the six electrical sectors
///
/// Each sector energizes 2 of the 3 phases:
/// - One phase driven high
/// - One phase driven low
/// - One phase floating (high-Z)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Sector {
    #[default]
    S0 = 0, // U+, V-, W floating
    S1 = 1, // U+, W-, V floating
    S2 = 2, // V+, W-, U floating
    S3 = 3, // V+, U-, W floating
    S4 = 4, // W+, U-, V floating
    S5 = 5, // W+, V-, U floating
}

impl Sector {
    /// All sectors in forward rotation order
    pub const ALL: [Sector; 6] = [
        Sector::S0,
        Sector::S1,
        Sector::S2,
        Sector::S3,
        Sector::S4,
        Sector::S5,
    ];

    /// Advance to the next sector (forward rotation)
    pub const fn next(self) -> Self {
        match self {
            Self::S0 => Self::S1,
            Self::S1 => Self::S2,
            Self::S2 => Self::S3,
            Self::S3 => Self::S4,
            Self::S4 => Self::S5,
            Self::S5 => Self::S0,
        }
    }

    /// Step back to the previous sector (reverse rotation)
    pub const fn prev(self) -> Self {
        match self {
            Self::S0 => Self::S5,
            Self::S1 => Self::S0,
            Self::S2 => Self::S1,
            Self::S3 => Self::S2,
            Self::S4 => Self::S3,
            Self::S5 => Self::S4,
        }
    }

    /// Sector for an index in 0..=5, `None` otherwise
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::S0),
            1 => Some(Self::S1),
            2 => Some(Self::S2),
            3 => Some(Self::S3),
            4 => Some(Self::S4),
            5 => Some(Self::S5),
            _ => None,
        }
    }

    /// Get the sector number (0-5)
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Rotation direction through the sector table
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

impl Direction {
    /// The sector that follows `sector` in this direction
    pub const fn step(self, sector: Sector) -> Sector {
        match self {
            Direction::Forward => sector.next(),
            Direction::Reverse => sector.prev(),
        }
    }
}
