//! Phase drive table: which phase is driven high, driven low, or left floating in each sector

use crate::sector::Sector;

/// Drive intent of a single phase
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriveIntent {
    /// High side switches with PWM, low side is its complement
    High,
    /// Low side held on, high side held off
    Low,
    /// Both switches open
    Float,
}

impl DriveIntent {
    pub const fn is_conducting(self) -> bool {
        !matches!(self, DriveIntent::Float)
    }
}

/// Motor phase, indexed in timer channel order (U = CH1, V = CH2, W = CH3)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Phase {
    U = 0,
    V = 1,
    W = 2,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::U, Phase::V, Phase::W];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Intents for phases U, V, W
pub type PhaseIntents = [DriveIntent; 3];

/// Every phase open. Used while stopped.
pub const FLOATING: PhaseIntents = [DriveIntent::Float; 3];

use DriveIntent::{Float, High, Low};

const TABLE: [PhaseIntents; 6] = [
    // U+, V-, W floating
    [High, Low, Float],
    // U+, W-, V floating
    [High, Float, Low],
    // V+, W-, U floating
    [Float, High, Low],
    // V+, U-, W floating
    [Low, High, Float],
    // W+, U-, V floating
    [Low, Float, High],
    // W+, V-, U floating
    [Float, Low, High],
];

/// Drive intents of U, V and W for `sector`
pub const fn intents_for(sector: Sector) -> PhaseIntents {
    TABLE[sector as usize]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sector::Direction;

    fn count(row: PhaseIntents, intent: DriveIntent) -> usize {
        row.iter().filter(|&&i| i == intent).count()
    }

    fn phase_with(row: PhaseIntents, intent: DriveIntent) -> Phase {
        Phase::ALL[row.iter().position(|&i| i == intent).unwrap()]
    }

    #[test]
    fn test_one_high_one_low_one_float() {
        for sector in Sector::ALL {
            let row = intents_for(sector);
            assert_eq!(count(row, High), 1, "{sector:?}");
            assert_eq!(count(row, Low), 1, "{sector:?}");
            assert_eq!(count(row, Float), 1, "{sector:?}");
        }
    }

    fn check_transition(from: Sector, to: Sector) {
        let a = intents_for(from);
        let b = intents_for(to);

        let released: Vec<_> = Phase::ALL
            .iter()
            .filter(|p| a[p.index()].is_conducting() && !b[p.index()].is_conducting())
            .collect();
        let picked_up: Vec<_> = Phase::ALL
            .iter()
            .filter(|p| !a[p.index()].is_conducting() && b[p.index()].is_conducting())
            .collect();
        assert_eq!(released.len(), 1, "{from:?} -> {to:?}");
        assert_eq!(picked_up.len(), 1, "{from:?} -> {to:?}");

        // The new conductor takes over the polarity the released phase gave up,
        // the remaining conductor keeps its own.
        let released = *released[0];
        let picked_up = *picked_up[0];
        assert_eq!(b[picked_up.index()], a[released.index()]);
        for phase in Phase::ALL {
            if phase != released && phase != picked_up {
                assert_eq!(a[phase.index()], b[phase.index()]);
            }
        }
    }

    #[test]
    fn test_forward_transitions_swap_one_conductor() {
        for sector in Sector::ALL {
            check_transition(sector, Direction::Forward.step(sector));
        }
    }

    #[test]
    fn test_reverse_transitions_swap_one_conductor() {
        for sector in Sector::ALL {
            check_transition(sector, Direction::Reverse.step(sector));
        }
    }

    #[test]
    fn test_roles_rotate_u_v_w() {
        let order = |phase: Phase| match phase {
            Phase::U => Phase::V,
            Phase::V => Phase::W,
            Phase::W => Phase::U,
        };
        // Each role moves to the next phase every two sectors
        for sector in [Sector::S0, Sector::S2, Sector::S4] {
            let here = intents_for(sector);
            let later = intents_for(sector.next().next());
            assert_eq!(phase_with(later, High), order(phase_with(here, High)));
            assert_eq!(phase_with(later, Low), order(phase_with(here, Low)));
        }
    }
}
