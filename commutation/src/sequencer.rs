//! Sector sequencer: owner of the current commutation sector

use crate::sector::{Direction, Sector};

#[derive(Debug, Default)]
pub struct SectorSequencer {
    current: Sector,
}

impl SectorSequencer {
    pub const fn new(start: Sector) -> Self {
        Self { current: start }
    }

    /// Move one sector forward and return it
    pub fn advance(&mut self) -> Sector {
        self.step(Direction::Forward)
    }

    /// Move one sector backward and return it
    pub fn retreat(&mut self) -> Sector {
        self.step(Direction::Reverse)
    }

    pub fn step(&mut self, direction: Direction) -> Sector {
        self.current = direction.step(self.current);
        self.current
    }

    pub fn current(&self) -> Sector {
        self.current
    }
}
