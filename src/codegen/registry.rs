use std::collections::VecDeque;

use tracing::trace;

use super::scope::VariableId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupant {
    Free,
    Holds(VariableId),
}

#[derive(Debug)]
pub struct Registry {
    occupants: Vec<Occupant>,
    order: VecDeque<usize>,
    /// `None` grows without bound, for targets whose registers are host variables.
    capacity: Option<usize>,
}

impl Registry {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            occupants: Vec::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    /// Hands out a register at the most-recently-used position, returning
    /// whatever it held before. A `Holds` result means the caller must spill.
    pub fn allocate(&mut self) -> (usize, Occupant) {
        if let Some(position) = self
            .order
            .iter()
            .position(|reg| self.occupants[*reg] == Occupant::Free)
        {
            let reg = self.order[position];
            self.promote(reg);
            return (reg, Occupant::Free);
        }

        let grow = self
            .capacity
            .is_none_or(|capacity| self.occupants.len() < capacity);
        if !grow && let Some(reg) = self.order.pop_front() {
            self.order.push_back(reg);
            let evicted = std::mem::replace(&mut self.occupants[reg], Occupant::Free);
            trace!(reg, ?evicted, "evicting least recently used register");
            return (reg, evicted);
        }

        let reg = self.occupants.len();
        self.occupants.push(Occupant::Free);
        self.order.push_back(reg);
        (reg, Occupant::Free)
    }

    /// Moves `reg` to the most-recently-used position.
    pub fn promote(&mut self, reg: usize) {
        if let Some(position) = self.order.iter().position(|r| *r == reg) {
            self.order.remove(position);
        }
        self.order.push_back(reg);
    }

    /// Fetches the occupant of `reg` and promotes it.
    pub fn get(&mut self, reg: usize) -> Occupant {
        self.promote(reg);
        self.occupants[reg]
    }

    pub fn occupant(&self, reg: usize) -> Occupant {
        self.occupants
            .get(reg)
            .copied()
            .unwrap_or(Occupant::Free)
    }

    pub fn assign(&mut self, reg: usize, variable: VariableId) {
        self.occupants[reg] = Occupant::Holds(variable);
    }

    /// Empties `reg` and demotes it to the least-recently-used position.
    pub fn free(&mut self, reg: usize) {
        self.occupants[reg] = Occupant::Free;
        if let Some(position) = self.order.iter().position(|r| *r == reg) {
            self.order.remove(position);
        }
        self.order.push_front(reg);
    }

    /// Occupied registers in index order.
    pub fn occupied(&self) -> Vec<(usize, VariableId)> {
        self.occupants
            .iter()
            .enumerate()
            .filter_map(|(reg, occupant)| match occupant {
                Occupant::Holds(variable) => Some((reg, *variable)),
                Occupant::Free => None,
            })
            .collect()
    }
}
