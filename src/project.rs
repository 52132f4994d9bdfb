//! Read-only store projection API for emitters (§4.9).
//!
//! This is the only surface external collaborators (the HDL/register/
//! linker-script emitters, out of scope per spec.md §1) are meant to read
//! from once the pipeline has frozen the design.

use crate::bus::{Bus, BusRegistry, Master, Slave};
use crate::clock::{Clock, ClockRegistry};
use crate::interrupt::{InterruptLine, Pic, PicRegistry};
use std::collections::HashSet;

pub struct Project {
    pub buses: BusRegistry,
    pub clocks: ClockRegistry,
    pub pics: PicRegistry,
    pub lines: Vec<InterruptLine>,
}

impl Project {
    /// Every bus, children before their parent bridge (§4.9).
    pub fn list_buses(&self) -> Vec<&Bus> {
        let mut visited = HashSet::new();
        let mut out = Vec::new();
        for name in self.buses.names() {
            visit(name, &self.buses, &mut visited, &mut out);
        }
        out
    }

    /// A bus's slaves in ascending base-address order.
    pub fn list_slaves<'a>(&self, bus: &'a Bus) -> Vec<&'a Slave> {
        let mut slaves: Vec<&Slave> = bus.slaves.iter().collect();
        slaves.sort_by_key(|s| s.base_octets.unwrap_or(i64::MAX));
        slaves
    }

    pub fn list_masters<'a>(&self, bus: &'a Bus) -> Vec<&'a Master> {
        bus.masters.iter().collect()
    }

    pub fn list_pics(&self) -> Vec<&Pic> {
        self.pics.list().collect()
    }

    pub fn list_clocks(&self) -> Vec<&Clock> {
        self.clocks.list().collect()
    }
}

fn visit<'a>(name: &'a str, reg: &'a BusRegistry, visited: &mut HashSet<&'a str>, out: &mut Vec<&'a Bus>) {
    if visited.contains(name) {
        return;
    }
    visited.insert(name);
    let Some(bus) = reg.get(name) else { return };
    for s in &bus.slaves {
        if let Some(child) = &s.child_bus {
            visit(child.as_str(), reg, visited, out);
        }
    }
    out.push(bus);
}
