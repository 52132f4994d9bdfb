//! Slave-tier classifier and sub-bus synthesizer (§4.6).

use crate::bus::{Bus, BusRegistry, Slave, SlaveTier};

const SIO_SUFFIX: &str = "_sio";
const DIO_SUFFIX: &str = "_dio";

/// Applies the tier-mixing policy to every bus currently in `registry`,
/// synthesizing bridge buses where needed. Newly synthesized buses are
/// themselves already tier-resolved (their slaves were all one tier by
/// construction) so a single pass over the pre-existing bus names suffices.
pub fn classify_and_synthesize(registry: &mut BusRegistry) {
    let bus_names: Vec<String> = registry.names().map(String::from).collect();
    for name in bus_names {
        process_bus(&name, registry);
    }
}

fn process_bus(name: &str, registry: &mut BusRegistry) {
    let bus = registry.get_mut(name).expect("name came from registry.names()");
    let total = bus.slaves.len();
    if total == 0 {
        return;
    }

    let mut num_single = bus.slaves.iter().filter(|s| s.tier == SlaveTier::Single).count();
    let mut num_double = bus.slaves.iter().filter(|s| s.tier == SlaveTier::Double).count();

    if num_single == total {
        return;
    }
    if num_single <= 2 && num_double > 0 {
        for s in bus.slaves.iter_mut() {
            if s.tier == SlaveTier::Single {
                s.tier = SlaveTier::Double;
            }
        }
        num_double += num_single;
        num_single = 0;
    }
    if num_double == total {
        return;
    }

    if num_single > 0 {
        synth_bridge(name, registry, SlaveTier::Single, SIO_SUFFIX);
    }
    if let Some(parent) = registry.get(name) {
        let residual_double = parent.slaves.iter().filter(|s| s.tier == SlaveTier::Double).count();
        if residual_double > 0 && residual_double < parent.slaves.len() {
            synth_bridge(name, registry, SlaveTier::Double, DIO_SUFFIX);
        }
    }
}

/// Moves every slave of `tier` off `parent_name` onto a freshly created
/// child bus, then registers a bridge slave for that child bus back onto
/// the parent (§4.6, §9 "a bridge is just a slave that also owns a child
/// bus").
fn synth_bridge(parent_name: &str, registry: &mut BusRegistry, tier: SlaveTier, suffix: &str) {
    let parent = registry.get_mut(parent_name).expect("parent bus must exist");
    let (moved, kept): (Vec<Slave>, Vec<Slave>) = parent.slaves.drain(..).partition(|s| s.tier == tier);
    parent.slaves = kept;
    if moved.is_empty() {
        return;
    }

    let child_name = format!("{parent_name}{suffix}");
    let child_bus = Bus {
        name: child_name.clone(),
        bus_type: parent.bus_type.clone(),
        data_width_bits: parent.data_width_bits,
        clock: parent.clock.clone(),
        reset: parent.reset.clone(),
        nullsz_octets: 0,
        masters: Vec::new(),
        slaves: moved,
        address_width_bits: None,
    };
    registry.insert(child_bus);

    let bridge = Slave {
        name: child_name.clone(),
        bus: parent_name.to_string(),
        prefix: child_name.clone(),
        tier: SlaveTier::Other,
        order: None,
        naddr: 1,
        read_only: false,
        write_only: false,
        error_wire: None,
        ld_name: None,
        ld_perm: None,
        child_bus: Some(child_name),
        base_octets: None,
        mask_octets: None,
        awid_octets: None,
    };
    registry.get_mut(parent_name).expect("parent bus must exist").slaves.push(bridge);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Master;

    fn slave(name: &str, tier: SlaveTier) -> Slave {
        Slave {
            name: name.to_string(),
            bus: "wb".to_string(),
            prefix: name.to_string(),
            tier,
            order: None,
            naddr: 1,
            read_only: false,
            write_only: false,
            error_wire: None,
            ld_name: None,
            ld_perm: None,
            child_bus: None,
            base_octets: None,
            mask_octets: None,
            awid_octets: None,
        }
    }

    fn bus_with(slaves: Vec<Slave>) -> Bus {
        Bus {
            name: "wb".to_string(),
            bus_type: "wb".to_string(),
            data_width_bits: 32,
            clock: "clk".to_string(),
            reset: "i_reset".to_string(),
            nullsz_octets: 0,
            masters: vec![Master {
                name: "cpu".to_string(),
                bus: "wb".to_string(),
                prefix: "cpu".to_string(),
                read_only: false,
                write_only: false,
                id_width: None,
            }],
            slaves,
            address_width_bits: None,
        }
    }

    #[test]
    fn whole_single_bus_is_untouched() {
        let mut reg = BusRegistry::new();
        reg.insert(bus_with(vec![slave("a", SlaveTier::Single), slave("b", SlaveTier::Single)]));
        classify_and_synthesize(&mut reg);
        assert_eq!(reg.get("wb").unwrap().slaves.len(), 2);
        assert!(reg.get("wb_sio").is_none());
    }

    #[test]
    fn mixed_single_and_other_synthesizes_sio_bridge() {
        let mut reg = BusRegistry::new();
        let mut slaves: Vec<Slave> = (0..5).map(|i| slave(&format!("single{i}"), SlaveTier::Single)).collect();
        slaves.extend((0..3).map(|i| slave(&format!("other{i}"), SlaveTier::Other)));
        reg.insert(bus_with(slaves));
        classify_and_synthesize(&mut reg);

        let parent = reg.get("wb").unwrap();
        assert_eq!(parent.slaves.len(), 4);
        assert_eq!(parent.slaves.iter().filter(|s| s.is_bridge()).count(), 1);

        let child = reg.get("wb_sio").unwrap();
        assert_eq!(child.slaves.len(), 5);
    }

    #[test]
    fn few_singles_promote_to_double() {
        let mut reg = BusRegistry::new();
        reg.insert(bus_with(vec![
            slave("s0", SlaveTier::Single),
            slave("d0", SlaveTier::Double),
            slave("d1", SlaveTier::Double),
        ]));
        classify_and_synthesize(&mut reg);
        let bus = reg.get("wb").unwrap();
        assert_eq!(bus.slaves.len(), 3);
        assert!(bus.slaves.iter().all(|s| s.tier == SlaveTier::Double));
    }
}
