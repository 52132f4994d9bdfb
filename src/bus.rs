//! Bus registry: discovery, master/slave grouping (§4.5).

use crate::diag::Sink;
use crate::keys;
use crate::store::Store;
use crate::value::Value;
use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlaveTier {
    Single,
    Double,
    Memory,
    Other,
    /// Assigned by the tier classifier (§4.6), never by discovery: a slave
    /// that owns a child bus.
    BusBridge,
}

impl SlaveTier {
    fn from_key(tag: &str) -> SlaveTier {
        match tag {
            keys::slave_type::SINGLE => SlaveTier::Single,
            keys::slave_type::DOUBLE => SlaveTier::Double,
            keys::slave_type::MEMORY => SlaveTier::Memory,
            keys::slave_type::BUS => SlaveTier::BusBridge,
            _ => SlaveTier::Other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Master {
    pub name: String,
    pub bus: String,
    pub prefix: String,
    pub read_only: bool,
    pub write_only: bool,
    pub id_width: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Slave {
    pub name: String,
    pub bus: String,
    pub prefix: String,
    pub tier: SlaveTier,
    pub order: Option<i64>,
    pub naddr: i64,
    pub read_only: bool,
    pub write_only: bool,
    pub error_wire: Option<String>,
    pub ld_name: Option<String>,
    pub ld_perm: Option<String>,
    /// Set only for a bridge slave (§3.1 "Bus-bridge slave"): the name of
    /// the child bus this slave's address window maps onto.
    pub child_bus: Option<String>,
    pub base_octets: Option<i64>,
    pub mask_octets: Option<i64>,
    pub awid_octets: Option<u32>,
}

impl Slave {
    pub fn is_bridge(&self) -> bool {
        self.child_bus.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Bus {
    pub name: String,
    pub bus_type: String,
    pub data_width_bits: u32,
    pub clock: String,
    pub reset: String,
    pub nullsz_octets: i64,
    pub masters: Vec<Master>,
    pub slaves: Vec<Slave>,
    pub address_width_bits: Option<u32>,
}

impl Bus {
    pub fn is_word_addressed(&self) -> bool {
        self.bus_type.starts_with("wb")
    }

    /// `log2(data_width/8)`, i.e. how many low octet-address bits are
    /// absorbed by the bus's own word size.
    pub fn octet_offset_bits(&self) -> u32 {
        let bytes = (self.data_width_bits / 8).max(1);
        bytes.trailing_zeros()
    }
}

#[derive(Debug, Default)]
pub struct BusRegistry {
    buses: IndexMap<String, Bus>,
}

impl BusRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Bus> {
        self.buses.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Bus> {
        self.buses.get_mut(name)
    }

    pub fn insert(&mut self, bus: Bus) {
        self.buses.insert(bus.name.clone(), bus);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.buses.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bus> {
        self.buses.values()
    }

    fn declare(&mut self, name: &str, bus_type: &str, width: u32, clock: &str, reset: &str, nullsz: i64, sink: &mut Sink) {
        match self.buses.get_mut(name) {
            Some(existing) => {
                if existing.data_width_bits != width {
                    sink.error(
                        "bus",
                        Some(name.to_string()),
                        format!("conflicting BUS.WIDTH: {} vs {width}", existing.data_width_bits),
                    );
                }
            }
            None => {
                self.buses.insert(
                    name.to_string(),
                    Bus {
                        name: name.to_string(),
                        bus_type: bus_type.to_string(),
                        data_width_bits: width,
                        clock: clock.to_string(),
                        reset: reset.to_string(),
                        nullsz_octets: nullsz,
                        masters: Vec::new(),
                        slaves: Vec::new(),
                        address_width_bits: None,
                    },
                );
            }
        }
    }

    fn ensure_bus_stub(&mut self, name: &str, default_clock: &str) -> &mut Bus {
        self.buses.entry(name.to_string()).or_insert_with(|| Bus {
            name: name.to_string(),
            bus_type: "wb".to_string(),
            data_width_bits: 32,
            clock: default_clock.to_string(),
            reset: "i_reset".to_string(),
            nullsz_octets: 0,
            masters: Vec::new(),
            slaves: Vec::new(),
            address_width_bits: None,
        })
    }

    /// Drops any bus with no masters and no slaves, per §4.5, recording a
    /// warning for each.
    pub fn drop_empty_buses(&mut self, sink: &mut Sink) {
        let empty: Vec<String> = self
            .buses
            .iter()
            .filter(|(_, b)| b.masters.is_empty() && b.slaves.is_empty())
            .map(|(n, _)| n.clone())
            .collect();
        for name in empty {
            sink.warn("bus", Some(name.clone()), "bus has no masters and no slaves, dropping");
            self.buses.shift_remove(&name);
        }
    }
}

/// Parses a `MASTER.OPTIONS`/`SLAVE.OPTIONS` token list the way
/// `predicates.cpp`'s `read_only_option`/`write_only_option` do: split on
/// `", \t\r\n"`, match `RO`/`WO` case-insensitively, return
/// `(read_only, write_only)`.
fn parse_access_options(raw: &str) -> (bool, bool) {
    let mut read_only = false;
    let mut write_only = false;
    for tok in raw.split([',', ' ', '\t', '\r', '\n']).filter(|t| !t.is_empty()) {
        if tok.eq_ignore_ascii_case("RO") {
            read_only = true;
        } else if tok.eq_ignore_ascii_case("WO") {
            write_only = true;
        }
    }
    (read_only, write_only)
}

/// Walks every top-level component in `root`, registering bus/master/slave
/// declarations found under the canonical keys (§6.3). Components that
/// declare neither role are ignored — discovery is additive and orderless
/// across components, but master/slave lists on each bus preserve the
/// insertion order components were visited in (§5's ordering guarantee).
pub fn discover(root: &Store, default_clock: &str, sink: &mut Sink) -> BusRegistry {
    let mut reg = BusRegistry::new();

    for (_name, v) in root.iter() {
        let Some(cm) = v.as_map() else { continue };
        if let Some(bus_name) = cm.lookup(keys::BUS_NAME).and_then(Value::as_text) {
            let bus_type = cm.lookup(keys::BUS_TYPE).and_then(Value::as_text).unwrap_or("wb");
            let width = cm.lookup(keys::BUS_WIDTH).and_then(Value::as_int).unwrap_or(32) as u32;
            let clock = cm.lookup(keys::BUS_CLOCK).and_then(Value::as_text).unwrap_or(default_clock);
            let reset = cm.lookup(keys::BUS_RESET).and_then(Value::as_text).unwrap_or("i_reset");
            let nullsz = cm.lookup(keys::BUS_NULLSZ).and_then(Value::as_int).unwrap_or(0);
            reg.declare(bus_name, bus_type, width, clock, reset, nullsz, sink);
        }
    }

    for (name, v) in root.iter() {
        let Some(cm) = v.as_map() else { continue };

        if let Some(bus_name) = cm.lookup(keys::MASTER_BUS).and_then(Value::as_text).map(str::to_string) {
            let prefix = cm.lookup(keys::MASTER_PREFIX).and_then(Value::as_text).unwrap_or(name).to_string();
            let (read_only, write_only) =
                cm.lookup(keys::MASTER_OPTIONS).and_then(Value::as_text).map(parse_access_options).unwrap_or_default();
            reg.ensure_bus_stub(&bus_name, default_clock);
            let bus = reg.get_mut(&bus_name).expect("just ensured");
            bus.masters.push(Master {
                name: name.to_string(),
                bus: bus_name,
                prefix,
                read_only,
                write_only,
                id_width: None,
            });
        }

        if let Some(bus_name) = cm.lookup(keys::SLAVE_BUS).and_then(Value::as_text).map(str::to_string) {
            let prefix = cm.lookup(keys::SLAVE_PREFIX).and_then(Value::as_text).unwrap_or(name).to_string();
            let tier = cm
                .lookup(keys::SLAVE_TYPE)
                .and_then(Value::as_text)
                .map(SlaveTier::from_key)
                .unwrap_or(SlaveTier::Other);
            let order = cm.lookup(keys::SLAVE_ORDER).and_then(Value::as_int);
            let naddr = cm.lookup(keys::NADDR).and_then(Value::as_int).unwrap_or(1);
            if naddr <= 0 {
                sink.error("bus", Some(name.to_string()), "slave declared with NADDR <= 0");
            }
            let (read_only, write_only) =
                cm.lookup(keys::SLAVE_OPTIONS).and_then(Value::as_text).map(parse_access_options).unwrap_or_default();
            let error_wire = cm.lookup(keys::SLAVE_ERROR_WIRE).and_then(Value::as_text).map(str::to_string);
            reg.ensure_bus_stub(&bus_name, default_clock);
            let bus = reg.get_mut(&bus_name).expect("just ensured");
            bus.slaves.push(Slave {
                name: name.to_string(),
                bus: bus_name,
                prefix,
                tier,
                order,
                naddr: naddr.max(1),
                read_only,
                write_only,
                error_wire,
                ld_name: None,
                ld_perm: None,
                child_bus: None,
                base_octets: None,
                mask_octets: None,
                awid_octets: None,
            });
        }
    }

    reg.drop_empty_buses(sink);
    reg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_master_and_slave() -> Store {
        let mut root = Store::new();
        let mut wb = Store::new();
        wb.insert(keys::BUS_NAME, Value::Text("wb".into())).unwrap();
        wb.insert(keys::BUS_TYPE, Value::Text("wb".into())).unwrap();
        wb.insert(keys::BUS_WIDTH, Value::Integer(32)).unwrap();
        root.insert("wb", Value::Map(wb)).unwrap();

        let mut cpu = Store::new();
        cpu.insert(keys::MASTER_BUS, Value::Text("wb".into())).unwrap();
        root.insert("cpu", Value::Map(cpu)).unwrap();

        let mut gpio = Store::new();
        gpio.insert(keys::SLAVE_BUS, Value::Text("wb".into())).unwrap();
        gpio.insert(keys::SLAVE_TYPE, Value::Text("SINGLE".into())).unwrap();
        gpio.insert(keys::NADDR, Value::Integer(1)).unwrap();
        root.insert("gpio", Value::Map(gpio)).unwrap();
        root
    }

    #[test]
    fn parses_ro_wo_options_case_insensitively() {
        assert_eq!(parse_access_options("ro"), (true, false));
        assert_eq!(parse_access_options("WO"), (false, true));
        assert_eq!(parse_access_options("RO, WO"), (true, true));
        assert_eq!(parse_access_options("  \tro\r\nwo"), (true, true));
        assert_eq!(parse_access_options("NONE"), (false, false));
    }

    #[test]
    fn slave_options_set_read_only_flag() {
        let mut root = store_with_master_and_slave();
        root.insert(&format!("gpio.{}", keys::SLAVE_OPTIONS), Value::Text("RO".into())).unwrap();
        let mut sink = Sink::new();
        let reg = discover(&root, "clk", &mut sink);
        let bus = reg.get("wb").unwrap();
        assert!(bus.slaves[0].read_only);
        assert!(!bus.slaves[0].write_only);
    }

    #[test]
    fn discovers_masters_and_slaves() {
        let root = store_with_master_and_slave();
        let mut sink = Sink::new();
        let reg = discover(&root, "clk", &mut sink);
        let bus = reg.get("wb").unwrap();
        assert_eq!(bus.masters.len(), 1);
        assert_eq!(bus.slaves.len(), 1);
        assert_eq!(bus.slaves[0].tier, SlaveTier::Single);
    }

    #[test]
    fn drops_empty_bus_with_warning() {
        let mut root = Store::new();
        let mut wb = Store::new();
        wb.insert(keys::BUS_NAME, Value::Text("unused".into())).unwrap();
        root.insert("unused", Value::Map(wb)).unwrap();
        let mut sink = Sink::new();
        let reg = discover(&root, "clk", &mut sink);
        assert!(reg.get("unused").is_none());
        assert_eq!(sink.records().len(), 1);
    }
}
