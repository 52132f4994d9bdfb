//! Orchestrates the core pipeline end to end over an already-merged
//! [`Store`] (ambient; SPEC_FULL.md §A). Input-merge (tokenizer/search-path
//! resolution) and output emission are both external collaborators per
//! spec.md §1 — this module only runs the composition core itself.

use crate::address;
use crate::clock::ClockRegistry;
use crate::diag::Sink;
use crate::eval;
use crate::interrupt;
use crate::keys;
use crate::project::Project;
use crate::store::Store;
use crate::tier;
use crate::value::Value;

/// The only configuration surface the core owns (SPEC_FULL.md §E) — no
/// file discovery, no output paths, just the knobs that affect its own
/// algorithms.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    pub default_clock_period_ps: i64,
    pub max_eval_sweeps: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions { default_clock_period_ps: crate::clock::DEFAULT_PERIOD_PS, max_eval_sweeps: 256 }
    }
}

/// Runs the evaluator, bus discovery, tier synthesis, address assignment,
/// and interrupt routing over `root`, writing derived keys back into it,
/// and returns the frozen [`Project`] view plus the accumulated
/// diagnostics.
pub fn run(root: &mut Store, options: &PipelineOptions) -> (Project, Sink) {
    let mut sink = Sink::new();

    eval::run_fixed_point(root, &mut sink, options.max_eval_sweeps);
    write_back_expr_siblings(root, &mut sink);

    let mut clocks = ClockRegistry::new();
    discover_clocks(root, &mut clocks, &mut sink);
    clocks.finalize(options.default_clock_period_ps);
    let default_clock = clocks.get(crate::clock::DEFAULT_NAME).expect("finalize just inserted it").name.clone();

    let mut buses = crate::bus::discover(root, &default_clock, &mut sink);
    tier::classify_and_synthesize(&mut buses);
    address::assign_addresses(&mut buses, &mut sink);
    write_back_addresses(root, &buses);

    let (mut pics, mut lines) = interrupt::discover(root);
    interrupt::route(&mut lines, &mut pics, &mut sink);
    write_back_interrupts(root, &lines);

    (Project { buses, clocks, pics, lines }, sink)
}

fn discover_clocks(root: &Store, clocks: &mut ClockRegistry, sink: &mut Sink) {
    for (name, v) in root.iter() {
        let Some(cm) = v.as_map() else { continue };
        let is_clock = cm.lookup(keys::CLOCK_NAME).is_some()
            || cm.lookup(keys::CLOCK_WIRE).is_some()
            || cm.lookup(keys::CLOCK_FREQUENCY).is_some();
        if !is_clock {
            continue;
        }
        let clock_name = cm.lookup(keys::CLOCK_NAME).and_then(Value::as_text).unwrap_or(name);
        let wire = cm.lookup(keys::CLOCK_WIRE).and_then(Value::as_text);
        let top = cm.lookup(keys::CLOCK_TOP).and_then(Value::as_text);
        let class = cm.lookup(keys::CLOCK_CLASS).and_then(Value::as_text);
        let freq = cm.lookup(keys::CLOCK_FREQUENCY).and_then(Value::as_int);
        clocks.declare(clock_name, wire, None, freq, top, class, sink);
    }
}

/// §6.5: once an `EXPR` leaf reduces, the core writes sibling `VAL` and
/// `STR` keys alongside it in the same map.
fn write_back_expr_siblings(root: &mut Store, _sink: &mut Sink) {
    root.for_each_map_mut(&mut |m: &mut Store| {
        let resolved = match m.get_mut(keys::EXPR) {
            Some(Value::Integer(n)) => Some(*n),
            Some(Value::Expr(a)) if a.is_defined() => Some(a.evaluate()),
            _ => None,
        };
        if let Some(n) = resolved {
            let fmt = m.lookup(keys::FORMAT).and_then(Value::as_text).map(str::to_string);
            let rendered = eval::format_integer(fmt.as_deref(), n);
            let _ = m.insert(keys::VAL, Value::Integer(n));
            let _ = m.insert(keys::STR, Value::Text(rendered));
        }
    });
}

fn write_back_addresses(root: &mut Store, buses: &crate::bus::BusRegistry) {
    for bus in buses.iter() {
        for slave in &bus.slaves {
            let Some(base) = slave.base_octets else { continue };
            if root.lookup(&slave.name).is_none() {
                let _ = root.insert(&format!("{}.{}", slave.name, keys::SLAVE_TYPE), Value::Text("OTHER".into()));
                let _ = root.insert(&format!("{}.{}", slave.name, keys::SLAVE_BUS), Value::Text(bus.name.clone()));
            }
            let _ = root.insert(&format!("{}.{}", slave.name, keys::BASE), Value::Integer(base));
            let _ = root.insert(&format!("{}.{}", slave.name, keys::MASK), Value::Integer(slave.mask_octets.unwrap_or(0)));
            let _ =
                root.insert(&format!("{}.{}", slave.name, keys::AWID), Value::Integer(slave.awid_octets.unwrap_or(0) as i64));
        }
        let Some(awid) = bus.address_width_bits else { continue };
        if root.lookup(&bus.name).is_none() {
            let _ = root.insert(&format!("{}.{}", bus.name, keys::BUS_NAME), Value::Text(bus.name.clone()));
            let _ = root.insert(&format!("{}.{}", bus.name, keys::BUS_TYPE), Value::Text(bus.bus_type.clone()));
            let _ = root.insert(
                &format!("{}.{}", bus.name, keys::BUS_WIDTH),
                Value::Integer(bus.data_width_bits as i64),
            );
        }
        let _ = root.insert(&format!("{}.{}", bus.name, keys::AWID), Value::Integer(awid as i64));
    }
}

fn write_back_interrupts(root: &mut Store, lines: &[interrupt::InterruptLine]) {
    for line in lines {
        for (i, (pic_name, id)) in line.assigned.iter().enumerate() {
            let path = format!("{}.{}", line.owner, keys::int_key(&line.line_name, keys::int::ID));
            if i == 0 {
                let _ = root.insert(&path, Value::Integer(*id));
            }
            let per_pic = format!("{}.INT.{}.IDS.{}", line.owner, line.line_name, pic_name);
            let _ = root.insert(&per_pic, Value::Integer(*id));
        }
    }
}
