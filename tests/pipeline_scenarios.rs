//! Whole-pipeline scenarios driving `soccompose::run` end to end, matching
//! the worked examples in spec.md's composition-core sections that aren't
//! already exercised by a single module's unit tests.

use soccompose::store::Store;
use soccompose::value::Value;
use soccompose::{keys, PipelineOptions};

fn bus(root: &mut Store, name: &str, bus_type: &str, width: i64) {
    let mut b = Store::new();
    b.insert(keys::BUS_NAME, Value::Text(name.into())).unwrap();
    b.insert(keys::BUS_TYPE, Value::Text(bus_type.into())).unwrap();
    b.insert(keys::BUS_WIDTH, Value::Integer(width)).unwrap();
    root.insert(name, Value::Map(b)).unwrap();
}

fn master(root: &mut Store, name: &str, bus_name: &str) {
    let mut m = Store::new();
    m.insert(keys::MASTER_BUS, Value::Text(bus_name.into())).unwrap();
    root.insert(name, Value::Map(m)).unwrap();
}

fn slave(root: &mut Store, name: &str, bus_name: &str, tier: &str, naddr: i64) {
    let mut s = Store::new();
    s.insert(keys::SLAVE_BUS, Value::Text(bus_name.into())).unwrap();
    s.insert(keys::SLAVE_TYPE, Value::Text(tier.into())).unwrap();
    s.insert(keys::NADDR, Value::Integer(naddr)).unwrap();
    root.insert(name, Value::Map(s)).unwrap();
}

/// Two ordinary wishbone slaves on the same bus: neither overlaps, both
/// stay aligned to their own natural width, and the whole map fits the
/// bus's derived address width.
#[test]
fn two_slaves_share_a_bus_without_overlap() {
    let mut root = Store::new();
    bus(&mut root, "wb", "wb", 32);
    master(&mut root, "cpu", "wb");
    slave(&mut root, "small", "wb", "OTHER", 4);
    slave(&mut root, "big", "wb", "OTHER", 64);

    let (project, sink) = soccompose::run(&mut root, &PipelineOptions::default());
    assert_eq!(sink.error_count(), 0);

    let b = project.buses.get("wb").unwrap();
    let small = b.slaves.iter().find(|s| s.name == "small").unwrap();
    let big = b.slaves.iter().find(|s| s.name == "big").unwrap();
    let (sb, sm) = (small.base_octets.unwrap(), small.mask_octets.unwrap());
    let (bb, bm) = (big.base_octets.unwrap(), big.mask_octets.unwrap());
    assert!((sb & bm) != (bb & bm) || (bb & sm) != (sb & sm));
    assert_eq!(sb % (1i64 << small.awid_octets.unwrap()), 0);
    assert_eq!(bb % (1i64 << big.awid_octets.unwrap()), 0);
}

/// Five single-cycle slaves mixed with three other-tier slaves on one bus:
/// the singles are pulled onto a synthesized `_sio` child bus and the
/// parent keeps exactly one bridge slave in their place (spec.md tier
/// mixing scenario).
#[test]
fn tier_mixing_synthesizes_a_bridge_bus() {
    let mut root = Store::new();
    bus(&mut root, "wb", "wb", 32);
    master(&mut root, "cpu", "wb");
    for i in 0..5 {
        slave(&mut root, &format!("single{i}"), "wb", "SINGLE", 1);
    }
    for i in 0..3 {
        slave(&mut root, &format!("other{i}"), "wb", "OTHER", 4);
    }

    let (project, sink) = soccompose::run(&mut root, &PipelineOptions::default());
    assert_eq!(sink.error_count(), 0);

    let parent = project.buses.get("wb").unwrap();
    assert_eq!(parent.slaves.len(), 4);
    assert_eq!(parent.slaves.iter().filter(|s| s.is_bridge()).count(), 1);
    let child = project.buses.get("wb_sio").unwrap();
    assert_eq!(child.slaves.len(), 5);

    let bridge = parent.slaves.iter().find(|s| s.is_bridge()).unwrap();
    assert!(bridge.base_octets.is_some());
    assert!(child.address_width_bits.is_some());
}

/// A shared interrupt fans a single device event out to two independent
/// PICs, each handing back its own ID, while a pinned line on the same PIC
/// keeps its requested slot.
#[test]
fn interrupt_fan_out_and_pinning_coexist() {
    let mut root = Store::new();
    let mut syspic = Store::new();
    syspic.insert(keys::PIC, Value::Text("syspic".into())).unwrap();
    syspic.insert(keys::PIC_MAX, Value::Integer(8)).unwrap();
    root.insert("syspic", Value::Map(syspic)).unwrap();

    let mut altpic = Store::new();
    altpic.insert(keys::PIC, Value::Text("altpic".into())).unwrap();
    altpic.insert(keys::PIC_MAX, Value::Integer(8)).unwrap();
    root.insert("altpic", Value::Map(altpic)).unwrap();

    root.insert("dma.INT.done.PIC", Value::Text("syspic,altpic".into())).unwrap();
    root.insert("dma.INT.done.ID", Value::Integer(3)).unwrap();

    root.insert("uart.INT.rx.PIC", Value::Text("syspic".into())).unwrap();

    let (project, sink) = soccompose::run(&mut root, &PipelineOptions::default());
    assert_eq!(sink.error_count(), 0);

    let dma = project.lines.iter().find(|l| l.owner == "dma").unwrap();
    assert_eq!(dma.assigned.get("syspic"), Some(&3));
    assert_eq!(dma.assigned.get("altpic"), Some(&3));

    let uart = project.lines.iter().find(|l| l.owner == "uart").unwrap();
    assert_ne!(uart.assigned.get("syspic"), Some(&3));

    assert_eq!(root.lookup("dma.INT.done.IDS.syspic").and_then(Value::as_int), Some(3));
    assert_eq!(root.lookup("dma.INT.done.IDS.altpic").and_then(Value::as_int), Some(3));
}

/// Running the fixed-point evaluator an additional sweep after the pipeline
/// has already quiesced must not change anything (ownership/idempotence
/// invariant, spec.md §8).
#[test]
fn rerunning_the_evaluator_after_convergence_is_a_no_op() {
    let mut root = Store::new();
    root.insert("A", Value::Integer(2)).unwrap();
    root.insert("B", Value::Expr(soccompose::ast::parse("A*3").unwrap())).unwrap();
    root.insert("MSG", Value::Text("b=@$(.B)".into())).unwrap();

    soccompose::run(&mut root, &PipelineOptions::default());
    let snapshot_b = root.lookup("B").and_then(Value::as_int);
    let snapshot_msg = root.lookup("MSG").and_then(Value::as_text).map(str::to_string);

    let mut sink2 = soccompose::Sink::new();
    let sweeps = soccompose::eval::run_fixed_point(&mut root, &mut sink2, 256);
    assert_eq!(sweeps, 1);
    assert_eq!(root.lookup("B").and_then(Value::as_int), snapshot_b);
    assert_eq!(root.lookup("MSG").and_then(Value::as_text).map(str::to_string), snapshot_msg);
}
