//! Demo harness: builds a representative design in memory and runs it
//! through the composition core, printing the resulting address map and
//! interrupt table. Input merging and HDL emission are both external
//! collaborators (spec.md §1) so this binary fabricates its own store
//! instead of reading one from disk.

use anyhow::{Context, Result};
use soccompose::store::Store;
use soccompose::value::Value;
use soccompose::{keys, PipelineOptions};

fn main() -> Result<()> {
    env_logger::init();

    let mut root = build_design().context("building demo design")?;
    let (project, sink) = soccompose::run(&mut root, &PipelineOptions::default());

    println!("== buses ==");
    for bus in project.list_buses() {
        println!("{} ({}, {}-bit, awid={:?})", bus.name, bus.bus_type, bus.data_width_bits, bus.address_width_bits);
        for slave in project.list_slaves(bus) {
            println!(
                "  {:<12} base=0x{:08x} mask=0x{:08x} tier={:?}",
                slave.name,
                slave.base_octets.unwrap_or(0),
                slave.mask_octets.unwrap_or(0),
                slave.tier
            );
        }
        for master in project.list_masters(bus) {
            println!("  master {}", master.name);
        }
    }

    println!("\n== interrupts ==");
    for line in &project.lines {
        for (pic, id) in &line.assigned {
            println!("{}.{} -> {pic}[{id}]", line.owner, line.line_name);
        }
    }

    println!("\n== diagnostics ==");
    for d in sink.records() {
        println!("{d}");
    }
    if sink.has_fatal() {
        anyhow::bail!("pipeline reported a fatal diagnostic");
    }
    log::info!("demo pipeline finished with {} diagnostic(s)", sink.records().len());
    Ok(())
}

/// A CPU with one wishbone bus carrying a mix of single- and multi-cycle
/// slaves (triggering bridge synthesis, §4.6) plus a fan-out interrupt line.
fn build_design() -> Result<Store> {
    let mut root = Store::new();

    let mut wb = Store::new();
    wb.insert(keys::BUS_NAME, Value::Text("wb".into()))?;
    wb.insert(keys::BUS_TYPE, Value::Text("wb".into()))?;
    wb.insert(keys::BUS_WIDTH, Value::Integer(32))?;
    root.insert("wb", Value::Map(wb))?;

    let mut cpu = Store::new();
    cpu.insert(keys::MASTER_BUS, Value::Text("wb".into()))?;
    root.insert("cpu", Value::Map(cpu))?;

    let mut syspic = Store::new();
    syspic.insert(keys::PIC, Value::Text("syspic".into()))?;
    syspic.insert(keys::PIC_MAX, Value::Integer(16))?;
    root.insert("syspic", Value::Map(syspic))?;

    for (name, naddr) in [("gpio", 1), ("uart", 1), ("timer", 1)] {
        let mut slave = Store::new();
        slave.insert(keys::SLAVE_BUS, Value::Text("wb".into()))?;
        slave.insert(keys::SLAVE_TYPE, Value::Text("SINGLE".into()))?;
        slave.insert(keys::NADDR, Value::Integer(naddr))?;
        root.insert(name, Value::Map(slave))?;
    }

    let mut sdram = Store::new();
    sdram.insert(keys::SLAVE_BUS, Value::Text("wb".into()))?;
    sdram.insert(keys::SLAVE_TYPE, Value::Text("MEMORY".into()))?;
    sdram.insert(keys::NADDR, Value::Integer(1 << 20))?;
    root.insert("sdram", Value::Map(sdram))?;

    root.insert("uart.INT.rx.WIRE", Value::Text("w_uart_rx_int".into()))?;
    root.insert("uart.INT.rx.PIC", Value::Text("syspic".into()))?;
    root.insert("uart.INT.tx.WIRE", Value::Text("w_uart_tx_int".into()))?;
    root.insert("uart.INT.tx.PIC", Value::Text("syspic".into()))?;

    root.insert("timer.INT.tick.WIRE", Value::Text("w_timer_int".into()))?;
    root.insert("timer.INT.tick.PIC", Value::Text("syspic".into()))?;
    root.insert("timer.INT.tick.ID", Value::Integer(0))?;

    Ok(root)
}
