//! Canonical key namespace (spec.md §6.3).
//!
//! Mirrors `original_source/sw/keys.h`: a flat set of string constants the
//! core recognizes when it walks a [`crate::store::Store`]. Everything not
//! named here is transparent to the core and passes through untouched to
//! the emitters.

pub const PREFIX: &str = "PREFIX";
pub const ACCESS: &str = "ACCESS";
pub const DEPENDS: &str = "DEPENDS";

pub const SLAVE_TYPE: &str = "SLAVE.TYPE";
pub const SLAVE_BUS: &str = "SLAVE.BUS";
pub const SLAVE_PREFIX: &str = "SLAVE.PREFIX";
pub const SLAVE_OPTIONS: &str = "SLAVE.OPTIONS";
pub const SLAVE_ERROR_WIRE: &str = "SLAVE.ERROR_WIRE";
pub const SLAVE_ORDER: &str = "SLAVE.ORDER";

pub const MASTER_TYPE: &str = "MASTER.TYPE";
pub const MASTER_BUS: &str = "MASTER.BUS";
pub const MASTER_PREFIX: &str = "MASTER.PREFIX";
pub const MASTER_OPTIONS: &str = "MASTER.OPTIONS";

pub const BUS_NAME: &str = "BUS.NAME";
pub const BUS_TYPE: &str = "BUS.TYPE";
pub const BUS_WIDTH: &str = "BUS.WIDTH";
pub const BUS_CLOCK: &str = "BUS.CLOCK";
pub const BUS_RESET: &str = "BUS.RESET";
pub const BUS_NULLSZ: &str = "BUS.NULLSZ";
pub const BUS_OPT_PREFIX: &str = "BUS.OPT_";

pub const CLOCK_NAME: &str = "CLOCK.NAME";
pub const CLOCK_WIRE: &str = "CLOCK.WIRE";
pub const CLOCK_TOP: &str = "CLOCK.TOP";
pub const CLOCK_CLASS: &str = "CLOCK.CLASS";
pub const CLOCK_FREQUENCY: &str = "CLOCK.FREQUENCY";

pub const PIC: &str = "PIC";
pub const PIC_BUS: &str = "PIC.BUS";
pub const PIC_MAX: &str = "PIC.MAX";

pub const NADDR: &str = "NADDR";
pub const BASE: &str = "BASE";
pub const MASK: &str = "MASK";
pub const AWID: &str = "AWID";

pub const REGS_N: &str = "REGS.N";

pub const EXPR: &str = "EXPR";
pub const VAL: &str = "VAL";
pub const FORMAT: &str = "FORMAT";
pub const STR: &str = "STR";

/// Tag values for `SLAVE.TYPE`.
pub mod slave_type {
    pub const SINGLE: &str = "SINGLE";
    pub const DOUBLE: &str = "DOUBLE";
    pub const MEMORY: &str = "MEMORY";
    pub const BUS: &str = "BUS";
    pub const OTHER: &str = "OTHER";
}

/// Interrupt-line sub-keys, nested as `INT.<name>.<sub>`.
pub mod int {
    pub const WIRE: &str = "WIRE";
    pub const PIC: &str = "PIC";
    pub const ID: &str = "ID";
}

pub fn int_key(line: &str, sub: &str) -> String {
    format!("INT.{line}.{sub}")
}
