//! Interrupt router (§4.8): PIC registry plus pinned-then-greedy line
//! assignment.

use crate::diag::Sink;
use crate::keys;
use crate::store::Store;
use crate::value::Value;
use indexmap::IndexMap;

#[derive(Debug, Clone)]
pub struct Pic {
    pub name: String,
    pub vector_wire: Option<String>,
    pub capacity: usize,
    /// Index = assigned ID; `Some(line_key)` once occupied.
    pub by_id: Vec<Option<String>>,
}

impl Pic {
    fn new(name: &str, capacity: usize, vector_wire: Option<String>) -> Self {
        Pic { name: name.to_string(), vector_wire, capacity, by_id: vec![None; capacity] }
    }
}

#[derive(Debug, Default)]
pub struct PicRegistry {
    pics: IndexMap<String, Pic>,
}

impl PicRegistry {
    pub fn get(&self, name: &str) -> Option<&Pic> {
        self.pics.get(name)
    }

    pub fn list(&self) -> impl Iterator<Item = &Pic> {
        self.pics.values()
    }
}

#[derive(Debug, Clone)]
pub struct InterruptLine {
    pub owner: String,
    pub line_name: String,
    pub wire: Option<String>,
    pub pic_names: Vec<String>,
    pub pinned_id: Option<i64>,
    /// Populated by [`route`]: PIC name -> assigned ID, one entry per PIC
    /// the line fanned out to.
    pub assigned: IndexMap<String, i64>,
}

impl InterruptLine {
    pub fn key(&self) -> String {
        format!("{}.{}", self.owner, self.line_name)
    }
}

/// Walks every top-level component for a PIC declaration (`PIC=name`,
/// `PIC.MAX=capacity`) or nested interrupt-line declarations
/// (`INT.<name>.WIRE/PIC/ID`).
pub fn discover(root: &Store) -> (PicRegistry, Vec<InterruptLine>) {
    let mut registry = PicRegistry::default();
    let mut lines = Vec::new();

    for (owner, v) in root.iter() {
        let Some(cm) = v.as_map() else { continue };

        if let Some(pic_name) = cm.lookup(keys::PIC).and_then(Value::as_text) {
            let capacity = cm.lookup(keys::PIC_MAX).and_then(Value::as_int).unwrap_or(32).max(0) as usize;
            let wire = cm.lookup(keys::PIC_BUS).and_then(Value::as_text).map(str::to_string);
            registry.pics.entry(pic_name.to_string()).or_insert_with(|| Pic::new(pic_name, capacity, wire));
        }

        if let Some(Value::Map(int_map)) = cm.local("INT") {
            for (line_name, line_v) in int_map.iter() {
                let Some(lm) = line_v.as_map() else { continue };
                let wire = lm.lookup(keys::int::WIRE).and_then(Value::as_text).map(str::to_string);
                let pic_field = lm.lookup(keys::int::PIC).and_then(Value::as_text).unwrap_or("");
                let pic_names: Vec<String> = pic_field.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect();
                let pinned_id = lm.lookup(keys::int::ID).and_then(Value::as_int);
                lines.push(InterruptLine {
                    owner: owner.to_string(),
                    line_name: line_name.to_string(),
                    wire,
                    pic_names,
                    pinned_id,
                    assigned: IndexMap::new(),
                });
            }
        }
    }

    (registry, lines)
}

/// Pinned pass first, then a greedy lowest-free-slot pass, per §4.8.
/// A line fanning out to several PICs gets an independent ID on each.
pub fn route(lines: &mut [InterruptLine], registry: &mut PicRegistry, sink: &mut Sink) {
    for line in lines.iter_mut() {
        let Some(id) = line.pinned_id else { continue };
        let key = line.key();
        for pic_name in &line.pic_names {
            let Some(pic) = registry.pics.get_mut(pic_name) else {
                sink.warn("interrupt", Some(key.clone()), format!("line names unknown PIC {pic_name:?}"));
                continue;
            };
            let idx = id as usize;
            if id < 0 || idx >= pic.capacity {
                sink.error("interrupt", Some(key.clone()), format!("pinned ID {id} out of range for PIC {pic_name:?}"));
                continue;
            }
            if pic.by_id[idx].is_some() {
                sink.error("interrupt", Some(key.clone()), format!("duplicate pinned ID {id} on PIC {pic_name:?}"));
                continue;
            }
            pic.by_id[idx] = Some(key.clone());
            line.assigned.insert(pic_name.clone(), id);
        }
    }

    for line in lines.iter_mut() {
        if line.pinned_id.is_some() {
            continue;
        }
        for pic_name in &line.pic_names {
            let Some(pic) = registry.pics.get_mut(pic_name) else {
                sink.warn("interrupt", Some(line.key()), format!("line names unknown PIC {pic_name:?}"));
                continue;
            };
            match pic.by_id.iter().position(Option::is_none) {
                Some(slot) => {
                    pic.by_id[slot] = Some(line.key());
                    line.assigned.insert(pic_name.clone(), slot as i64);
                }
                None => {
                    sink.warn("interrupt", Some(line.key()), format!("no free slot on PIC {pic_name:?}"));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(owner: &str, name: &str, pics: &[&str], pinned: Option<i64>) -> InterruptLine {
        InterruptLine {
            owner: owner.to_string(),
            line_name: name.to_string(),
            wire: None,
            pic_names: pics.iter().map(|s| s.to_string()).collect(),
            pinned_id: pinned,
            assigned: IndexMap::new(),
        }
    }

    #[test]
    fn pinned_id_is_honored() {
        let mut registry = PicRegistry::default();
        registry.pics.insert("syspic".to_string(), Pic::new("syspic", 8, None));
        let mut lines = vec![line("uart", "rx", &["syspic"], Some(3))];
        let mut sink = Sink::new();
        route(&mut lines, &mut registry, &mut sink);
        assert_eq!(lines[0].assigned.get("syspic"), Some(&3));
    }

    #[test]
    fn fan_out_gets_independent_ids() {
        let mut registry = PicRegistry::default();
        registry.pics.insert("syspic".to_string(), Pic::new("syspic", 8, None));
        registry.pics.insert("altpic".to_string(), Pic::new("altpic", 16, None));
        let mut lines = vec![line("dma", "done", &["syspic", "altpic"], Some(3))];
        let mut sink = Sink::new();
        route(&mut lines, &mut registry, &mut sink);
        assert_eq!(lines[0].assigned.get("syspic"), Some(&3));
        assert_eq!(lines[0].assigned.get("altpic"), Some(&0));
    }

    #[test]
    fn greedy_pass_fills_lowest_free_slot() {
        let mut registry = PicRegistry::default();
        registry.pics.insert("p".to_string(), Pic::new("p", 4, None));
        let mut lines = vec![line("a", "x", &["p"], Some(1)), line("b", "y", &["p"], None), line("c", "z", &["p"], None)];
        let mut sink = Sink::new();
        route(&mut lines, &mut registry, &mut sink);
        assert_eq!(lines[1].assigned.get("p"), Some(&0));
        assert_eq!(lines[2].assigned.get("p"), Some(&2));
    }

    #[test]
    fn unknown_pic_in_mixed_list_warns_but_still_routes_known() {
        let mut registry = PicRegistry::default();
        registry.pics.insert("syspic".to_string(), Pic::new("syspic", 8, None));
        let mut lines = vec![line("x", "irq", &["syspic", "ghost"], None)];
        let mut sink = Sink::new();
        route(&mut lines, &mut registry, &mut sink);
        assert_eq!(lines[0].assigned.get("syspic"), Some(&0));
        assert!(lines[0].assigned.get("ghost").is_none());
        assert_eq!(sink.records().len(), 1);
    }
}
