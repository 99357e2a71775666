//! Physical register catalog and the per-function allocation pool.
//!
//! The catalog and exclusion set are process constants; busy/free state is
//! per function. There is no spilling: exhaustion is a fatal condition.

use std::fmt;

use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegClass {
    Data,
    Addr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Register {
    pub name: &'static str,
    pub class: RegClass,
    pub bits: u16,
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Stack-pointer base for local slots. Pseudo-register, never allocated.
pub const SP: Register = Register {
    name: "SP",
    class: RegClass::Addr,
    bits: 64,
};

/// Frame-pointer base for parameter and return slots. Pseudo-register,
/// never allocated.
pub const FP: Register = Register {
    name: "FP",
    class: RegClass::Addr,
    bits: 64,
};

const fn data(name: &'static str) -> Register {
    Register {
        name,
        class: RegClass::Data,
        bits: 64,
    }
}

const fn addr(name: &'static str) -> Register {
    Register {
        name,
        class: RegClass::Addr,
        bits: 64,
    }
}

/// Allocation catalog, scanned in this fixed order.
pub const CATALOG: &[Register] = &[
    data("AX"),
    data("CX"),
    data("DX"),
    addr("BX"),
    addr("SI"),
    addr("DI"),
    data("R8"),
    data("R9"),
    data("R10"),
    data("R11"),
    data("R12"),
    data("R13"),
    addr("BP"),
    data("R14"),
    data("R15"),
];

/// Registers reserved by the runtime/ABI; present in the catalog but never
/// handed out.
pub const EXCLUDED: &[&str] = &["BP", "R14", "R15"];

/// Per-function register state. A busy register is owned by exactly one
/// in-flight emission step, which must free it before the step completes.
#[derive(Debug, Clone)]
pub struct RegisterPool {
    busy: IndexMap<&'static str, bool>,
}

impl RegisterPool {
    pub fn new() -> Self {
        Self {
            busy: CATALOG.iter().map(|r| (r.name, false)).collect(),
        }
    }

    /// First free catalog-order register of the requested class and width.
    /// Address-class requests fall back to data-class registers, which are
    /// interchangeable for addressing on x86-64.
    pub fn allocate(&mut self, class: RegClass, width_bytes: usize) -> Register {
        for reg in CATALOG {
            if EXCLUDED.contains(&reg.name) {
                continue;
            }
            if self.busy.get(reg.name).copied().unwrap_or(true) {
                continue;
            }
            if reg.class == class && reg.bits as usize == width_bytes * 8 {
                self.busy.insert(reg.name, true);
                return *reg;
            }
        }
        if class == RegClass::Addr {
            return self.allocate(RegClass::Data, width_bytes);
        }
        panic!(
            "codegen: out of {:?} registers of width {} bytes",
            class, width_bytes
        );
    }

    /// Constrained allocation for instructions with fixed register operands
    /// (division claims AX/DX, variable shift counts claim CX).
    pub fn allocate_named(&mut self, name: &str) -> Register {
        let reg = CATALOG
            .iter()
            .find(|r| r.name == name)
            .unwrap_or_else(|| panic!("codegen: unknown register `{}`", name));
        if EXCLUDED.contains(&name) {
            panic!("codegen: register `{}` is reserved", name);
        }
        if self.busy.get(reg.name).copied().unwrap_or(false) {
            panic!("codegen: register `{}` already in use", name);
        }
        self.busy.insert(reg.name, true);
        *reg
    }

    pub fn free(&mut self, reg: Register) {
        self.busy.insert(reg.name, false);
    }

    /// Number of registers currently held. Zero between emission steps.
    pub fn busy_count(&self) -> usize {
        self.busy.values().filter(|b| **b).count()
    }
}

impl Default for RegisterPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "tests/t_regs.rs"]
mod tests;
