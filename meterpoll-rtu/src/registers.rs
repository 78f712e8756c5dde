//! Register descriptors and the ordered register table.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Errors detected while building a register table.
#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    #[error("register table is empty")]
    Empty,
    #[error("register #{0} has an empty name")]
    EmptyName(usize),
    #[error("duplicate register name '{0}'")]
    DuplicateName(String),
    #[error("register '{name}': {count} words at {address:#06x} exceed the address space")]
    AddressOverflow { name: String, address: u16, count: u16 },
    #[error("register '{name}': scale must be a finite number")]
    InvalidScale { name: String },
}

/// Modbus register class, selecting the read function code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterType {
    /// Holding registers, read with function 0x03.
    Holding,
    /// Input registers, read with function 0x04.
    Input,
}

impl RegisterType {
    /// Return the Modbus function code used to read this register class.
    pub fn function_code(&self) -> u8 {
        match self {
            RegisterType::Holding => 0x03,
            RegisterType::Input => 0x04,
        }
    }

    /// Return the string name for this register type.
    pub fn as_str(&self) -> &'static str {
        match self {
            RegisterType::Holding => "holding",
            RegisterType::Input => "input",
        }
    }
}

/// Number of consecutive 16-bit registers forming one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum WordCount {
    /// Single register, 16-bit magnitude.
    One,
    /// Double word, 32-bit magnitude.
    Two,
    /// Quadruple word, 64-bit magnitude.
    Four,
}

impl WordCount {
    /// Number of registers to request from the meter.
    pub fn words(self) -> u16 {
        match self {
            WordCount::One => 1,
            WordCount::Two => 2,
            WordCount::Four => 4,
        }
    }
}

impl TryFrom<u16> for WordCount {
    type Error = String;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(WordCount::One),
            2 => Ok(WordCount::Two),
            4 => Ok(WordCount::Four),
            other => Err(format!("word count must be 1, 2 or 4 (got {})", other)),
        }
    }
}

impl From<WordCount> for u16 {
    fn from(count: WordCount) -> Self {
        count.words()
    }
}

/// Description of one logical meter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterDescriptor {
    /// Output key, unique within the table
    pub name: String,

    /// Display unit of the scaled value
    #[serde(default)]
    pub unit: String,

    /// Start address (0-based)
    pub address: u16,

    /// Registers making up the value
    pub count: WordCount,

    /// Register class
    #[serde(rename = "type", default = "default_register_type")]
    pub register_type: RegisterType,

    /// Scaling factor (raw * scale)
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_register_type() -> RegisterType {
    RegisterType::Input
}

fn default_scale() -> f64 {
    1.0
}

impl RegisterDescriptor {
    /// Create a descriptor.
    pub fn new(
        name: impl Into<String>,
        unit: impl Into<String>,
        address: u16,
        count: WordCount,
        register_type: RegisterType,
        scale: f64,
    ) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            address,
            count,
            register_type,
            scale,
        }
    }
}

/// Ordered, validated, read-only set of register descriptors.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterTable {
    registers: Vec<RegisterDescriptor>,
}

impl RegisterTable {
    /// Build a table, rejecting empty/duplicate names and out-of-range reads.
    pub fn new(registers: Vec<RegisterDescriptor>) -> Result<Self, TableError> {
        if registers.is_empty() {
            return Err(TableError::Empty);
        }

        let mut seen = HashSet::new();
        for (index, register) in registers.iter().enumerate() {
            if register.name.trim().is_empty() {
                return Err(TableError::EmptyName(index));
            }
            if !seen.insert(register.name.as_str()) {
                return Err(TableError::DuplicateName(register.name.clone()));
            }
            let end = u32::from(register.address) + u32::from(register.count.words());
            if end > 0x1_0000 {
                return Err(TableError::AddressOverflow {
                    name: register.name.clone(),
                    address: register.address,
                    count: register.count.words(),
                });
            }
            if !register.scale.is_finite() {
                return Err(TableError::InvalidScale {
                    name: register.name.clone(),
                });
            }
        }

        Ok(Self { registers })
    }

    /// Registers in polling order.
    pub fn iter(&self) -> std::slice::Iter<'_, RegisterDescriptor> {
        self.registers.iter()
    }

    pub fn len(&self) -> usize {
        self.registers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }

    /// Look up a register by name.
    pub fn get(&self, name: &str) -> Option<&RegisterDescriptor> {
        self.registers.iter().find(|r| r.name == name)
    }

    /// Built-in table for the UPM209 meter, single-phase registers.
    pub fn upm209_single_phase() -> Result<Self, TableError> {
        let registers = UPM209_SINGLE_PHASE
            .iter()
            .map(|&(name, unit, address, count, scale)| {
                RegisterDescriptor::new(name, unit, address, count, RegisterType::Input, scale)
            })
            .collect();

        Self::new(registers)
    }
}

impl<'a> IntoIterator for &'a RegisterTable {
    type Item = &'a RegisterDescriptor;
    type IntoIter = std::slice::Iter<'a, RegisterDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// Raw units are milli-units (energy in 0.1 Wh); the scales bring them to the units below.
const UPM209_SINGLE_PHASE: &[(&str, &str, u16, WordCount, f64)] = &[
    // Instantaneous values
    ("Voltage L-N Phase 1 (V1)", "V", 0x0000, WordCount::Two, 0.001),
    ("Current Phase 1 (A1)", "A", 0x000E, WordCount::Two, 0.001),
    ("Active Power Phase 1 (P1)", "W", 0x0018, WordCount::Four, 0.001),
    ("Apparent Power Phase 1 (S1)", "VA", 0x0028, WordCount::Four, 0.001),
    ("Reactive Power Phase 1 (Q1)", "var", 0x0038, WordCount::Four, 0.001),
    ("Power Factor Phase 1 (PF1)", "", 0x0048, WordCount::Two, 0.001),
    ("Tangent Phi Phase 1 (TAN01)", "", 0x0056, WordCount::Two, 0.001),
    // Maximum values
    ("Max Voltage L-N Phase 1 (V1 MAX)", "V", 0x0200, WordCount::Two, 0.001),
    ("Max Current Phase 1 (A1 MAX)", "A", 0x020E, WordCount::Two, 0.001),
    ("Max Active Power Phase 1 (+P1 MAX)", "W", 0x0218, WordCount::Four, 0.001),
    ("Max Apparent Power Phase 1 (+S1 MAX)", "VA", 0x0238, WordCount::Four, 0.001),
    ("Max Reactive Power Phase 1 (+Q1 MAX)", "var", 0x0258, WordCount::Four, 0.001),
    ("Max Power Factor Phase 1 (+PF1 MAX)", "", 0x0278, WordCount::Two, 0.001),
    ("Max Tangent Phi Phase 1 (TAN01 MAX)", "", 0x028A, WordCount::Two, 0.001),
    // Other parameters
    ("Frequency (F)", "Hz", 0x0072, WordCount::Two, 0.001),
    ("Imported Active Energy", "kWh", 0x0400, WordCount::Four, 0.0001),
];
