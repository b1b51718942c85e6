//! Geometry presets: physical media classes a test runs against.

use lfsperm_error::{PermError, Result};
use serde::Serialize;

/// A named (read, prog, block) size triple.
///
/// Selecting a preset sets all three sizes at once, so the three geometry
/// defines never sweep independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Geometry {
    pub name: &'static str,
    pub read_size: i64,
    pub prog_size: i64,
    pub block_size: i64,
}

/// Preset table, in canonical order.
pub const GEOMETRIES: [Geometry; 5] = [
    Geometry::new("default", 16, 16, 512),
    Geometry::new("eeprom", 1, 1, 512),
    Geometry::new("emmc", 512, 512, 512),
    Geometry::new("nor", 1, 1, 4096),
    Geometry::new("nand", 4096, 4096, 32768),
];

impl Geometry {
    #[must_use]
    pub const fn new(name: &'static str, read_size: i64, prog_size: i64, block_size: i64) -> Self {
        Self {
            name,
            read_size,
            prog_size,
            block_size,
        }
    }

    /// Look up a preset by name.
    pub fn by_name(name: &str) -> Result<Self> {
        GEOMETRIES
            .iter()
            .find(|geometry| geometry.name == name)
            .copied()
            .ok_or_else(|| PermError::UnknownGeometry {
                name: name.to_owned(),
            })
    }

    /// Parse a comma-separated list of preset names, preserving order.
    ///
    /// An empty list selects every preset.
    pub fn parse_list(list: &str) -> Result<Vec<Self>> {
        let names: Vec<&str> = list
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();
        if names.is_empty() {
            return Ok(GEOMETRIES.to_vec());
        }
        names.into_iter().map(Self::by_name).collect()
    }

    /// Value this preset assigns to a geometry define slot (0, 1 or 2).
    #[must_use]
    pub const fn value_at(&self, slot: usize) -> Option<i64> {
        match slot {
            0 => Some(self.read_size),
            1 => Some(self.prog_size),
            2 => Some(self.block_size),
            _ => None,
        }
    }
}
