//! Entity templates: the shared, read-only schema of a replicated entity
//!
//! A template fixes the property order, kinds, flags, widths and defaults
//! for every entity instantiated from it. The order IS the wire format:
//! updates carry no property names or tags, only a changed bit and a value
//! per position. Both peers must therefore load byte-identical schemas,
//! which the positional schema hash verifies at connect time.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use syncwire_core::{Result, SyncError};

use crate::property::{Property, PropertyFlag, PropertyFlags, PropertyKind, PropertyValue};

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

fn fnv1a(hash: u32, byte: u8) -> u32 {
    (hash ^ byte as u32).wrapping_mul(FNV_PRIME)
}

/// One property definition within a template
#[derive(Debug, Clone)]
pub struct PropertyDef {
    /// Name for script/debug lookup; never transmitted
    pub name: String,
    pub kind: PropertyKind,
    pub flags: PropertyFlags,
    /// Wire width for Int/Vec2I components; fixed 1..=32
    pub bit_width: u8,
    pub default: PropertyValue,
}

/// Template data file entry (JSON)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDefFile {
    pub name: String,
    pub kind: PropertyKind,
    #[serde(default)]
    pub flags: Vec<PropertyFlag>,
    #[serde(default = "default_bit_width")]
    pub bit_width: u8,
    pub default: PropertyValue,
}

fn default_bit_width() -> u8 {
    32
}

/// Template data file (JSON)
///
/// # Format
/// ```json
/// {
///   "name": "player",
///   "properties": [
///     { "name": "position", "kind": "Vec2F",
///       "flags": ["predict", "owner_updates"],
///       "default": { "type": "Vec2F", "value": { "x": 0.0, "y": 0.0 } } },
///     { "name": "health", "kind": "Int", "bit_width": 7,
///       "default": { "type": "Int", "value": 100 } }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateFile {
    pub name: String,
    pub properties: Vec<PropertyDefFile>,
}

/// Shared, immutable entity schema
#[derive(Debug)]
pub struct Template {
    name: String,
    defs: Vec<PropertyDef>,
    schema_hash: u32,
}

impl Template {
    /// Build a template, validating every definition
    ///
    /// Widths outside 1..=32 and defaults whose kind disagrees with the
    /// declared kind are load-time errors; they must never reach the wire
    /// layer.
    pub fn new(name: impl Into<String>, defs: Vec<PropertyDef>) -> Result<Self> {
        let name = name.into();
        for def in &defs {
            if def.bit_width == 0 || def.bit_width > 32 {
                return Err(SyncError::InvalidData(format!(
                    "template {}: property {} has bit width {} (must be 1..=32)",
                    name, def.name, def.bit_width
                )));
            }
            if def.default.kind() != def.kind {
                return Err(SyncError::TypeMismatch {
                    expected: def.kind.as_str(),
                    found: def.default.kind().as_str(),
                });
            }
        }

        let schema_hash = Self::hash_defs(&defs);
        Ok(Self {
            name,
            defs,
            schema_hash,
        })
    }

    /// Parse a JSON template file
    pub fn from_json(json: &str) -> Result<Self> {
        let file: TemplateFile = serde_json::from_str(json)
            .map_err(|e| SyncError::InvalidData(format!("template parse: {}", e)))?;
        let defs = file
            .properties
            .into_iter()
            .map(|p| PropertyDef {
                name: p.name,
                kind: p.kind,
                flags: p
                    .flags
                    .iter()
                    .fold(PropertyFlags::NONE, |acc, f| acc | f.as_flags()),
                bit_width: p.bit_width,
                default: p.default,
            })
            .collect();
        Self::new(file.name, defs)
    }

    /// Load a template from a JSON file on disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn defs(&self) -> &[PropertyDef] {
        &self.defs
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Index of a property by name, for script/host lookup
    pub fn property_index(&self, name: &str) -> Option<usize> {
        self.defs.iter().position(|d| d.name == name)
    }

    /// Positional schema hash: kind, width and flags of every property in
    /// order. Names are excluded — they are not part of the wire contract.
    pub fn schema_hash(&self) -> u32 {
        self.schema_hash
    }

    fn hash_defs(defs: &[PropertyDef]) -> u32 {
        let mut hash = FNV_OFFSET;
        for def in defs {
            hash = fnv1a(hash, def.kind.code());
            hash = fnv1a(hash, def.bit_width);
            hash = fnv1a(hash, def.flags.bits());
        }
        hash
    }

    /// Clone the default property set for a new entity
    pub fn instantiate(&self) -> Vec<Property> {
        self.defs
            .iter()
            .map(|d| Property::from_default(d.default.clone(), d.flags, d.bit_width))
            .collect()
    }
}

/// Explicit template registry, owned by a world/session
///
/// Replaces the original's global static template map. The lock allows the
/// registry to be shared between the server and client worlds of a single
/// process; within a tick every access is a read.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: RwLock<BTreeMap<String, Arc<Template>>>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template, returning the shared handle
    ///
    /// Re-registering a name replaces the previous template; entities
    /// already holding the old `Arc` keep it.
    pub fn insert(&self, template: Template) -> Arc<Template> {
        let template = Arc::new(template);
        tracing::debug!(
            "Registering template {} ({} properties, schema {:#010x})",
            template.name(),
            template.len(),
            template.schema_hash()
        );
        self.templates
            .write()
            .insert(template.name().to_string(), template.clone());
        template
    }

    pub fn get(&self, name: &str) -> Option<Arc<Template>> {
        self.templates.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.templates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.read().is_empty()
    }

    /// Digest over every registered template in name order
    ///
    /// Template names ARE included here: spawn messages carry them, so two
    /// registries only interoperate when names and positional schemas both
    /// agree.
    pub fn schema_digest(&self) -> u32 {
        let templates = self.templates.read();
        let mut digest = FNV_OFFSET;
        for (name, template) in templates.iter() {
            for &b in name.as_bytes() {
                digest = fnv1a(digest, b);
            }
            for &b in template.schema_hash().to_be_bytes().iter() {
                digest = fnv1a(digest, b);
            }
        }
        digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syncwire_core::Vec2f;

    pub(crate) fn test_defs() -> Vec<PropertyDef> {
        vec![
            PropertyDef {
                name: "position".into(),
                kind: PropertyKind::Vec2F,
                flags: PropertyFlags::PREDICT | PropertyFlags::OWNER_UPDATES,
                bit_width: 32,
                default: PropertyValue::Vec2F(Vec2f::ZERO),
            },
            PropertyDef {
                name: "health".into(),
                kind: PropertyKind::Int,
                flags: PropertyFlags::NONE,
                bit_width: 8,
                default: PropertyValue::Int(100),
            },
            PropertyDef {
                name: "name".into(),
                kind: PropertyKind::String,
                flags: PropertyFlags::NONE,
                bit_width: 32,
                default: PropertyValue::String(String::new()),
            },
        ]
    }

    #[test]
    fn test_template_validation() {
        let mut defs = test_defs();
        defs[1].bit_width = 0;
        assert!(Template::new("bad", defs).is_err());

        let mut defs = test_defs();
        defs[1].default = PropertyValue::Bool(false);
        assert!(matches!(
            Template::new("bad", defs),
            Err(SyncError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_instantiate_clones_defaults() {
        let template = Template::new("unit", test_defs()).unwrap();
        let props = template.instantiate();
        assert_eq!(props.len(), 3);
        assert_eq!(props[1].as_int(), Some(100));
        assert!(!props[0].differs_from_default());
    }

    #[test]
    fn test_property_index() {
        let template = Template::new("unit", test_defs()).unwrap();
        assert_eq!(template.property_index("health"), Some(1));
        assert_eq!(template.property_index("mana"), None);
    }

    #[test]
    fn test_schema_hash_tracks_positional_schema() {
        let a = Template::new("unit", test_defs()).unwrap();

        // Same schema, different template and property names: same hash
        let mut renamed = test_defs();
        renamed[0].name = "pos".into();
        let b = Template::new("mob", renamed).unwrap();
        assert_eq!(a.schema_hash(), b.schema_hash());

        // Different width: different hash
        let mut widened = test_defs();
        widened[1].bit_width = 12;
        let c = Template::new("unit", widened).unwrap();
        assert_ne!(a.schema_hash(), c.schema_hash());

        // Different flags: different hash
        let mut reflagged = test_defs();
        reflagged[1].flags = PropertyFlags::UNLOCKED;
        let d = Template::new("unit", reflagged).unwrap();
        assert_ne!(a.schema_hash(), d.schema_hash());
    }

    #[test]
    fn test_registry_digest() {
        let reg_a = TemplateRegistry::new();
        reg_a.insert(Template::new("unit", test_defs()).unwrap());
        let reg_b = TemplateRegistry::new();
        reg_b.insert(Template::new("unit", test_defs()).unwrap());
        assert_eq!(reg_a.schema_digest(), reg_b.schema_digest());

        // Same schema under a different template name: digest differs
        let reg_c = TemplateRegistry::new();
        reg_c.insert(Template::new("mob", test_defs()).unwrap());
        assert_ne!(reg_a.schema_digest(), reg_c.schema_digest());
    }

    #[test]
    fn test_json_template() {
        let json = r#"{
            "name": "crate",
            "properties": [
                { "name": "position", "kind": "Vec2F",
                  "flags": ["owner_updates"],
                  "default": { "type": "Vec2F", "value": { "x": 1.0, "y": 2.0 } } },
                { "name": "stack", "kind": "Int", "bit_width": 6,
                  "flags": ["unlocked"],
                  "default": { "type": "Int", "value": 0 } }
            ]
        }"#;

        let template = Template::from_json(json).unwrap();
        assert_eq!(template.name(), "crate");
        assert_eq!(template.len(), 2);
        assert_eq!(template.defs()[1].bit_width, 6);
        assert!(template.defs()[0]
            .flags
            .contains(PropertyFlags::OWNER_UPDATES));
        assert!(template.defs()[1].flags.contains(PropertyFlags::UNLOCKED));
        assert_eq!(
            template.defs()[0].default,
            PropertyValue::Vec2F(Vec2f::new(1.0, 2.0))
        );
    }
}
