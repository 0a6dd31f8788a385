//! Controller introspection.
//!
//! The [`Introspector`] turns a [`ControllerDefinition`] into the
//! [`ControllerMetadata`] the adapter works from. It runs once per
//! controller identifier, at registration, and only reads the definition.
//!
//! Two lookup rules apply:
//!
//! - reactive values and outlets come from the most derived definition only;
//!   ancestors' declarations are not made reactive
//! - callbacks are collected along the whole chain, and the most derived
//!   declaration of a given callback name wins
//!
//! The host still sees the values and outlets of the whole chain
//! ([`ControllerMetadata::host_values`], [`ControllerMetadata::host_outlets`]).

use indexmap::IndexMap;
use serde_json::Value;

use crate::definition::{
    collection_name, existence_name, value_attribute, CallbackName, ControllerDefinition,
    ValueType,
};
use crate::error::Result;

/// A value as the adapter and the host see it.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueMetadata {
    pub name: String,
    pub value_type: ValueType,
    pub default: Value,
    /// The element attribute backing the value.
    pub attribute: String,
}

/// An outlet together with its derived accessor names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutletMetadata {
    /// Singular accessor, e.g. `item`.
    pub name: String,
    /// Collection accessor, e.g. `items`.
    pub collection: String,
    /// Existence flag, e.g. `hasItem`.
    pub existence: String,
}

impl OutletMetadata {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            collection: collection_name(name),
            existence: existence_name(name),
        }
    }
}

/// A callback and the definition that declared it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackMetadata {
    pub name: CallbackName,
    pub declared_by: String,
}

/// Everything the adapter needs to know about one controller class.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerMetadata {
    pub identifier: String,
    /// Values mirrored into the reactive store.
    pub values: IndexMap<String, ValueMetadata>,
    /// Outlets mirrored into the reactive store.
    pub outlets: IndexMap<String, OutletMetadata>,
    /// Callbacks keyed by their host name, e.g. `priceValueChanged`.
    pub callbacks: IndexMap<String, CallbackMetadata>,
    /// Values the host observes, across the whole chain.
    pub host_values: IndexMap<String, ValueMetadata>,
    /// Outlets the host connects, across the whole chain.
    pub host_outlets: IndexMap<String, OutletMetadata>,
}

impl ControllerMetadata {
    /// Whether the class declares `callback` anywhere in its chain.
    pub fn declares(&self, callback: &CallbackName) -> bool {
        self.callbacks.contains_key(&callback.to_string())
    }

    /// Find an outlet by its collection name (`items` -> `item`).
    pub fn outlet_by_collection(&self, collection: &str) -> Option<&OutletMetadata> {
        self.outlets.values().find(|outlet| outlet.collection == collection)
    }
}

/// Reads controller definitions.
pub struct Introspector;

impl Introspector {
    /// Build the metadata for `definition`.
    pub fn inspect(definition: &ControllerDefinition) -> Result<ControllerMetadata> {
        definition.validate()?;
        let identifier = definition.identifier();

        let value_metadata = |value: &crate::definition::ValueDefinition| ValueMetadata {
            name: value.name.clone(),
            value_type: value.value_type,
            default: value.default_value(),
            attribute: value_attribute(identifier, &value.name),
        };

        let values = definition
            .values()
            .iter()
            .map(|value| (value.name.clone(), value_metadata(value)))
            .collect();

        let outlets = definition
            .outlets()
            .iter()
            .map(|outlet| (outlet.clone(), OutletMetadata::new(outlet)))
            .collect();

        let mut callbacks: IndexMap<String, CallbackMetadata> = IndexMap::new();
        let mut host_values: IndexMap<String, ValueMetadata> = IndexMap::new();
        let mut host_outlets: IndexMap<String, OutletMetadata> = IndexMap::new();

        for ancestor in definition.ancestry() {
            for name in ancestor.callbacks() {
                callbacks
                    .entry(name.to_string())
                    .or_insert_with(|| CallbackMetadata {
                        name: name.clone(),
                        declared_by: ancestor.identifier().to_string(),
                    });
            }

            for value in ancestor.values() {
                host_values
                    .entry(value.name.clone())
                    .or_insert_with(|| value_metadata(value));
            }
            for outlet in ancestor.outlets() {
                host_outlets
                    .entry(outlet.clone())
                    .or_insert_with(|| OutletMetadata::new(outlet));
            }
        }

        tracing::debug!(
            identifier,
            values = definition.values().len(),
            outlets = definition.outlets().len(),
            callbacks = callbacks.len(),
            "inspected controller definition"
        );

        Ok(ControllerMetadata {
            identifier: identifier.to_string(),
            values,
            outlets,
            callbacks,
            host_values,
            host_outlets,
        })
    }
}
