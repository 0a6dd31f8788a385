//! Controller declarations.
//!
//! A [`ControllerDefinition`] lists the values and outlets a controller
//! class declares. Controllers state these explicitly instead of having
//! them inferred from accessor names, and the list can be written in code
//! or loaded from JSON:
//!
//! ```rust
//! use lattice_controllers::ControllerDefinition;
//!
//! let definition = ControllerDefinition::from_json(r#"{
//!     "identifier": "cart",
//!     "values": [{ "name": "currency", "type": "string", "default": "EUR" }],
//!     "outlets": ["item"]
//! }"#).unwrap();
//! assert_eq!(definition.identifier(), "cart");
//! ```
//!
//! Names follow the host's property grammar: a value `price` is reflected to
//! the `data-<identifier>-price-value` attribute and observed through
//! `priceValueChanged`; an outlet `item` yields the accessors `item`,
//! `items` and `hasItem`.
//!
//! Lifecycle callbacks are declared too. Only declared callbacks are
//! dispatched to the controller; the rest are no-ops.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ReactivityError, Result};

/// The type of a declared value, which fixes its default and its attribute
/// encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Array,
    Boolean,
    Number,
    Object,
    String,
}

impl ValueType {
    pub fn name(&self) -> &'static str {
        match self {
            ValueType::Array => "array",
            ValueType::Boolean => "boolean",
            ValueType::Number => "number",
            ValueType::Object => "object",
            ValueType::String => "string",
        }
    }

    /// The value used when neither a default nor an attribute is present.
    pub fn default_value(&self) -> Value {
        match self {
            ValueType::Array => Value::Array(Vec::new()),
            ValueType::Boolean => Value::Bool(false),
            ValueType::Number => Value::from(0),
            ValueType::Object => Value::Object(serde_json::Map::new()),
            ValueType::String => Value::String(String::new()),
        }
    }

    /// Decode an attribute string.
    pub fn read(&self, name: &str, raw: &str) -> Result<Value> {
        let invalid = || ReactivityError::InvalidValue {
            name: name.to_string(),
            value_type: self.name(),
            raw: raw.to_string(),
        };

        match self {
            ValueType::Array => match serde_json::from_str(raw) {
                Ok(value @ Value::Array(_)) => Ok(value),
                _ => Err(invalid()),
            },
            ValueType::Object => match serde_json::from_str(raw) {
                Ok(value @ Value::Object(_)) => Ok(value),
                _ => Err(invalid()),
            },
            ValueType::Boolean => Ok(Value::Bool(!(raw == "0" || raw == "false"))),
            ValueType::Number => {
                let cleaned = raw.trim().replace('_', "");
                let number: f64 = cleaned.parse().map_err(|_| invalid())?;
                if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
                    Ok(Value::from(number as i64))
                } else {
                    serde_json::Number::from_f64(number)
                        .map(Value::Number)
                        .ok_or_else(invalid)
                }
            }
            ValueType::String => Ok(Value::String(raw.to_string())),
        }
    }

    /// Encode a value as an attribute string.
    pub fn write(&self, value: &Value) -> String {
        match (self, value) {
            (ValueType::Array | ValueType::Object, value) => value.to_string(),
            (_, Value::String(text)) => text.clone(),
            (_, Value::Null) => String::new(),
            (_, value) => value.to_string(),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One declared value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ValueDefinition {
    /// The declared default, or the type's default.
    pub fn default_value(&self) -> Value {
        self.default
            .clone()
            .unwrap_or_else(|| self.value_type.default_value())
    }
}

/// The explicit declaration of a controller class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerDefinition {
    identifier: String,
    #[serde(default)]
    values: Vec<ValueDefinition>,
    #[serde(default)]
    outlets: Vec<String>,
    #[serde(default)]
    callbacks: Vec<CallbackName>,
    #[serde(skip)]
    invalid_callbacks: Vec<String>,
    #[serde(skip)]
    parent: Option<Arc<ControllerDefinition>>,
}

impl ControllerDefinition {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            values: Vec::new(),
            outlets: Vec::new(),
            callbacks: Vec::new(),
            invalid_callbacks: Vec::new(),
            parent: None,
        }
    }

    /// Load a definition from its JSON form.
    pub fn from_json(source: &str) -> Result<Self> {
        let definition: Self = serde_json::from_str(source)?;
        definition.validate()?;
        Ok(definition)
    }

    /// Declare a value using its type's default.
    pub fn value(mut self, name: impl Into<String>, value_type: ValueType) -> Self {
        self.values.push(ValueDefinition {
            name: name.into(),
            value_type,
            default: None,
        });
        self
    }

    /// Declare a value with an explicit default.
    pub fn value_with_default(
        mut self,
        name: impl Into<String>,
        value_type: ValueType,
        default: impl Into<Value>,
    ) -> Self {
        self.values.push(ValueDefinition {
            name: name.into(),
            value_type,
            default: Some(default.into()),
        });
        self
    }

    pub fn outlet(mut self, name: impl Into<String>) -> Self {
        self.outlets.push(name.into());
        self
    }

    /// Declare a lifecycle callback by its host name, e.g.
    /// `priceValueChanged`. Names outside the callback grammar are reported
    /// by [`validate`](Self::validate).
    pub fn callback(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        match name.parse() {
            Ok(callback) => self.callbacks.push(callback),
            Err(_) => self.invalid_callbacks.push(name),
        }
        self
    }

    /// Derive this definition from `parent`.
    pub fn extends(mut self, parent: ControllerDefinition) -> Self {
        self.parent = Some(Arc::new(parent));
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Values declared by this definition itself.
    pub fn values(&self) -> &[ValueDefinition] {
        &self.values
    }

    /// Outlets declared by this definition itself.
    pub fn outlets(&self) -> &[String] {
        &self.outlets
    }

    /// Callbacks declared by this definition itself.
    pub fn callbacks(&self) -> &[CallbackName] {
        &self.callbacks
    }

    pub fn parent(&self) -> Option<&ControllerDefinition> {
        self.parent.as_deref()
    }

    /// This definition followed by its ancestors, most derived first.
    pub fn ancestry(&self) -> impl Iterator<Item = &ControllerDefinition> {
        std::iter::successors(Some(self), |definition| definition.parent())
    }

    /// Check identifiers and names, reject duplicates, and make sure every
    /// declared callback targets a value or outlet of the chain.
    pub fn validate(&self) -> Result<()> {
        for definition in self.ancestry() {
            definition.validate_own()?;
        }

        let declares_value = |name: &str| {
            self.ancestry()
                .any(|definition| definition.values.iter().any(|value| value.name == name))
        };
        let declares_outlet = |name: &str| {
            self.ancestry()
                .any(|definition| definition.outlets.iter().any(|outlet| outlet == name))
        };

        for definition in self.ancestry() {
            for callback in &definition.callbacks {
                match callback {
                    CallbackName::Initialize | CallbackName::Disconnect => {}
                    CallbackName::ValueChanged(name) if !declares_value(name.as_str()) => {
                        return Err(ReactivityError::UnknownValue {
                            identifier: definition.identifier.clone(),
                            name: name.clone(),
                        });
                    }
                    CallbackName::OutletConnected(name) | CallbackName::OutletDisconnected(name)
                        if !declares_outlet(name.as_str()) =>
                    {
                        return Err(ReactivityError::UnknownOutlet {
                            identifier: definition.identifier.clone(),
                            name: name.clone(),
                        });
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn validate_own(&self) -> Result<()> {
        if !is_identifier(&self.identifier) {
            return Err(ReactivityError::InvalidName {
                kind: "controller identifier",
                name: self.identifier.clone(),
            });
        }

        let mut seen = std::collections::HashSet::new();
        let names = self
            .values
            .iter()
            .map(|value| ("value", value.name.as_str()))
            .chain(self.outlets.iter().map(|outlet| ("outlet", outlet.as_str())));

        for (kind, name) in names {
            if !is_property_name(name) {
                return Err(ReactivityError::InvalidName {
                    kind,
                    name: name.to_string(),
                });
            }
            if !seen.insert((kind, name)) {
                return Err(ReactivityError::DuplicateDeclaration {
                    identifier: self.identifier.clone(),
                    name: name.to_string(),
                });
            }
        }

        if let Some(name) = self.invalid_callbacks.first() {
            return Err(ReactivityError::InvalidName {
                kind: "callback",
                name: name.clone(),
            });
        }

        let mut callbacks = std::collections::HashSet::new();
        for callback in &self.callbacks {
            if !callbacks.insert(callback) {
                return Err(ReactivityError::DuplicateDeclaration {
                    identifier: self.identifier.clone(),
                    name: callback.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// A lifecycle callback, named the way the host names it.
///
/// Serialized as its host name (`"priceValueChanged"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CallbackName {
    Initialize,
    Disconnect,
    /// `<name>ValueChanged`
    ValueChanged(String),
    /// `<name>OutletConnected`
    OutletConnected(String),
    /// `<name>OutletDisconnected`
    OutletDisconnected(String),
}

const VALUE_CHANGED: &str = "ValueChanged";
const OUTLET_CONNECTED: &str = "OutletConnected";
const OUTLET_DISCONNECTED: &str = "OutletDisconnected";

impl fmt::Display for CallbackName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackName::Initialize => f.write_str("initialize"),
            CallbackName::Disconnect => f.write_str("disconnect"),
            CallbackName::ValueChanged(name) => write!(f, "{name}{VALUE_CHANGED}"),
            CallbackName::OutletConnected(name) => write!(f, "{name}{OUTLET_CONNECTED}"),
            CallbackName::OutletDisconnected(name) => write!(f, "{name}{OUTLET_DISCONNECTED}"),
        }
    }
}

impl FromStr for CallbackName {
    type Err = ReactivityError;

    fn from_str(source: &str) -> Result<Self> {
        let parsed = match source {
            "initialize" => Some(CallbackName::Initialize),
            "disconnect" => Some(CallbackName::Disconnect),
            _ => property_prefix(source, VALUE_CHANGED)
                .map(CallbackName::ValueChanged)
                .or_else(|| property_prefix(source, OUTLET_CONNECTED).map(CallbackName::OutletConnected))
                .or_else(|| {
                    property_prefix(source, OUTLET_DISCONNECTED).map(CallbackName::OutletDisconnected)
                }),
        };

        parsed.ok_or_else(|| ReactivityError::InvalidName {
            kind: "callback",
            name: source.to_string(),
        })
    }
}

impl TryFrom<String> for CallbackName {
    type Error = ReactivityError;

    fn try_from(source: String) -> Result<Self> {
        source.parse()
    }
}

impl From<CallbackName> for String {
    fn from(callback: CallbackName) -> Self {
        callback.to_string()
    }
}

fn property_prefix(source: &str, suffix: &str) -> Option<String> {
    source
        .strip_suffix(suffix)
        .filter(|name| is_property_name(name))
        .map(str::to_string)
}

/// camelCase property name: a lowercase ASCII letter followed by ASCII
/// letters and digits.
pub fn is_property_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(first) if first.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_alphanumeric())
}

/// Controller identifier: lowercase ASCII letters, digits, `-` and `_`,
/// starting with a letter.
pub fn is_identifier(identifier: &str) -> bool {
    let mut chars = identifier.chars();
    matches!(chars.next(), Some(first) if first.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

/// `item` -> `items`
pub fn collection_name(outlet: &str) -> String {
    format!("{outlet}s")
}

/// `item` -> `hasItem`
pub fn existence_name(outlet: &str) -> String {
    format!("has{}", capitalize(outlet))
}

/// `price` on `cart-item` -> `data-cart-item-price-value`
pub fn value_attribute(identifier: &str, value: &str) -> String {
    format!("data-{identifier}-{}-value", kebab_case(value))
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for c in name.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn derived_names() {
        assert_eq!(collection_name("item"), "items");
        assert_eq!(existence_name("item"), "hasItem");
        assert_eq!(existence_name("lineItem"), "hasLineItem");
        assert_eq!(value_attribute("cart-item", "unitPrice"), "data-cart-item-unit-price-value");
    }

    #[test]
    fn callback_names_round_trip_through_the_grammar() {
        let names = [
            "initialize",
            "disconnect",
            "priceValueChanged",
            "itemOutletConnected",
            "itemOutletDisconnected",
        ];
        for name in names {
            let parsed: CallbackName = name.parse().unwrap();
            assert_eq!(parsed.to_string(), name);
        }
        assert_eq!(
            "itemOutletDisconnected".parse::<CallbackName>().unwrap(),
            CallbackName::OutletDisconnected("item".into())
        );
    }

    #[test]
    fn non_callbacks_are_rejected() {
        for name in ["connect", "ValueChanged", "Price ValueChanged", "hasItem", ""] {
            assert!(name.parse::<CallbackName>().is_err(), "{name} parsed");
        }
    }

    #[test]
    fn value_types_decode_attributes() {
        assert_eq!(ValueType::Number.read("n", "1_000").unwrap(), json!(1000));
        assert_eq!(ValueType::Number.read("n", "2.5").unwrap(), json!(2.5));
        assert!(ValueType::Number.read("n", "ten").is_err());
        assert_eq!(ValueType::Boolean.read("b", "false").unwrap(), json!(false));
        assert_eq!(ValueType::Boolean.read("b", "").unwrap(), json!(true));
        assert_eq!(ValueType::Array.read("a", "[1,2]").unwrap(), json!([1, 2]));
        assert!(ValueType::Array.read("a", "{}").is_err());
        assert_eq!(ValueType::Object.read("o", r#"{"a":1}"#).unwrap(), json!({"a": 1}));
        assert_eq!(ValueType::String.read("s", "hi").unwrap(), json!("hi"));
    }

    #[test]
    fn value_types_encode_attributes() {
        assert_eq!(ValueType::String.write(&json!("hi")), "hi");
        assert_eq!(ValueType::Number.write(&json!(3)), "3");
        assert_eq!(ValueType::Boolean.write(&json!(true)), "true");
        assert_eq!(ValueType::Array.write(&json!([1])), "[1]");
    }

    #[test]
    fn defaults_fall_back_to_the_type() {
        let definition = ControllerDefinition::new("item")
            .value_with_default("quantity", ValueType::Number, 1)
            .value("price", ValueType::Number);
        assert_eq!(definition.values()[0].default_value(), json!(1));
        assert_eq!(definition.values()[1].default_value(), json!(0));
    }

    #[test]
    fn validation_rejects_bad_declarations() {
        let duplicate = ControllerDefinition::new("item")
            .value("price", ValueType::Number)
            .value("price", ValueType::String);
        assert!(matches!(
            duplicate.validate(),
            Err(ReactivityError::DuplicateDeclaration { .. })
        ));

        let bad_name = ControllerDefinition::new("item").outlet("Cart");
        assert!(matches!(bad_name.validate(), Err(ReactivityError::InvalidName { .. })));

        let bad_identifier = ControllerDefinition::new("Item");
        assert!(bad_identifier.validate().is_err());

        let inherited_bad = ControllerDefinition::new("child").extends(bad_name);
        assert!(inherited_bad.validate().is_err());
    }

    #[test]
    fn definitions_load_from_json() {
        let definition = ControllerDefinition::from_json(
            r#"{ "identifier": "item", "values": [{ "name": "price", "type": "number" }] }"#,
        )
        .unwrap();
        assert_eq!(definition.values()[0].value_type, ValueType::Number);
        assert!(definition.outlets().is_empty());

        assert!(ControllerDefinition::from_json(r#"{ "identifier": "Bad" }"#).is_err());
    }

    #[test]
    fn callbacks_are_declared_explicitly() {
        let definition = ControllerDefinition::new("item")
            .value("price", ValueType::Number)
            .outlet("cart")
            .callback("initialize")
            .callback("priceValueChanged")
            .callback("cartOutletDisconnected");
        definition.validate().unwrap();
        assert_eq!(
            definition.callbacks(),
            &[
                CallbackName::Initialize,
                CallbackName::ValueChanged("price".into()),
                CallbackName::OutletDisconnected("cart".into()),
            ]
        );
    }

    #[test]
    fn callback_declarations_are_validated() {
        let malformed = ControllerDefinition::new("item").callback("connect");
        assert!(matches!(
            malformed.validate(),
            Err(ReactivityError::InvalidName { kind: "callback", .. })
        ));

        let untargeted = ControllerDefinition::new("item").callback("priceValueChanged");
        assert!(matches!(
            untargeted.validate(),
            Err(ReactivityError::UnknownValue { .. })
        ));

        let repeated = ControllerDefinition::new("item")
            .callback("initialize")
            .callback("initialize");
        assert!(matches!(
            repeated.validate(),
            Err(ReactivityError::DuplicateDeclaration { .. })
        ));

        // A parent may observe a value that only the child declares.
        let parent = ControllerDefinition::new("base").callback("labelValueChanged");
        let child = ControllerDefinition::new("panel")
            .value("label", ValueType::String)
            .extends(parent);
        child.validate().unwrap();
    }

    #[test]
    fn callbacks_load_from_json() {
        let definition = ControllerDefinition::from_json(
            r#"{
                "identifier": "item",
                "outlets": ["cart"],
                "callbacks": ["disconnect", "cartOutletConnected"]
            }"#,
        )
        .unwrap();
        assert_eq!(
            definition.callbacks(),
            &[
                CallbackName::Disconnect,
                CallbackName::OutletConnected("cart".into())
            ]
        );
        assert_eq!(
            serde_json::to_value(&definition.callbacks()[1]).unwrap(),
            json!("cartOutletConnected")
        );

        assert!(ControllerDefinition::from_json(
            r#"{ "identifier": "item", "callbacks": ["hasCart"] }"#
        )
        .is_err());
    }

    #[test]
    fn ancestry_lists_most_derived_first() {
        let definition = ControllerDefinition::new("special-item")
            .extends(ControllerDefinition::new("item").extends(ControllerDefinition::new("base")));
        let chain: Vec<_> = definition.ancestry().map(|d| d.identifier()).collect();
        assert_eq!(chain, vec!["special-item", "item", "base"]);
    }
}
