//! A minimal host: elements, attribute-backed accessors and an application
//! that drives controller lifecycles.
//!
//! The host owns attribute observation and outlet resolution. It only ever
//! talks to controllers through the wrapped lifecycle methods on
//! [`ControllerHandle`], so everything it reports ends up in the reactive
//! store before user code sees it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::config::ReactivityConfig;
use crate::controller::{Controller, ControllerClass, ControllerHandle};
use crate::definition::ControllerDefinition;
use crate::error::{ReactivityError, Result};
use crate::introspect::{OutletMetadata, ValueMetadata};
use crate::reactive::Runtime;

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(0);

struct ElementInner {
    id: u64,
    tag: String,
    attributes: RwLock<IndexMap<String, String>>,
}

/// A host element: a tag and a bag of string attributes.
///
/// Clones share the same element; equality is identity.
#[derive(Clone)]
pub struct Element(Arc<ElementInner>);

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(Arc::new(ElementInner {
            id: NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed),
            tag: tag.into(),
            attributes: RwLock::new(IndexMap::new()),
        }))
    }

    pub fn with_attribute(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn tag(&self) -> &str {
        &self.0.tag
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.0.attributes.read().get(name).cloned()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.0.attributes.read().contains_key(name)
    }

    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        self.0.attributes.write().insert(name.into(), value.into());
    }

    pub fn remove_attribute(&self, name: &str) -> Option<String> {
        self.0.attributes.write().shift_remove(name)
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Element {}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.0.id)
            .field("tag", &self.0.tag)
            .field("attributes", &*self.0.attributes.read())
            .finish()
    }
}

/// The host's own accessors, used where the store has nothing to say:
/// inherited values, reflected writes and the singular outlet fallback.
pub trait HostAccessors: Send + Sync {
    /// Read a value from the element.
    fn read_value(&self, element: &Element, value: &ValueMetadata) -> Result<Value>;

    /// Write a value back to the element.
    fn write_value(&self, element: &Element, value: &ValueMetadata, new_value: &Value);

    /// Resolve the singular outlet accessor when no outlet is connected.
    fn find_outlet(
        &self,
        element: &Element,
        identifier: &str,
        outlet: &OutletMetadata,
    ) -> Result<ControllerHandle>;
}

/// Accessors backed by `data-<identifier>-<name>-value` attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeAccessors;

impl HostAccessors for AttributeAccessors {
    fn read_value(&self, element: &Element, value: &ValueMetadata) -> Result<Value> {
        match element.attribute(&value.attribute) {
            Some(raw) => value.value_type.read(&value.name, &raw),
            None => Ok(value.default.clone()),
        }
    }

    fn write_value(&self, element: &Element, value: &ValueMetadata, new_value: &Value) {
        element.set_attribute(value.attribute.clone(), value.value_type.write(new_value));
    }

    fn find_outlet(
        &self,
        _element: &Element,
        identifier: &str,
        outlet: &OutletMetadata,
    ) -> Result<ControllerHandle> {
        Err(ReactivityError::MissingOutlet {
            identifier: identifier.to_string(),
            outlet: outlet.name.clone(),
        })
    }
}

struct OutletLink {
    owner: ControllerHandle,
    name: String,
    target: ControllerHandle,
}

/// Registers controller classes and drives instance lifecycles.
///
/// The application applies its [`ReactivityConfig`] to the reactive runtime
/// of the thread it is created on; drive it from that thread.
pub struct Application {
    config: ReactivityConfig,
    accessors: Arc<dyn HostAccessors>,
    classes: RwLock<IndexMap<String, Arc<ControllerClass>>>,
    links: Mutex<Vec<OutletLink>>,
}

impl Application {
    pub fn new(config: ReactivityConfig) -> Self {
        Self::with_accessors(config, Arc::new(AttributeAccessors))
    }

    /// An application whose controllers fall back to custom host accessors.
    pub fn with_accessors(config: ReactivityConfig, accessors: Arc<dyn HostAccessors>) -> Self {
        Runtime::configure(&config);
        Self {
            config,
            accessors,
            classes: RwLock::new(IndexMap::new()),
            links: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &ReactivityConfig {
        &self.config
    }

    /// Register a controller class. The definition is inspected once, here.
    ///
    /// Registering an identifier again replaces the previous class for new
    /// mounts.
    pub fn register<C, F>(&self, definition: ControllerDefinition, factory: F) -> Result<()>
    where
        C: Controller,
        F: Fn() -> C + Send + Sync + 'static,
    {
        let class = ControllerClass::new(
            &definition,
            Arc::clone(&self.accessors),
            self.config.clone(),
            factory,
        )?;
        tracing::debug!(
            identifier = class.identifier(),
            values = class.metadata().values.len(),
            outlets = class.metadata().outlets.len(),
            "registered controller"
        );
        self.classes
            .write()
            .insert(definition.identifier().to_string(), Arc::new(class));
        Ok(())
    }

    pub fn class(&self, identifier: &str) -> Result<Arc<ControllerClass>> {
        self.classes
            .read()
            .get(identifier)
            .cloned()
            .ok_or_else(|| ReactivityError::UnknownController(identifier.to_string()))
    }

    /// Instantiate `identifier` on `element` and connect it.
    pub fn mount(&self, identifier: &str, element: Element) -> Result<ControllerHandle> {
        let handle = self.class(identifier)?.instantiate(element);
        self.connect(&handle)?;
        Ok(handle)
    }

    /// Connect an instance: `initialize` on first connect, one value change
    /// per host value with its current value, then `connect`.
    pub fn connect(&self, handle: &ControllerHandle) -> Result<()> {
        if !handle.is_initialized() {
            handle.initialize();
        }

        let values: Vec<ValueMetadata> = handle.metadata().host_values.values().cloned().collect();
        for value in &values {
            let current = self.accessors.read_value(handle.element(), value)?;
            handle.value_changed(&value.name, &current, None);
        }

        handle.connect();
        tracing::debug!(
            identifier = handle.identifier(),
            element = handle.element().id(),
            "connected controller"
        );
        Ok(())
    }

    /// Disconnect an instance, then detach the outlets it owns.
    pub fn disconnect(&self, handle: &ControllerHandle) {
        handle.disconnect();

        let owned = self.take_links(|link| &link.owner == handle);
        for link in owned {
            handle.outlet_disconnected(&link.name, &link.target, link.target.element());
        }
        tracing::debug!(identifier = handle.identifier(), "disconnected controller");
    }

    /// Connect `target` as outlet `name` of `owner`.
    pub fn connect_outlet(
        &self,
        owner: &ControllerHandle,
        name: &str,
        target: &ControllerHandle,
    ) -> Result<()> {
        self.require_outlet(owner, name)?;
        self.links.lock().push(OutletLink {
            owner: owner.clone(),
            name: name.to_string(),
            target: target.clone(),
        });
        owner.outlet_connected(name, target, target.element());
        Ok(())
    }

    /// Disconnect `target` from outlet `name` of `owner`.
    pub fn disconnect_outlet(
        &self,
        owner: &ControllerHandle,
        name: &str,
        target: &ControllerHandle,
    ) -> Result<()> {
        self.require_outlet(owner, name)?;
        let removed = self.take_links(|link| {
            &link.owner == owner && link.name == name && &link.target == target
        });
        if removed.is_empty() {
            tracing::warn!(
                identifier = owner.identifier(),
                outlet = name,
                "outlet was not connected"
            );
        }
        owner.outlet_disconnected(name, target, target.element());
        Ok(())
    }

    /// Change a value attribute and notify the controller if the decoded
    /// value changed.
    pub fn set_attribute(&self, handle: &ControllerHandle, name: &str, raw: &str) -> Result<()> {
        let value = handle
            .metadata()
            .host_values
            .get(name)
            .cloned()
            .ok_or_else(|| ReactivityError::UnknownValue {
                identifier: handle.identifier().to_string(),
                name: name.to_string(),
            })?;

        let previous = self.accessors.read_value(handle.element(), &value)?;
        let next = value.value_type.read(&value.name, raw)?;
        handle.element().set_attribute(value.attribute.clone(), raw);

        if next != previous {
            handle.value_changed(name, &next, Some(&previous));
        }
        Ok(())
    }

    /// Remove an instance from the page: every controller holding it as an
    /// outlet is told first, then the instance is disconnected.
    pub fn remove(&self, handle: &ControllerHandle) {
        let referencing = self.take_links(|link| &link.target == handle);
        for link in referencing {
            link.owner
                .outlet_disconnected(&link.name, handle, handle.element());
        }
        self.disconnect(handle);
    }

    fn take_links(&self, mut predicate: impl FnMut(&OutletLink) -> bool) -> Vec<OutletLink> {
        let mut links = self.links.lock();
        let mut taken = Vec::new();
        let mut index = 0;
        while index < links.len() {
            if predicate(&links[index]) {
                taken.push(links.remove(index));
            } else {
                index += 1;
            }
        }
        taken
    }

    fn require_outlet(&self, owner: &ControllerHandle, name: &str) -> Result<()> {
        if owner.metadata().host_outlets.contains_key(name) {
            Ok(())
        } else {
            Err(ReactivityError::UnknownOutlet {
                identifier: owner.identifier().to_string(),
                name: name.to_string(),
            })
        }
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("config", &self.config)
            .field("classes", &self.classes.read().keys().collect::<Vec<_>>())
            .field("links", &self.links.lock().len())
            .finish()
    }
}
