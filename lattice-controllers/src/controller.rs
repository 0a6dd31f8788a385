//! Reactive controllers.
//!
//! A [`ControllerHandle`] wraps one controller instance and sits between the
//! host and the user's [`Controller`]. The host drives the wrapped
//! lifecycle methods, and each of them mirrors its payload into the
//! instance's reactive store before handing over to the user callback:
//!
//! | host call | store effect |
//! |---|---|
//! | `initialize` | create the [`ReactiveMarker`] once per instance |
//! | `value_changed` | write the value cell |
//! | `outlet_connected` | append to the outlet collection |
//! | `outlet_disconnected` | drop the controller from the collection |
//! | `disconnect` | stop the tracking scope and start a fresh one |
//!
//! User code reads the store through [`ControllerHandle::value`],
//! [`ControllerHandle::outlets`] and friends, and registers reactive work
//! with [`ControllerHandle::effect`] and [`ControllerHandle::computed`].
//! Those registrations belong to the instance's current scope and stop at
//! the next disconnect.
//!
//! User callbacks only run when the definition chain declares them.
//! `connect` is the exception and always runs.

use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::ReactivityConfig;
use crate::definition::{CallbackName, ControllerDefinition};
use crate::error::{ReactivityError, Result};
use crate::host::{Element, HostAccessors};
use crate::introspect::{ControllerMetadata, Introspector, OutletMetadata, ValueMetadata};
use crate::reactive::{EffectScope, Memo, ReactiveMap, ShallowRef};

/// Controllers connected through one outlet, in connection order.
pub type OutletList = Arc<[ControllerHandle]>;

/// User-side lifecycle callbacks.
///
/// Every method has an empty default; implement the ones the controller
/// reacts to. `this` is the wrapped instance the callback runs for.
#[allow(unused_variables)]
pub trait Controller: Send + Sync + 'static {
    fn initialize(&self, this: &ControllerHandle) {}

    fn connect(&self, this: &ControllerHandle) {}

    fn disconnect(&self, this: &ControllerHandle) {}

    /// `<name>ValueChanged(value, previousValue)`. `previous` is `None` on
    /// the first notification.
    fn value_changed(
        &self,
        this: &ControllerHandle,
        name: &str,
        value: &Value,
        previous: Option<&Value>,
    ) {
    }

    /// `<name>OutletConnected(controller, element)`
    fn outlet_connected(
        &self,
        this: &ControllerHandle,
        name: &str,
        outlet: &ControllerHandle,
        element: &Element,
    ) {
    }

    /// `<name>OutletDisconnected(controller, element)`
    fn outlet_disconnected(
        &self,
        this: &ControllerHandle,
        name: &str,
        outlet: &ControllerHandle,
        element: &Element,
    ) {
    }
}

type ControllerFactory = Box<dyn Fn() -> Box<dyn Controller> + Send + Sync>;

/// Per-class configuration, built once at registration and shared by every
/// instance of the class.
pub struct ControllerClass {
    metadata: Arc<ControllerMetadata>,
    accessors: Arc<dyn HostAccessors>,
    config: ReactivityConfig,
    factory: ControllerFactory,
}

impl ControllerClass {
    /// Inspect `definition` and bind it to a controller factory.
    pub fn new<C, F>(
        definition: &ControllerDefinition,
        accessors: Arc<dyn HostAccessors>,
        config: ReactivityConfig,
        factory: F,
    ) -> Result<Self>
    where
        C: Controller,
        F: Fn() -> C + Send + Sync + 'static,
    {
        let metadata = Introspector::inspect(definition)?;
        Ok(Self {
            metadata: Arc::new(metadata),
            accessors,
            config,
            factory: Box::new(move || Box::new(factory()) as Box<dyn Controller>),
        })
    }

    pub fn identifier(&self) -> &str {
        &self.metadata.identifier
    }

    pub fn metadata(&self) -> &ControllerMetadata {
        &self.metadata
    }

    /// Create an instance bound to `element`. Nothing runs until the host
    /// calls [`ControllerHandle::initialize`].
    pub fn instantiate(self: &Arc<Self>, element: Element) -> ControllerHandle {
        ControllerHandle(Arc::new(Instance {
            class: Arc::clone(self),
            element,
            controller: (self.factory)(),
            marker: OnceLock::new(),
        }))
    }
}

impl fmt::Debug for ControllerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerClass")
            .field("identifier", &self.identifier())
            .field("config", &self.config)
            .finish()
    }
}

/// The reactive store of one instance.
///
/// Value cells start out undefined (`None`) until the host reports the
/// first value. Outlet collections are keyed by collection name (`items`)
/// and replaced wholesale on every change.
pub struct ControllerStore {
    values: ReactiveMap<Option<Value>>,
    outlets: IndexMap<String, ShallowRef<OutletList>>,
}

impl ControllerStore {
    fn new(metadata: &ControllerMetadata) -> Self {
        let values = ReactiveMap::new();
        for name in metadata.values.keys() {
            values.insert(name.clone(), None);
        }
        let outlets = metadata
            .outlets
            .values()
            .map(|outlet| {
                let empty: OutletList = Arc::from(Vec::new());
                (outlet.collection.clone(), ShallowRef::new(empty))
            })
            .collect();
        Self { values, outlets }
    }

    /// The value cells, keyed by value name.
    pub fn values(&self) -> &ReactiveMap<Option<Value>> {
        &self.values
    }

    /// The outlet collection cell for `collection` (e.g. `items`).
    pub fn outlet_collection(&self, collection: &str) -> Option<&ShallowRef<OutletList>> {
        self.outlets.get(collection)
    }
}

/// Per-instance record binding a controller to its store and current scope.
///
/// Created once per instance; only the scope is replaced afterwards.
pub struct ReactiveMarker {
    store: ControllerStore,
    scope: Mutex<EffectScope>,
}

impl ReactiveMarker {
    fn new(metadata: &ControllerMetadata) -> Self {
        Self {
            store: ControllerStore::new(metadata),
            scope: Mutex::new(EffectScope::new()),
        }
    }

    pub fn store(&self) -> &ControllerStore {
        &self.store
    }

    /// The scope new registrations go to.
    pub fn scope(&self) -> EffectScope {
        self.scope.lock().clone()
    }
}

struct Instance {
    class: Arc<ControllerClass>,
    element: Element,
    controller: Box<dyn Controller>,
    marker: OnceLock<ReactiveMarker>,
}

/// A wrapped controller instance.
///
/// Handles are cheap to clone and compare by instance identity.
#[derive(Clone)]
pub struct ControllerHandle(Arc<Instance>);

/// A non-owning [`ControllerHandle`], for closures that must not keep their
/// controller alive.
#[derive(Clone)]
pub struct WeakControllerHandle(Weak<Instance>);

impl WeakControllerHandle {
    pub fn upgrade(&self) -> Option<ControllerHandle> {
        self.0.upgrade().map(ControllerHandle)
    }
}

impl ControllerHandle {
    pub fn identifier(&self) -> &str {
        self.0.class.identifier()
    }

    pub fn element(&self) -> &Element {
        &self.0.element
    }

    pub fn metadata(&self) -> &ControllerMetadata {
        self.0.class.metadata()
    }

    pub fn downgrade(&self) -> WeakControllerHandle {
        WeakControllerHandle(Arc::downgrade(&self.0))
    }

    /// Whether the wrapped `initialize` has run at least once.
    pub fn is_initialized(&self) -> bool {
        self.0.marker.get().is_some()
    }

    /// The reactive marker, once `initialize` ran.
    pub fn marker(&self) -> Option<&ReactiveMarker> {
        self.0.marker.get()
    }

    fn require_marker(&self, operation: &'static str) -> Result<&ReactiveMarker> {
        self.0
            .marker
            .get()
            .ok_or_else(|| ReactivityError::NotInitialized {
                identifier: self.identifier().to_string(),
                operation,
            })
    }

    /// The reactive store of this instance.
    pub fn store(&self) -> Result<&ControllerStore> {
        self.require_marker("store").map(ReactiveMarker::store)
    }

    /// The tracking scope current registrations go to.
    pub fn scope(&self) -> Result<EffectScope> {
        self.require_marker("scope").map(ReactiveMarker::scope)
    }

    fn controller(&self) -> &dyn Controller {
        self.0.controller.as_ref()
    }

    // ------------------------------------------------------------------
    // Wrapped lifecycle, driven by the host
    // ------------------------------------------------------------------

    /// Create the reactive marker on first call, then run the user's
    /// `initialize`. A reused instance keeps its marker and store.
    pub fn initialize(&self) {
        let mut created = false;
        self.0.marker.get_or_init(|| {
            created = true;
            ReactiveMarker::new(self.metadata())
        });

        if created {
            tracing::debug!(identifier = self.identifier(), "created reactive marker");
        } else {
            tracing::debug!(identifier = self.identifier(), "reusing reactive marker");
        }

        if self.metadata().declares(&CallbackName::Initialize) {
            self.controller().initialize(self);
        }
    }

    pub fn connect(&self) {
        self.controller().connect(self);
    }

    /// Stop the current scope and install a fresh one, then run the user's
    /// `disconnect`. The store keeps its values.
    pub fn disconnect(&self) {
        if let Some(marker) = self.0.marker.get() {
            let mut scope = marker.scope.lock();
            let stopped = scope.id();
            scope.stop();
            *scope = EffectScope::new();
            tracing::debug!(
                identifier = self.identifier(),
                stopped = ?stopped,
                fresh = ?scope.id(),
                "rotated tracking scope"
            );
        }

        if self.metadata().declares(&CallbackName::Disconnect) {
            self.controller().disconnect(self);
        }
    }

    /// Mirror a host-observed value change into the store, then run the
    /// user's `<name>ValueChanged`.
    pub fn value_changed(&self, name: &str, value: &Value, previous: Option<&Value>) {
        if self.metadata().values.contains_key(name) {
            match self.0.marker.get() {
                Some(marker) => {
                    tracing::trace!(identifier = self.identifier(), name, %value, "value changed");
                    marker.store.values.insert(name, Some(value.clone()));
                }
                None => tracing::warn!(
                    identifier = self.identifier(),
                    name,
                    "value change before initialize"
                ),
            }
        }

        if self
            .metadata()
            .declares(&CallbackName::ValueChanged(name.to_string()))
        {
            self.controller().value_changed(self, name, value, previous);
        }
    }

    /// Append `outlet` to the collection, then run the user's
    /// `<name>OutletConnected`.
    pub fn outlet_connected(&self, name: &str, outlet: &ControllerHandle, element: &Element) {
        if let Some(cell) = self.outlet_cell(name) {
            let current = cell.value_untracked();
            let next: OutletList = current
                .iter()
                .cloned()
                .chain(std::iter::once(outlet.clone()))
                .collect();
            tracing::trace!(
                identifier = self.identifier(),
                outlet = name,
                count = next.len(),
                "outlet connected"
            );
            cell.set_value(next);
        }

        if self
            .metadata()
            .declares(&CallbackName::OutletConnected(name.to_string()))
        {
            self.controller().outlet_connected(self, name, outlet, element);
        }
    }

    /// Drop every reference to `outlet` from the collection, then run the
    /// user's `<name>OutletDisconnected`.
    pub fn outlet_disconnected(&self, name: &str, outlet: &ControllerHandle, element: &Element) {
        if let Some(cell) = self.outlet_cell(name) {
            let current = cell.value_untracked();
            let next: OutletList = current.iter().filter(|c| *c != outlet).cloned().collect();
            if next.len() == current.len() {
                tracing::warn!(
                    identifier = self.identifier(),
                    outlet = name,
                    "disconnected outlet was not in the collection"
                );
            }
            tracing::trace!(
                identifier = self.identifier(),
                outlet = name,
                count = next.len(),
                "outlet disconnected"
            );
            cell.set_value(next);
        }

        if self
            .metadata()
            .declares(&CallbackName::OutletDisconnected(name.to_string()))
        {
            self.controller().outlet_disconnected(self, name, outlet, element);
        }
    }

    fn outlet_cell(&self, name: &str) -> Option<&ShallowRef<OutletList>> {
        let outlet = self.metadata().outlets.get(name)?;
        let marker = self.0.marker.get()?;
        marker.store.outlet_collection(&outlet.collection)
    }

    // ------------------------------------------------------------------
    // Intercepted accessors
    // ------------------------------------------------------------------

    /// Read a value. Reactive values are read from the store (and tracked);
    /// `None` means the host has not reported the value yet.
    pub fn value(&self, name: &str) -> Result<Option<Value>> {
        if self.metadata().values.contains_key(name) {
            let marker = self.require_marker("value")?;
            return Ok(marker.store.values.get(name).flatten());
        }
        match self.metadata().host_values.get(name) {
            Some(value) => self
                .0
                .class
                .accessors
                .read_value(self.element(), value)
                .map(Some),
            None => Err(self.unknown_value(name)),
        }
    }

    /// Read a value and deserialize it.
    pub fn value_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.value(name)? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| ReactivityError::ValueDecode {
                    name: name.to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }

    /// Write a value: first the store, then the host's own setter.
    ///
    /// A reflected write that changes the element dispatches
    /// `<name>ValueChanged` with the previous value decoded from the element.
    pub fn set_value(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();

        if let Some(metadata) = self.metadata().values.get(name) {
            let marker = self.require_marker("set_value")?;
            marker.store.values.insert(name, Some(value.clone()));
            if self.0.class.config.reflect_values {
                self.reflect(metadata, &value);
            }
            return Ok(());
        }

        match self.metadata().host_values.get(name) {
            Some(metadata) => {
                self.reflect(metadata, &value);
                Ok(())
            }
            None => Err(self.unknown_value(name)),
        }
    }

    fn reflect(&self, metadata: &ValueMetadata, value: &Value) {
        let accessors = &self.0.class.accessors;
        let previous = match accessors.read_value(self.element(), metadata) {
            Ok(previous) => Some(previous),
            Err(error) => {
                tracing::debug!(
                    identifier = self.identifier(),
                    name = %metadata.name,
                    %error,
                    "previous value unreadable"
                );
                None
            }
        };

        accessors.write_value(self.element(), metadata, value);
        if previous.as_ref() != Some(value) {
            self.value_changed(&metadata.name, value, previous.as_ref());
        }
    }

    fn unknown_value(&self, name: &str) -> ReactivityError {
        ReactivityError::UnknownValue {
            identifier: self.identifier().to_string(),
            name: name.to_string(),
        }
    }

    fn outlet_metadata(&self, name: &str) -> Result<&OutletMetadata> {
        self.metadata()
            .outlets
            .get(name)
            .ok_or_else(|| ReactivityError::UnknownOutlet {
                identifier: self.identifier().to_string(),
                name: name.to_string(),
            })
    }

    /// The `<name>s` collection: every connected outlet, in connection order.
    pub fn outlets(&self, name: &str) -> Result<OutletList> {
        let outlet = self.outlet_metadata(name)?;
        let marker = self.require_marker("outlets")?;
        marker
            .store
            .outlet_collection(&outlet.collection)
            .map(ShallowRef::value)
            .ok_or_else(|| ReactivityError::UnknownOutlet {
                identifier: self.identifier().to_string(),
                name: name.to_string(),
            })
    }

    /// `has<Name>`: whether at least one outlet is connected.
    pub fn has_outlet(&self, name: &str) -> Result<bool> {
        Ok(!self.outlets(name)?.is_empty())
    }

    /// The singular `<name>` accessor: the first connected outlet, or
    /// whatever the host's own accessor says when none is connected.
    pub fn outlet(&self, name: &str) -> Result<ControllerHandle> {
        if let Some(first) = self.outlets(name)?.first() {
            return Ok(first.clone());
        }
        let outlet = self.outlet_metadata(name)?;
        self.0
            .class
            .accessors
            .find_outlet(self.element(), self.identifier(), outlet)
    }

    // ------------------------------------------------------------------
    // Scoped registration
    // ------------------------------------------------------------------

    /// Run `callback` now and again whenever something it read changes,
    /// until the next disconnect.
    pub fn effect<F>(&self, callback: F) -> Result<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let scope = self.require_marker("effect")?.scope();
        scope.effect(callback).map(|_| ())
    }

    /// A memoized value derived from reactive reads, live until the next
    /// disconnect.
    pub fn computed<T, F>(&self, callback: F) -> Result<Memo<T>>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let scope = self.require_marker("computed")?.scope();
        scope.memo(callback)
    }
}

impl PartialEq for ControllerHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ControllerHandle {}

impl fmt::Debug for ControllerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerHandle")
            .field("identifier", &self.identifier())
            .field("element", &self.element().id())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
