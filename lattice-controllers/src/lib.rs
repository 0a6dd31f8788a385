//! Lattice Controllers
//!
//! Fine-grained reactivity for attribute-backed UI controllers. It provides:
//!
//! - Reactive primitives (signals, memos, effects, scopes)
//! - A dependency graph that propagates changes in topological order
//! - Controller introspection from explicit definitions
//! - A wrapped controller lifecycle that mirrors host values and outlets
//!   into a per-instance reactive store
//!
//! # Architecture
//!
//! - `reactive`: core reactive primitives and dependency tracking
//! - `graph`: dependency graph and update scheduling
//! - `definition` / `introspect`: controller declarations and the metadata
//!   derived from them
//! - `controller`: the wrapped instance and its reactive store
//! - `host`: elements, attribute accessors and the application driver
//!
//! # Example
//!
//! ```rust
//! use lattice_controllers::{
//!     Application, Controller, ControllerDefinition, ControllerHandle, Element,
//!     ReactivityConfig, ValueType,
//! };
//!
//! struct Greeter;
//!
//! impl Controller for Greeter {
//!     fn initialize(&self, this: &ControllerHandle) {
//!         let reader = this.clone();
//!         this.effect(move || {
//!             let name = reader.value("name").unwrap_or_default();
//!             println!("hello {:?}", name);
//!         })
//!         .unwrap();
//!     }
//! }
//!
//! let app = Application::new(ReactivityConfig::default());
//! app.register(
//!     ControllerDefinition::new("greeter")
//!         .value("name", ValueType::String)
//!         .callback("initialize"),
//!     || Greeter,
//! )
//! .unwrap();
//!
//! let greeter = app.mount("greeter", Element::new("div")).unwrap();
//! greeter.set_value("name", "lattice").unwrap();
//! ```

pub mod config;
pub mod controller;
pub mod definition;
pub mod error;
pub mod graph;
pub mod host;
pub mod introspect;
pub mod reactive;

pub use config::ReactivityConfig;
pub use controller::{
    Controller, ControllerClass, ControllerHandle, ControllerStore, OutletList, ReactiveMarker,
    WeakControllerHandle,
};
pub use definition::{CallbackName, ControllerDefinition, ValueDefinition, ValueType};
pub use error::{ReactivityError, Result};
pub use host::{Application, AttributeAccessors, Element, HostAccessors};
pub use introspect::{
    CallbackMetadata, ControllerMetadata, Introspector, OutletMetadata, ValueMetadata,
};
