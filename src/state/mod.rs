//! Observable application state shared with the UI.

mod store;

pub use store::{ObservableStore, PropertyChange, Subscriber, keys};
