//! Durable JSON state.
//!
//! Every file the tool owns (config, known marketplaces, marketplace
//! manifests, the host's settings) is read and written through [`JsonStore`].
//! Accesses to the same path are serialized in-process; nothing guards
//! against a second process writing the same file.

pub mod json;
pub mod lock;

pub use json::JsonStore;
pub use lock::KeyedMutex;
