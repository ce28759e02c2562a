//
// lib.rs
//
// Library surface of refnum. main.rs, benches/ and tests/ use these modules
// through the crate name.
//

pub mod cli;
pub mod error;
pub mod event;
pub mod importer;
pub mod initializer;
pub mod link;
pub mod manager;
pub mod metadata;
pub mod model;
pub mod numbering;
pub mod numeral;
pub mod parser;
pub mod settings;
pub mod staticify;
pub mod store;
pub mod theorem;
pub mod vault;
pub mod watch;
// test_utils is available in test builds and when the `test-support` feature is enabled.
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;

pub use error::{IndexError, IndexResult};
pub use event::{EventBus, IndexEvent, InitializationStats};
pub use manager::IndexManager;
pub use store::ObjectStore;
