//
// test_utils/mod.rs
//
// Helpers shared by unit tests, integration tests and benchmarks
//

pub mod fixture_vault;
