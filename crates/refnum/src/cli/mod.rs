//
// cli/mod.rs
//
// Command-line surface of the refnum binary
//

pub mod report;
