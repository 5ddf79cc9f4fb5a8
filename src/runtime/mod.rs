/// Runtime bootstrap module - Gateway

mod bootstrap;

pub use bootstrap::{Runtime, RuntimeContext, RuntimeSettings};
