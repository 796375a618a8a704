pub mod invocations;
pub mod objects;
