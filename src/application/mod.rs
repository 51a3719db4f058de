pub mod bridge;
pub mod catalog;
pub mod invoker;
pub mod stdio;
pub mod tooling;
