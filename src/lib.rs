// Main library entry point for RunVis.

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod ports;
