//! Terminal presentation

mod console;

pub use console::ConsoleReporter;
