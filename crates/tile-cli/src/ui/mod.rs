pub mod reporter;
pub mod summary;
pub mod theme;

pub use reporter::ConsoleReporter;
pub use theme::{Theme, format_size};
