// Shared utilities

mod cursor;

pub use cursor::*;
