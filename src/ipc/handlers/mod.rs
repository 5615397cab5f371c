pub mod classes;
pub mod core;
pub mod import;
pub mod setup;
pub mod users;
