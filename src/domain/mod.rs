pub mod history;
pub mod models;
pub mod session;
pub mod settings;
