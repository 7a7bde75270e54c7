pub mod app;
pub mod components;
pub mod panels;
pub mod theme;
