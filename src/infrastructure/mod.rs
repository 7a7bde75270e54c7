pub mod bluetooth;
pub mod bus;
pub mod logging;
