pub mod clock;
pub mod config;
pub mod cover;
pub mod dispatch;
pub mod logging;
pub mod matrix;
pub mod mqtt;
pub mod output;
pub mod volume;
