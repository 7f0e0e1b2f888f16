pub mod config;
pub mod errors;
pub mod forge_status;
pub mod monitor;
pub mod node;
pub mod process;
pub mod reporter;
pub mod restart;
pub mod round;
pub mod scheduler;
pub mod server;
pub mod slots;
pub mod telemetry;
