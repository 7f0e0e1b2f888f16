//! CLI command implementations.
//!
//! | Module    | Commands handled                 |
//! |-----------|----------------------------------|
//! | `run`     | `Run`                            |
//! | `control` | `Restart`, `Cancel`, `Status`    |
//! | `config`  | `Config`                         |

pub mod config;
pub mod control;
pub mod run;

pub use config::cmd_config;
pub use control::{cmd_cancel, cmd_restart, cmd_status};
pub use run::cmd_run;
