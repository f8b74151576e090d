//! CLI command implementations.
//!
//! | Module      | Commands handled |
//! |-------------|------------------|
//! | `run`       | `Run`            |
//! | `status`    | `Status`         |
//! | `preflight` | `Preflight`      |
//! | `config`    | `Config`         |

pub mod config;
pub mod preflight;
pub mod run;
pub mod status;

pub use config::cmd_config;
pub use preflight::cmd_preflight;
pub use run::cmd_run;
pub use status::cmd_status;
