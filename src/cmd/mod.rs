//! CLI command implementations.
//!
//! Each submodule owns one `Commands` variant:
//! - `run` — the full provisioning sequence
//! - `status` — probe evaluation and live health without mutating anything
//! - `stop` — graceful teardown of the server and chat UI container
//! - `config` — configuration view and scaffolding

mod config;
mod run;
mod status;
mod stop;

pub use config::{cmd_config_init, cmd_config_show};
pub use run::cmd_run;
pub use status::cmd_status;
pub use stop::cmd_stop;
