pub mod command;
pub mod controller;

pub use command::{CommandOutput, CommandRunner, SystemCommandRunner};
pub use controller::{is_reload_success_output, CheckReport, NamedController, ReloadOutcome};
