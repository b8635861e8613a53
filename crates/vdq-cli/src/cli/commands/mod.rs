//! CLI command handlers. Each command is in its own file for clarity.

mod add;
mod pause;
mod remove;
mod resume;
mod run;
mod status;
mod stop;

pub use add::{run_add, AddRequest};
pub use pause::run_pause;
pub use remove::run_remove;
pub use resume::run_resume;
pub use run::run_scheduler;
pub use status::run_status;
pub use stop::run_stop;
