pub mod common;
pub mod install_id;
pub mod list;
pub mod run;
pub mod show;
pub mod status;
pub mod sync;
