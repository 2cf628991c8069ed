pub mod add;
pub mod auth_cmd;
pub mod common;
pub mod completions;
pub mod delete;
pub mod edit;
pub mod export;
pub mod folder;
pub mod import;
pub mod list;
pub mod show;
pub mod status;
pub mod sync;
