mod admin;
mod config_files;
mod content;
mod sync;

pub use admin::{admin_purge, clear_cache, health};
pub use config_files::{
    attach_parent, create_config_file, delete_config_file, detach_config_file, get_config_file,
    list_config_files,
};
pub use content::serve_content;
pub use sync::{export_config, import_config};
