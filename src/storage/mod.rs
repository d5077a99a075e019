pub mod db;
mod config_files;
mod managed_files;
pub mod models;
mod tables;

pub use db::{Database, DatabaseError};
pub use tables::*;
