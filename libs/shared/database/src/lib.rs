pub mod db_service;

pub use db_service::{DbError, DbServiceClient};
