pub mod bootstrap;
pub mod category_repository;
pub mod commands;
pub mod controller;
pub mod error;
pub mod form;
pub mod task_repository;

use chrono::{DateTime, Utc};
use std::sync::Arc;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;
