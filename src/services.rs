pub mod auth;
pub mod curve_service;
pub mod project_service;
pub mod task_service;
