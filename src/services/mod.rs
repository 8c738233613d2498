pub mod check_service;
pub mod step_service;
