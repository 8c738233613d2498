pub mod check_dto;
pub mod step_dto;
