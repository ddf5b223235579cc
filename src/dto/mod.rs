pub mod admin_dto;
pub mod auth_dto;
pub mod compiler_dto;
pub mod student_dto;
