pub mod auth_service;
pub mod chat_service;
pub mod group_service;
pub mod note_service;
pub mod profile_service;
pub mod task_service;
