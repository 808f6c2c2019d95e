pub mod group_routes;
pub mod match_routes;
pub mod message_routes;
pub mod note_routes;
pub mod task_routes;
pub mod user_routes;
