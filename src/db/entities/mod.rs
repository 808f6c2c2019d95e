//! SeaORM entities mapping the study-group tables.
//!
//! Each table has its own module; the prelude re-exports the entity,
//! model and column types under table-specific names.

pub mod message;
pub mod note;
pub mod study_group;
pub mod task;
pub mod task_completion;
pub mod user;
pub mod user_subject;

pub mod prelude {
    pub use super::user::Entity as User;
    pub use super::user::Model as UserModel;
    pub use super::user::ActiveModel as UserActiveModel;
    pub use super::user::Column as UserColumn;

    pub use super::user_subject::Entity as UserSubject;
    pub use super::user_subject::Model as UserSubjectModel;
    pub use super::user_subject::ActiveModel as UserSubjectActiveModel;
    pub use super::user_subject::Column as UserSubjectColumn;

    pub use super::study_group::Entity as StudyGroup;
    pub use super::study_group::Model as StudyGroupModel;
    pub use super::study_group::ActiveModel as StudyGroupActiveModel;
    pub use super::study_group::Column as StudyGroupColumn;

    pub use super::message::Entity as Message;
    pub use super::message::Model as MessageModel;
    pub use super::message::ActiveModel as MessageActiveModel;
    pub use super::message::Column as MessageColumn;

    pub use super::task::Entity as Task;
    pub use super::task::Model as TaskModel;
    pub use super::task::ActiveModel as TaskActiveModel;
    pub use super::task::Column as TaskColumn;

    pub use super::task_completion::Entity as TaskCompletion;
    pub use super::task_completion::Model as TaskCompletionModel;
    pub use super::task_completion::ActiveModel as TaskCompletionActiveModel;
    pub use super::task_completion::Column as TaskCompletionColumn;

    pub use super::note::Entity as Note;
    pub use super::note::Model as NoteModel;
    pub use super::note::ActiveModel as NoteActiveModel;
    pub use super::note::Column as NoteColumn;
}
