use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, EntityName, EntityTrait, Schema};
use tracing::debug;

use crate::db::entities::{message, note, study_group, task, task_completion, user, user_subject};

/// Creates every table that does not exist yet, parents before children so
/// foreign keys resolve.
pub async fn create_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    create_table(db, study_group::Entity).await?;
    create_table(db, user::Entity).await?;
    create_table(db, user_subject::Entity).await?;
    create_table(db, message::Entity).await?;
    create_table(db, task::Entity).await?;
    create_table(db, task_completion::Entity).await?;
    create_table(db, note::Entity).await?;
    Ok(())
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(backend.build(&statement)).await?;
    debug!(table = entity.table_name(), "Ensured table exists.");
    Ok(())
}
