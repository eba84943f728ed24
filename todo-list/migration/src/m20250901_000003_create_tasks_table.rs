use sea_orm_migration::prelude::*;
use sea_orm_migration::schema::*;

use crate::m20250901_000002_create_todo_lists_table::TodoLists;

const FK_TASKS_TO_TODO_LISTS: &str = "fk-tasks-list_id";
const FK_TASKS_TO_PARENT: &str = "fk-tasks-parent_id";
const IDX_TASKS_LIST_ID: &str = "idx-tasks-list_id";
const IDX_TASKS_PARENT_ID: &str = "idx-tasks-parent_id";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tasks::Table)
                    .if_not_exists()
                    .col(pk_auto(Tasks::Id))
                    .col(string_len(Tasks::Title, 100))
                    .col(string_len(Tasks::Description, 200).default(""))
                    .col(string_len(Tasks::Status, 16).default("Todo"))
                    .col(integer(Tasks::ListId))
                    .col(integer_null(Tasks::ParentId))
                    .foreign_key(
                        ForeignKey::create()
                            .name(FK_TASKS_TO_TODO_LISTS)
                            .from(Tasks::Table, Tasks::ListId)
                            .to(TodoLists::Table, TodoLists::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    // Subtrees are removed explicitly, children first.
                    .foreign_key(
                        ForeignKey::create()
                            .name(FK_TASKS_TO_PARENT)
                            .from(Tasks::Table, Tasks::ParentId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::NoAction)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name(IDX_TASKS_LIST_ID)
                    .table(Tasks::Table)
                    .col(Tasks::ListId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name(IDX_TASKS_PARENT_ID)
                    .table(Tasks::Table)
                    .col(Tasks::ParentId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name(IDX_TASKS_PARENT_ID)
                    .table(Tasks::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name(IDX_TASKS_LIST_ID)
                    .table(Tasks::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Tasks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Tasks {
    Table,
    Id,
    Title,
    Description,
    Status,
    ListId,
    ParentId,
}
