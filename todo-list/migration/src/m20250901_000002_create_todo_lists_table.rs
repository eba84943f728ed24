use sea_orm_migration::prelude::*;
use sea_orm_migration::schema::*;

use crate::m20250901_000001_create_users_table::Users;

const FK_TODO_LISTS_TO_USERS: &str = "fk-todo_lists-user_id";
const IDX_TODO_LISTS_USER_ID: &str = "idx-todo_lists-user_id";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TodoLists::Table)
                    .if_not_exists()
                    .col(pk_auto(TodoLists::Id))
                    .col(string_len(TodoLists::Title, 100))
                    .col(integer(TodoLists::UserId))
                    .foreign_key(
                        ForeignKey::create()
                            .name(FK_TODO_LISTS_TO_USERS)
                            .from(TodoLists::Table, TodoLists::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name(IDX_TODO_LISTS_USER_ID)
                    .table(TodoLists::Table)
                    .col(TodoLists::UserId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name(IDX_TODO_LISTS_USER_ID)
                    .table(TodoLists::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(TodoLists::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum TodoLists {
    Table,
    Id,
    Title,
    UserId,
}
