//! Ownership checks. A task is owned through its list, and a list through its user.

use crate::entities::*;
use crate::todo::{Resource, TodoError};
use sea_orm::*;

/// Resolves a list and confirms `user_id` owns it.
#[tracing::instrument(skip(conn))]
pub async fn owned_list<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    list_id: i32,
) -> Result<todo_list::Model, TodoError> {
    let list = todo_list::Entity::find_by_id(list_id)
        .one(conn)
        .await?
        .ok_or(TodoError::NotFound(Resource::List, list_id))?;

    if list.user_id != user_id {
        tracing::warn!(list_owner = list.user_id, "Rejected access to list of another user");
        return Err(TodoError::Forbidden);
    }
    Ok(list)
}

/// Resolves a task and its list, and confirms `user_id` owns the list.
#[tracing::instrument(skip(conn))]
pub async fn owned_task<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    task_id: i32,
) -> Result<(task::Model, todo_list::Model), TodoError> {
    let task = task::Entity::find_by_id(task_id)
        .one(conn)
        .await?
        .ok_or(TodoError::NotFound(Resource::Task, task_id))?;
    let list = owned_list(conn, user_id, task.list_id).await?;
    Ok((task, list))
}
