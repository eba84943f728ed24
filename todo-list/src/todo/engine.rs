//! Tree integrity engine.
//!
//! Every function takes the connection of the caller's unit of work, normally an
//! open transaction, and validates against a snapshot read through it. Ownership
//! must already be confirmed by [`crate::todo::guard`].

use crate::entities::sea_orm_active_enums::TaskStatus;
use crate::entities::*;
use crate::todo::hierarchy::TaskForest;
use crate::todo::{
    DuplicateTitlePolicy, MAX_TASK_DEPTH, NewTask, ParentChange, Resource, StatusChange,
    TaskPlacement, TodoError, TreeRules,
};
use sea_orm::sea_query::Expr;
use sea_orm::*;

fn forest_query(list_ids: &[i32]) -> Select<task::Entity> {
    task::Entity::find()
        .filter(task::Column::ListId.is_in(list_ids.iter().copied()))
        .order_by_asc(task::Column::Id)
}

/// Loads every task of the given lists into an arena.
pub async fn load_forest<C: ConnectionTrait>(
    conn: &C,
    list_ids: &[i32],
) -> Result<TaskForest, DbErr> {
    let rows = forest_query(list_ids).all(conn).await?;
    Ok(TaskForest::from_tasks(rows))
}

/// Row-locking variant of [`load_forest`] for the structural mutations.
///
/// On PostgreSQL the rows are read `FOR UPDATE`, so two transactions reshaping the
/// same list run one after the other and the second one validates against the
/// committed result of the first. SQLite serializes writers on its own.
fn locked_forest_query(backend: DbBackend, list_ids: &[i32]) -> Select<task::Entity> {
    let query = forest_query(list_ids);
    match backend {
        DbBackend::Postgres => query.lock_exclusive(),
        _ => query,
    }
}

async fn lock_forest<C: ConnectionTrait>(
    conn: &C,
    list_ids: &[i32],
) -> Result<TaskForest, DbErr> {
    let rows = locked_forest_query(conn.get_database_backend(), list_ids)
        .all(conn)
        .await?;
    Ok(TaskForest::from_tasks(rows))
}

async fn find_task<C: ConnectionTrait>(conn: &C, task_id: i32) -> Result<task::Model, TodoError> {
    task::Entity::find_by_id(task_id)
        .one(conn)
        .await?
        .ok_or(TodoError::NotFound(Resource::Task, task_id))
}

/// Creates a task, enforcing the parent list, the depth limit and the title policy.
#[tracing::instrument(skip(conn))]
pub async fn create_task<C: ConnectionTrait>(
    conn: &C,
    rules: &TreeRules,
    new_task: NewTask,
) -> Result<task::Model, TodoError> {
    if let Some(parent_id) = new_task.parent_id {
        let parent = find_task(conn, parent_id).await?;
        if parent.list_id != new_task.list_id {
            return Err(TodoError::InvalidParent(parent_id));
        }

        let forest = lock_forest(conn, &[new_task.list_id]).await?;
        if forest.depth(parent_id)? >= MAX_TASK_DEPTH {
            return Err(TodoError::DepthExceeded);
        }
    }

    ensure_unique_title(
        conn,
        rules.duplicate_task_titles,
        new_task.list_id,
        new_task.parent_id,
        &new_task.title,
    )
    .await?;

    let created = task::ActiveModel {
        title: ActiveValue::Set(new_task.title),
        description: ActiveValue::Set(new_task.description),
        status: ActiveValue::Set(new_task.status),
        list_id: ActiveValue::Set(new_task.list_id),
        parent_id: ActiveValue::Set(new_task.parent_id),
        ..Default::default()
    }
    .insert(conn)
    .await?;
    Ok(created)
}

async fn ensure_unique_title<C: ConnectionTrait>(
    conn: &C,
    policy: DuplicateTitlePolicy,
    list_id: i32,
    parent_id: Option<i32>,
    title: &str,
) -> Result<(), TodoError> {
    let siblings = match (policy, parent_id) {
        (DuplicateTitlePolicy::Allow, _) | (DuplicateTitlePolicy::TopLevel, Some(_)) => {
            return Ok(());
        }
        (DuplicateTitlePolicy::Siblings, Some(parent_id)) => {
            Condition::all().add(task::Column::ParentId.eq(parent_id))
        }
        (_, None) => Condition::all()
            .add(task::Column::ListId.eq(list_id))
            .add(task::Column::ParentId.is_null()),
    };

    let existing = task::Entity::find()
        .filter(siblings)
        .filter(task::Column::Title.eq(title))
        .one(conn)
        .await?;

    match (existing, parent_id) {
        (None, _) => Ok(()),
        (Some(_), Some(_)) => Err(TodoError::Conflict(
            "A subtask with this name already exists".to_string(),
        )),
        (Some(_), None) => Err(TodoError::Conflict(
            "A task with this name already exists in this list".to_string(),
        )),
    }
}

/// Moves a task to another list and/or parent, carrying its subtree along.
///
/// The cycle check walks up from the candidate parent using the tree as it is
/// before the move. Depth is checked for the whole moved subtree.
#[tracing::instrument(skip(conn))]
pub async fn move_task<C: ConnectionTrait>(
    conn: &C,
    task_id: i32,
    target_list_id: Option<i32>,
    parent: ParentChange,
) -> Result<TaskPlacement, TodoError> {
    let current_list = find_task(conn, task_id).await?.list_id;
    let list_id = target_list_id.unwrap_or(current_list);
    let list_changed = list_id != current_list;

    if list_changed {
        todo_list::Entity::find_by_id(list_id)
            .one(conn)
            .await?
            .ok_or(TodoError::NotFound(Resource::List, list_id))?;
    }

    let mut lists = vec![current_list];
    if list_changed {
        lists.push(list_id);
    }
    let forest = lock_forest(conn, &lists).await?;
    // Re-read from the locked rows; another move may have committed in between.
    let task = forest
        .get(task_id)
        .cloned()
        .ok_or(TodoError::NotFound(Resource::Task, task_id))?;

    let parent_id = match parent {
        ParentChange::Keep if list_changed => None,
        ParentChange::Keep => task.parent_id,
        ParentChange::Detach => None,
        ParentChange::Attach(parent_id) => {
            let candidate_list = match forest.get(parent_id) {
                Some(candidate) => candidate.list_id,
                None => find_task(conn, parent_id).await?.list_id,
            };
            if candidate_list != list_id {
                return Err(TodoError::CrossListParent);
            }
            if forest.is_self_or_descendant(parent_id, task.id)? {
                return Err(TodoError::CycleDetected);
            }
            let deepest = forest.depth(parent_id)? + 1 + forest.height(task.id)?;
            if deepest > MAX_TASK_DEPTH {
                return Err(TodoError::DepthExceeded);
            }
            Some(parent_id)
        }
    };

    let mut active: task::ActiveModel = task.clone().into();
    active.list_id = ActiveValue::Set(list_id);
    active.parent_id = ActiveValue::Set(parent_id);
    let updated = active.update(conn).await?;

    if list_changed {
        let descendants: Vec<i32> = forest
            .subtree(task.id)?
            .into_iter()
            .filter(|id| *id != task.id)
            .collect();
        if !descendants.is_empty() {
            task::Entity::update_many()
                .col_expr(task::Column::ListId, Expr::value(list_id))
                .filter(task::Column::Id.is_in(descendants))
                .exec(conn)
                .await?;
        }
    }

    Ok(TaskPlacement {
        task_id: updated.id,
        list_id: updated.list_id,
        parent_id: updated.parent_id,
    })
}

/// Deletes a task and all of its descendants, deepest first.
#[tracing::instrument(skip(conn))]
pub async fn delete_task<C: ConnectionTrait>(
    conn: &C,
    task_id: i32,
) -> Result<Vec<i32>, TodoError> {
    let task = find_task(conn, task_id).await?;
    let forest = lock_forest(conn, &[task.list_id]).await?;
    let order = forest.deletion_order(task.id)?;

    for id in &order {
        task::Entity::delete_by_id(*id).exec(conn).await?;
    }
    Ok(order)
}

/// Stores a new status. When a task becomes done and all of its siblings are done,
/// its parent is completed too. The rollup stops at the parent.
#[tracing::instrument(skip(conn))]
pub async fn update_status<C: ConnectionTrait>(
    conn: &C,
    task_id: i32,
    status: TaskStatus,
) -> Result<StatusChange, TodoError> {
    let list_id = find_task(conn, task_id).await?.list_id;
    let forest = lock_forest(conn, &[list_id]).await?;
    let task = forest
        .get(task_id)
        .cloned()
        .ok_or(TodoError::NotFound(Resource::Task, task_id))?;
    let parent_id = task.parent_id;

    let mut active: task::ActiveModel = task.into();
    active.status = ActiveValue::Set(status);
    active.update(conn).await?;

    let mut completed_parent = None;
    if let (TaskStatus::Done, Some(parent_id)) = (status, parent_id) {
        // The rows stay locked, so a plain reload sees the new status.
        let forest = load_forest(conn, &[list_id]).await?;
        let parent = forest
            .get(parent_id)
            .cloned()
            .ok_or(TodoError::NotFound(Resource::Task, parent_id))?;

        if forest.all_children_done(parent_id) && parent.status != TaskStatus::Done {
            let mut active: task::ActiveModel = parent.into();
            active.status = ActiveValue::Set(TaskStatus::Done);
            active.update(conn).await?;
            tracing::info!(parent_id, "Completed parent task after its last subtask");
            completed_parent = Some(parent_id);
        }
    }

    Ok(StatusChange {
        task_id,
        status,
        completed_parent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locks_task_rows_on_postgres() {
        let sql = locked_forest_query(DbBackend::Postgres, &[1, 2])
            .build(DbBackend::Postgres)
            .to_string();

        assert!(sql.contains(r#"WHERE "tasks"."list_id" IN (1, 2)"#), "{sql}");
        assert!(sql.ends_with("FOR UPDATE"), "{sql}");
    }

    #[test]
    fn reads_without_row_locks_on_sqlite() {
        let sql = locked_forest_query(DbBackend::Sqlite, &[1])
            .build(DbBackend::Sqlite)
            .to_string();

        assert!(!sql.contains("FOR UPDATE"), "{sql}");
    }
}
