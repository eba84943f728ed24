use crate::entities::sea_orm_active_enums::TaskStatus;
use crate::entities::*;
use sea_orm::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod api;
pub mod engine;
pub mod guard;
pub mod hierarchy;

use hierarchy::HierarchyError;

/// Deepest allowed task depth. Roots sit at depth 0, so a list holds three levels.
pub const MAX_TASK_DEPTH: usize = 2;

/// Number of task levels a list may hold.
pub const TASK_LEVELS: usize = MAX_TASK_DEPTH + 1;

/// Which siblings must not share a task title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateTitlePolicy {
    /// Titles are never checked.
    Allow,
    /// Only top-level tasks of a list must have distinct titles.
    TopLevel,
    /// Every task must have a title distinct from its siblings.
    #[default]
    Siblings,
}

/// Deployment rules applied by the tree integrity engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeRules {
    pub duplicate_task_titles: DuplicateTitlePolicy,
    pub unique_list_titles: bool,
}

impl Default for TreeRules {
    fn default() -> Self {
        Self {
            duplicate_task_titles: DuplicateTitlePolicy::default(),
            unique_list_titles: true,
        }
    }
}

/// Kind of row a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    List,
    Task,
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resource::List => f.write_str("List"),
            Resource::Task => f.write_str("Task"),
        }
    }
}

/// Error type for list and task operations.
#[derive(Debug, thiserror::Error)]
pub enum TodoError {
    /// A required field is missing or malformed.
    #[error("{0}")]
    Validation(String),
    /// The status is not one of the known labels.
    #[error("Invalid status '{0}'")]
    InvalidStatus(String),
    /// The target is owned by another user.
    #[error("Not authorized")]
    Forbidden,
    #[error("{0} {1} not found")]
    NotFound(Resource, i32),
    /// A sibling or list with the same title exists.
    #[error("{0}")]
    Conflict(String),
    #[error("Max depth ({}) reached", TASK_LEVELS)]
    DepthExceeded,
    #[error("Cannot move a task to be a child of itself or its descendants")]
    CycleDetected,
    #[error("Parent task must be in the same list")]
    CrossListParent,
    #[error("Parent task {0} belongs to a different list")]
    InvalidParent(i32),
    /// The stored rows no longer form a forest.
    #[error("Task hierarchy is corrupt: {0}")]
    CorruptHierarchy(#[from] HierarchyError),
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Parses a status label as sent by clients.
pub fn parse_status(raw: &str) -> Result<TaskStatus, TodoError> {
    TaskStatus::iter()
        .find(|status| status.to_value() == raw)
        .ok_or_else(|| TodoError::InvalidStatus(raw.to_string()))
}

/// A task and its subtasks, as rendered for a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TaskNode {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub list_id: i32,
    #[schema(value_type = Vec<Object>)]
    pub subtasks: Vec<TaskNode>,
}

impl TaskNode {
    pub(crate) fn from_row(row: &task::Model, subtasks: Vec<TaskNode>) -> Self {
        Self {
            id: row.id,
            title: row.title.clone(),
            description: row.description.clone(),
            status: row.status,
            list_id: row.list_id,
            subtasks,
        }
    }
}

/// Fields of a task about to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub list_id: i32,
    pub parent_id: Option<i32>,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
}

/// How a move changes the parent of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentChange {
    /// Leave the parent alone. A task moved to another list is detached instead.
    Keep,
    /// Promote the task to the top level.
    Detach,
    /// Re-parent the task under the given task.
    Attach(i32),
}

impl ParentChange {
    /// Decodes the wire value, where `0` promotes to the top level.
    pub fn from_wire(parent_id: Option<i32>) -> Self {
        match parent_id {
            None => ParentChange::Keep,
            Some(0) => ParentChange::Detach,
            Some(id) => ParentChange::Attach(id),
        }
    }
}

/// Where a task ended up after a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskPlacement {
    pub task_id: i32,
    pub list_id: i32,
    pub parent_id: Option<i32>,
}

/// Outcome of a status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub task_id: i32,
    pub status: TaskStatus,
    /// The parent that was completed because all of its children are done.
    pub completed_parent: Option<i32>,
}

/// Runs list and task operations on behalf of a user.
///
/// Every mutation opens one transaction, checks ownership inside it and hands the
/// transaction to the tree integrity engine before committing.
pub struct TodoService<'a> {
    db: &'a DatabaseConnection,
    rules: TreeRules,
}

impl<'a> TodoService<'a> {
    pub fn new(db: &'a DatabaseConnection, rules: TreeRules) -> Self {
        TodoService { db, rules }
    }

    /// Creates a list owned by `user_id`.
    ///
    /// # Returns
    ///
    /// The created list, `Validation` for a blank title or `Conflict` when the user
    /// already has a list with that title and list titles are unique.
    #[tracing::instrument(skip(self))]
    pub async fn create_list(
        &self,
        user_id: i32,
        title: &str,
    ) -> Result<todo_list::Model, TodoError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(TodoError::Validation("Missing title".to_string()));
        }

        let txn = self.db.begin().await?;
        if self.rules.unique_list_titles {
            let existing = todo_list::Entity::find()
                .filter(todo_list::Column::UserId.eq(user_id))
                .filter(todo_list::Column::Title.eq(title))
                .one(&txn)
                .await?;
            if existing.is_some() {
                return Err(TodoError::Conflict(
                    "A list with this name already exists".to_string(),
                ));
            }
        }

        let created = todo_list::ActiveModel {
            title: ActiveValue::Set(title.to_string()),
            user_id: ActiveValue::Set(user_id),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
        txn.commit().await?;

        tracing::info!(list_id = created.id, "Created todo list");
        Ok(created)
    }

    /// Retrieves the lists owned by `user_id`, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn lists_for_user(&self, user_id: i32) -> Result<Vec<todo_list::Model>, TodoError> {
        let lists = todo_list::Entity::find()
            .filter(todo_list::Column::UserId.eq(user_id))
            .order_by_asc(todo_list::Column::Id)
            .all(self.db)
            .await?;
        Ok(lists)
    }

    /// Creates a task in a list owned by `user_id`, optionally under a parent task.
    #[tracing::instrument(skip(self))]
    pub async fn create_task(
        &self,
        user_id: i32,
        mut new_task: NewTask,
    ) -> Result<task::Model, TodoError> {
        new_task.title = new_task.title.trim().to_string();
        if new_task.title.is_empty() {
            return Err(TodoError::Validation("Missing title".to_string()));
        }

        let txn = self.db.begin().await?;
        guard::owned_list(&txn, user_id, new_task.list_id).await?;
        let created = engine::create_task(&txn, &self.rules, new_task).await?;
        txn.commit().await?;

        tracing::info!(task_id = created.id, "Created task");
        Ok(created)
    }

    /// Renders the task tree of a list owned by `user_id`.
    #[tracing::instrument(skip(self))]
    pub async fn task_tree(&self, user_id: i32, list_id: i32) -> Result<Vec<TaskNode>, TodoError> {
        guard::owned_list(self.db, user_id, list_id).await?;
        let forest = engine::load_forest(self.db, &[list_id]).await?;
        Ok(forest.tree(list_id)?)
    }

    /// Sets the status of a task and completes its parent when all siblings are done.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        user_id: i32,
        task_id: i32,
        status: TaskStatus,
    ) -> Result<StatusChange, TodoError> {
        let txn = self.db.begin().await?;
        guard::owned_task(&txn, user_id, task_id).await?;
        let change = engine::update_status(&txn, task_id, status).await?;
        txn.commit().await?;
        Ok(change)
    }

    /// Deletes a task together with all of its descendants.
    ///
    /// # Returns
    ///
    /// The ids of every deleted task, children before their parents.
    #[tracing::instrument(skip(self))]
    pub async fn delete_task(&self, user_id: i32, task_id: i32) -> Result<Vec<i32>, TodoError> {
        let txn = self.db.begin().await?;
        guard::owned_task(&txn, user_id, task_id).await?;
        let deleted = engine::delete_task(&txn, task_id).await?;
        txn.commit().await?;

        tracing::info!(task_id, deleted = deleted.len(), "Deleted task subtree");
        Ok(deleted)
    }

    /// Moves a task to another list and/or parent. Both the current and the target
    /// list must be owned by `user_id`.
    #[tracing::instrument(skip(self))]
    pub async fn move_task(
        &self,
        user_id: i32,
        task_id: i32,
        list_id: Option<i32>,
        parent: ParentChange,
    ) -> Result<TaskPlacement, TodoError> {
        let txn = self.db.begin().await?;
        let (task, _) = guard::owned_task(&txn, user_id, task_id).await?;
        if let Some(list_id) = list_id.filter(|list_id| *list_id != task.list_id) {
            guard::owned_list(&txn, user_id, list_id).await?;
        }
        let placement = engine::move_task(&txn, task_id, list_id, parent).await?;
        txn.commit().await?;

        tracing::info!(
            task_id,
            list_id = placement.list_id,
            parent_id = ?placement.parent_id,
            "Moved task"
        );
        Ok(placement)
    }
}
