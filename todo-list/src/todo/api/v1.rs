use crate::auth::CurrentUser;
use crate::entities::sea_orm_active_enums::TaskStatus;
use crate::entities::todo_list;
use crate::todo::{
    NewTask, ParentChange, TaskNode, TodoError, TodoService, TreeRules, parse_status,
};
use crate::web::api::ErrorResponse;
use axum::{
    Extension, Json, Router,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

/// Shared state of the todo endpoints.
pub struct TodoState {
    pub db: Arc<sea_orm::DatabaseConnection>,
    pub rules: TreeRules,
}

impl TodoState {
    fn service(&self) -> TodoService<'_> {
        TodoService::new(&self.db, self.rules)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateListRequest {
    pub title: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListCreatedResponse {
    pub message: String,
    pub list_id: i32,
}

/// JSON representation of a list owned by the caller.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TodoListJson {
    pub id: i32,
    pub title: String,
}

impl From<todo_list::Model> for TodoListJson {
    fn from(model: todo_list::Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    /// `Todo`, `In Progress` or `Done`. Defaults to `Todo`.
    pub status: Option<String>,
    pub list_id: Option<i32>,
    /// Parent task. Absent, null or 0 creates a top-level task.
    pub parent_id: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskCreatedResponse {
    pub message: String,
    pub task_id: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusUpdatedResponse {
    pub message: String,
    pub task_id: i32,
    pub new_status: TaskStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MoveTaskRequest {
    pub list_id: Option<i32>,
    /// New parent task. 0 promotes the task to the top level, absent keeps the parent.
    pub parent_id: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskMovedResponse {
    pub message: String,
    pub task_id: i32,
    pub new_list_id: i32,
    pub new_parent_id: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl IntoResponse for TodoError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            TodoError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            TodoError::InvalidStatus(_) => (StatusCode::BAD_REQUEST, "INVALID_STATUS"),
            TodoError::DepthExceeded => (StatusCode::BAD_REQUEST, "DEPTH_EXCEEDED"),
            TodoError::CycleDetected => (StatusCode::BAD_REQUEST, "CYCLE_DETECTED"),
            TodoError::CrossListParent => (StatusCode::BAD_REQUEST, "CROSS_LIST_PARENT"),
            TodoError::InvalidParent(_) => (StatusCode::BAD_REQUEST, "INVALID_PARENT"),
            TodoError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            TodoError::NotFound(_, _) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            TodoError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            TodoError::CorruptHierarchy(_) | TodoError::Database(_) => {
                tracing::error!("Todo operation failed: {}", self);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::internal()),
                )
                    .into_response();
            }
        };
        (status, Json(ErrorResponse::new(code, self.to_string()))).into_response()
    }
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, TodoError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| TodoError::Validation(rejection.body_text()))
}

fn path_id(path: Result<Path<i32>, PathRejection>) -> Result<i32, TodoError> {
    path.map(|Path(id)| id)
        .map_err(|rejection| TodoError::Validation(rejection.body_text()))
}

/// Handler for POST /api/todos/list - Creates a list for the caller.
#[tracing::instrument(skip(state, payload))]
#[utoipa::path(
    post,
    path = "/api/todos/list",
    request_body = CreateListRequest,
    responses(
        (status = 201, description = "List created", body = ListCreatedResponse),
        (status = 400, description = "Missing title", body = ErrorResponse),
        (status = 409, description = "Duplicate list title", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Lists"
)]
pub async fn create_list_handler(
    State(state): State<Arc<TodoState>>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<CreateListRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ListCreatedResponse>), TodoError> {
    let request = json_body(payload)?;
    let title = request.title.unwrap_or_default();
    let list = state.service().create_list(user.id, &title).await?;

    Ok((
        StatusCode::CREATED,
        Json(ListCreatedResponse {
            message: "Todo list created".to_string(),
            list_id: list.id,
        }),
    ))
}

/// Handler for GET /api/todos/lists - Returns the caller's lists.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/todos/lists",
    responses(
        (status = 200, description = "Lists of the caller", body = [TodoListJson])
    ),
    security(("bearer" = [])),
    tag = "Lists"
)]
pub async fn get_lists_handler(
    State(state): State<Arc<TodoState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<TodoListJson>>, TodoError> {
    let lists = state.service().lists_for_user(user.id).await?;
    Ok(Json(lists.into_iter().map(TodoListJson::from).collect()))
}

/// Handler for POST /api/todos/task - Creates a task or subtask.
#[tracing::instrument(skip(state, payload))]
#[utoipa::path(
    post,
    path = "/api/todos/task",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = TaskCreatedResponse),
        (status = 400, description = "Invalid fields, parent or depth", body = ErrorResponse),
        (status = 403, description = "List owned by another user", body = ErrorResponse),
        (status = 404, description = "List or parent not found", body = ErrorResponse),
        (status = 409, description = "Duplicate sibling title", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Tasks"
)]
pub async fn create_task_handler(
    State(state): State<Arc<TodoState>>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskCreatedResponse>), TodoError> {
    let request = json_body(payload)?;
    let title = request
        .title
        .filter(|title| !title.trim().is_empty())
        .ok_or_else(|| TodoError::Validation("Missing title".to_string()))?;
    let list_id = request
        .list_id
        .ok_or_else(|| TodoError::Validation("Missing list_id".to_string()))?;
    let status = match request.status.as_deref() {
        Some(raw) => parse_status(raw)?,
        None => TaskStatus::default(),
    };

    let new_task = NewTask {
        list_id,
        parent_id: request.parent_id.filter(|parent_id| *parent_id != 0),
        title,
        description: request.description.unwrap_or_default(),
        status,
    };
    let task = state.service().create_task(user.id, new_task).await?;

    Ok((
        StatusCode::CREATED,
        Json(TaskCreatedResponse {
            message: "Task added".to_string(),
            task_id: task.id,
        }),
    ))
}

/// Handler for GET /api/todos/tasks/{list_id} - Returns the task tree of a list.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    get,
    path = "/api/todos/tasks/{list_id}",
    params(("list_id" = i32, Path, description = "List to render")),
    responses(
        (status = 200, description = "Top-level tasks with nested subtasks", body = [TaskNode]),
        (status = 403, description = "List owned by another user", body = ErrorResponse),
        (status = 404, description = "List not found", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Tasks"
)]
pub async fn get_tasks_handler(
    State(state): State<Arc<TodoState>>,
    Extension(user): Extension<CurrentUser>,
    list_id: Result<Path<i32>, PathRejection>,
) -> Result<Json<Vec<TaskNode>>, TodoError> {
    let list_id = path_id(list_id)?;
    let tree = state.service().task_tree(user.id, list_id).await?;
    Ok(Json(tree))
}

/// Handler for PATCH /api/todos/task/{id}/status - Updates the status of a task.
#[tracing::instrument(skip(state, payload))]
#[utoipa::path(
    patch,
    path = "/api/todos/task/{id}/status",
    params(("id" = i32, Path, description = "Task to update")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = StatusUpdatedResponse),
        (status = 400, description = "Invalid status", body = ErrorResponse),
        (status = 403, description = "Task owned by another user", body = ErrorResponse),
        (status = 404, description = "Task not found", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Tasks"
)]
pub async fn update_status_handler(
    State(state): State<Arc<TodoState>>,
    Extension(user): Extension<CurrentUser>,
    task_id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<StatusUpdatedResponse>, TodoError> {
    let task_id = path_id(task_id)?;
    let request = json_body(payload)?;
    let status = parse_status(request.status.as_deref().unwrap_or_default())?;
    let change = state.service().update_status(user.id, task_id, status).await?;

    Ok(Json(StatusUpdatedResponse {
        message: "Status updated".to_string(),
        task_id: change.task_id,
        new_status: change.status,
    }))
}

/// Handler for DELETE /api/todos/task/{id} - Deletes a task and its subtasks.
#[tracing::instrument(skip(state))]
#[utoipa::path(
    delete,
    path = "/api/todos/task/{id}",
    params(("id" = i32, Path, description = "Task to delete")),
    responses(
        (status = 200, description = "Task and subtasks deleted", body = MessageResponse),
        (status = 403, description = "Task owned by another user", body = ErrorResponse),
        (status = 404, description = "Task not found", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Tasks"
)]
pub async fn delete_task_handler(
    State(state): State<Arc<TodoState>>,
    Extension(user): Extension<CurrentUser>,
    task_id: Result<Path<i32>, PathRejection>,
) -> Result<Json<MessageResponse>, TodoError> {
    let task_id = path_id(task_id)?;
    state.service().delete_task(user.id, task_id).await?;
    Ok(Json(MessageResponse {
        message: "Task deleted successfully".to_string(),
    }))
}

/// Handler for PATCH /api/todos/task/{id}/move - Moves a task to another list or parent.
#[tracing::instrument(skip(state, payload))]
#[utoipa::path(
    patch,
    path = "/api/todos/task/{id}/move",
    params(("id" = i32, Path, description = "Task to move")),
    request_body = MoveTaskRequest,
    responses(
        (status = 200, description = "Task moved", body = TaskMovedResponse),
        (status = 400, description = "Missing fields, cycle, depth or cross-list parent", body = ErrorResponse),
        (status = 403, description = "Task or target list owned by another user", body = ErrorResponse),
        (status = 404, description = "Task, list or parent not found", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Tasks"
)]
pub async fn move_task_handler(
    State(state): State<Arc<TodoState>>,
    Extension(user): Extension<CurrentUser>,
    task_id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<MoveTaskRequest>, JsonRejection>,
) -> Result<Json<TaskMovedResponse>, TodoError> {
    let task_id = path_id(task_id)?;
    let request = json_body(payload)?;
    if request.list_id.is_none() && request.parent_id.is_none() {
        return Err(TodoError::Validation(
            "Missing list_id or parent_id".to_string(),
        ));
    }

    let placement = state
        .service()
        .move_task(
            user.id,
            task_id,
            request.list_id,
            ParentChange::from_wire(request.parent_id),
        )
        .await?;

    Ok(Json(TaskMovedResponse {
        message: "Task moved successfully".to_string(),
        task_id: placement.task_id,
        new_list_id: placement.list_id,
        new_parent_id: placement.parent_id,
    }))
}

/// Creates and returns the todo API router, to be nested under `/api/todos`.
pub fn create_api_router(state: Arc<TodoState>) -> Router {
    Router::new()
        .route("/list", post(create_list_handler))
        .route("/lists", get(get_lists_handler))
        .route("/task", post(create_task_handler))
        .route("/tasks/{list_id}", get(get_tasks_handler))
        .route("/task/{id}", axum::routing::delete(delete_task_handler))
        .route("/task/{id}/status", patch(update_status_handler))
        .route("/task/{id}/move", patch(move_task_handler))
        .with_state(state)
}
