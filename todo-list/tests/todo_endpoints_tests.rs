use axum::Router;
use axum::http::StatusCode;
use insta::assert_snapshot;
use serde_json::{Value, json};
use todo_list_server::web::create_app;

mod common;

use common::{bearer_for, create_user, send, setup_db, test_config};

struct TestApp {
    app: Router,
    owner: String,
    stranger: String,
}

async fn setup() -> TestApp {
    let db = setup_db().await.expect("Failed to setup database");
    let owner = create_user(&db, "alice").await.unwrap();
    let stranger = create_user(&db, "mallory").await.unwrap();
    TestApp {
        owner: bearer_for(&owner).await,
        stranger: bearer_for(&stranger).await,
        app: create_app(&test_config(), db),
    }
}

impl TestApp {
    async fn create_list(&self, title: &str) -> i64 {
        let (status, body) = send(
            &self.app,
            "POST",
            "/api/todos/list",
            Some(self.owner.as_str()),
            Some(json!({ "title": title })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["list_id"].as_i64().unwrap()
    }

    async fn create_task(&self, list_id: i64, parent_id: Option<i64>, title: &str) -> (StatusCode, Value) {
        send(
            &self.app,
            "POST",
            "/api/todos/task",
            Some(self.owner.as_str()),
            Some(json!({ "title": title, "list_id": list_id, "parent_id": parent_id })),
        )
        .await
    }

    async fn add_task(&self, list_id: i64, parent_id: Option<i64>, title: &str) -> i64 {
        let (status, body) = self.create_task(list_id, parent_id, title).await;
        assert_eq!(status, StatusCode::CREATED, "unexpected body: {body}");
        body["task_id"].as_i64().unwrap()
    }

    async fn tree(&self, list_id: i64) -> Value {
        let (status, body) = send(
            &self.app,
            "GET",
            &format!("/api/todos/tasks/{list_id}"),
            Some(self.owner.as_str()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    async fn patch(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        send(&self.app, "PATCH", uri, Some(self.owner.as_str()), Some(body)).await
    }
}

#[tokio::test]
async fn requires_a_bearer_token() {
    let test = setup().await;

    let (status, body) = send(&test.app, "GET", "/api/todos/lists", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = send(
        &test.app,
        "GET",
        "/api/todos/lists",
        Some("Bearer not-a-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn can_create_and_list_lists() {
    let test = setup().await;

    let (status, body) = send(
        &test.app,
        "POST",
        "/api/todos/list",
        Some(test.owner.as_str()),
        Some(json!({ "title": "Groceries" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Todo list created");
    let list_id = body["list_id"].as_i64().unwrap();

    let (status, body) = send(&test.app, "GET", "/api/todos/lists", Some(test.owner.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{ "id": list_id, "title": "Groceries" }]));

    let (status, body) = send(&test.app, "GET", "/api/todos/lists", Some(test.stranger.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn rejects_invalid_list_requests() {
    let test = setup().await;
    test.create_list("Groceries").await;

    let (status, body) = send(
        &test.app,
        "POST",
        "/api/todos/list",
        Some(test.owner.as_str()),
        Some(json!({ "title": "Groceries" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (status, body) = send(
        &test.app,
        "POST",
        "/api/todos/list",
        Some(test.owner.as_str()),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"], "Missing title");
}

#[tokio::test]
async fn renders_nested_task_tree() {
    let test = setup().await;
    let list_id = test.create_list("Groceries").await;
    let milk = test.add_task(list_id, None, "Buy milk").await;
    let two_percent = test.add_task(list_id, Some(milk), "2% milk").await;
    let bread = test.add_task(list_id, Some(0), "Bread").await;

    let tree = test.tree(list_id).await;

    assert_eq!(
        tree,
        json!([
            {
                "id": milk,
                "title": "Buy milk",
                "description": "",
                "status": "Todo",
                "list_id": list_id,
                "subtasks": [{
                    "id": two_percent,
                    "title": "2% milk",
                    "description": "",
                    "status": "Todo",
                    "list_id": list_id,
                    "subtasks": []
                }]
            },
            {
                "id": bread,
                "title": "Bread",
                "description": "",
                "status": "Todo",
                "list_id": list_id,
                "subtasks": []
            }
        ])
    );
}

#[tokio::test]
async fn rejects_a_fourth_level() {
    let test = setup().await;
    let list_id = test.create_list("Groceries").await;
    let milk = test.add_task(list_id, None, "Buy milk").await;
    let two_percent = test.add_task(list_id, Some(milk), "2% milk").await;
    let brand = test.add_task(list_id, Some(two_percent), "brand X").await;

    let (status, body) = test.create_task(list_id, Some(brand), "too deep").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "DEPTH_EXCEEDED");
    assert_snapshot!(body["error"].as_str().unwrap(), @"Max depth (3) reached");
}

#[tokio::test]
async fn rejects_invalid_task_requests() {
    let test = setup().await;
    let list_id = test.create_list("Home").await;
    test.add_task(list_id, None, "Clean").await;

    let (status, body) = send(
        &test.app,
        "POST",
        "/api/todos/task",
        Some(test.owner.as_str()),
        Some(json!({ "title": "Clean", "list_id": list_id, "status": "Finished" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_STATUS");

    let (status, body) = send(
        &test.app,
        "POST",
        "/api/todos/task",
        Some(test.owner.as_str()),
        Some(json!({ "list_id": list_id })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = test.create_task(list_id, None, "Clean").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "A task with this name already exists in this list");

    let (status, body) = test.create_task(999, None, "Nowhere").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn rejects_malformed_json() {
    let test = setup().await;

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/todos/list")
        .header("authorization", &test.owner)
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let response = tower::ServiceExt::oneshot(test.app.clone(), request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn strangers_are_forbidden() {
    let test = setup().await;
    let list_id = test.create_list("Home").await;
    let task_id = test.add_task(list_id, None, "Clean").await;

    let (status, body) = send(
        &test.app,
        "GET",
        &format!("/api/todos/tasks/{list_id}"),
        Some(test.stranger.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let (status, _) = send(
        &test.app,
        "DELETE",
        &format!("/api/todos/task/{task_id}"),
        Some(test.stranger.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &test.app,
        "PATCH",
        &format!("/api/todos/task/{task_id}/status"),
        Some(test.stranger.as_str()),
        Some(json!({ "status": "Done" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let tree = test.tree(list_id).await;
    assert_eq!(tree[0]["status"], "Todo");

    let (status, _) = send(
        &test.app,
        "GET",
        "/api/todos/tasks/999",
        Some(test.owner.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn completing_all_subtasks_completes_the_parent() {
    let test = setup().await;
    let list_id = test.create_list("Home").await;
    let parent = test.add_task(list_id, None, "P").await;
    let first = test.add_task(list_id, Some(parent), "A").await;
    let second = test.add_task(list_id, Some(parent), "B").await;

    let (status, body) = test
        .patch(
            &format!("/api/todos/task/{first}/status"),
            json!({ "status": "In Progress" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["new_status"], "In Progress");

    for task_id in [first, second] {
        let (status, _) = test
            .patch(
                &format!("/api/todos/task/{task_id}/status"),
                json!({ "status": "Done" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let tree = test.tree(list_id).await;
    assert_eq!(tree[0]["status"], "Done");

    let (status, body) = test
        .patch(
            &format!("/api/todos/task/{first}/status"),
            json!({ "status": "done" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_STATUS");
}

#[tokio::test]
async fn can_move_tasks_between_parents_and_lists() {
    let test = setup().await;
    let home = test.create_list("Home").await;
    let work = test.create_list("Work").await;
    let t1 = test.add_task(home, None, "T1").await;
    let t2 = test.add_task(home, Some(t1), "T2").await;
    let t3 = test.add_task(home, Some(t2), "T3").await;

    let (status, body) = test
        .patch(&format!("/api/todos/task/{t1}/move"), json!({ "parent_id": t3 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "CYCLE_DETECTED");
    assert_snapshot!(
        body["error"].as_str().unwrap(),
        @"Cannot move a task to be a child of itself or its descendants"
    );

    let (status, body) = test
        .patch(&format!("/api/todos/task/{t2}/move"), json!({ "parent_id": 0 }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "message": "Task moved successfully",
            "task_id": t2,
            "new_list_id": home,
            "new_parent_id": null
        })
    );

    let (status, body) = test
        .patch(&format!("/api/todos/task/{t2}/move"), json!({ "list_id": work }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["new_list_id"], work);

    let tree = test.tree(work).await;
    assert_eq!(tree[0]["id"], t2);
    assert_eq!(tree[0]["subtasks"][0]["id"], t3);
    assert_eq!(tree[0]["subtasks"][0]["list_id"], work);

    let (status, body) = test
        .patch(&format!("/api/todos/task/{t2}/move"), json!({ "parent_id": t1 }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "CROSS_LIST_PARENT");

    let (status, body) = test
        .patch(&format!("/api/todos/task/{t2}/move"), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn deleting_a_task_removes_its_subtasks() {
    let test = setup().await;
    let list_id = test.create_list("Home").await;
    let t1 = test.add_task(list_id, None, "T1").await;
    let t2 = test.add_task(list_id, Some(t1), "T2").await;
    test.add_task(list_id, Some(t2), "T3").await;
    let keep = test.add_task(list_id, None, "Keep").await;

    let (status, body) = send(
        &test.app,
        "DELETE",
        &format!("/api/todos/task/{t1}"),
        Some(test.owner.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Task deleted successfully");

    let tree = test.tree(list_id).await;
    assert_eq!(tree.as_array().unwrap().len(), 1);
    assert_eq!(tree[0]["id"], keep);

    let (status, _) = send(
        &test.app,
        "DELETE",
        &format!("/api/todos/task/{t2}"),
        Some(test.owner.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rejects_malformed_ids_with_json_errors() {
    let test = setup().await;
    let owner = Some(test.owner.as_str());

    let requests = [
        ("GET", "/api/todos/tasks/abc", None),
        ("DELETE", "/api/todos/task/99999999999", None),
        (
            "PATCH",
            "/api/todos/task/x/status",
            Some(json!({ "status": "Done" })),
        ),
        ("PATCH", "/api/todos/task/x/move", Some(json!({ "parent_id": 0 }))),
    ];

    for (method, uri, body) in requests {
        let (status, body) = send(&test.app, method, uri, owner, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri}");
        assert_eq!(body["code"], "VALIDATION_ERROR", "{method} {uri}");
        assert!(body["error"].is_string(), "{method} {uri}");
    }
}

#[tokio::test]
async fn trims_task_titles_before_checking_duplicates() {
    let test = setup().await;
    let list_id = test.create_list("Groceries").await;
    let milk = test.add_task(list_id, None, "  Buy milk ").await;

    let (status, body) = test.create_task(list_id, None, "Buy milk ").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let tree = test.tree(list_id).await;
    assert_eq!(tree[0]["id"], milk);
    assert_eq!(tree[0]["title"], "Buy milk");
}
