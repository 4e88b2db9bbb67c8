use std::sync::Arc;

use clip_store_lib::{DatabaseManager, StorageGateway, StorageResponse};
use serde_json::{json, Value};
use tempfile::TempDir;

fn open_gateway() -> (StorageGateway, TempDir) {
    let dir = TempDir::new().unwrap();
    let db = DatabaseManager::new(dir.path().join("clips.db")).unwrap();
    (StorageGateway::new(Arc::new(db)), dir)
}

async fn call(gateway: &StorageGateway, action: &str, payload: Value) -> Value {
    let response: StorageResponse = gateway
        .handle(json!({ "action": action, "payload": payload }))
        .await;
    assert!(response.success, "{} failed: {:?}", action, response.error);
    response.data.unwrap_or(Value::Null)
}

async fn add_clip(gateway: &StorageGateway, title: &str) -> String {
    let clip = call(
        gateway,
        "clips:add",
        json!({
            "source": "webpage",
            "url": format!("https://example.com/{}", title),
            "title": title,
            "rawTextSnippet": format!("{} snippet", title),
        }),
    )
    .await;
    clip["id"].as_str().unwrap().to_string()
}

fn ids_of(list: &Value) -> Vec<String> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn add_then_get_returns_input_plus_generated_fields() {
    let (gateway, _dir) = open_gateway();

    let input = json!({
        "source": "youtube",
        "url": "https://youtube.com/watch?v=abc",
        "title": "Talk",
        "rawTextSnippet": "transcript start",
        "summary": "A talk",
        "keyPoints": ["first", "second"],
        "tags": ["video"],
        "images": [{ "data": "data:image/png;base64,AAAA", "caption": "cover" }],
        "aiRating": 5,
        "personalComment": "watch again"
    });
    let added = call(&gateway, "clips:add", input.clone()).await;
    let id = added["id"].as_str().unwrap();
    let fetched = call(&gateway, "clips:getById", json!({ "id": id })).await;

    for (key, value) in input.as_object().unwrap() {
        assert_eq!(&fetched[key], value, "field {}", key);
    }
    assert!(fetched["createdAt"].as_i64().unwrap() > 0);
    assert_eq!(fetched["createdAt"], fetched["updatedAt"]);
}

#[tokio::test]
async fn delete_many_excludes_exactly_the_deleted_ids() {
    let (gateway, _dir) = open_gateway();

    let mut ids = Vec::new();
    for i in 0..5 {
        ids.push(add_clip(&gateway, &format!("clip-{}", i)).await);
    }
    let doomed = vec![ids[1].clone(), ids[3].clone()];

    let deleted = call(&gateway, "clips:deleteMany", json!({ "ids": doomed })).await;
    assert_eq!(deleted, json!(2));

    let remaining = ids_of(&call(&gateway, "clips:getAll", Value::Null).await);
    let mut expected: Vec<String> = ids.into_iter().filter(|id| !doomed.contains(id)).collect();
    expected.reverse();
    assert_eq!(remaining, expected);
}

#[tokio::test]
async fn deleting_a_folder_uncategorizes_its_clips() {
    let (gateway, _dir) = open_gateway();

    let folder = call(
        &gateway,
        "folders:create",
        json!({ "name": "Research", "color": "green" }),
    )
    .await;
    let folder_id = folder["id"].as_str().unwrap().to_string();
    let a = add_clip(&gateway, "a").await;
    let b = add_clip(&gateway, "b").await;
    call(
        &gateway,
        "clips:moveManyToFolder",
        json!({ "ids": [a, b], "folderId": folder_id }),
    )
    .await;
    assert_eq!(
        call(&gateway, "folders:getClipCount", json!({ "folderId": folder_id })).await,
        json!(2)
    );

    assert_eq!(
        call(&gateway, "folders:delete", json!({ "id": folder_id })).await,
        json!(true)
    );

    let in_folder = call(&gateway, "clips:getByFolder", json!({ "folderId": folder_id })).await;
    assert_eq!(in_folder, json!([]));

    let uncategorized =
        ids_of(&call(&gateway, "clips:getByFolder", json!({ "folderId": null })).await);
    assert_eq!(uncategorized, vec![b, a]);
}

#[tokio::test]
async fn empty_search_equals_get_all() {
    let (gateway, _dir) = open_gateway();

    add_clip(&gateway, "alpha").await;
    add_clip(&gateway, "beta").await;

    let all = call(&gateway, "clips:getAll", Value::Null).await;
    assert_eq!(call(&gateway, "clips:search", json!({ "keyword": "" })).await, all);
    assert_eq!(call(&gateway, "clips:search", Value::Null).await, all);

    let hits = call(&gateway, "clips:search", json!({ "keyword": "ALPHA" })).await;
    assert_eq!(hits.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn pagination_has_more_matches_formula() {
    let (gateway, _dir) = open_gateway();

    let total = 11u64;
    for i in 0..total {
        add_clip(&gateway, &format!("p{}", i)).await;
    }

    let mut seen = Vec::new();
    for page in 1..=4u64 {
        let result = call(
            &gateway,
            "clips:getPaginated",
            json!({ "page": page, "pageSize": 3 }),
        )
        .await;
        assert_eq!(result["total"], json!(total));
        assert_eq!(result["hasMore"], json!(page * 3 < total));
        seen.extend(ids_of(&result["items"]));
    }

    // Pages tile the newest-first listing without gaps or overlap
    assert_eq!(seen, ids_of(&call(&gateway, "clips:getAll", Value::Null).await));
}

#[tokio::test]
async fn huge_page_numbers_return_an_empty_page() {
    let (gateway, _dir) = open_gateway();

    add_clip(&gateway, "only").await;

    let result = call(
        &gateway,
        "clips:getPaginated",
        json!({ "page": u32::MAX, "pageSize": u32::MAX }),
    )
    .await;
    assert_eq!(result["items"], json!([]));
    assert_eq!(result["total"], json!(1));
    assert_eq!(result["hasMore"], json!(false));
}

#[tokio::test]
async fn move_many_is_all_or_nothing() {
    let (gateway, _dir) = open_gateway();

    let folder = call(&gateway, "folders:create", json!({ "name": "Target" })).await;
    let folder_id = folder["id"].as_str().unwrap().to_string();
    let a = add_clip(&gateway, "a").await;
    let b = add_clip(&gateway, "b").await;

    let trigger = format!(
        "CREATE TRIGGER reject_b BEFORE UPDATE OF folder_id ON clips \
         WHEN old.id = '{}' BEGIN SELECT RAISE(ABORT, 'simulated failure'); END;",
        b
    );
    gateway
        .database()
        .with_connection(|conn| conn.execute_batch(&trigger))
        .unwrap();

    let response = gateway
        .handle(json!({
            "action": "clips:moveManyToFolder",
            "payload": { "ids": [a, b], "folderId": folder_id }
        }))
        .await;
    assert!(!response.success);
    assert!(response.error.unwrap().contains("simulated failure"));

    assert_eq!(
        call(&gateway, "folders:getClipCount", json!({ "folderId": folder_id })).await,
        json!(0)
    );
    let clip_a = call(&gateway, "clips:getById", json!({ "id": a })).await;
    assert!(clip_a.get("folderId").is_none());
}

#[tokio::test]
async fn unknown_ids_yield_null_not_errors() {
    let (gateway, _dir) = open_gateway();

    assert_eq!(call(&gateway, "clips:getById", json!({ "id": "x" })).await, Value::Null);
    assert_eq!(
        call(&gateway, "clips:update", json!({ "id": "x", "updates": { "title": "t" } })).await,
        Value::Null
    );
    assert_eq!(
        call(&gateway, "clips:removeImage", json!({ "id": "x", "index": 0 })).await,
        Value::Null
    );
    assert_eq!(
        call(&gateway, "folders:rename", json!({ "id": "x", "name": "y" })).await,
        Value::Null
    );
    assert_eq!(call(&gateway, "clips:delete", json!({ "id": "x" })).await, json!(false));
}

#[tokio::test]
async fn backup_round_trip_through_gateway() {
    let (source, _source_dir) = open_gateway();
    let (target, _target_dir) = open_gateway();

    let folder = call(&source, "folders:create", json!({ "name": "Keep" })).await;
    let id = add_clip(&source, "kept").await;
    call(&source, "clips:moveToFolder", json!({ "id": id, "folderId": folder["id"] })).await;

    let snapshot = call(&source, "backup:export", Value::Null).await;
    let summary = call(&target, "backup:import", json!({ "snapshot": snapshot })).await;
    assert_eq!(summary["clipsImported"], json!(1));
    assert_eq!(summary["foldersImported"], json!(1));

    assert_eq!(
        call(&target, "clips:getAll", Value::Null).await,
        call(&source, "clips:getAll", Value::Null).await
    );
}
