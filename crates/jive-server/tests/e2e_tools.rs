//! End-to-end scenarios through the dispatcher
//!
//! Each test drives the consolidated tool surface exactly as an MCP peer
//! would: tool name + JSON arguments in, response envelope out.

use std::sync::Arc;

use serde_json::{Value, json};

use jive_infrastructure::AppContext;
use jive_server::ToolRegistry;

async fn registry() -> ToolRegistry {
    let app = Arc::new(AppContext::build_in_memory().await.unwrap());
    ToolRegistry::new(app).unwrap()
}

async fn call(registry: &ToolRegistry, tool: &str, args: Value) -> Value {
    registry.dispatch(tool, args).await.envelope
}

async fn create_item(registry: &ToolRegistry, item_type: &str, title: &str, parent: Option<&str>) -> String {
    let mut args = json!({"action": "create", "type": item_type, "title": title});
    if let Some(parent) = parent {
        args["parent_id"] = json!(parent);
    }
    let envelope = call(registry, "jive_manage_work_item", args).await;
    assert_eq!(envelope["success"], json!(true), "{envelope:?}");
    envelope["data"]["work_item_id"].as_str().unwrap().to_owned()
}

fn progress_of(envelope: &Value) -> f64 {
    envelope["data"]["work_item"]["progress_percentage"]
        .as_f64()
        .unwrap()
}

#[tokio::test]
async fn scenario_create_hierarchy_and_propagate_progress() {
    let registry = registry().await;

    let initiative = create_item(&registry, "initiative", "I", None).await;
    let epic = create_item(&registry, "epic", "E", Some(&initiative)).await;

    // Story directly under the epic skips feature and must fail
    let bad = call(
        &registry,
        "jive_manage_work_item",
        json!({"action": "create", "type": "story", "title": "S-bad", "parent_id": epic}),
    )
    .await;
    assert_eq!(bad["success"], json!(false));
    assert_eq!(bad["error_code"], json!("INVALID_HIERARCHY"));

    let feature = create_item(&registry, "feature", "F", Some(&epic)).await;
    let story = create_item(&registry, "story", "S", Some(&feature)).await;
    let task = create_item(&registry, "task", "T", Some(&story)).await;

    // Mark the task in progress: 50% everywhere up the chain
    let tracked = call(
        &registry,
        "jive_track_progress",
        json!({"action": "track", "work_item_id": task, "status": "in_progress"}),
    )
    .await;
    assert_eq!(tracked["success"], json!(true), "{tracked:?}");
    assert_eq!(progress_of(&tracked), 50.0);

    for id in [&story, &feature, &epic, &initiative] {
        let fetched = call(
            &registry,
            "jive_get_work_item",
            json!({"work_item_id": id}),
        )
        .await;
        assert_eq!(progress_of(&fetched), 50.0, "{fetched:?}");
    }

    // Complete the task: the whole chain reaches 100 and completes
    call(
        &registry,
        "jive_track_progress",
        json!({"action": "track", "work_item_id": task, "status": "completed"}),
    )
    .await;
    let initiative_fetched = call(
        &registry,
        "jive_get_work_item",
        json!({"work_item_id": initiative}),
    )
    .await;
    assert_eq!(progress_of(&initiative_fetched), 100.0);
    assert_eq!(
        initiative_fetched["data"]["work_item"]["status"],
        json!("completed")
    );
}

#[tokio::test]
async fn scenario_dependency_cycle_detection() {
    let registry = registry().await;

    let a = create_item(&registry, "task", "A", None).await;
    let b = create_item(&registry, "task", "B", None).await;
    let c = create_item(&registry, "task", "C", None).await;

    // A -> B, B -> C, C -> A
    for (item, dep) in [(&a, &b), (&b, &c), (&c, &a)] {
        let updated = call(
            &registry,
            "jive_manage_work_item",
            json!({"action": "update", "work_item_id": item, "dependencies": [dep]}),
        )
        .await;
        assert_eq!(updated["success"], json!(true), "{updated:?}");
    }

    let invalid = call(
        &registry,
        "jive_get_hierarchy",
        json!({"relationship": "validate_dependencies", "check_circular": true}),
    )
    .await;
    assert_eq!(invalid["data"]["is_valid"], json!(false));
    let errors = invalid["data"]["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["kind"], json!("circular_dependency"));
    assert_eq!(errors[0]["cycle"].as_array().unwrap().len(), 4);
    assert!(invalid["data"].get("execution_order").is_none());

    // Break the cycle: C no longer depends on A
    call(
        &registry,
        "jive_manage_work_item",
        json!({"action": "update", "work_item_id": c, "dependencies": []}),
    )
    .await;

    let valid = call(
        &registry,
        "jive_get_hierarchy",
        json!({"relationship": "validate_dependencies"}),
    )
    .await;
    assert_eq!(valid["data"]["is_valid"], json!(true));
    let order: Vec<String> = valid["data"]["execution_order"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_owned())
        .collect();
    assert_eq!(order, vec![c.clone(), b.clone(), a.clone()]);
}

#[tokio::test]
async fn scenario_identifier_resolution() {
    let registry = registry().await;
    let id = create_item(&registry, "task", "Payment Integration", None).await;

    for reference in ["Payment Integration", "payment integration", "payment"] {
        let fetched = call(
            &registry,
            "jive_get_work_item",
            json!({"work_item_id": reference}),
        )
        .await;
        assert_eq!(fetched["success"], json!(true), "{reference}: {fetched:?}");
        assert_eq!(fetched["data"]["work_item"]["id"], json!(id));
    }

    let miss = call(
        &registry,
        "jive_get_work_item",
        json!({"work_item_id": "nonexistent payment thing"}),
    )
    .await;
    assert_eq!(miss["success"], json!(false));
    assert_eq!(miss["error_code"], json!("NOT_FOUND"));
    assert_eq!(
        miss["details"]["suggestions"],
        json!(["Payment Integration"])
    );
}

#[tokio::test]
async fn scenario_response_shaping() {
    let registry = registry().await;

    let big_description = "d".repeat(5_000);
    let created = call(
        &registry,
        "jive_manage_work_item",
        json!({
            "action": "create",
            "type": "task",
            "title": "Huge",
            "description": big_description,
            "metadata": {"blob": "m".repeat(50_000)},
        }),
    )
    .await;
    assert_eq!(created["success"], json!(true), "{created:?}");

    let fetched = call(
        &registry,
        "jive_get_work_item",
        json!({"work_item_id": "Huge"}),
    )
    .await;
    let serialized = serde_json::to_string(&fetched).unwrap();
    assert!(serialized.len() <= 50_000);

    let description = fetched["data"]["work_item"]["description"].as_str().unwrap();
    assert!(description.contains("[TRUNCATED - Original length: 5000 chars]"));
    assert!(fetched["data"]["work_item"].get("metadata").is_none());
    // Essential fields survive shaping
    assert_eq!(fetched["data"]["work_item"]["title"], json!("Huge"));
    assert_eq!(fetched["data"]["work_item"]["status"], json!("not_started"));
}

#[tokio::test]
async fn scenario_architecture_context_under_tight_budget() {
    let registry = registry().await;
    let body = |tokens: usize| "Sound architectural guidance sentence here. ".repeat(tokens / 10);

    for i in 0..4 {
        let child = call(
            &registry,
            "jive_memory",
            json!({
                "namespace": "architecture",
                "action": "create",
                "slug": format!("child-{i}"),
                "title": format!("Child {i}"),
                "ai_requirements": body(500),
            }),
        )
        .await;
        assert_eq!(child["success"], json!(true), "{child:?}");
    }
    for i in 0..2 {
        call(
            &registry,
            "jive_memory",
            json!({
                "namespace": "architecture",
                "action": "create",
                "slug": format!("related-{i}"),
                "title": format!("Related {i}"),
                "ai_requirements": body(300),
            }),
        )
        .await;
    }
    let primary = call(
        &registry,
        "jive_memory",
        json!({
            "namespace": "architecture",
            "action": "create",
            "slug": "primary",
            "title": "Primary",
            "ai_requirements": body(2000),
            "children_slugs": ["child-0", "child-1", "child-2", "child-3"],
            "related_slugs": ["related-0", "related-1"],
        }),
    )
    .await;
    assert_eq!(primary["success"], json!(true), "{primary:?}");

    let context = call(
        &registry,
        "jive_memory",
        json!({
            "namespace": "architecture",
            "action": "get_context",
            "slug": "primary",
            "max_tokens": 3000,
        }),
    )
    .await;
    assert_eq!(context["success"], json!(true), "{context:?}");
    let data = &context["data"];
    assert_eq!(data["truncation_applied"], json!(true));
    // Primary body is verbatim; some but not all children fit
    let children = data["children"].as_array().unwrap();
    assert!(!children.is_empty());
    assert!(children.len() < 4);
    assert!(data["related"].as_array().unwrap().len() <= 2);
    assert!(data["markdown"].as_str().unwrap().contains("# Primary"));
}

#[tokio::test]
async fn scenario_troubleshoot_matching_with_success_boost() {
    let registry = registry().await;

    for (slug, usage, success) in [("proven", 10, 9), ("unproven", 1, 0)] {
        let created = call(
            &registry,
            "jive_memory",
            json!({
                "namespace": "troubleshoot",
                "action": "create",
                "slug": slug,
                "title": format!("Fix {slug}"),
                "ai_solutions": "Restart the connection pool and check limits.",
                "ai_use_case": ["database connection pool exhausted"],
            }),
        )
        .await;
        assert_eq!(created["success"], json!(true), "{created:?}");
        // Seed the usage counters through the feedback path
        for i in 0..usage {
            call(
                &registry,
                "jive_memory",
                json!({
                    "namespace": "troubleshoot",
                    "action": "mark_outcome",
                    "slug": slug,
                    "worked": i < success,
                }),
            )
            .await;
        }
    }

    let boosted = call(
        &registry,
        "jive_memory",
        json!({
            "namespace": "troubleshoot",
            "action": "match_problem",
            "problem": "database connection pool exhausted",
            "boost_by_success_rate": true,
        }),
    )
    .await;
    let matches = boosted["data"]["matches"].as_array().unwrap();
    assert_eq!(matches[0]["slug"], json!("proven"));

    let unboosted = call(
        &registry,
        "jive_memory",
        json!({
            "namespace": "troubleshoot",
            "action": "match_problem",
            "problem": "database connection pool exhausted",
            "boost_by_success_rate": false,
        }),
    )
    .await;
    let matches = unboosted["data"]["matches"].as_array().unwrap();
    assert_eq!(
        matches[0]["relevance_score"].as_f64().unwrap(),
        matches[1]["relevance_score"].as_f64().unwrap()
    );

    // Fetching the detailed solution increments usage by exactly one
    let before = call(
        &registry,
        "jive_memory",
        json!({"namespace": "troubleshoot", "action": "get", "slug": "proven"}),
    )
    .await;
    let usage_before = before["data"]["item"]["usage_count"].as_u64().unwrap();
    let solution = call(
        &registry,
        "jive_memory",
        json!({
            "namespace": "troubleshoot",
            "action": "get_solution",
            "slug": "proven",
            "mark_as_used": true,
        }),
    )
    .await;
    assert_eq!(
        solution["data"]["solution"]["usage_count"].as_u64().unwrap(),
        usage_before + 1
    );
}

#[tokio::test]
async fn sync_round_trip_through_the_tool_surface() {
    let registry = registry().await;
    let dir = tempfile::tempdir().unwrap();
    let dir_str = dir.path().to_str().unwrap();

    call(
        &registry,
        "jive_memory",
        json!({
            "namespace": "architecture",
            "action": "create",
            "slug": "exported",
            "title": "Exported",
            "ai_requirements": "Keep layers separate.",
        }),
    )
    .await;

    let exported = call(
        &registry,
        "jive_sync_data",
        json!({"action": "export", "namespace": "architecture", "directory": dir_str}),
    )
    .await;
    assert_eq!(exported["success"], json!(true), "{exported:?}");
    assert_eq!(exported["data"]["reports"][0]["exported"], json!(1));

    call(
        &registry,
        "jive_memory",
        json!({"namespace": "architecture", "action": "delete", "slug": "exported"}),
    )
    .await;

    let imported = call(
        &registry,
        "jive_sync_data",
        json!({"action": "import", "directory": dir_str}),
    )
    .await;
    assert_eq!(imported["success"], json!(true), "{imported:?}");

    let restored = call(
        &registry,
        "jive_memory",
        json!({"namespace": "architecture", "action": "get", "slug": "exported"}),
    )
    .await;
    assert_eq!(restored["data"]["item"]["title"], json!("Exported"));
}

#[tokio::test]
async fn execution_lifecycle_through_the_tool_surface() {
    let registry = registry().await;
    let task = create_item(&registry, "task", "Run me", None).await;

    let started = call(
        &registry,
        "jive_execute_work_item",
        json!({"action": "start", "work_item_id": task}),
    )
    .await;
    assert_eq!(started["success"], json!(true), "{started:?}");
    let execution_id = started["data"]["execution_id"].as_str().unwrap().to_owned();

    let status = call(
        &registry,
        "jive_execute_work_item",
        json!({"action": "status", "execution_id": execution_id}),
    )
    .await;
    assert_eq!(status["data"]["execution"]["status"], json!("running"));

    let cancelled = call(
        &registry,
        "jive_execute_work_item",
        json!({"action": "cancel", "execution_id": execution_id, "reason": "test abort"}),
    )
    .await;
    assert_eq!(
        cancelled["data"]["execution"]["status"],
        json!("cancelled")
    );
    assert_eq!(
        cancelled["data"]["execution"]["error_message"],
        json!("test abort")
    );

    // Terminal records refuse further transitions
    let again = call(
        &registry,
        "jive_execute_work_item",
        json!({"action": "cancel", "execution_id": execution_id}),
    )
    .await;
    assert_eq!(again["success"], json!(false));
}
