mod common;

use std::sync::Arc;

use common::{
    CLICKING_TS, FIXED_TS, MockFactory, NAVIGATE_ONLY_PY, SCENARIOS_JSON, ScriptedRunner, core_with,
};
use testpilot_ai::MockStep;
use serde_json::{Map, json};
use testpilot_browser::mock::MOCK_SCREENSHOT;
use testpilot_browser::{ActionOutput, ScriptLanguage, actions};
use testpilot_core::models::{
    ChangeKind, CodeStatus, ExecutionStatus, ExplorationMethod, HealStatus, PlanStatus,
    ProtocolConfig, StepStatus,
};
use testpilot_core::services::{
    ExecuteRequest, ExploreRequest, GenerateRequest, HealRequest, codes, executions, heals, plans,
    protocol, runtime, statistics,
};
use testpilot_core::storage::{HealFilter, PlanFilter};

const NO_ACTIONS_TS: &str = "```typescript\nimport { test } from '@playwright/test';\n\ntest('smoke', async () => {\n  console.log('nothing to drive here');\n});\n```";

#[tokio::test]
async fn explore_generate_execute_example_com() {
    let factory = Arc::new(MockFactory::new(vec![
        MockStep::text(SCENARIOS_JSON),
        MockStep::text(NAVIGATE_ONLY_PY),
    ]));
    let (core, _temp_dir) = core_with(factory.clone());

    let plan = plans::explore(&core, ExploreRequest::new("https://example.com"))
        .await
        .unwrap();
    assert_eq!(plan.status, PlanStatus::Completed);
    assert_eq!(plan.max_depth, 2);
    assert!(!plan.test_scenarios.is_empty());
    let result = plan.exploration_result.as_ref().unwrap();
    assert_eq!(result.method, ExplorationMethod::LocalBrowser);
    assert_eq!(result.total_scenarios, plan.test_scenarios.len());
    assert!(result.plan_content.contains("Home page loads"));

    let code = codes::generate(&core, GenerateRequest::new(&plan.id, ScriptLanguage::Python))
        .await
        .unwrap();
    assert_eq!(code.status, CodeStatus::Completed);
    assert!(code.code.contains("https://example.com"));
    assert!(code.code.len() >= 50);
    assert!(code.enhanced);
    assert!(code.config.is_some());

    let execution = executions::execute(&core, ExecuteRequest::new(&code.id))
        .await
        .unwrap();
    assert_eq!(execution.status, ExecutionStatus::Success);
    assert_eq!(execution.backend.as_deref(), Some("local"));
    assert_eq!(execution.exit_code, Some(0));
    assert_eq!(execution.screenshots.len(), 1);
    let record = &execution.screenshots[0];
    assert_eq!(record.step_number, 1);
    assert_eq!(record.action, "navigate");
    assert_eq!(record.status, StepStatus::Success);
    assert!(record.screenshot_after.as_deref().is_some_and(|shot| !shot.is_empty()));

    let steps = executions::get_steps(&core, &execution.id).await.unwrap();
    assert_eq!(steps.total_steps, 1);
    assert_eq!(steps.status, ExecutionStatus::Success);

    let stored = plans::get_plan(&core, &plan.id).await.unwrap();
    assert_eq!(stored.status, PlanStatus::Completed);

    let stats = statistics::get_statistics(&core).await.unwrap();
    assert_eq!(stats.total_plans, 1);
    assert_eq!(stats.total_codes, 1);
    assert_eq!(stats.successful_executions, 1);
    assert_eq!(stats.success_rate, 100.0);
    assert_eq!(stats.heal_success_rate, 0.0);

    assert!(!factory.local.is_open().await);
}

#[tokio::test]
async fn every_tier_failing_leaves_plan_failed() {
    let factory = MockFactory::new(vec![MockStep::error("model offline")]);
    factory.local.fail_initialize("browser executable not found").await;
    let (core, _temp_dir) = core_with(Arc::new(factory));

    let plan = plans::explore(&core, ExploreRequest::new("https://example.com"))
        .await
        .unwrap();

    assert_eq!(plan.status, PlanStatus::Failed);
    assert!(plan.test_scenarios.is_empty());
    assert!(plan.error_message.is_some());
    let stored = plans::get_plan(&core, &plan.id).await.unwrap();
    assert_eq!(stored.status, PlanStatus::Failed);
}

#[tokio::test]
async fn unreachable_protocol_server_falls_back_to_local_browser() {
    let factory = MockFactory::new(vec![MockStep::text(SCENARIOS_JSON)]);
    factory.remote.fail_initialize("connection refused").await;
    let factory = Arc::new(factory);
    let (core, _temp_dir) = core_with(factory.clone());

    let server = protocol::create_config(
        &core,
        ProtocolConfig::streamable_http("local-server", "http://127.0.0.1:8006"),
    )
    .await
    .unwrap();
    let mut request = ExploreRequest::new("https://example.com");
    request.protocol_config_id = Some(server.id.clone());

    let plan = plans::explore(&core, request).await.unwrap();

    assert_eq!(plan.status, PlanStatus::Completed);
    assert_eq!(
        plan.exploration_result.unwrap().method,
        ExplorationMethod::LocalBrowser
    );
    assert!(factory.remote.calls().await.is_empty());
    assert!(factory.remote.close_calls().await >= 1);
    assert!(factory.local.call_names().await.contains(&actions::SNAPSHOT.to_string()));
}

#[tokio::test]
async fn no_browser_at_all_still_plans_from_the_model() {
    let factory = MockFactory::new(vec![MockStep::text("I cannot produce JSON today.")]);
    factory.remote.fail_initialize("connection refused").await;
    factory.local.fail_initialize("browser executable not found").await;
    let factory = Arc::new(factory);
    let (core, _temp_dir) = core_with(factory.clone());
    let server = protocol::create_config(
        &core,
        ProtocolConfig::streamable_http("local-server", "http://127.0.0.1:8006"),
    )
    .await
    .unwrap();
    let mut request = ExploreRequest::new("https://example.com");
    request.protocol_config_id = Some(server.id.clone());

    let plan = plans::explore(&core, request).await.unwrap();

    assert_eq!(plan.status, PlanStatus::Completed);
    let result = plan.exploration_result.as_ref().unwrap();
    assert_eq!(result.method, ExplorationMethod::LlmInference);
    assert!(result.steps.is_empty());
    let priorities: Vec<&str> = plan
        .test_scenarios
        .iter()
        .map(|scenario| scenario.priority.as_str())
        .collect();
    assert_eq!(priorities, vec!["high", "medium", "high"]);

    let requests = factory.llm.requests().await;
    assert_eq!(requests.len(), 1);
    assert!(requests[0].messages[0].content.contains("https://example.com"));
}

#[tokio::test]
async fn remote_exploration_caps_telemetry_and_keeps_screenshot_out_of_prompt() {
    let factory = MockFactory::new(vec![MockStep::text(SCENARIOS_JSON)]);
    let requests: Vec<_> = (0..30)
        .map(|i| json!({"url": format!("https://example.com/api/{i}"), "method": "GET"}))
        .collect();
    let mut network = Map::new();
    network.insert("requests".to_string(), json!(requests));
    factory
        .remote
        .respond(actions::NETWORK_REQUESTS, ActionOutput::Mapping(network))
        .await;
    factory
        .remote
        .fail_on(actions::CONSOLE_MESSAGES, 1, "console log unavailable")
        .await;
    let factory = Arc::new(factory);
    let (core, _temp_dir) = core_with(factory.clone());
    let server = protocol::create_config(
        &core,
        ProtocolConfig::streamable_http("local-server", "http://127.0.0.1:8006"),
    )
    .await
    .unwrap();
    let mut request = ExploreRequest::new("https://example.com");
    request.protocol_config_id = Some(server.id.clone());

    let plan = plans::explore(&core, request).await.unwrap();

    assert_eq!(plan.status, PlanStatus::Completed);
    let result = plan.exploration_result.as_ref().unwrap();
    assert_eq!(result.method, ExplorationMethod::McpServer);
    assert_eq!(result.snapshot["network_requests"].as_array().unwrap().len(), 10);
    assert!(result.snapshot["console_messages"].as_array().unwrap().is_empty());
    assert_eq!(result.snapshot["screenshot"], MOCK_SCREENSHOT);
    let step = &result.steps[0];
    assert_eq!(step.action, "enhanced_explore");
    assert_eq!(step.network_requests_count, 30);
    assert_eq!(step.console_logs_count, 0);

    let prompts = factory.llm.requests().await;
    let prompt = &prompts[0].messages[0].content;
    assert!(prompt.contains("https://example.com/api/0"));
    assert!(!prompt.contains(MOCK_SCREENSHOT));

    let names = factory.remote.call_names().await;
    assert_eq!(names.last().map(String::as_str), Some(actions::CLOSE));
    assert!(!factory.remote.is_open().await);
    assert!(factory.local.call_names().await.is_empty());
}

#[tokio::test]
async fn remote_execution_closes_the_server_browser() {
    let factory = Arc::new(MockFactory::new(vec![
        MockStep::text(SCENARIOS_JSON),
        MockStep::text(CLICKING_TS),
    ]));
    let (core, _temp_dir) = core_with(factory.clone());
    let server = protocol::create_config(
        &core,
        ProtocolConfig::streamable_http("local-server", "http://127.0.0.1:8006"),
    )
    .await
    .unwrap();

    let plan = plans::explore(&core, ExploreRequest::new("https://example.com"))
        .await
        .unwrap();
    let code = codes::generate(&core, GenerateRequest::new(&plan.id, ScriptLanguage::Typescript))
        .await
        .unwrap();
    let mut request = ExecuteRequest::new(&code.id);
    request.protocol_config_id = Some(server.id.clone());
    let execution = executions::execute(&core, request).await.unwrap();

    assert_eq!(execution.status, ExecutionStatus::Success);
    assert_eq!(execution.backend.as_deref(), Some("remote"));
    assert_eq!(execution.screenshots.len(), 2);
    let names = factory.remote.call_names().await;
    assert_eq!(names.first().map(String::as_str), Some(actions::NAVIGATE));
    assert_eq!(names.last().map(String::as_str), Some(actions::CLOSE));
    assert!(factory.remote.close_calls().await >= 1);
}

#[tokio::test]
async fn failed_execution_heals_into_new_code() {
    let factory = MockFactory::new(vec![
        MockStep::text(SCENARIOS_JSON),
        MockStep::text(CLICKING_TS),
        MockStep::text("The element #more-info does not exist. The page only has a plain link."),
        MockStep::text(FIXED_TS),
    ]);
    factory
        .local
        .fail_on(actions::CLICK, 1, "Timeout 10000ms exceeded waiting for #more-info")
        .await;
    let (core, _temp_dir) = core_with(Arc::new(factory));

    let plan = plans::explore(&core, ExploreRequest::new("https://example.com"))
        .await
        .unwrap();
    let code = codes::generate(&core, GenerateRequest::new(&plan.id, ScriptLanguage::Typescript))
        .await
        .unwrap();
    let execution = executions::execute(&core, ExecuteRequest::new(&code.id))
        .await
        .unwrap();

    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert_eq!(execution.screenshots.len(), 2);
    assert_eq!(execution.screenshots[1].status, StepStatus::Failed);
    assert!(execution.error_message.as_deref().unwrap().contains("#more-info"));

    let result = heals::heal(&core, HealRequest::new(&execution.id)).await.unwrap();
    let record = result.record;
    assert_eq!(record.status, HealStatus::Success);
    assert!(record.error_analysis.contains("#more-info"));
    assert!((0.0..=1.0).contains(&record.confidence));
    assert!(record.page_state.is_some());
    assert!(record.changes.iter().any(|change| change.kind == ChangeKind::WaitAdded));
    assert!(record.changes.iter().any(|change| change.kind == ChangeKind::SelectorUpdated));

    let fixed = result.fixed_code.unwrap();
    assert_eq!(record.fixed_code_id.as_deref(), Some(fixed.id.as_str()));
    let stored = codes::get_code(&core, &fixed.id).await.unwrap();
    assert_eq!(stored.status, CodeStatus::Completed);
    assert_eq!(stored.plan_id, plan.id);
    assert_eq!(stored.language, ScriptLanguage::Typescript);
    assert!(stored.code.contains("waitForSelector"));

    let listed = heals::list_records(
        &core,
        &HealFilter {
            execution_id: Some(execution.id.clone()),
            ..HealFilter::default()
        },
        1,
        20,
    )
    .await
    .unwrap();
    assert_eq!(listed.total, 1);

    let stats = statistics::get_statistics(&core).await.unwrap();
    assert_eq!(stats.failed_executions, 1);
    assert_eq!(stats.heal_success_rate, 100.0);
}

#[tokio::test]
async fn only_failed_executions_can_be_healed() {
    let factory = Arc::new(MockFactory::new(vec![
        MockStep::text(SCENARIOS_JSON),
        MockStep::text(NAVIGATE_ONLY_PY),
    ]));
    let (core, _temp_dir) = core_with(factory);

    let plan = plans::explore(&core, ExploreRequest::new("https://example.com"))
        .await
        .unwrap();
    let code = codes::generate(&core, GenerateRequest::new(&plan.id, ScriptLanguage::Python))
        .await
        .unwrap();
    let execution = executions::execute(&core, ExecuteRequest::new(&code.id))
        .await
        .unwrap();

    let err = heals::heal(&core, HealRequest::new(&execution.id))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Only failed executions can be healed"));
    assert_eq!(
        heals::list_records(&core, &HealFilter::default(), 1, 20)
            .await
            .unwrap()
            .total,
        0
    );
}

#[tokio::test]
async fn scripts_without_browser_actions_run_through_the_test_runner() {
    let mut factory = MockFactory::new(vec![
        MockStep::text(SCENARIOS_JSON),
        MockStep::text(NO_ACTIONS_TS),
    ]);
    factory.runner = Arc::new(ScriptedRunner::exiting(1, "", "Error: expect(received).toBe(expected)"));
    let runner = factory.runner.clone();
    let (core, _temp_dir) = core_with(Arc::new(factory));

    let plan = plans::explore(&core, ExploreRequest::new("https://example.com"))
        .await
        .unwrap();
    let code = codes::generate(&core, GenerateRequest::new(&plan.id, ScriptLanguage::Typescript))
        .await
        .unwrap();
    let mut request = ExecuteRequest::new(&code.id);
    request.headless = false;
    let execution = executions::execute(&core, request).await.unwrap();

    assert_eq!(execution.backend.as_deref(), Some("subprocess"));
    assert_eq!(execution.status, ExecutionStatus::Failed);
    assert!(execution.screenshots.is_empty());
    assert_eq!(execution.exit_code, Some(1));
    assert!(execution.error_message.unwrap().contains("toBe"));

    let requests = runner.requests().await;
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headless);
    assert_eq!(requests[0].language, ScriptLanguage::Typescript);
}

#[tokio::test]
async fn missing_entities_are_reported_not_fabricated() {
    let (core, _temp_dir) = core_with(Arc::new(MockFactory::new(Vec::new())));

    let err = plans::get_plan(&core, "missing").await.unwrap_err();
    assert!(err.to_string().contains("not found"));
    let err = codes::generate(&core, GenerateRequest::new("missing", ScriptLanguage::Python))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Test plan missing not found"));
    let err = executions::execute(&core, ExecuteRequest::new("missing"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Generated code missing not found"));

    let mut request = ExploreRequest::new("https://example.com");
    request.llm_config_id = Some("missing".to_string());
    assert!(plans::explore(&core, request).await.is_err());
    let page = plans::list_plans(&core, &PlanFilter::default(), 1, 20).await.unwrap();
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn protocol_connection_test_lists_tools_and_runtime_probe_reports() {
    let (core, _temp_dir) = core_with(Arc::new(MockFactory::new(Vec::new())));
    let server = protocol::create_config(
        &core,
        ProtocolConfig::streamable_http("local-server", "http://127.0.0.1:8006"),
    )
    .await
    .unwrap();

    let tools = protocol::test_connection(&core, &server.id).await.unwrap();
    assert_eq!(tools[0].name, "navigate");

    let probe = runtime::probe_runtime(&core).await.unwrap();
    assert!(probe.ready);
}
