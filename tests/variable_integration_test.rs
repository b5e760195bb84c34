use std::fs;

use ocrun::Collection;
use ocrun::runner::{CollectionRunOptions, CollectionRunner, RequestRunner};
use ocrun::variable::{ConfigLoader, VarMap};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn collection_json(base: &str) -> String {
    json!({
        "info": {"name": "Shop", "version": "1.0"},
        "request": {
            "headers": [{"name": "Accept", "value": "application/json"}],
            "variables": [{"name": "apiVersion", "value": "v1"}]
        },
        "config": {"environments": [
            {"name": "local", "variables": [
                {"name": "baseUrl", "value": base},
                {"name": "user", "value": "alice"}
            ]}
        ]},
        "items": [
            {
                "info": {"name": "Login", "type": "http"},
                "http": {
                    "method": "POST",
                    "url": "{{baseUrl}}/{{apiVersion}}/login",
                    "body": {"type": "json", "data": "{\"user\": \"{{user}}\"}"}
                },
                "runtime": {
                    "scripts": [
                        {"type": "after-response", "code": "bru.setVar(\"token\", res.body.token);"}
                    ],
                    "assertions": [
                        {"expression": "res.status", "operator": "eq", "value": "200"}
                    ]
                }
            },
            {
                "type": "folder",
                "name": "Orders",
                "request": {
                    "variables": [{"name": "limit", "value": "5"}]
                },
                "items": [
                    {
                        "type": "http",
                        "name": "List orders",
                        "method": "GET",
                        "url": "{{baseUrl}}/{{apiVersion}}/orders",
                        "headers": [{"name": "Authorization", "value": "Bearer {{token}}"}],
                        "params": [{"name": "limit", "value": "{{limit}}", "type": "query"}],
                        "assertions": [
                            {"expression": "res.body.orders", "operator": "isArray"},
                            {"expression": "res.body.orders.length", "operator": "eq", "value": "{{limit}}"}
                        ]
                    }
                ]
            }
        ]
    })
    .to_string()
}

async fn mount_shop(mock_server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "tok-123"})))
        .expect(1)
        .mount(mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/orders"))
        .and(query_param("limit", "5"))
        .and(header("authorization", "Bearer tok-123"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "orders": [1, 2, 3, 4, 5]
        })))
        .expect(1)
        .mount(mock_server)
        .await;
}

/// 测试从文件加载集合并按顺序运行，运行时变量在请求间传递
#[tokio::test]
async fn test_collection_run_shares_runtime_variables() {
    let mock_server = MockServer::start().await;
    mount_shop(&mock_server).await;

    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("shop.json");
    fs::write(&file, collection_json(&mock_server.uri())).unwrap();

    let collection = Collection::from_json_str(&fs::read_to_string(&file).unwrap()).unwrap();
    assert_eq!(collection.requests().len(), 2);

    let runner = CollectionRunner::new(RequestRunner::new().unwrap());
    let result = runner
        .run(
            &collection,
            CollectionRunOptions {
                environment: collection.environment("local"),
                process_env: Some(VarMap::new()),
                ..Default::default()
            },
        )
        .await;

    assert_eq!(result.runs.len(), 2);
    assert_eq!(result.runs[0].name, "Login");
    assert_eq!(result.runs[1].method, "GET");
    assert_eq!(result.runtime_variables.get("token"), Some(&json!("tok-123")));
    assert_eq!(result.summary.completed, 2);
    assert_eq!(result.summary.assertions_passed, 3);
    assert!(result.summary.is_success());
}

/// 测试只运行指定名称的请求
#[tokio::test]
async fn test_collection_run_single_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "x"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let collection = Collection::from_json_str(&collection_json(&mock_server.uri())).unwrap();
    let runner = CollectionRunner::new(RequestRunner::new().unwrap());
    let result = runner
        .run(
            &collection,
            CollectionRunOptions {
                environment: collection.environment("local"),
                request_name: Some("Login"),
                process_env: Some(VarMap::new()),
                ..Default::default()
            },
        )
        .await;

    assert_eq!(result.runs.len(), 1);
    assert!(result.runs[0].passed());
}

/// 测试临时变量覆盖环境变量
#[tokio::test]
async fn test_prompt_variables_override_environment() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/login"))
        .and(wiremock::matchers::body_json(json!({"user": "bob"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "b"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let collection = Collection::from_json_str(&collection_json(&mock_server.uri())).unwrap();
    let mut prompt = VarMap::new();
    prompt.insert("user".to_string(), json!("bob"));

    let runner = CollectionRunner::new(RequestRunner::new().unwrap());
    let result = runner
        .run(
            &collection,
            CollectionRunOptions {
                environment: collection.environment("local"),
                request_name: Some("Login"),
                prompt_variables: prompt,
                process_env: Some(VarMap::new()),
                ..Default::default()
            },
        )
        .await;

    assert_eq!(result.runs[0].result.status(), Some(200));
}

/// 测试进程环境变量通过 process.env 前缀插值
#[tokio::test]
async fn test_process_env_interpolation() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secure"))
        .and(header("x-api-key", "from-process"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let doc = json!({
        "info": {"name": "Env"},
        "items": [{
            "type": "http",
            "name": "Secure",
            "method": "GET",
            "url": format!("{}/secure", mock_server.uri()),
            "headers": [{"name": "X-Api-Key", "value": "{{process.env.API_KEY}}"}]
        }]
    });
    let collection = Collection::from_value(&doc).unwrap();

    let mut process_env = VarMap::new();
    process_env.insert("API_KEY".to_string(), json!("from-process"));

    let runner = CollectionRunner::new(RequestRunner::new().unwrap());
    let result = runner
        .run(
            &collection,
            CollectionRunOptions {
                process_env: Some(process_env),
                ..Default::default()
            },
        )
        .await;

    assert_eq!(result.runs[0].result.status(), Some(204));
}

/// 测试配置文件向上查找并提供全局变量和默认超时
#[tokio::test]
async fn test_config_discovery_and_globals() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tenants/acme"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let temp_dir = TempDir::new().unwrap();
    let nested = temp_dir.path().join("project").join("collections");
    fs::create_dir_all(&nested).unwrap();
    fs::write(
        temp_dir.path().join("project").join("ocrun.toml"),
        r#"
[runner]
timeout_ms = 5000
script_flow = "sequential"

[globals]
tenant = "acme"
"#,
    )
    .unwrap();

    let found = ConfigLoader::find(&nested).unwrap();
    assert!(found.ends_with("project/ocrun.toml"));
    let config = ConfigLoader::find_and_load(&nested).unwrap().unwrap();
    assert_eq!(config.runner.timeout_ms, 5000);
    assert_eq!(config.global_variables().get("tenant"), Some(&json!("acme")));

    let doc = json!({
        "info": {"name": "Tenants"},
        "items": [{
            "type": "http",
            "name": "Tenant",
            "method": "GET",
            "url": format!("{}/tenants/{{{{tenant}}}}", mock_server.uri())
        }]
    });
    let collection = Collection::from_value(&doc).unwrap();

    let runner = CollectionRunner::new(RequestRunner::with_config(config).unwrap());
    let result = runner
        .run(
            &collection,
            CollectionRunOptions {
                process_env: Some(VarMap::new()),
                ..Default::default()
            },
        )
        .await;

    assert_eq!(result.runs[0].result.status(), Some(200));
}

/// 测试配置文件格式错误时报错
#[test]
fn test_invalid_config_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("ocrun.toml");
    fs::write(&file, "[runner\ntimeout_ms = ").unwrap();

    assert!(ConfigLoader::load_from_path(&file).is_err());
    assert!(ConfigLoader::find_and_load(temp_dir.path()).is_err());
}
