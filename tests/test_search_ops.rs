use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use splunk_search_mcp::config::ConnectionConfig;
use splunk_search_mcp::error::SplunkSearchError;
use splunk_search_mcp::model::{
    Outcome, RawMessage, SearchIndexParams, SearchParams, SearchSplunkParams,
};
use splunk_search_mcp::search::{list_indexes, search, search_index, search_splunk};

fn basic_config(server: &MockServer) -> ConnectionConfig {
    let addr = server.address();
    ConnectionConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        scheme: "http".to_string(),
        verify: false,
        token: None,
        username: Some("admin".to_string()),
        password: Some("changeme".to_string()),
    }
}

fn token_config(server: &MockServer) -> ConnectionConfig {
    ConnectionConfig {
        token: Some("tok-1".to_string()),
        username: None,
        password: None,
        ..basic_config(server)
    }
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/services/auth/login"))
        .and(body_string_contains("output_mode=json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sessionKey": "sk-123" })))
        .mount(server)
        .await;
}

fn results_payload(rows: serde_json::Value) -> serde_json::Value {
    json!({ "preview": false, "init_offset": 0, "messages": [], "results": rows })
}

#[tokio::test]
async fn search_returns_rows_from_a_oneshot_job() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("POST"))
        .and(path("/services/search/jobs"))
        .and(header("Authorization", "Splunk sk-123"))
        .and(body_string_contains("exec_mode=oneshot"))
        .and(body_string_contains("search=search+index%3Dmain+error"))
        .and(body_string_contains("earliest_time=-24h"))
        .and(body_string_contains("count=50"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(results_payload(json!([
                { "_time": "2024-05-01T10:00:00.000+00:00", "host": "web-1", "_raw": "boom" }
            ]))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let outcome = search(
        &basic_config(&server),
        SearchParams {
            query: "index=main error".to_string(),
            earliest: "-24h".to_string(),
            latest: "now".to_string(),
            count: 50,
        },
    )
    .await
    .unwrap();

    match outcome {
        Outcome::Rows(rows) => {
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0]["host"], "web-1");
        }
        other => panic!("expected rows, got {:?}", other),
    }
}

#[tokio::test]
async fn pipe_queries_pass_through_without_the_search_verb() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("POST"))
        .and(path("/services/search/jobs"))
        .and(body_string_contains("search=%7C+tstats+count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(results_payload(json!([]))))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = search(
        &basic_config(&server),
        SearchParams {
            query: "| tstats count".to_string(),
            earliest: "-7d".to_string(),
            latest: "now".to_string(),
            count: 200,
        },
    )
    .await
    .unwrap();

    assert!(matches!(outcome, Outcome::Rows(rows) if rows.is_empty()));
}

#[tokio::test]
async fn search_splunk_runs_a_blocking_job_and_projects_raw_text() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("POST"))
        .and(path("/services/search/jobs"))
        .and(body_string_contains("exec_mode=blocking"))
        .and(body_string_contains("preview=false"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sid": "job-42" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/services/search/jobs/job-42/results"))
        .and(query_param("output_mode", "json"))
        .and(query_param("count", "5"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(results_payload(json!([
                { "_raw": "line one", "host": "a" },
                { "host": "no-raw" },
                { "_raw": "line two" }
            ]))),
        )
        .expect(1)
        .mount(&server)
        .await;

    let messages = search_splunk(
        &basic_config(&server),
        SearchSplunkParams {
            search_query: "error".to_string(),
            earliest_time: "-24h".to_string(),
            latest_time: "now".to_string(),
            max_results: 5,
        },
    )
    .await
    .unwrap();

    assert_eq!(
        messages,
        vec![
            RawMessage {
                message: "line one".to_string()
            },
            RawMessage {
                message: "line two".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn engine_rejection_becomes_a_structured_error_outcome() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("POST"))
        .and(path("/services/search/jobs"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "messages": [{ "type": "FATAL", "text": "Unknown search command 'frobnicate'." }]
        })))
        .mount(&server)
        .await;

    let outcome = search(
        &basic_config(&server),
        SearchParams {
            query: "frobnicate".to_string(),
            earliest: "-7d".to_string(),
            latest: "now".to_string(),
            count: 200,
        },
    )
    .await
    .unwrap();

    match outcome {
        Outcome::Error(f) => {
            assert_eq!(f.error, "splunk_http_error");
            assert_eq!(f.status, Some(400));
            assert_eq!(f.message, "Unknown search command 'frobnicate'.");
            assert_eq!(f.query, "search frobnicate");
        }
        other => panic!("expected error outcome, got {:?}", other),
    }
}

#[tokio::test]
async fn search_index_engine_rejection_becomes_a_structured_error_outcome() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("POST"))
        .and(path("/services/search/jobs"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "messages": [{ "type": "FATAL", "text": "Comparator '=' is missing a term." }]
        })))
        .mount(&server)
        .await;

    let outcome = search_index(
        &basic_config(&server),
        SearchIndexParams {
            index: "main".to_string(),
            filter: "frob=1".to_string(),
            earliest: "-5d".to_string(),
            latest: "now".to_string(),
            fields: None,
            limit: 100,
        },
    )
    .await
    .unwrap();

    match outcome {
        Outcome::Error(f) => {
            assert_eq!(f.error, "splunk_http_error");
            assert_eq!(f.status, Some(400));
            assert_eq!(f.message, "Comparator '=' is missing a term.");
            assert_eq!(f.query, "search index=main frob=1 | sort - _time");
        }
        other => panic!("expected error outcome, got {:?}", other),
    }
}

#[tokio::test]
async fn search_splunk_raises_on_engine_rejection() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("POST"))
        .and(path("/services/search/jobs"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "messages": [{ "type": "FATAL", "text": "Unknown search command 'frobnicate'." }]
        })))
        .mount(&server)
        .await;

    let err = search_splunk(
        &basic_config(&server),
        SearchSplunkParams {
            search_query: "frobnicate".to_string(),
            earliest_time: "-24h".to_string(),
            latest_time: "now".to_string(),
            max_results: 100,
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        SplunkSearchError::EngineHttp {
            status: Some(400),
            ..
        }
    ));
}

#[tokio::test]
async fn zero_rows_with_diagnostics_come_back_as_a_warning() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("POST"))
        .and(path("/services/search/jobs"))
        .and(body_string_contains("search=search+index%3Dmain+%7C+sort+-+_time"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "preview": false,
            "messages": [{ "type": "WARN", "text": "field=foo does not exist" }],
            "results": []
        })))
        .mount(&server)
        .await;

    let outcome = search_index(
        &basic_config(&server),
        SearchIndexParams {
            index: "main".to_string(),
            filter: String::new(),
            earliest: "-5d".to_string(),
            latest: "now".to_string(),
            fields: None,
            limit: 100,
        },
    )
    .await
    .unwrap();

    match outcome {
        Outcome::Warning(w) => {
            assert_eq!(w.warning, "no_rows");
            assert_eq!(w.messages, vec!["WARN: field=foo does not exist".to_string()]);
            assert_eq!(w.query, "search index=main | sort - _time");
            assert_eq!(w.earliest, "-5d");
            assert_eq!(w.latest, "now");
        }
        other => panic!("expected warning, got {:?}", other),
    }
}

#[tokio::test]
async fn list_indexes_returns_catalog_names_in_order() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/services/data/indexes"))
        .and(query_param("output_mode", "json"))
        .and(query_param("count", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entry": [{ "name": "main" }, { "name": "web" }, { "name": "_internal" }]
        })))
        .mount(&server)
        .await;

    let names = list_indexes(&basic_config(&server)).await.unwrap();
    assert_eq!(names, vec!["main", "web", "_internal"]);
}

#[tokio::test]
async fn list_indexes_propagates_engine_failures() {
    let server = MockServer::start().await;
    mount_login(&server).await;

    Mock::given(method("GET"))
        .and(path("/services/data/indexes"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;

    let err = list_indexes(&basic_config(&server)).await.unwrap_err();
    assert!(matches!(
        err,
        SplunkSearchError::EngineHttp {
            status: Some(503),
            ..
        }
    ));
}

#[tokio::test]
async fn bearer_token_is_validated_at_connect_time() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/services/server/info"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "generator": {} })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/services/data/indexes"))
        .and(header("Authorization", "Bearer tok-1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "entry": [{ "name": "main" }] })),
        )
        .mount(&server)
        .await;

    let names = list_indexes(&token_config(&server)).await.unwrap();
    assert_eq!(names, vec!["main"]);
}

#[tokio::test]
async fn rejected_token_surfaces_as_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/services/server/info"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = list_indexes(&token_config(&server)).await.unwrap_err();
    assert!(matches!(err, SplunkSearchError::AuthError(_)));
}

#[tokio::test]
async fn rejected_login_surfaces_as_auth_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/services/auth/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = list_indexes(&basic_config(&server)).await.unwrap_err();
    assert!(matches!(err, SplunkSearchError::AuthError(_)));
}

#[tokio::test]
async fn invalid_input_never_touches_the_network() {
    let server = MockServer::start().await;

    let err = search(
        &basic_config(&server),
        SearchParams {
            query: "   ".to_string(),
            earliest: "-7d".to_string(),
            latest: "now".to_string(),
            count: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SplunkSearchError::InvalidInput(_)));

    let err = search_index(
        &basic_config(&server),
        SearchIndexParams {
            index: "  ".to_string(),
            filter: String::new(),
            earliest: "-5d".to_string(),
            latest: "now".to_string(),
            fields: None,
            limit: 1,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SplunkSearchError::InvalidInput(_)));

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn each_call_performs_its_own_login_handshake() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/services/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sessionKey": "sk-123" })))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/services/search/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(results_payload(json!([]))))
        .expect(2)
        .mount(&server)
        .await;

    let cfg = basic_config(&server);
    for _ in 0..2 {
        let outcome = search(
            &cfg,
            SearchParams {
                query: "index=main".to_string(),
                earliest: "-7d".to_string(),
                latest: "now".to_string(),
                count: 10,
            },
        )
        .await
        .unwrap();
        assert!(matches!(outcome, Outcome::Rows(_)));
    }

    server.verify().await;
}
