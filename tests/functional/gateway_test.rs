//! Functional tests for forwarding, local routes and the error envelope

#[path = "../common/mod.rs"]
mod common;

use axum::http::{Method, StatusCode};
use base64::{engine::general_purpose::STANDARD, Engine};
use sdapi_gateway::config::OptionMap;
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::{
    matchers::{body_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn as_map(value: Value) -> OptionMap {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {}", other),
    }
}

#[tokio::test]
async fn test_txt2img_forwarded_verbatim() {
    let backend = MockServer::start().await;
    let request = json!({
        "prompt": "a lighthouse at dusk",
        "steps": 20,
        "custom_extension_field": {"nested": [1, 2, 3]}
    });
    let reply = json!({"images": ["iVBORw0KGgo="], "parameters": {}, "info": "{\"seed\": 42}"});

    Mock::given(method("POST"))
        .and(path("/sdapi/v1/txt2img"))
        .and(body_json(&request))
        .respond_with(ResponseTemplate::new(200).set_body_json(&reply))
        .expect(1)
        .mount(&backend)
        .await;

    let gateway = common::gateway_for_backend(&backend.uri()).await;
    let (status, headers, body) = common::send(
        &gateway.app,
        common::json_request(Method::POST, "/sdapi/v1/txt2img", &request),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, reply);
    assert!(common::process_time(&headers) >= 0.0);
}

#[tokio::test]
async fn test_progress_and_interrupt_forwarded() {
    let backend = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sdapi/v1/progress"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"progress": 0.5})))
        .mount(&backend)
        .await;
    Mock::given(method("POST"))
        .and(path("/sdapi/v1/interrupt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&backend)
        .await;

    let gateway = common::gateway_for_backend(&backend.uri()).await;

    let (status, _, body) = common::send(&gateway.app, common::get_request("/sdapi/v1/progress")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["progress"], 0.5);

    let (status, _, _) = common::send(&gateway.app, common::post_empty("/sdapi/v1/interrupt")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_backend_error_status_is_remote_call_failure() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sdapi/v1/txt2img"))
        .respond_with(ResponseTemplate::new(500).set_body_string("CUDA out of memory"))
        .mount(&backend)
        .await;

    let gateway = common::gateway_for_backend(&backend.uri()).await;
    let (status, headers, body) = common::send(
        &gateway.app,
        common::json_request(Method::POST, "/sdapi/v1/txt2img", &json!({"prompt": "x"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "RemoteCallFailed");
    assert_eq!(body["body"], "");
    assert!(body["detail"].as_str().unwrap().contains("txt2img"));
    assert!(body["errors"].is_string());
    assert!(common::process_time(&headers) >= 0.0);
}

#[tokio::test]
async fn test_unreachable_backend_is_remote_call_failure() {
    // Nothing listens on the discard port
    let gateway = common::gateway_for_backend("http://127.0.0.1:9").await;
    let (status, _, body) = common::send(
        &gateway.app,
        common::json_request(Method::POST, "/sdapi/v1/txt2img", &json!({"prompt": "x"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "RemoteCallFailed");
}

#[tokio::test]
async fn test_backend_timeout_is_remote_call_failure() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sdapi/v1/txt2img"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"images": []}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&backend)
        .await;

    let uri = backend.uri();
    let gateway = common::gateway_with(move |settings, _| {
        settings.backend.base_url = uri;
        settings.backend.timeout_secs = 1;
    })
    .await;
    let (status, _, body) = common::send(
        &gateway.app,
        common::json_request(Method::POST, "/sdapi/v1/txt2img", &json!({"prompt": "x"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "RemoteCallFailed");
}

#[tokio::test]
async fn test_missing_required_field_is_rejected_before_forwarding() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&backend)
        .await;

    let gateway = common::gateway_for_backend(&backend.uri()).await;
    let (status, _, body) = common::send(
        &gateway.app,
        common::json_request(Method::POST, "/sdapi/v1/extra-single-image", &json!({"upscaling_resize": 2})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "InvalidRequest");
    assert!(body["detail"].as_str().unwrap().contains("image"));
}

#[tokio::test]
async fn test_malformed_json_is_invalid_request() {
    let gateway = common::gateway_for_backend("http://127.0.0.1:9").await;
    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/sdapi/v1/txt2img")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let (status, headers, body) = common::send(&gateway.app, request).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "InvalidRequest");
    assert!(common::process_time(&headers) >= 0.0);
}

#[tokio::test]
async fn test_remote_image_with_requests_disabled_is_forbidden() {
    let backend = MockServer::start().await;
    let gateway = common::gateway_for_backend(&backend.uri()).await;
    gateway
        .state
        .options
        .update(as_map(json!({"api_enable_requests": false})))
        .await
        .unwrap();

    let (status, _, body) = common::send(
        &gateway.app,
        common::json_request(
            Method::POST,
            "/sdapi/v1/img2img",
            &json!({"init_images": ["https://example.com/cat.png"]}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "ForbiddenOperation");
    assert_eq!(body["detail"], "Requests not allowed");
    assert!(backend.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remote_image_on_local_address_is_forbidden() {
    let backend = MockServer::start().await;
    let gateway = common::gateway_for_backend(&backend.uri()).await;

    let (status, _, body) = common::send(
        &gateway.app,
        common::json_request(
            Method::POST,
            "/sdapi/v1/png-info",
            &json!({"image": format!("{}/cat.png", backend.uri())}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "ForbiddenOperation");
    assert_eq!(body["detail"], "Request to local resource not allowed");
    assert!(backend.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remote_image_resolved_before_forwarding() {
    let server = MockServer::start().await;
    let picture = common::gradient(4, 3);
    Mock::given(method("GET"))
        .and(path("/cat.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(common::png_bytes(&picture)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/sdapi/v1/img2img"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"images": []})))
        .expect(1)
        .mount(&server)
        .await;

    let gateway = common::gateway_for_backend(&server.uri()).await;
    gateway
        .state
        .options
        .update(as_map(json!({"api_forbid_local_requests": false})))
        .await
        .unwrap();

    let (status, _, _) = common::send(
        &gateway.app,
        common::json_request(
            Method::POST,
            "/sdapi/v1/img2img",
            &json!({"prompt": "x", "init_images": [format!("{}/cat.png", server.uri())]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let requests = server.received_requests().await.unwrap();
    let forwarded = requests
        .iter()
        .find(|r| r.url.path() == "/sdapi/v1/img2img")
        .unwrap();
    let body: Value = serde_json::from_slice(&forwarded.body).unwrap();
    assert_eq!(body["prompt"], "x");

    let encoded = body["init_images"][0].as_str().unwrap();
    let decoded = image::load_from_memory(&STANDARD.decode(encoded).unwrap()).unwrap();
    assert_eq!(decoded.to_rgb8(), picture.to_rgb8());
}

#[tokio::test]
async fn test_unknown_route_is_not_found_envelope() {
    let gateway = common::gateway_for_backend("http://127.0.0.1:9").await;
    let (status, headers, body) =
        common::send(&gateway.app, common::get_request("/sdapi/v1/does-not-exist")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");
    assert_eq!(body["body"], "");
    assert!(common::process_time(&headers) >= 0.0);
}

#[tokio::test]
async fn test_wrong_method_is_method_not_allowed_envelope() {
    let gateway = common::gateway_for_backend("http://127.0.0.1:9").await;
    let (status, headers, body) =
        common::send(&gateway.app, common::get_request("/sdapi/v1/txt2img")).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], "MethodNotAllowed");
    assert_eq!(body["detail"], "GET /sdapi/v1/txt2img Method Not Allowed");
    assert!(headers.contains_key("allow"));
    assert!(common::process_time(&headers) >= 0.0);
}

#[tokio::test]
async fn test_large_init_image_forwarded() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sdapi/v1/img2img"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"images": []})))
        .expect(1)
        .mount(&backend)
        .await;

    let gateway = common::gateway_for_backend(&backend.uri()).await;
    // well past the 2 MB default request body limit
    let request = json!({
        "prompt": "x",
        "init_images": ["A".repeat(3 * 1024 * 1024)]
    });
    let (status, _, body) = common::send(
        &gateway.app,
        common::json_request(Method::POST, "/sdapi/v1/img2img", &request),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["images"], json!([]));
}

#[tokio::test]
async fn test_proxy_mode_fixed_answers() {
    let gateway = common::gateway_for_backend("http://127.0.0.1:9").await;

    for uri in [
        "/sdapi/v1/samplers",
        "/sdapi/v1/schedulers",
        "/sdapi/v1/upscalers",
        "/sdapi/v1/sd-models",
        "/sdapi/v1/hypernetworks",
        "/sdapi/v1/face-restorers",
        "/sdapi/v1/script-info",
    ] {
        let (status, _, body) = common::send(&gateway.app, common::get_request(uri)).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert_eq!(body, json!([]), "{}", uri);
    }

    let (_, _, body) = common::send(&gateway.app, common::get_request("/sdapi/v1/embeddings")).await;
    assert_eq!(body, json!({"loaded": {}, "skipped": {}}));

    let (_, _, body) = common::send(&gateway.app, common::get_request("/sdapi/v1/scripts")).await;
    assert_eq!(body, json!({"txt2img": [], "img2img": []}));

    let (status, _, body) = common::send(
        &gateway.app,
        common::json_request(Method::POST, "/sdapi/v1/create/embedding", &json!({"name": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["info"], "Not supported in remote API mode");

    let (status, _, body) = common::send(&gateway.app, common::post_empty("/sdapi/v1/refresh-checkpoints")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn test_memory_report() {
    let gateway = common::gateway_for_backend("http://127.0.0.1:9").await;
    let (status, _, body) = common::send(&gateway.app, common::get_request("/sdapi/v1/memory")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cuda"]["error"], "Not available in remote API mode");
    assert!(body["ram"].is_object());
}

#[tokio::test]
async fn test_prompt_styles_from_file() {
    let gateway = common::gateway_with(|_, dir| {
        std::fs::write(
            dir.join("styles.csv"),
            "name,prompt,negative_prompt\nCinematic,\"{prompt}, film grain\",blurry\n",
        )
        .unwrap();
    })
    .await;

    let (status, _, body) = common::send(&gateway.app, common::get_request("/sdapi/v1/prompt-styles")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([{"name": "Cinematic", "prompt": "{prompt}, film grain", "negative_prompt": "blurry"}])
    );
}

#[tokio::test]
async fn test_extensions_listing() {
    let gateway = common::gateway_with(|_, dir| {
        let git = dir.join("extensions").join("controlnet").join(".git");
        std::fs::create_dir_all(git.join("refs").join("heads")).unwrap();
        std::fs::write(
            git.join("config"),
            "[remote \"origin\"]\n\turl = https://github.com/example/controlnet.git\n",
        )
        .unwrap();
        std::fs::write(git.join("HEAD"), "ref: refs/heads/main\n").unwrap();
        std::fs::write(
            git.join("refs").join("heads").join("main"),
            "0123456789abcdef0123456789abcdef01234567\n",
        )
        .unwrap();
    })
    .await;

    let (status, _, body) = common::send(&gateway.app, common::get_request("/sdapi/v1/extensions")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "controlnet");
    assert_eq!(body[0]["remote"], "https://github.com/example/controlnet.git");
    assert_eq!(body[0]["branch"], "main");
    assert_eq!(body[0]["version"], "01234567");
    assert_eq!(body[0]["enabled"], true);
}

#[tokio::test]
async fn test_cmd_flags_hide_passwords() {
    let gateway = common::gateway_with(|settings, _| {
        settings.api.auth = Some("alice:secret".to_string());
    })
    .await;

    let request = axum::http::Request::builder()
        .uri("/sdapi/v1/cmd-flags")
        .header(
            "authorization",
            format!("Basic {}", STANDARD.encode("alice:secret")),
        )
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, _, body) = common::send(&gateway.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["api"]["auth"], "alice:***");
    assert!(!body.to_string().contains("secret"));
}

#[tokio::test]
async fn test_subpath_nesting() {
    let gateway = common::gateway_with(|settings, _| {
        settings.server.subpath = Some("/sd/".to_string());
    })
    .await;

    let (status, _, _) = common::send(&gateway.app, common::get_request("/sd/sdapi/v1/samplers")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = common::send(&gateway.app, common::get_request("/sdapi/v1/samplers")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");
}

#[tokio::test]
async fn test_lifecycle_routes_only_when_enabled() {
    let gateway = common::gateway_for_backend("http://127.0.0.1:9").await;
    let (status, _, _) = common::send(&gateway.app, common::post_empty("/sdapi/v1/server-stop")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let gateway = common::gateway_with(|settings, _| settings.api.server_stop = true).await;
    let (status, _, _) = common::send(&gateway.app, common::post_empty("/sdapi/v1/server-restart")).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);

    let (status, _, body) = common::send(&gateway.app, common::post_empty("/sdapi/v1/server-stop")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("Stopping.".to_string()));
    assert!(gateway.state.lifecycle.requested().is_some());
}
