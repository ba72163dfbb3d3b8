mod common;

use axum::http::StatusCode;
use linkpulse::{cache::memory::MemoryCache, store::memory::MemoryStore};
use tower::ServiceExt;

use common::{
    UnreachableCache, body_json, build_test_app, build_test_app_at, get, get_as, location, shorten,
};

async fn create(app: &axum::Router, original_url: &str, owner: Option<&str>) -> String {
    let response = app
        .clone()
        .oneshot(shorten(original_url, owner))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    body["shortId"].as_str().unwrap().to_string()
}

async fn click_count(app: &axum::Router, short_id: &str) -> u64 {
    let response = app
        .clone()
        .oneshot(get(&format!("/api/url/analytics/{short_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["clickCount"].as_u64().unwrap()
}

#[tokio::test]
async fn health_check_works() {
    let app = build_test_app(MemoryStore::new(), MemoryCache::new());

    let response = app.oneshot(get("/health_check")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn shorten_then_redirect() {
    let app = build_test_app(MemoryStore::new(), MemoryCache::new());

    let response = app
        .clone()
        .oneshot(shorten("https://example.com/test-page", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let short_url_header = location(&response);
    let body = body_json(response).await;

    assert_eq!(body["msg"], "URL shortened successfully");
    let short_id = body["shortId"].as_str().unwrap();
    assert_eq!(short_id.len(), 8);
    assert_eq!(body["shortUrl"], format!("{}/{short_id}", common::BASE_URL));
    assert_eq!(short_url_header, body["shortUrl"].as_str().unwrap());

    let response = app.oneshot(get(&format!("/{short_id}"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "https://example.com/test-page");
}

#[tokio::test]
async fn short_urls_keep_base_path_prefix() {
    for base in ["http://sho.rt/s", "http://sho.rt/s/"] {
        let app = build_test_app_at(base, MemoryStore::new(), MemoryCache::new());

        let response = app
            .oneshot(shorten("https://example.com/prefixed", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let short_url_header = location(&response);
        let body = body_json(response).await;

        let short_id = body["shortId"].as_str().unwrap();
        assert_eq!(body["shortUrl"], format!("http://sho.rt/s/{short_id}"), "{base}");
        assert_eq!(short_url_header, body["shortUrl"].as_str().unwrap());
    }
}

#[tokio::test]
async fn analytics_reflect_every_completed_redirect() {
    let cache = MemoryCache::new();
    let app = build_test_app(MemoryStore::new(), cache.clone());
    let short_id = create(&app, "https://example.com/", None).await;

    assert_eq!(click_count(&app, &short_id).await, 0);
    assert!(cache.contains_key(&format!("analytics:{short_id}")));

    for expected in 1..=3 {
        let response = app
            .clone()
            .oneshot(get(&format!("/{short_id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert!(!cache.contains_key(&format!("analytics:{short_id}")));
        assert_eq!(click_count(&app, &short_id).await, expected);
    }
}

#[tokio::test]
async fn analytics_body_shape() {
    let app = build_test_app(MemoryStore::new(), MemoryCache::new());
    let short_id = create(&app, "https://example.com/shape", None).await;

    let response = app
        .oneshot(get(&format!("/api/url/analytics/{short_id}")))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["shortId"], short_id.as_str());
    assert_eq!(body["originalUrl"], "https://example.com/shape");
    assert_eq!(body["clickCount"], 0);
    assert!(body["createdAt"].is_string());
}

#[tokio::test]
async fn concurrent_redirects_are_all_counted() {
    let app = build_test_app(MemoryStore::new(), MemoryCache::new());
    let short_id = create(&app, "https://example.com/hot", None).await;

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let app = app.clone();
            let uri = format!("/{short_id}");
            tokio::spawn(async move { app.oneshot(get(&uri)).await.unwrap().status() })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::FOUND);
    }

    assert_eq!(click_count(&app, &short_id).await, 50);
}

#[tokio::test]
async fn unknown_and_malformed_ids_are_not_found() {
    let app = build_test_app(MemoryStore::new(), MemoryCache::new());

    for uri in ["/zzzzzzzz", "/nonexistent", "/api/url/analytics/zzzzzzzz"] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        let body = body_json(response).await;
        assert_eq!(body["code"], "not_found");
        assert_eq!(body["error"], "Resource not found");
    }
}

#[tokio::test]
async fn invalid_shorten_requests_are_rejected() {
    let app = build_test_app(MemoryStore::new(), MemoryCache::new());

    for (original_url, needle) in [
        ("not-a-valid-url", "Invalid URL"),
        ("", "required"),
        ("ftp://example.com/file", "http and https"),
        ("http://localhost:3000/admin", "Localhost"),
    ] {
        let response = app
            .clone()
            .oneshot(shorten(original_url, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{original_url}");
        let body = body_json(response).await;
        assert_eq!(body["code"], "bad_request");
        assert!(body["error"].as_str().unwrap().contains(needle), "{body}");
    }
}

#[tokio::test]
async fn malformed_json_is_rejected() {
    let app = build_test_app(MemoryStore::new(), MemoryCache::new());

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/api/url/shorten")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "invalid_json");
}

#[tokio::test]
async fn user_urls_requires_owner() {
    let app = build_test_app(MemoryStore::new(), MemoryCache::new());

    let response = app.oneshot(get("/api/url/user-urls")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "unauthorized");
}

#[tokio::test]
async fn user_urls_lists_only_own_links_paged() {
    let app = build_test_app(MemoryStore::new(), MemoryCache::new());
    for i in 0..3 {
        create(&app, &format!("https://example.com/{i}"), Some("alice")).await;
    }
    create(&app, "https://example.com/bob", Some("bob")).await;
    create(&app, "https://example.com/anon", None).await;

    let response = app
        .clone()
        .oneshot(get_as("/api/url/user-urls?page=1&limit=2", "alice"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["totalUrls"], 3);
    assert_eq!(body["totalPages"], 2);
    assert_eq!(body["currentPage"], 1);
    let urls = body["urls"].as_array().unwrap();
    assert_eq!(urls.len(), 2);
    assert!(urls.iter().all(|u| u["ownerId"] == "alice"));

    let response = app
        .clone()
        .oneshot(get_as("/api/url/user-urls", "bob"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["totalUrls"], 1);
    assert_eq!(body["currentPage"], 1);
}

#[tokio::test]
async fn user_urls_ignores_unparsable_paging() {
    let app = build_test_app(MemoryStore::new(), MemoryCache::new());
    for i in 0..12 {
        create(&app, &format!("https://example.com/{i}"), Some("alice")).await;
    }

    for uri in [
        "/api/url/user-urls?page=abc&limit=xyz",
        "/api/url/user-urls?page=-2&limit=",
    ] {
        let response = app.clone().oneshot(get_as(uri, "alice")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        let body = body_json(response).await;
        assert_eq!(body["currentPage"], 1);
        assert_eq!(body["totalUrls"], 12);
        assert_eq!(body["totalPages"], 2);
        assert_eq!(body["urls"].as_array().unwrap().len(), 10);
    }
}

#[tokio::test]
async fn everything_works_with_cache_down() {
    let app = build_test_app(MemoryStore::new(), UnreachableCache);
    let short_id = create(&app, "https://example.com/no-cache", Some("alice")).await;

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(get(&format!("/{short_id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), "https://example.com/no-cache");
    }
    assert_eq!(click_count(&app, &short_id).await, 2);

    let response = app
        .oneshot(get_as("/api/url/user-urls", "alice"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["totalUrls"], 1);
}
