use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use immich_core::{ApiErrorClass, AssetType, ImmichClient, ImmichError};

#[tokio::test]
async fn search_assets_page_sends_api_key_and_paging() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/search/metadata"))
        .and(header("x-api-key", "test-key"))
        .and(body_json(json!({"withPeople": true, "page": 2, "size": 500})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "albums": {"items": []},
            "assets": {
                "total": 2,
                "count": 2,
                "nextPage": "3",
                "items": [
                    {
                        "id": "a1",
                        "type": "VIDEO",
                        "isFavorite": true,
                        "originalFileName": "clip.mp4",
                        "people": [{"id": "p1", "name": "Alice"}]
                    },
                    {
                        "id": "a2",
                        "type": "IMAGE",
                        "isFavorite": false,
                        "people": null
                    }
                ]
            }
        })))
        .mount(&server)
        .await;

    let client = ImmichClient::with_base_url(&server.uri(), "test-key").unwrap();
    let page = client.search_assets_page(2, 500).await.unwrap();

    assert_eq!(page.next_page.as_deref(), Some("3"));
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].asset_type, AssetType::Video);
    assert!(page.items[0].is_favorite);
    assert_eq!(page.items[0].people.as_ref().unwrap()[0].id, "p1");
    assert_eq!(
        page.items[0].extra.get("originalFileName"),
        Some(&json!("clip.mp4"))
    );
    assert!(page.items[1].people.is_none());
}

#[tokio::test]
async fn unknown_asset_type_maps_to_other() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/search/metadata"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "assets": {
                "nextPage": null,
                "items": [{"id": "a1", "type": "HOLOGRAM"}]
            }
        })))
        .mount(&server)
        .await;

    let client = ImmichClient::with_base_url(&server.uri(), "test-key").unwrap();
    let page = client.search_assets_page(1, 10).await.unwrap();

    assert_eq!(page.items[0].asset_type, AssetType::Other);
    assert!(!page.items[0].is_favorite);
    assert!(page.next_page.is_none());
}

#[tokio::test]
async fn list_people_unwraps_people_field() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/people"))
        .and(header("x-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 2,
            "hidden": 0,
            "people": [
                {"id": "p1", "name": "Alice"},
                {"id": "p2", "name": ""}
            ]
        })))
        .mount(&server)
        .await;

    let client = ImmichClient::with_base_url(&server.uri(), "test-key").unwrap();
    let people = client.list_people().await.unwrap();

    assert_eq!(people.len(), 2);
    assert_eq!(people[0].name, "Alice");
    assert!(people[1].name.is_empty());
}

#[tokio::test]
async fn get_album_returns_member_ids() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/albums/album-1"))
        .and(query_param("withoutAssets", "false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "album-1",
            "albumName": "Favorites-Auto",
            "assetCount": 2,
            "assets": [{"id": "a1", "type": "IMAGE"}, {"id": "a2", "type": "VIDEO"}]
        })))
        .mount(&server)
        .await;

    let client = ImmichClient::with_base_url(&server.uri(), "test-key").unwrap();
    let album = client.get_album("album-1").await.unwrap();

    assert_eq!(album.album_name, "Favorites-Auto");
    let ids: Vec<_> = album.assets.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["a1", "a2"]);
}

#[tokio::test]
async fn create_album_posts_album_name() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/albums"))
        .and(body_json(json!({"albumName": "Videos-Auto"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "new-album",
            "albumName": "Videos-Auto",
            "assetCount": 0
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ImmichClient::with_base_url(&server.uri(), "test-key").unwrap();
    let album = client.create_album("Videos-Auto").await.unwrap();

    assert_eq!(album.id, "new-album");
}

#[tokio::test]
async fn add_and_remove_assets_use_bulk_ids_body() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/albums/album-1/assets"))
        .and(body_json(json!({"ids": ["a1", "a2"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "a1", "success": true},
            {"id": "a2", "success": false, "error": "duplicate"}
        ])))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/api/albums/album-1/assets"))
        .and(body_json(json!({"ids": ["a3"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "a3", "success": true}
        ])))
        .mount(&server)
        .await;

    let client = ImmichClient::with_base_url(&server.uri(), "test-key").unwrap();
    let added = client
        .add_assets("album-1", &["a1".to_string(), "a2".to_string()])
        .await
        .unwrap();
    let removed = client
        .remove_assets("album-1", &["a3".to_string()])
        .await
        .unwrap();

    assert!(added[0].success);
    assert_eq!(added[1].error.as_deref(), Some("duplicate"));
    assert_eq!(removed.len(), 1);
}

#[tokio::test]
async fn rate_limit_is_retryable_and_carries_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/albums"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "3")
                .set_body_string("slow down"),
        )
        .mount(&server)
        .await;

    let client = ImmichClient::with_base_url(&server.uri(), "test-key").unwrap();
    let err = client.list_albums().await.expect_err("expected 429");

    assert_eq!(err.classification(), Some(ApiErrorClass::RateLimit));
    assert!(err.is_retryable());
    assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
    assert!(matches!(err, ImmichError::Api { ref body, .. } if body == "slow down"));
}

#[tokio::test]
async fn not_found_is_permanent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/albums/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let client = ImmichClient::with_base_url(&server.uri(), "test-key").unwrap();
    let err = client.get_album("missing").await.expect_err("expected 404");

    assert_eq!(err.classification(), Some(ApiErrorClass::Permanent));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn unauthorized_is_auth_class() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/people"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = ImmichClient::with_base_url(&server.uri(), "bad-key").unwrap();
    let err = client.list_people().await.expect_err("expected 401");

    assert_eq!(err.classification(), Some(ApiErrorClass::Auth));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn bulk_calls_accept_empty_success_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/albums/alb-1/assets"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/albums/alb-1/assets"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = ImmichClient::with_base_url(&server.uri(), "test-key").unwrap();
    let ids = vec!["a1".to_string()];
    assert!(client.remove_assets("alb-1", &ids).await.unwrap().is_empty());
    assert!(client.add_assets("alb-1", &ids).await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_bulk_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/albums/alb-1/assets"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = ImmichClient::with_base_url(&server.uri(), "test-key").unwrap();
    let err = client
        .add_assets("alb-1", &["a1".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, ImmichError::Decode(_)));
    assert!(!err.is_retryable());
}
