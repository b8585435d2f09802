use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::api::api_key::API_KEY_HEADER;
use crate::api::handlers::{self, AppState};
use crate::config::ApiConfig;
use crate::store::traits::Store;

pub fn create_router<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        // Catalogs
        .route(
            "/catalogs/",
            get(handlers::list_catalogs::<S>)
                .post(handlers::create_catalog::<S>)
                .put(handlers::update_catalog::<S>),
        )
        // Families
        .route(
            "/families/",
            get(handlers::list_families::<S>)
                .post(handlers::create_family::<S>)
                .put(handlers::update_family::<S>),
        )
        .route("/families/letter/:letter", get(handlers::families_by_letter::<S>))
        .route("/families/count/", get(handlers::count_families::<S>))
        // Genera
        .route(
            "/genera/",
            get(handlers::list_genera::<S>)
                .post(handlers::create_genus::<S>)
                .put(handlers::update_genus::<S>),
        )
        .route("/genera/letter/:letter", get(handlers::genera_by_letter::<S>))
        .route("/genera/count/", get(handlers::count_genera::<S>))
        // Species
        .route(
            "/species/",
            get(handlers::list_species::<S>)
                .post(handlers::create_species::<S>)
                .put(handlers::update_species::<S>),
        )
        .route("/species/count/", get(handlers::count_species::<S>))
        .route(
            "/subspecies/",
            get(handlers::list_subspecies::<S>).post(handlers::create_subspecies::<S>),
        )
        // Items
        .route(
            "/items/",
            get(handlers::list_items::<S>).post(handlers::create_item::<S>),
        )
        // Provenance
        .route(
            "/studies/",
            get(handlers::list_studies::<S>).post(handlers::create_study::<S>),
        )
        .route(
            "/samples/",
            get(handlers::list_samples::<S>).post(handlers::create_sample::<S>),
        )
        .route(
            "/slides/",
            get(handlers::list_slides::<S>).post(handlers::create_slide::<S>),
        )
}

/// CORS policy for the configured origins; `*` allows any origin
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(API_KEY_HEADER),
        ]);

    if origins.iter().any(|origin| origin.trim() == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.trim().parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Full application: routes, CORS and state
pub fn build_app<S: Store + 'static>(store: Arc<S>, api: ApiConfig) -> Router {
    let cors = cors_layer(&api.cors_origins);
    create_router::<S>()
        .layer(cors)
        .with_state(AppState::new(store, api))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::api_key::hash_api_key;
    use crate::model::generate_id;
    use crate::store::MemoryStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const KEY: &str = "test-secret";

    fn app() -> Router {
        let api = ApiConfig {
            api_key_hash: Some(hash_api_key(KEY)),
            ..ApiConfig::default()
        };
        build_app(Arc::new(MemoryStore::new()), api)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>, key: Option<&str>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            request = request.header("x-api-key", key);
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn post(app: &Router, uri: &str, body: Value) -> Value {
        let (status, value) = send(app, "POST", uri, Some(body), Some(KEY)).await;
        assert_eq!(status, StatusCode::CREATED, "POST {} failed: {}", uri, value);
        value["id"].clone()
    }

    #[tokio::test]
    async fn test_mutation_requires_api_key() {
        let app = app();

        let (status, _) = send(&app, "POST", "/catalogs/", Some(json!({"name": "Pollen"})), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, "POST", "/catalogs/", Some(json!({"name": "Pollen"})), Some("wrong")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&app, "GET", "/catalogs/", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_unconfigured_key_rejects_all_writes() {
        let app = build_app(Arc::new(MemoryStore::new()), ApiConfig::default());
        let (status, _) = send(&app, "POST", "/catalogs/", Some(json!({"name": "Pollen"})), Some(KEY)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_put_missing_genus_is_not_found() {
        let app = app();
        let catalog = post(&app, "/catalogs/", json!({"name": "Pollen"})).await;
        let family = post(&app, "/families/", json!({"name": "Betulaceae", "catalog_id": catalog})).await;

        let genus = json!({"id": generate_id(), "name": "Alnus", "family_id": family, "is_type": false});
        let (status, _) = send(&app, "PUT", "/genera/", Some(genus), Some(KEY)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, genera) = send(&app, "GET", "/genera/", None, None).await;
        assert_eq!(genera, json!([]));
    }

    #[tokio::test]
    async fn test_put_family_updates_row() {
        let app = app();
        let catalog = post(&app, "/catalogs/", json!({"name": "Pollen"})).await;
        let family = post(&app, "/families/", json!({"name": "Betulacea", "catalog_id": catalog})).await;

        let update = json!({"id": family, "name": "Betulaceae", "catalog_id": catalog});
        let (status, _) = send(&app, "PUT", "/families/", Some(update), Some(KEY)).await;
        assert_eq!(status, StatusCode::OK);

        let uri = format!("/families/?catalog_id={}", catalog.as_str().unwrap());
        let (_, families) = send(&app, "GET", &uri, None, None).await;
        assert_eq!(families[0]["name"], "Betulaceae");
    }

    #[tokio::test]
    async fn test_duplicate_study_is_conflict() {
        let app = app();
        let catalog = post(&app, "/catalogs/", json!({"name": "Pollen"})).await;
        let study_id = generate_id();
        let study = json!({"id": study_id, "catalog_id": catalog, "is_reference": true});

        post(&app, "/studies/", study.clone()).await;
        let (status, body) = send(&app, "POST", "/studies/", Some(study), Some(KEY)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("study_pkey"));
    }

    #[tokio::test]
    async fn test_item_with_two_taxa_is_unprocessable() {
        let app = app();
        let item = json!({
            "key_image": "a.png",
            "family_id": generate_id(),
            "genus_id": generate_id(),
            "slide_id": generate_id(),
            "voxel_width": 0.3
        });
        let (status, _) = send(&app, "POST", "/items/", Some(item), Some(KEY)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_item_listing_by_anchor() {
        let app = app();
        let catalog = post(&app, "/catalogs/", json!({"name": "Pollen"})).await;
        let family = post(&app, "/families/", json!({"name": "Cannabaceae", "catalog_id": catalog})).await;
        let genus = post(&app, "/genera/", json!({"name": "Humulus", "family_id": family})).await;
        let species = post(&app, "/species/", json!({"name": "Humulus lupulus", "genus_id": genus})).await;
        let study = post(&app, "/studies/", json!({"catalog_id": catalog})).await;
        let sample = post(&app, "/samples/", json!({"study_id": study})).await;
        let slide = post(&app, "/slides/", json!({"sample_id": sample})).await;

        for (level, id) in [("family_id", &family), ("genus_id", &genus), ("species_id", &species)] {
            let mut item = json!({"key_image": format!("{level}.png"), "slide_id": slide, "voxel_width": 0.2});
            item[level] = id.clone();
            post(&app, "/items/", item).await;
        }

        let count = |anchor: &str, id: &Value| format!("/items/?{}={}", anchor, id.as_str().unwrap());
        let (_, items) = send(&app, "GET", &count("family_id", &family), None, None).await;
        assert_eq!(items.as_array().unwrap().len(), 3);
        let (_, items) = send(&app, "GET", &count("genus_id", &genus), None, None).await;
        assert_eq!(items.as_array().unwrap().len(), 2);
        let (_, items) = send(&app, "GET", &count("species_id", &species), None, None).await;
        assert_eq!(items.as_array().unwrap().len(), 1);
        assert_eq!(items[0]["species_id"], species);

        let (_, items) = send(&app, "GET", "/items/", None, None).await;
        assert_eq!(items, json!([]));

        let reference_only = format!("{}&reference_only=true", count("family_id", &family));
        let (_, items) = send(&app, "GET", &reference_only, None, None).await;
        assert_eq!(items, json!([]));

        let (_, letters) = send(&app, "GET", "/families/letter/c", None, None).await;
        assert_eq!(letters[0]["item_count"], 3);
        assert_eq!(letters[0]["has_items_without_species"], true);

        let (_, count) = send(&app, "GET", "/species/count/", None, None).await;
        assert_eq!(count, json!({"count": 1}));
    }

    #[tokio::test]
    async fn test_blank_anchor_params_fall_through() {
        let app = app();
        let catalog = post(&app, "/catalogs/", json!({"name": "Pollen"})).await;
        let family = post(&app, "/families/", json!({"name": "Pinaceae", "catalog_id": catalog})).await;
        let genus = post(&app, "/genera/", json!({"name": "Pinus", "family_id": family})).await;
        let study = post(&app, "/studies/", json!({"catalog_id": catalog})).await;
        let sample = post(&app, "/samples/", json!({"study_id": study})).await;
        let slide = post(&app, "/slides/", json!({"sample_id": sample})).await;
        post(&app, "/items/", json!({"key_image": "p.png", "genus_id": genus, "slide_id": slide, "voxel_width": 1.0})).await;

        let (status, items) = send(&app, "GET", "/items/?family_id=", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(items, json!([]));

        let uri = format!("/items/?family_id=&genus_id={}&page=", genus.as_str().unwrap());
        let (status, items) = send(&app, "GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(items.as_array().unwrap().len(), 1);
        assert_eq!(items[0]["genus_id"], genus);
    }

    #[tokio::test]
    async fn test_item_pages_respect_max_results() {
        let app = app();
        let catalog = post(&app, "/catalogs/", json!({"name": "Pollen"})).await;
        let family = post(&app, "/families/", json!({"name": "Pinaceae", "catalog_id": catalog})).await;
        let study = post(&app, "/studies/", json!({"catalog_id": catalog})).await;
        let sample = post(&app, "/samples/", json!({"study_id": study})).await;
        let slide = post(&app, "/slides/", json!({"sample_id": sample})).await;
        for n in 0..7 {
            post(&app, "/items/", json!({"key_image": format!("{n}.png"), "family_id": family, "slide_id": slide, "voxel_width": 1.0})).await;
        }

        let family_id = family.as_str().unwrap();
        let mut seen = Vec::new();
        for page in 1..=3 {
            let uri = format!("/items/?family_id={family_id}&max_results=3&page={page}");
            let (status, items) = send(&app, "GET", &uri, None, None).await;
            assert_eq!(status, StatusCode::OK);
            seen.extend(items.as_array().unwrap().iter().map(|item| item["id"].clone()));
        }
        assert_eq!(seen.len(), 7);
        seen.sort_by_key(|id| id.to_string());
        seen.dedup();
        assert_eq!(seen.len(), 7);
    }

    #[test]
    fn test_cors_layer_accepts_wildcard_and_lists() {
        let _ = cors_layer(&["*".to_string()]);
        let _ = cors_layer(&["http://localhost:8081".to_string(), "not a header\n".to_string()]);
    }
}
