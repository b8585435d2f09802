use micromap_db_rust::api::api_key::hash_api_key;
use micromap_db_rust::api::routes::build_app;
use micromap_db_rust::config::ApiConfig;
use micromap_db_rust::store::MemoryStore;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

const API_KEY: &str = "integration-secret";

// Test client wrapper for making API calls
struct TestClient {
    client: Client,
    base_url: String,
}

impl TestClient {
    fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    async fn post(&self, path: &str, json: Value) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(&format!("{}{}", self.base_url, path))
            .header("x-api-key", API_KEY)
            .json(&json)
            .send()
            .await
    }

    async fn put(&self, path: &str, json: Value) -> reqwest::Result<reqwest::Response> {
        self.client
            .put(&format!("{}{}", self.base_url, path))
            .header("x-api-key", API_KEY)
            .json(&json)
            .send()
            .await
    }

    async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client
            .get(&format!("{}{}", self.base_url, path))
            .send()
            .await
    }

    /// POST and return the created id
    async fn create(&self, path: &str, json: Value) -> String {
        let response = self.post(path, json).await.expect("request failed");
        assert_eq!(response.status(), StatusCode::CREATED, "POST {}", path);
        let body: Value = response.json().await.expect("invalid json");
        body["id"].as_str().expect("missing id").to_string()
    }

    async fn get_json(&self, path: &str) -> Value {
        let response = self.get(path).await.expect("request failed");
        assert_eq!(response.status(), StatusCode::OK, "GET {}", path);
        response.json().await.expect("invalid json")
    }
}

/// Serve the app on an ephemeral port backed by a fresh in-memory store
async fn spawn_server() -> TestClient {
    let api = ApiConfig {
        api_key_hash: Some(hash_api_key(API_KEY)),
        max_results: 50,
        ..ApiConfig::default()
    };
    let app = build_app(Arc::new(MemoryStore::new()), api);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestClient::new(format!("http://{}", address))
}

#[tokio::test]
async fn test_pollen_catalog_workflow() {
    let client = spawn_server().await;

    let health = client.get_json("/health").await;
    assert_eq!(health["status"], "healthy");

    // Taxonomy
    let catalog = client.create("/catalogs/", json!({"name": "Pollen"})).await;
    let cannabaceae = client
        .create("/families/", json!({"name": "Cannabaceae", "catalog_id": catalog}))
        .await;
    client
        .create("/families/", json!({"name": "Betulaceae", "catalog_id": catalog}))
        .await;
    let celtis = client
        .create("/genera/", json!({"name": "Celtis", "family_id": cannabaceae, "is_type": true}))
        .await;
    let humulus = client
        .create("/genera/", json!({"name": "Humulus", "family_id": cannabaceae}))
        .await;
    let lupulus = client
        .create("/species/", json!({"name": "Humulus lupulus", "genus_id": humulus, "is_type": true}))
        .await;
    let scandens = client
        .create("/species/", json!({"name": "Humulus scandens", "genus_id": humulus}))
        .await;
    client
        .create("/subspecies/", json!({"name": "Humulus lupulus var. cordifolius", "species_id": lupulus}))
        .await;

    let families = client.get_json(&format!("/families/?catalog_id={catalog}")).await;
    let names: Vec<&str> = families
        .as_array()
        .unwrap()
        .iter()
        .map(|family| family["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Betulaceae", "Cannabaceae"]);

    let genera = client
        .get_json(&format!("/genera/?family_id={cannabaceae}&include_genus_type=false"))
        .await;
    assert_eq!(genera.as_array().unwrap().len(), 1);
    assert_eq!(genera[0]["id"], humulus.as_str());

    let species = client.get_json(&format!("/species/?genera_id={humulus}")).await;
    assert_eq!(species.as_array().unwrap().len(), 2);
    let species = client.get_json(&format!("/species/?catalog_id={catalog}")).await;
    assert_eq!(species.as_array().unwrap().len(), 2);
    assert_eq!(client.get_json("/species/").await, json!([]));

    // Provenance chains: one reference collection, one field study
    let reference_study = client
        .create("/studies/", json!({"catalog_id": catalog, "is_reference": true, "description": "Herbarium"}))
        .await;
    let field_study = client
        .create("/studies/", json!({"catalog_id": catalog, "location": "Lake Siljan"}))
        .await;
    let reference_sample = client.create("/samples/", json!({"study_id": reference_study})).await;
    let field_sample = client
        .create("/samples/", json!({"study_id": field_study, "age": "Holocene"}))
        .await;
    let reference_slide = client.create("/slides/", json!({"sample_id": reference_sample})).await;
    let field_slide = client.create("/slides/", json!({"sample_id": field_sample})).await;

    let studies = client.get_json(&format!("/studies/?catalog_id={catalog}")).await;
    assert_eq!(studies.as_array().unwrap().len(), 2);

    // Items on every level below Cannabaceae
    let items = [
        json!({"family_id": cannabaceae, "slide_id": field_slide}),
        json!({"genus_id": celtis, "slide_id": reference_slide}),
        json!({"genus_id": humulus, "slide_id": field_slide}),
        json!({"species_id": lupulus, "slide_id": reference_slide}),
        json!({"species_id": scandens, "slide_id": field_slide}),
    ];
    for (index, mut item) in items.into_iter().enumerate() {
        item["key_image"] = json!(format!("images/{index}.png"));
        item["voxel_width"] = json!(0.25);
        client.create("/items/", item).await;
    }

    let family_items = client.get_json(&format!("/items/?family_id={cannabaceae}")).await;
    assert_eq!(family_items.as_array().unwrap().len(), 5);

    let humulus_items = client.get_json(&format!("/items/?genus_id={humulus}")).await;
    assert_eq!(humulus_items.as_array().unwrap().len(), 3);

    let celtis_items = client
        .get_json(&format!("/items/?genus_id={celtis}&include_genus_type=false"))
        .await;
    assert_eq!(celtis_items, json!([]));

    let lupulus_items = client
        .get_json(&format!("/items/?species_id={lupulus}&include_species_type=false"))
        .await;
    assert_eq!(lupulus_items, json!([]));

    let reference_items = client
        .get_json(&format!("/items/?family_id={cannabaceae}&reference_only=true"))
        .await;
    assert_eq!(reference_items.as_array().unwrap().len(), 2);

    // Same query, same order
    let again = client.get_json(&format!("/items/?family_id={cannabaceae}")).await;
    assert_eq!(family_items, again);

    // Letter views and counts
    let letter = client.get_json("/genera/letter/H").await;
    assert_eq!(letter.as_array().unwrap().len(), 1);
    assert_eq!(letter[0]["item_count"], 3);
    assert_eq!(client.get_json("/families/count/").await, json!({"count": 2}));
    assert_eq!(client.get_json("/genera/count/").await, json!({"count": 2}));
    assert_eq!(client.get_json("/species/count/").await, json!({"count": 2}));
}

#[tokio::test]
async fn test_write_errors() {
    let client = spawn_server().await;
    let catalog = client.create("/catalogs/", json!({"name": "Pollen"})).await;

    // Duplicate name
    let response = client
        .post("/catalogs/", json!({"name": "Pollen"}))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Unknown parent
    let response = client
        .post(
            "/families/",
            json!({"name": "Pinaceae", "catalog_id": "00000000-0000-0000-0000-000000000001"}),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Update of a missing row
    let response = client
        .put(
            "/catalogs/",
            json!({"id": "00000000-0000-0000-0000-000000000002", "name": "Spores"}),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Item without a taxon
    let response = client
        .post(
            "/items/",
            json!({"key_image": "x.png", "slide_id": catalog, "voxel_width": 1.0}),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Writes without a key
    let response = reqwest::Client::new()
        .post(format!("{}/catalogs/", client.base_url))
        .json(&json!({"name": "Spores"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let catalogs = client.get_json("/catalogs/").await;
    assert_eq!(catalogs.as_array().unwrap().len(), 1);
}
