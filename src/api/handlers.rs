use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::api_key::ApiKey;
use crate::config::ApiConfig;
use crate::logic::item_query;
use crate::model::{
    Catalog, CountResponse, CreatedResponse, Family, FamilyLetterEntry, Genus, GenusLetterEntry,
    Id, Item, ItemQuery, NewCatalog, NewFamily, NewGenus, NewItem, NewSample, NewSlide,
    NewSpecies, NewStudy, NewSubspecies, Sample, Slide, Species, Study, Subspecies,
};
use crate::store::{Store, StoreError};

/// Shared handler state: the injected store plus read-only API settings
pub struct AppState<S> {
    pub store: Arc<S>,
    pub api: Arc<ApiConfig>,
}

impl<S> AppState<S> {
    pub fn new(store: Arc<S>, api: ApiConfig) -> Self {
        Self {
            store,
            api: Arc::new(api),
        }
    }
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            api: Arc::clone(&self.api),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
        }
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);
pub type HandlerResult<T> = Result<T, ApiError>;

/// Map store errors onto HTTP statuses
fn store_error(err: StoreError) -> ApiError {
    match &err {
        StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, Json(ErrorResponse::new(&err.to_string()))),
        StoreError::KeyViolation { detail } => {
            log::warn!("Rejected write: {}", detail);
            (StatusCode::CONFLICT, Json(ErrorResponse::new(detail)))
        }
        StoreError::Backend(e) => {
            log::error!("Storage failure: {:#}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(&e.to_string())),
            )
        }
    }
}

fn created(id: Id) -> (StatusCode, Json<CreatedResponse>) {
    (StatusCode::CREATED, Json(CreatedResponse { id }))
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "MicroMap API" }))
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

// Catalogs

pub async fn list_catalogs<S: Store>(
    State(state): State<AppState<S>>,
) -> HandlerResult<Json<Vec<Catalog>>> {
    let catalogs = state.store.get_catalogs().await.map_err(store_error)?;
    Ok(Json(catalogs))
}

pub async fn create_catalog<S: Store>(
    _key: ApiKey,
    State(state): State<AppState<S>>,
    RequestJson(new): RequestJson<NewCatalog>,
) -> HandlerResult<(StatusCode, Json<CreatedResponse>)> {
    let id = state
        .store
        .add_catalog(Catalog::from(new))
        .await
        .map_err(store_error)?;
    log::info!("Created catalog {}", id);
    Ok(created(id))
}

pub async fn update_catalog<S: Store>(
    _key: ApiKey,
    State(state): State<AppState<S>>,
    RequestJson(catalog): RequestJson<Catalog>,
) -> HandlerResult<StatusCode> {
    state
        .store
        .update_catalog(catalog)
        .await
        .map_err(store_error)?;
    Ok(StatusCode::OK)
}

// Families

#[derive(Debug, Deserialize)]
pub struct FamilyQuery {
    pub catalog_id: Id,
}

pub async fn list_families<S: Store>(
    State(state): State<AppState<S>>,
    Query(query): Query<FamilyQuery>,
) -> HandlerResult<Json<Vec<Family>>> {
    let families = state
        .store
        .get_families(&query.catalog_id)
        .await
        .map_err(store_error)?;
    Ok(Json(families))
}

pub async fn create_family<S: Store>(
    _key: ApiKey,
    State(state): State<AppState<S>>,
    RequestJson(new): RequestJson<NewFamily>,
) -> HandlerResult<(StatusCode, Json<CreatedResponse>)> {
    let id = state
        .store
        .add_family(Family::from(new))
        .await
        .map_err(store_error)?;
    Ok(created(id))
}

pub async fn update_family<S: Store>(
    _key: ApiKey,
    State(state): State<AppState<S>>,
    RequestJson(family): RequestJson<Family>,
) -> HandlerResult<StatusCode> {
    state.store.update_family(family).await.map_err(store_error)?;
    Ok(StatusCode::OK)
}

pub async fn families_by_letter<S: Store>(
    State(state): State<AppState<S>>,
    Path(letter): Path<String>,
) -> HandlerResult<Json<Vec<FamilyLetterEntry>>> {
    let families = state
        .store
        .families_by_letter(&letter)
        .await
        .map_err(store_error)?;
    Ok(Json(families))
}

pub async fn count_families<S: Store>(
    State(state): State<AppState<S>>,
) -> HandlerResult<Json<CountResponse>> {
    let count = state.store.count_families().await.map_err(store_error)?;
    Ok(Json(CountResponse { count }))
}

// Genera

#[derive(Debug, Deserialize)]
pub struct GenusQuery {
    pub family_id: Option<Id>,
    #[serde(default = "default_true")]
    pub include_genus_type: bool,
}

#[derive(Debug, Deserialize)]
pub struct GenusLetterQuery {
    #[serde(default = "default_true")]
    pub include_genus_type: bool,
}

pub async fn list_genera<S: Store>(
    State(state): State<AppState<S>>,
    Query(query): Query<GenusQuery>,
) -> HandlerResult<Json<Vec<Genus>>> {
    let genera = state
        .store
        .get_genera(query.family_id.as_ref(), query.include_genus_type)
        .await
        .map_err(store_error)?;
    Ok(Json(genera))
}

pub async fn create_genus<S: Store>(
    _key: ApiKey,
    State(state): State<AppState<S>>,
    RequestJson(new): RequestJson<NewGenus>,
) -> HandlerResult<(StatusCode, Json<CreatedResponse>)> {
    let id = state
        .store
        .add_genus(Genus::from(new))
        .await
        .map_err(store_error)?;
    Ok(created(id))
}

pub async fn update_genus<S: Store>(
    _key: ApiKey,
    State(state): State<AppState<S>>,
    RequestJson(genus): RequestJson<Genus>,
) -> HandlerResult<StatusCode> {
    state.store.update_genus(genus).await.map_err(store_error)?;
    Ok(StatusCode::OK)
}

pub async fn genera_by_letter<S: Store>(
    State(state): State<AppState<S>>,
    Path(letter): Path<String>,
    Query(query): Query<GenusLetterQuery>,
) -> HandlerResult<Json<Vec<GenusLetterEntry>>> {
    let genera = state
        .store
        .genera_by_letter(&letter, query.include_genus_type)
        .await
        .map_err(store_error)?;
    Ok(Json(genera))
}

pub async fn count_genera<S: Store>(
    State(state): State<AppState<S>>,
) -> HandlerResult<Json<CountResponse>> {
    let count = state.store.count_genera().await.map_err(store_error)?;
    Ok(Json(CountResponse { count }))
}

// Species

#[derive(Debug, Deserialize)]
pub struct SpeciesQuery {
    pub genera_id: Option<Id>,
    pub catalog_id: Option<Id>,
}

pub async fn list_species<S: Store>(
    State(state): State<AppState<S>>,
    Query(query): Query<SpeciesQuery>,
) -> HandlerResult<Json<Vec<Species>>> {
    let species = match (query.genera_id, query.catalog_id) {
        (Some(genus_id), _) => state.store.get_species(&genus_id).await,
        (None, Some(catalog_id)) => state.store.get_species_for_catalog(&catalog_id).await,
        (None, None) => Ok(Vec::new()),
    }
    .map_err(store_error)?;
    Ok(Json(species))
}

pub async fn create_species<S: Store>(
    _key: ApiKey,
    State(state): State<AppState<S>>,
    RequestJson(new): RequestJson<NewSpecies>,
) -> HandlerResult<(StatusCode, Json<CreatedResponse>)> {
    let id = state
        .store
        .add_species(Species::from(new))
        .await
        .map_err(store_error)?;
    Ok(created(id))
}

pub async fn update_species<S: Store>(
    _key: ApiKey,
    State(state): State<AppState<S>>,
    RequestJson(species): RequestJson<Species>,
) -> HandlerResult<StatusCode> {
    state.store.update_species(species).await.map_err(store_error)?;
    Ok(StatusCode::OK)
}

pub async fn count_species<S: Store>(
    State(state): State<AppState<S>>,
) -> HandlerResult<Json<CountResponse>> {
    let count = state.store.count_species().await.map_err(store_error)?;
    Ok(Json(CountResponse { count }))
}

// Subspecies

#[derive(Debug, Deserialize)]
pub struct SubspeciesQuery {
    pub species_id: Id,
}

pub async fn list_subspecies<S: Store>(
    State(state): State<AppState<S>>,
    Query(query): Query<SubspeciesQuery>,
) -> HandlerResult<Json<Vec<Subspecies>>> {
    let subspecies = state
        .store
        .get_subspecies(&query.species_id)
        .await
        .map_err(store_error)?;
    Ok(Json(subspecies))
}

pub async fn create_subspecies<S: Store>(
    _key: ApiKey,
    State(state): State<AppState<S>>,
    RequestJson(new): RequestJson<NewSubspecies>,
) -> HandlerResult<(StatusCode, Json<CreatedResponse>)> {
    let id = state
        .store
        .add_subspecies(Subspecies::from(new))
        .await
        .map_err(store_error)?;
    Ok(created(id))
}

// Items

pub async fn list_items<S: Store>(
    State(state): State<AppState<S>>,
    Query(query): Query<ItemQuery>,
) -> HandlerResult<Json<Vec<Item>>> {
    let filter = query.filter();
    let page = query.page_request(state.api.max_results);

    let items = item_query::get_items(state.store.as_ref(), filter.as_ref(), page)
        .await
        .map_err(store_error)?;
    Ok(Json(items))
}

pub async fn create_item<S: Store>(
    _key: ApiKey,
    State(state): State<AppState<S>>,
    RequestJson(new): RequestJson<NewItem>,
) -> HandlerResult<(StatusCode, Json<CreatedResponse>)> {
    let item = Item::try_from(new).map_err(|e| {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse::new(&e.to_string())),
        )
    })?;

    let id = state.store.add_item(item).await.map_err(store_error)?;
    Ok(created(id))
}

// Studies, samples and slides

#[derive(Debug, Deserialize)]
pub struct StudyQuery {
    pub catalog_id: Id,
}

#[derive(Debug, Deserialize)]
pub struct SampleQuery {
    pub study_id: Id,
}

#[derive(Debug, Deserialize)]
pub struct SlideQuery {
    pub sample_id: Id,
}

pub async fn list_studies<S: Store>(
    State(state): State<AppState<S>>,
    Query(query): Query<StudyQuery>,
) -> HandlerResult<Json<Vec<Study>>> {
    let studies = state
        .store
        .get_studies(&query.catalog_id)
        .await
        .map_err(store_error)?;
    Ok(Json(studies))
}

pub async fn create_study<S: Store>(
    _key: ApiKey,
    State(state): State<AppState<S>>,
    RequestJson(new): RequestJson<NewStudy>,
) -> HandlerResult<(StatusCode, Json<CreatedResponse>)> {
    let id = state
        .store
        .add_study(Study::from(new))
        .await
        .map_err(store_error)?;
    Ok(created(id))
}

pub async fn list_samples<S: Store>(
    State(state): State<AppState<S>>,
    Query(query): Query<SampleQuery>,
) -> HandlerResult<Json<Vec<Sample>>> {
    let samples = state
        .store
        .get_samples(&query.study_id)
        .await
        .map_err(store_error)?;
    Ok(Json(samples))
}

pub async fn create_sample<S: Store>(
    _key: ApiKey,
    State(state): State<AppState<S>>,
    RequestJson(new): RequestJson<NewSample>,
) -> HandlerResult<(StatusCode, Json<CreatedResponse>)> {
    let id = state
        .store
        .add_sample(Sample::from(new))
        .await
        .map_err(store_error)?;
    Ok(created(id))
}

pub async fn list_slides<S: Store>(
    State(state): State<AppState<S>>,
    Query(query): Query<SlideQuery>,
) -> HandlerResult<Json<Vec<Slide>>> {
    let slides = state
        .store
        .get_slides(&query.sample_id)
        .await
        .map_err(store_error)?;
    Ok(Json(slides))
}

pub async fn create_slide<S: Store>(
    _key: ApiKey,
    State(state): State<AppState<S>>,
    RequestJson(new): RequestJson<NewSlide>,
) -> HandlerResult<(StatusCode, Json<CreatedResponse>)> {
    let id = state
        .store
        .add_slide(Slide::from(new))
        .await
        .map_err(store_error)?;
    Ok(created(id))
}
