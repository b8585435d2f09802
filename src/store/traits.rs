use crate::model::{
    Catalog, Family, FamilyLetterEntry, Genus, GenusLetterEntry, Id, Item, ItemFilter, Sample,
    Slide, Species, Study, Subspecies,
};
use crate::store::StoreResult;

#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_catalogs(&self) -> StoreResult<Vec<Catalog>>;
    async fn add_catalog(&self, catalog: Catalog) -> StoreResult<Id>;
    async fn update_catalog(&self, catalog: Catalog) -> StoreResult<()>;
}

#[async_trait::async_trait]
pub trait FamilyStore: Send + Sync {
    /// Families of a catalog ordered by name
    async fn get_families(&self, catalog_id: &Id) -> StoreResult<Vec<Family>>;
    async fn add_family(&self, family: Family) -> StoreResult<Id>;
    async fn update_family(&self, family: Family) -> StoreResult<()>;
    /// Families whose name starts with `prefix`, case-insensitive
    async fn families_by_letter(&self, prefix: &str) -> StoreResult<Vec<FamilyLetterEntry>>;
    async fn count_families(&self) -> StoreResult<i64>;
}

#[async_trait::async_trait]
pub trait GenusStore: Send + Sync {
    /// Genera of a family, or every genus when `family_id` is `None`, ordered by name
    async fn get_genera(&self, family_id: Option<&Id>, include_type: bool) -> StoreResult<Vec<Genus>>;
    async fn add_genus(&self, genus: Genus) -> StoreResult<Id>;
    async fn update_genus(&self, genus: Genus) -> StoreResult<()>;
    async fn genera_by_letter(
        &self,
        prefix: &str,
        include_type: bool,
    ) -> StoreResult<Vec<GenusLetterEntry>>;
    async fn count_genera(&self) -> StoreResult<i64>;
}

#[async_trait::async_trait]
pub trait SpeciesStore: Send + Sync {
    async fn get_species(&self, genus_id: &Id) -> StoreResult<Vec<Species>>;
    /// Species reachable from a catalog through family and genus
    async fn get_species_for_catalog(&self, catalog_id: &Id) -> StoreResult<Vec<Species>>;
    async fn add_species(&self, species: Species) -> StoreResult<Id>;
    async fn update_species(&self, species: Species) -> StoreResult<()>;
    async fn count_species(&self) -> StoreResult<i64>;
}

#[async_trait::async_trait]
pub trait SubspeciesStore: Send + Sync {
    async fn get_subspecies(&self, species_id: &Id) -> StoreResult<Vec<Subspecies>>;
    async fn add_subspecies(&self, subspecies: Subspecies) -> StoreResult<Id>;
}

/// Studies, samples and slides: where an item image came from
#[async_trait::async_trait]
pub trait ProvenanceStore: Send + Sync {
    async fn get_studies(&self, catalog_id: &Id) -> StoreResult<Vec<Study>>;
    async fn add_study(&self, study: Study) -> StoreResult<Id>;
    async fn get_samples(&self, study_id: &Id) -> StoreResult<Vec<Sample>>;
    async fn add_sample(&self, sample: Sample) -> StoreResult<Id>;
    async fn get_slides(&self, sample_id: &Id) -> StoreResult<Vec<Slide>>;
    async fn add_slide(&self, slide: Slide) -> StoreResult<Id>;
}

#[async_trait::async_trait]
pub trait ItemStore: Send + Sync {
    async fn add_item(&self, item: Item) -> StoreResult<Id>;
    /// Ids of every item owned by the filter's anchor, in no particular order
    async fn find_item_ids(&self, filter: &ItemFilter) -> StoreResult<Vec<Id>>;
    /// Full rows for `ids`; the order of the returned rows is unspecified
    async fn get_items_by_ids(&self, ids: &[Id]) -> StoreResult<Vec<Item>>;
}

pub trait Store:
    CatalogStore
    + FamilyStore
    + GenusStore
    + SpeciesStore
    + SubspeciesStore
    + ProvenanceStore
    + ItemStore
    + Send
    + Sync
{
}

impl<T> Store for T where
    T: CatalogStore
        + FamilyStore
        + GenusStore
        + SpeciesStore
        + SubspeciesStore
        + ProvenanceStore
        + ItemStore
        + Send
        + Sync
{
}
