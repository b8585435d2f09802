use itertools::Itertools;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};

use crate::model::{
    Catalog, Family, FamilyLetterEntry, Genus, GenusLetterEntry, Id, Item, ItemFilter, Sample,
    Slide, Species, Study, Subspecies, TaxonAnchor, TaxonRef,
};
use crate::store::traits::{
    CatalogStore, FamilyStore, GenusStore, ItemStore, ProvenanceStore, SpeciesStore,
    SubspeciesStore,
};
use crate::store::{StoreError, StoreResult};

#[derive(Debug, Default)]
struct Tables {
    catalogs: BTreeMap<Id, Catalog>,
    families: BTreeMap<Id, Family>,
    genera: BTreeMap<Id, Genus>,
    species: BTreeMap<Id, Species>,
    subspecies: BTreeMap<Id, Subspecies>,
    studies: BTreeMap<Id, Study>,
    samples: BTreeMap<Id, Sample>,
    slides: BTreeMap<Id, Slide>,
    items: BTreeMap<Id, Item>,
}

/// In-process store with the same constraint behavior as the Postgres schema.
///
/// Every operation takes the table lock once, so writes are all-or-nothing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn ensure_new_id<T>(rows: &BTreeMap<Id, T>, id: &Id, table: &str) -> StoreResult<()> {
    if rows.contains_key(id) {
        return Err(StoreError::key_violation(format!(
            "duplicate key value violates unique constraint \"{table}_pkey\" (id)=({id}) already exists"
        )));
    }
    Ok(())
}

fn ensure_unique_name<'a>(
    mut names: impl Iterator<Item = (&'a Id, &'a str)>,
    id: &Id,
    name: &str,
    table: &str,
) -> StoreResult<()> {
    if names.any(|(other_id, other_name)| other_id != id && other_name == name) {
        return Err(StoreError::key_violation(format!(
            "duplicate key value violates unique constraint \"{table}_name_key\" (name)=({name}) already exists"
        )));
    }
    Ok(())
}

fn ensure_parent<T>(rows: &BTreeMap<Id, T>, id: &Id, table: &str, column: &str) -> StoreResult<()> {
    if !rows.contains_key(id) {
        return Err(StoreError::key_violation(format!(
            "insert or update on table \"{table}\" violates foreign key constraint \"{table}_{column}_fkey\" ({column})=({id}) is not present"
        )));
    }
    Ok(())
}

fn has_prefix(name: &str, prefix: &str) -> bool {
    name.to_lowercase().starts_with(&prefix.to_lowercase())
}

impl Tables {
    fn species_of_genera(&self, genera: &HashSet<Id>) -> HashSet<Id> {
        self.species
            .values()
            .filter(|species| genera.contains(&species.genus_id))
            .map(|species| species.id)
            .collect()
    }

    fn genera_of_family(&self, family_id: &Id) -> HashSet<Id> {
        self.genera
            .values()
            .filter(|genus| &genus.family_id == family_id)
            .map(|genus| genus.id)
            .collect()
    }

    fn slide_is_reference(&self, slide_id: &Id) -> bool {
        self.slides
            .get(slide_id)
            .and_then(|slide| self.samples.get(&slide.sample_id))
            .and_then(|sample| self.studies.get(&sample.study_id))
            .map(|study| study.is_reference)
            .unwrap_or(false)
    }

    fn items_under_genera<'a>(
        &'a self,
        genera: &'a HashSet<Id>,
        species: &'a HashSet<Id>,
    ) -> impl Iterator<Item = &'a Item> + 'a {
        self.items.values().filter(move |item| match item.taxon {
            TaxonRef::Genus(id) => genera.contains(&id),
            TaxonRef::Species(id) => species.contains(&id),
            _ => false,
        })
    }
}

#[async_trait::async_trait]
impl CatalogStore for MemoryStore {
    async fn get_catalogs(&self) -> StoreResult<Vec<Catalog>> {
        let tables = self.tables.read();
        Ok(tables
            .catalogs
            .values()
            .cloned()
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .collect())
    }

    async fn add_catalog(&self, catalog: Catalog) -> StoreResult<Id> {
        let mut tables = self.tables.write();
        ensure_new_id(&tables.catalogs, &catalog.id, "catalog")?;
        ensure_unique_name(
            tables.catalogs.values().map(|c| (&c.id, c.name.as_str())),
            &catalog.id,
            &catalog.name,
            "catalog",
        )?;
        let id = catalog.id;
        tables.catalogs.insert(id, catalog);
        Ok(id)
    }

    async fn update_catalog(&self, catalog: Catalog) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if !tables.catalogs.contains_key(&catalog.id) {
            return Err(StoreError::not_found("catalog", catalog.id));
        }
        ensure_unique_name(
            tables.catalogs.values().map(|c| (&c.id, c.name.as_str())),
            &catalog.id,
            &catalog.name,
            "catalog",
        )?;
        tables.catalogs.insert(catalog.id, catalog);
        Ok(())
    }
}

#[async_trait::async_trait]
impl FamilyStore for MemoryStore {
    async fn get_families(&self, catalog_id: &Id) -> StoreResult<Vec<Family>> {
        let tables = self.tables.read();
        Ok(tables
            .families
            .values()
            .filter(|family| &family.catalog_id == catalog_id)
            .cloned()
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .collect())
    }

    async fn add_family(&self, family: Family) -> StoreResult<Id> {
        let mut tables = self.tables.write();
        ensure_new_id(&tables.families, &family.id, "family")?;
        ensure_unique_name(
            tables.families.values().map(|f| (&f.id, f.name.as_str())),
            &family.id,
            &family.name,
            "family",
        )?;
        ensure_parent(&tables.catalogs, &family.catalog_id, "family", "catalog_id")?;
        let id = family.id;
        tables.families.insert(id, family);
        Ok(id)
    }

    async fn update_family(&self, family: Family) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if !tables.families.contains_key(&family.id) {
            return Err(StoreError::not_found("family", family.id));
        }
        ensure_unique_name(
            tables.families.values().map(|f| (&f.id, f.name.as_str())),
            &family.id,
            &family.name,
            "family",
        )?;
        ensure_parent(&tables.catalogs, &family.catalog_id, "family", "catalog_id")?;
        tables.families.insert(family.id, family);
        Ok(())
    }

    async fn families_by_letter(&self, prefix: &str) -> StoreResult<Vec<FamilyLetterEntry>> {
        let tables = self.tables.read();
        let entries = tables
            .families
            .values()
            .filter(|family| has_prefix(&family.name, prefix))
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .map(|family| {
                let genera = tables.genera_of_family(&family.id);
                let species = tables.species_of_genera(&genera);
                let direct = tables
                    .items
                    .values()
                    .filter(|item| item.taxon == TaxonRef::Family(family.id))
                    .count();
                let under_genera: Vec<&Item> =
                    tables.items_under_genera(&genera, &species).collect();
                let on_genera = under_genera
                    .iter()
                    .filter(|item| matches!(item.taxon, TaxonRef::Genus(_)))
                    .count();

                FamilyLetterEntry {
                    id: family.id,
                    name: family.name.clone(),
                    item_count: (direct + under_genera.len()) as i64,
                    has_items_without_species: direct + on_genera > 0,
                }
            })
            .collect();
        Ok(entries)
    }

    async fn count_families(&self) -> StoreResult<i64> {
        Ok(self.tables.read().families.len() as i64)
    }
}

#[async_trait::async_trait]
impl GenusStore for MemoryStore {
    async fn get_genera(&self, family_id: Option<&Id>, include_type: bool) -> StoreResult<Vec<Genus>> {
        let tables = self.tables.read();
        Ok(tables
            .genera
            .values()
            .filter(|genus| family_id.map_or(true, |id| &genus.family_id == id))
            .filter(|genus| include_type || !genus.is_type)
            .cloned()
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .collect())
    }

    async fn add_genus(&self, genus: Genus) -> StoreResult<Id> {
        let mut tables = self.tables.write();
        ensure_new_id(&tables.genera, &genus.id, "genus")?;
        ensure_unique_name(
            tables.genera.values().map(|g| (&g.id, g.name.as_str())),
            &genus.id,
            &genus.name,
            "genus",
        )?;
        ensure_parent(&tables.families, &genus.family_id, "genus", "family_id")?;
        let id = genus.id;
        tables.genera.insert(id, genus);
        Ok(id)
    }

    async fn update_genus(&self, genus: Genus) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if !tables.genera.contains_key(&genus.id) {
            return Err(StoreError::not_found("genus", genus.id));
        }
        ensure_unique_name(
            tables.genera.values().map(|g| (&g.id, g.name.as_str())),
            &genus.id,
            &genus.name,
            "genus",
        )?;
        ensure_parent(&tables.families, &genus.family_id, "genus", "family_id")?;
        tables.genera.insert(genus.id, genus);
        Ok(())
    }

    async fn genera_by_letter(
        &self,
        prefix: &str,
        include_type: bool,
    ) -> StoreResult<Vec<GenusLetterEntry>> {
        let tables = self.tables.read();
        let entries = tables
            .genera
            .values()
            .filter(|genus| has_prefix(&genus.name, prefix))
            .filter(|genus| include_type || !genus.is_type)
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .map(|genus| {
                let genera = HashSet::from([genus.id]);
                let species = tables.species_of_genera(&genera);
                let items: Vec<&Item> = tables.items_under_genera(&genera, &species).collect();

                GenusLetterEntry {
                    id: genus.id,
                    name: genus.name.clone(),
                    family_id: genus.family_id,
                    is_type: genus.is_type,
                    item_count: items.len() as i64,
                    has_items_without_species: items
                        .iter()
                        .any(|item| item.taxon == TaxonRef::Genus(genus.id)),
                }
            })
            .collect();
        Ok(entries)
    }

    async fn count_genera(&self) -> StoreResult<i64> {
        Ok(self.tables.read().genera.len() as i64)
    }
}

#[async_trait::async_trait]
impl SpeciesStore for MemoryStore {
    async fn get_species(&self, genus_id: &Id) -> StoreResult<Vec<Species>> {
        let tables = self.tables.read();
        Ok(tables
            .species
            .values()
            .filter(|species| &species.genus_id == genus_id)
            .cloned()
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .collect())
    }

    async fn get_species_for_catalog(&self, catalog_id: &Id) -> StoreResult<Vec<Species>> {
        let tables = self.tables.read();
        let genera: HashSet<Id> = tables
            .families
            .values()
            .filter(|family| &family.catalog_id == catalog_id)
            .flat_map(|family| tables.genera_of_family(&family.id))
            .collect();

        Ok(tables
            .species
            .values()
            .filter(|species| genera.contains(&species.genus_id))
            .cloned()
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .collect())
    }

    async fn add_species(&self, species: Species) -> StoreResult<Id> {
        let mut tables = self.tables.write();
        ensure_new_id(&tables.species, &species.id, "species")?;
        ensure_unique_name(
            tables.species.values().map(|s| (&s.id, s.name.as_str())),
            &species.id,
            &species.name,
            "species",
        )?;
        ensure_parent(&tables.genera, &species.genus_id, "species", "genus_id")?;
        let id = species.id;
        tables.species.insert(id, species);
        Ok(id)
    }

    async fn update_species(&self, species: Species) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if !tables.species.contains_key(&species.id) {
            return Err(StoreError::not_found("species", species.id));
        }
        ensure_unique_name(
            tables.species.values().map(|s| (&s.id, s.name.as_str())),
            &species.id,
            &species.name,
            "species",
        )?;
        ensure_parent(&tables.genera, &species.genus_id, "species", "genus_id")?;
        tables.species.insert(species.id, species);
        Ok(())
    }

    async fn count_species(&self) -> StoreResult<i64> {
        Ok(self.tables.read().species.len() as i64)
    }
}

#[async_trait::async_trait]
impl SubspeciesStore for MemoryStore {
    async fn get_subspecies(&self, species_id: &Id) -> StoreResult<Vec<Subspecies>> {
        let tables = self.tables.read();
        Ok(tables
            .subspecies
            .values()
            .filter(|subspecies| &subspecies.species_id == species_id)
            .cloned()
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .collect())
    }

    async fn add_subspecies(&self, subspecies: Subspecies) -> StoreResult<Id> {
        let mut tables = self.tables.write();
        ensure_new_id(&tables.subspecies, &subspecies.id, "subspecies")?;
        ensure_unique_name(
            tables.subspecies.values().map(|s| (&s.id, s.name.as_str())),
            &subspecies.id,
            &subspecies.name,
            "subspecies",
        )?;
        ensure_parent(&tables.species, &subspecies.species_id, "subspecies", "species_id")?;
        let id = subspecies.id;
        tables.subspecies.insert(id, subspecies);
        Ok(id)
    }
}

#[async_trait::async_trait]
impl ProvenanceStore for MemoryStore {
    async fn get_studies(&self, catalog_id: &Id) -> StoreResult<Vec<Study>> {
        let tables = self.tables.read();
        Ok(tables
            .studies
            .values()
            .filter(|study| &study.catalog_id == catalog_id)
            .cloned()
            .collect())
    }

    async fn add_study(&self, study: Study) -> StoreResult<Id> {
        let mut tables = self.tables.write();
        ensure_new_id(&tables.studies, &study.id, "study")?;
        ensure_parent(&tables.catalogs, &study.catalog_id, "study", "catalog_id")?;
        let id = study.id;
        tables.studies.insert(id, study);
        Ok(id)
    }

    async fn get_samples(&self, study_id: &Id) -> StoreResult<Vec<Sample>> {
        let tables = self.tables.read();
        Ok(tables
            .samples
            .values()
            .filter(|sample| &sample.study_id == study_id)
            .cloned()
            .collect())
    }

    async fn add_sample(&self, sample: Sample) -> StoreResult<Id> {
        let mut tables = self.tables.write();
        ensure_new_id(&tables.samples, &sample.id, "sample")?;
        ensure_parent(&tables.studies, &sample.study_id, "sample", "study_id")?;
        let id = sample.id;
        tables.samples.insert(id, sample);
        Ok(id)
    }

    async fn get_slides(&self, sample_id: &Id) -> StoreResult<Vec<Slide>> {
        let tables = self.tables.read();
        Ok(tables
            .slides
            .values()
            .filter(|slide| &slide.sample_id == sample_id)
            .cloned()
            .collect())
    }

    async fn add_slide(&self, slide: Slide) -> StoreResult<Id> {
        let mut tables = self.tables.write();
        ensure_new_id(&tables.slides, &slide.id, "slide")?;
        ensure_parent(&tables.samples, &slide.sample_id, "slide", "sample_id")?;
        let id = slide.id;
        tables.slides.insert(id, slide);
        Ok(id)
    }
}

#[async_trait::async_trait]
impl ItemStore for MemoryStore {
    async fn add_item(&self, item: Item) -> StoreResult<Id> {
        let mut tables = self.tables.write();
        ensure_new_id(&tables.items, &item.id, "item")?;
        ensure_parent(&tables.slides, &item.slide_id, "item", "slide_id")?;
        match &item.taxon {
            TaxonRef::Family(id) => ensure_parent(&tables.families, id, "item", "family_id")?,
            TaxonRef::Genus(id) => ensure_parent(&tables.genera, id, "item", "genus_id")?,
            TaxonRef::Species(id) => ensure_parent(&tables.species, id, "item", "species_id")?,
            TaxonRef::Subspecies(id) => {
                ensure_parent(&tables.subspecies, id, "item", "subspecies_id")?
            }
        }
        let id = item.id;
        tables.items.insert(id, item);
        Ok(id)
    }

    async fn find_item_ids(&self, filter: &ItemFilter) -> StoreResult<Vec<Id>> {
        let tables = self.tables.read();

        let excluded_genus = filter
            .excluded_type_genus()
            .and_then(|id| tables.genera.get(&id))
            .map_or(false, |genus| genus.is_type);
        let excluded_species = filter
            .excluded_type_species()
            .and_then(|id| tables.species.get(&id))
            .map_or(false, |species| species.is_type);
        if excluded_genus || excluded_species {
            return Ok(Vec::new());
        }

        let (family, genera) = match filter.anchor {
            TaxonAnchor::Species(species_id) => {
                let ids = tables
                    .items
                    .values()
                    .filter(|item| item.taxon == TaxonRef::Species(species_id))
                    .filter(|item| !filter.reference_only || tables.slide_is_reference(&item.slide_id))
                    .map(|item| item.id)
                    .collect();
                return Ok(ids);
            }
            TaxonAnchor::Genus(genus_id) => (None, HashSet::from([genus_id])),
            TaxonAnchor::Family(family_id) => (Some(family_id), tables.genera_of_family(&family_id)),
        };
        let species = tables.species_of_genera(&genera);

        let ids = tables
            .items
            .values()
            .filter(|item| match item.taxon {
                TaxonRef::Family(id) => family == Some(id),
                TaxonRef::Genus(id) => genera.contains(&id),
                TaxonRef::Species(id) => species.contains(&id),
                TaxonRef::Subspecies(_) => false,
            })
            .filter(|item| !filter.reference_only || tables.slide_is_reference(&item.slide_id))
            .map(|item| item.id)
            .collect();
        Ok(ids)
    }

    async fn get_items_by_ids(&self, ids: &[Id]) -> StoreResult<Vec<Item>> {
        let tables = self.tables.read();
        Ok(ids
            .iter()
            .filter_map(|id| tables.items.get(id))
            .cloned()
            .collect())
    }
}
