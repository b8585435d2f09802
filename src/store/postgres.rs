use anyhow::{anyhow, Context, Result};
use sqlx::error::ErrorKind;
use sqlx::postgres::{PgDatabaseError, PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use crate::model::{
    Catalog, Family, FamilyLetterEntry, Genus, GenusLetterEntry, Id, Item, ItemFilter, Sample,
    Slide, Species, Study, Subspecies, TaxonAnchor, TaxonColumns, TaxonRef,
};
use crate::store::traits::{
    CatalogStore, FamilyStore, GenusStore, ItemStore, ProvenanceStore, SpeciesStore,
    SubspeciesStore,
};
use crate::store::{StoreError, StoreResult};

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Create the catalog tables if they are missing
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }
}

/// Turn constraint violations into `KeyViolation`; anything else is a backend failure
fn write_error(err: sqlx::Error, action: &'static str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let integrity = matches!(
            db_err.kind(),
            ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation
        );
        if integrity {
            let detail = match db_err
                .try_downcast_ref::<PgDatabaseError>()
                .and_then(|pg| pg.detail())
            {
                Some(detail) => format!("{} {}", db_err.message(), detail),
                None => db_err.message().to_string(),
            };
            return StoreError::key_violation(detail);
        }
    }
    StoreError::Backend(anyhow::Error::new(err).context(action))
}

/// Escape LIKE wildcards so the prefix is matched literally
fn like_prefix(prefix: &str) -> String {
    let escaped = prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("{escaped}%")
}

fn catalog_from_row(row: &PgRow) -> Catalog {
    Catalog {
        id: row.get("id"),
        name: row.get("name"),
    }
}

fn family_from_row(row: &PgRow) -> Family {
    Family {
        id: row.get("id"),
        name: row.get("name"),
        catalog_id: row.get("catalog_id"),
    }
}

fn genus_from_row(row: &PgRow) -> Genus {
    Genus {
        id: row.get("id"),
        name: row.get("name"),
        family_id: row.get("family_id"),
        is_type: row.get("is_type"),
    }
}

fn species_from_row(row: &PgRow) -> Species {
    Species {
        id: row.get("id"),
        name: row.get("name"),
        genus_id: row.get("genus_id"),
        is_type: row.get("is_type"),
    }
}

fn study_from_row(row: &PgRow) -> Study {
    Study {
        id: row.get("id"),
        description: row.get("description"),
        location: row.get("location"),
        remarks: row.get("remarks"),
        catalog_id: row.get("catalog_id"),
        is_reference: row.get("is_reference"),
    }
}

fn sample_from_row(row: &PgRow) -> Sample {
    Sample {
        id: row.get("id"),
        description: row.get("description"),
        location: row.get("location"),
        age: row.get("age"),
        remarks: row.get("remarks"),
        study_id: row.get("study_id"),
    }
}

fn slide_from_row(row: &PgRow) -> Slide {
    Slide {
        id: row.get("id"),
        description: row.get("description"),
        remarks: row.get("remarks"),
        sample_id: row.get("sample_id"),
    }
}

fn item_from_row(row: &PgRow) -> StoreResult<Item> {
    let id: Id = row.get("id");
    let taxon = TaxonRef::from_columns(TaxonColumns {
        family_id: row.get("family_id"),
        genus_id: row.get("genus_id"),
        species_id: row.get("species_id"),
        subspecies_id: row.get("subspecies_id"),
    })
    .map_err(|e| anyhow!("item {id} has an invalid taxon reference: {e}"))?;

    Ok(Item {
        id,
        key_image: row.get("key_image"),
        taxon,
        comment: row.get("comment"),
        slide_id: row.get("slide_id"),
        voxel_width: row.get("voxel_width"),
    })
}

#[async_trait::async_trait]
impl CatalogStore for PostgresStore {
    async fn get_catalogs(&self) -> StoreResult<Vec<Catalog>> {
        let rows = sqlx::query("SELECT id, name FROM catalog ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list catalogs")?;

        Ok(rows.iter().map(catalog_from_row).collect())
    }

    async fn add_catalog(&self, catalog: Catalog) -> StoreResult<Id> {
        sqlx::query("INSERT INTO catalog (id, name) VALUES ($1, $2)")
            .bind(catalog.id)
            .bind(&catalog.name)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, "Failed to insert catalog"))?;

        Ok(catalog.id)
    }

    async fn update_catalog(&self, catalog: Catalog) -> StoreResult<()> {
        let result = sqlx::query("UPDATE catalog SET name = $2 WHERE id = $1")
            .bind(catalog.id)
            .bind(&catalog.name)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, "Failed to update catalog"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("catalog", catalog.id));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl FamilyStore for PostgresStore {
    async fn get_families(&self, catalog_id: &Id) -> StoreResult<Vec<Family>> {
        let rows = sqlx::query(
            "SELECT id, name, catalog_id FROM family WHERE catalog_id = $1 ORDER BY name",
        )
        .bind(catalog_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list families")?;

        Ok(rows.iter().map(family_from_row).collect())
    }

    async fn add_family(&self, family: Family) -> StoreResult<Id> {
        sqlx::query("INSERT INTO family (id, name, catalog_id) VALUES ($1, $2, $3)")
            .bind(family.id)
            .bind(&family.name)
            .bind(family.catalog_id)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, "Failed to insert family"))?;

        Ok(family.id)
    }

    async fn update_family(&self, family: Family) -> StoreResult<()> {
        let result = sqlx::query("UPDATE family SET name = $2, catalog_id = $3 WHERE id = $1")
            .bind(family.id)
            .bind(&family.name)
            .bind(family.catalog_id)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, "Failed to update family"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("family", family.id));
        }
        Ok(())
    }

    async fn families_by_letter(&self, prefix: &str) -> StoreResult<Vec<FamilyLetterEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT f.id, f.name,
                (SELECT COUNT(*) FROM item i
                  WHERE i.family_id = f.id
                     OR i.genus_id IN (SELECT g.id FROM genus g WHERE g.family_id = f.id)
                     OR i.species_id IN (
                        SELECT s.id FROM species s
                        JOIN genus g ON s.genus_id = g.id
                        WHERE g.family_id = f.id)) AS item_count,
                EXISTS (SELECT 1 FROM item i
                  WHERE i.family_id = f.id
                     OR i.genus_id IN (SELECT g.id FROM genus g WHERE g.family_id = f.id)
                ) AS has_items_without_species
            FROM family f
            WHERE f.name ILIKE $1
            ORDER BY f.name
            "#,
        )
        .bind(like_prefix(prefix))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list families by letter")?;

        Ok(rows
            .iter()
            .map(|row| FamilyLetterEntry {
                id: row.get("id"),
                name: row.get("name"),
                item_count: row.get("item_count"),
                has_items_without_species: row.get("has_items_without_species"),
            })
            .collect())
    }

    async fn count_families(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM family")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count families")?;
        Ok(count)
    }
}

#[async_trait::async_trait]
impl GenusStore for PostgresStore {
    async fn get_genera(&self, family_id: Option<&Id>, include_type: bool) -> StoreResult<Vec<Genus>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, family_id, is_type FROM genus
            WHERE ($1::uuid IS NULL OR family_id = $1)
              AND ($2 OR NOT is_type)
            ORDER BY name
            "#,
        )
        .bind(family_id.copied())
        .bind(include_type)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list genera")?;

        Ok(rows.iter().map(genus_from_row).collect())
    }

    async fn add_genus(&self, genus: Genus) -> StoreResult<Id> {
        sqlx::query("INSERT INTO genus (id, name, family_id, is_type) VALUES ($1, $2, $3, $4)")
            .bind(genus.id)
            .bind(&genus.name)
            .bind(genus.family_id)
            .bind(genus.is_type)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, "Failed to insert genus"))?;

        Ok(genus.id)
    }

    async fn update_genus(&self, genus: Genus) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE genus SET name = $2, family_id = $3, is_type = $4 WHERE id = $1",
        )
        .bind(genus.id)
        .bind(&genus.name)
        .bind(genus.family_id)
        .bind(genus.is_type)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, "Failed to update genus"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("genus", genus.id));
        }
        Ok(())
    }

    async fn genera_by_letter(
        &self,
        prefix: &str,
        include_type: bool,
    ) -> StoreResult<Vec<GenusLetterEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT g.id, g.name, g.family_id, g.is_type,
                (SELECT COUNT(*) FROM item i
                  WHERE i.genus_id = g.id
                     OR i.species_id IN (SELECT s.id FROM species s WHERE s.genus_id = g.id)
                ) AS item_count,
                EXISTS (SELECT 1 FROM item i WHERE i.genus_id = g.id) AS has_items_without_species
            FROM genus g
            WHERE g.name ILIKE $1
              AND ($2 OR NOT g.is_type)
            ORDER BY g.name
            "#,
        )
        .bind(like_prefix(prefix))
        .bind(include_type)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list genera by letter")?;

        Ok(rows
            .iter()
            .map(|row| GenusLetterEntry {
                id: row.get("id"),
                name: row.get("name"),
                family_id: row.get("family_id"),
                is_type: row.get("is_type"),
                item_count: row.get("item_count"),
                has_items_without_species: row.get("has_items_without_species"),
            })
            .collect())
    }

    async fn count_genera(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM genus")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count genera")?;
        Ok(count)
    }
}

#[async_trait::async_trait]
impl SpeciesStore for PostgresStore {
    async fn get_species(&self, genus_id: &Id) -> StoreResult<Vec<Species>> {
        let rows = sqlx::query(
            "SELECT id, name, genus_id, is_type FROM species WHERE genus_id = $1 ORDER BY name",
        )
        .bind(genus_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list species")?;

        Ok(rows.iter().map(species_from_row).collect())
    }

    async fn get_species_for_catalog(&self, catalog_id: &Id) -> StoreResult<Vec<Species>> {
        let rows = sqlx::query(
            r#"
            SELECT s.id, s.name, s.genus_id, s.is_type
            FROM species s
            WHERE s.genus_id IN (
                SELECT g.id FROM genus g
                WHERE g.family_id IN (SELECT f.id FROM family f WHERE f.catalog_id = $1))
            ORDER BY s.name
            "#,
        )
        .bind(catalog_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list species for catalog")?;

        Ok(rows.iter().map(species_from_row).collect())
    }

    async fn add_species(&self, species: Species) -> StoreResult<Id> {
        sqlx::query("INSERT INTO species (id, name, genus_id, is_type) VALUES ($1, $2, $3, $4)")
            .bind(species.id)
            .bind(&species.name)
            .bind(species.genus_id)
            .bind(species.is_type)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, "Failed to insert species"))?;

        Ok(species.id)
    }

    async fn update_species(&self, species: Species) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE species SET name = $2, genus_id = $3, is_type = $4 WHERE id = $1",
        )
        .bind(species.id)
        .bind(&species.name)
        .bind(species.genus_id)
        .bind(species.is_type)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, "Failed to update species"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("species", species.id));
        }
        Ok(())
    }

    async fn count_species(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM species")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count species")?;
        Ok(count)
    }
}

#[async_trait::async_trait]
impl SubspeciesStore for PostgresStore {
    async fn get_subspecies(&self, species_id: &Id) -> StoreResult<Vec<Subspecies>> {
        let rows = sqlx::query(
            "SELECT id, name, species_id FROM subspecies WHERE species_id = $1 ORDER BY name",
        )
        .bind(species_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list subspecies")?;

        Ok(rows
            .iter()
            .map(|row| Subspecies {
                id: row.get("id"),
                name: row.get("name"),
                species_id: row.get("species_id"),
            })
            .collect())
    }

    async fn add_subspecies(&self, subspecies: Subspecies) -> StoreResult<Id> {
        sqlx::query("INSERT INTO subspecies (id, name, species_id) VALUES ($1, $2, $3)")
            .bind(subspecies.id)
            .bind(&subspecies.name)
            .bind(subspecies.species_id)
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, "Failed to insert subspecies"))?;

        Ok(subspecies.id)
    }
}

#[async_trait::async_trait]
impl ProvenanceStore for PostgresStore {
    async fn get_studies(&self, catalog_id: &Id) -> StoreResult<Vec<Study>> {
        let rows = sqlx::query(
            r#"
            SELECT id, description, location, remarks, catalog_id, is_reference
            FROM study WHERE catalog_id = $1
            "#,
        )
        .bind(catalog_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list studies")?;

        Ok(rows.iter().map(study_from_row).collect())
    }

    async fn add_study(&self, study: Study) -> StoreResult<Id> {
        sqlx::query(
            r#"
            INSERT INTO study (id, description, location, remarks, catalog_id, is_reference)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(study.id)
        .bind(&study.description)
        .bind(&study.location)
        .bind(&study.remarks)
        .bind(study.catalog_id)
        .bind(study.is_reference)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, "Failed to insert study"))?;

        Ok(study.id)
    }

    async fn get_samples(&self, study_id: &Id) -> StoreResult<Vec<Sample>> {
        let rows = sqlx::query(
            "SELECT id, description, location, age, remarks, study_id FROM sample WHERE study_id = $1",
        )
        .bind(study_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list samples")?;

        Ok(rows.iter().map(sample_from_row).collect())
    }

    async fn add_sample(&self, sample: Sample) -> StoreResult<Id> {
        sqlx::query(
            r#"
            INSERT INTO sample (id, description, location, age, remarks, study_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(sample.id)
        .bind(&sample.description)
        .bind(&sample.location)
        .bind(&sample.age)
        .bind(&sample.remarks)
        .bind(sample.study_id)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, "Failed to insert sample"))?;

        Ok(sample.id)
    }

    async fn get_slides(&self, sample_id: &Id) -> StoreResult<Vec<Slide>> {
        let rows = sqlx::query(
            "SELECT id, description, remarks, sample_id FROM slide WHERE sample_id = $1",
        )
        .bind(sample_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list slides")?;

        Ok(rows.iter().map(slide_from_row).collect())
    }

    async fn add_slide(&self, slide: Slide) -> StoreResult<Id> {
        sqlx::query(
            "INSERT INTO slide (id, description, remarks, sample_id) VALUES ($1, $2, $3, $4)",
        )
        .bind(slide.id)
        .bind(&slide.description)
        .bind(&slide.remarks)
        .bind(slide.sample_id)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, "Failed to insert slide"))?;

        Ok(slide.id)
    }
}

#[async_trait::async_trait]
impl ItemStore for PostgresStore {
    async fn add_item(&self, item: Item) -> StoreResult<Id> {
        let columns = item.taxon.columns();
        sqlx::query(
            r#"
            INSERT INTO item (id, key_image, family_id, genus_id, species_id, subspecies_id,
                              comment, slide_id, voxel_width)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(item.id)
        .bind(&item.key_image)
        .bind(columns.family_id)
        .bind(columns.genus_id)
        .bind(columns.species_id)
        .bind(columns.subspecies_id)
        .bind(&item.comment)
        .bind(item.slide_id)
        .bind(item.voxel_width)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, "Failed to insert item"))?;

        Ok(item.id)
    }

    async fn find_item_ids(&self, filter: &ItemFilter) -> StoreResult<Vec<Id>> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT i.id FROM item i WHERE ");

        match filter.anchor {
            TaxonAnchor::Species(id) => {
                query.push("i.species_id = ").push_bind(id);
            }
            TaxonAnchor::Genus(id) => {
                query
                    .push("(i.genus_id = ")
                    .push_bind(id)
                    .push(" OR i.species_id IN (SELECT s.id FROM species s WHERE s.genus_id = ")
                    .push_bind(id)
                    .push("))");
            }
            TaxonAnchor::Family(id) => {
                query
                    .push("(i.family_id = ")
                    .push_bind(id)
                    .push(" OR i.genus_id IN (SELECT g.id FROM genus g WHERE g.family_id = ")
                    .push_bind(id)
                    .push(") OR i.species_id IN (SELECT s.id FROM species s JOIN genus g ON s.genus_id = g.id WHERE g.family_id = ")
                    .push_bind(id)
                    .push("))");
            }
        }

        if let Some(genus_id) = filter.excluded_type_genus() {
            query
                .push(" AND NOT EXISTS (SELECT 1 FROM genus tg WHERE tg.id = ")
                .push_bind(genus_id)
                .push(" AND tg.is_type)");
        }
        if let Some(species_id) = filter.excluded_type_species() {
            query
                .push(" AND NOT EXISTS (SELECT 1 FROM species ts WHERE ts.id = ")
                .push_bind(species_id)
                .push(" AND ts.is_type)");
        }
        if filter.reference_only {
            query.push(
                " AND i.slide_id IN (SELECT sl.id FROM slide sl \
                 JOIN sample sa ON sl.sample_id = sa.id \
                 JOIN study st ON sa.study_id = st.id \
                 WHERE st.is_reference)",
            );
        }

        let ids = query
            .build_query_scalar::<Id>()
            .fetch_all(&self.pool)
            .await
            .context("Failed to query item ids")?;
        Ok(ids)
    }

    async fn get_items_by_ids(&self, ids: &[Id]) -> StoreResult<Vec<Item>> {
        let rows = sqlx::query(
            r#"
            SELECT id, key_image, family_id, genus_id, species_id, subspecies_id,
                   comment, slide_id, voxel_width
            FROM item WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch items")?;

        rows.iter().map(item_from_row).collect()
    }
}
