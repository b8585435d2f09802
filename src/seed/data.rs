use crate::model::{
    Catalog, Family, Genus, Id, Item, Sample, Slide, Species, Study, Subspecies, TaxonRef,
};
use crate::store::traits::Store;
use anyhow::{Context, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};

const DEMO_SEED: u64 = 88;
const DEMO_CATALOG: &str = "Pollen reference collection";

const FAMILIES: &[&str] = &[
    "Acanthaceae", "Achariaceae", "Aizoaceae", "Akaniaceae", "Alismataceae", "Altingiaceae",
    "Amaranthaceae", "Annonaceae", "Apiaceae", "Apocynaceae", "Aspleniaceae", "Betulaceae",
    "Bignoniaceae", "Bixaceae", "Boraginaceae", "Calycanthaceae", "Campanulaceae",
    "Cannabaceae", "Cannaceae", "Capparaceae", "Caprifoliaceae", "Caryophyllaceae",
    "Casuarinaceae", "Celastraceae", "Cistaceae", "Clethraceae",
];

/// Genera per family, the first of each list flagged as the family's type genus
const GENERA: &[(&str, &[&str])] = &[
    (
        "Cannabaceae",
        &["Celtis", "Aphananthe", "Cannabis", "Gironniera", "Humulus", "Lozanella", "Pteroceltis", "Trema"],
    ),
    ("Akaniaceae", &["Akania", "Bretschneidera"]),
    ("Betulaceae", &["Betula", "Alnus", "Carpinus", "Corylus"]),
];

/// Species per genus, the first of each list flagged as the genus' type species
const SPECIES: &[(&str, &[&str])] = &[
    ("Humulus", &["Humulus lupulus", "Humulus scandens"]),
    ("Cannabis", &["Cannabis sativa"]),
    ("Celtis", &["Celtis australis", "Celtis occidentalis"]),
    ("Betula", &["Betula pendula", "Betula pubescens", "Betula nana"]),
    ("Alnus", &["Alnus glutinosa", "Alnus incana"]),
];

/// Deterministic ids so repeated demo loads produce the same keys
struct IdSource {
    rng: StdRng,
}

impl IdSource {
    fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn next(&mut self) -> Id {
        uuid::Builder::from_random_bytes(self.rng.gen()).into_uuid()
    }
}

/// Summary of what a demo load inserted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub catalog_id: Id,
    pub families: usize,
    pub genera: usize,
    pub species: usize,
    pub items: usize,
}

/// Load a small pollen catalog for demonstration.
///
/// Skipped when the demo catalog already exists, so restarting against a
/// persistent database leaves earlier data untouched. The returned summary
/// then counts nothing as inserted.
pub async fn load_seed_data<S: Store + ?Sized>(store: &S) -> Result<SeedSummary> {
    let existing = store
        .get_catalogs()
        .await
        .context("Failed to look up demo catalog")?
        .into_iter()
        .find(|catalog| catalog.name == DEMO_CATALOG);
    if let Some(catalog) = existing {
        log::info!("Demo catalog {} already exists - skipping seed data", catalog.id);
        return Ok(SeedSummary {
            catalog_id: catalog.id,
            ..SeedSummary::default()
        });
    }

    let mut ids = IdSource::new(DEMO_SEED);
    let mut summary = SeedSummary::default();

    let catalog_id = store
        .add_catalog(Catalog {
            id: ids.next(),
            name: DEMO_CATALOG.to_string(),
        })
        .await
        .context("Failed to create demo catalog")?;
    summary.catalog_id = catalog_id;

    let mut family_ids = Vec::with_capacity(FAMILIES.len());
    for name in FAMILIES {
        let id = store
            .add_family(Family {
                id: ids.next(),
                name: name.to_string(),
                catalog_id,
            })
            .await
            .with_context(|| format!("Failed to create family {}", name))?;
        family_ids.push((*name, id));
        summary.families += 1;
    }

    let mut genus_ids = Vec::new();
    for (family_name, genera) in GENERA {
        let family_id = lookup(&family_ids, family_name)?;
        for (index, name) in genera.iter().enumerate() {
            let id = store
                .add_genus(Genus {
                    id: ids.next(),
                    name: name.to_string(),
                    family_id,
                    is_type: index == 0,
                })
                .await
                .with_context(|| format!("Failed to create genus {}", name))?;
            genus_ids.push((*name, id));
            summary.genera += 1;
        }
    }

    let mut species_ids = Vec::new();
    for (genus_name, species) in SPECIES {
        let genus_id = lookup(&genus_ids, genus_name)?;
        for (index, name) in species.iter().enumerate() {
            let id = store
                .add_species(Species {
                    id: ids.next(),
                    name: name.to_string(),
                    genus_id,
                    is_type: index == 0,
                })
                .await
                .with_context(|| format!("Failed to create species {}", name))?;
            species_ids.push((*name, id));
            summary.species += 1;
        }
    }

    let betula_pendula = lookup(&species_ids, "Betula pendula")?;
    store
        .add_subspecies(Subspecies {
            id: ids.next(),
            name: "Betula pendula subsp. mandshurica".to_string(),
            species_id: betula_pendula,
        })
        .await
        .context("Failed to create demo subspecies")?;

    let reference_slide = add_slide_chain(store, &mut ids, catalog_id, true, "Herbarium reference").await?;
    let field_slide = add_slide_chain(store, &mut ids, catalog_id, false, "Lake core").await?;

    let taxa = [
        TaxonRef::Family(lookup(&family_ids, "Cannabaceae")?),
        TaxonRef::Genus(lookup(&genus_ids, "Humulus")?),
        TaxonRef::Genus(lookup(&genus_ids, "Celtis")?),
        TaxonRef::Species(lookup(&species_ids, "Humulus lupulus")?),
        TaxonRef::Species(lookup(&species_ids, "Cannabis sativa")?),
        TaxonRef::Family(lookup(&family_ids, "Betulaceae")?),
        TaxonRef::Genus(lookup(&genus_ids, "Alnus")?),
        TaxonRef::Species(lookup(&species_ids, "Betula pendula")?),
        TaxonRef::Species(lookup(&species_ids, "Betula pubescens")?),
    ];
    for (index, taxon) in taxa.into_iter().enumerate() {
        let slide_id = if index % 3 == 0 { field_slide } else { reference_slide };
        store
            .add_item(Item {
                id: ids.next(),
                key_image: format!("demo/{:03}.png", index),
                taxon,
                comment: None,
                slide_id,
                voxel_width: 0.25,
            })
            .await
            .context("Failed to create demo item")?;
        summary.items += 1;
    }

    log::info!(
        "Loaded demo catalog {} with {} families, {} genera, {} species and {} items",
        catalog_id,
        summary.families,
        summary.genera,
        summary.species,
        summary.items
    );
    Ok(summary)
}

async fn add_slide_chain<S: Store + ?Sized>(
    store: &S,
    ids: &mut IdSource,
    catalog_id: Id,
    is_reference: bool,
    description: &str,
) -> Result<Id> {
    let study_id = store
        .add_study(Study {
            id: ids.next(),
            description: Some(description.to_string()),
            location: None,
            remarks: None,
            catalog_id,
            is_reference,
        })
        .await
        .context("Failed to create demo study")?;
    let sample_id = store
        .add_sample(Sample {
            id: ids.next(),
            description: None,
            location: None,
            age: None,
            remarks: None,
            study_id,
        })
        .await
        .context("Failed to create demo sample")?;
    let slide_id = store
        .add_slide(Slide {
            id: ids.next(),
            description: None,
            remarks: None,
            sample_id,
        })
        .await
        .context("Failed to create demo slide")?;
    Ok(slide_id)
}

fn lookup(entries: &[(&str, Id)], name: &str) -> Result<Id> {
    entries
        .iter()
        .find(|(entry, _)| *entry == name)
        .map(|(_, id)| *id)
        .with_context(|| format!("Demo data references unknown taxon {}", name))
}
