use crate::model::Id;
use serde::{de, Deserialize, Deserializer};
use std::fmt::Display;
use std::str::FromStr;

/// Taxonomic scope of an item query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxonAnchor {
    Family(Id),
    Genus(Id),
    Species(Id),
}

impl TaxonAnchor {
    /// Pick the anchor from the optional ids; species wins over genus, genus over family
    pub fn resolve(species_id: Option<Id>, genus_id: Option<Id>, family_id: Option<Id>) -> Option<Self> {
        species_id
            .map(TaxonAnchor::Species)
            .or(genus_id.map(TaxonAnchor::Genus))
            .or(family_id.map(TaxonAnchor::Family))
    }
}

/// Ownership and inclusion rules for one item query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemFilter {
    pub anchor: TaxonAnchor,
    pub reference_only: bool,
    pub include_genus_type: bool,
    pub include_species_type: bool,
}

impl ItemFilter {
    pub fn new(anchor: TaxonAnchor) -> Self {
        Self {
            anchor,
            reference_only: false,
            include_genus_type: true,
            include_species_type: true,
        }
    }

    pub fn reference_only(mut self, reference_only: bool) -> Self {
        self.reference_only = reference_only;
        self
    }

    pub fn include_genus_type(mut self, include: bool) -> Self {
        self.include_genus_type = include;
        self
    }

    pub fn include_species_type(mut self, include: bool) -> Self {
        self.include_species_type = include;
        self
    }

    /// Genus anchor whose genus must not be a type genus.
    /// Reference-only queries never apply the type flags.
    pub fn excluded_type_genus(&self) -> Option<Id> {
        match self.anchor {
            TaxonAnchor::Genus(id) if !self.reference_only && !self.include_genus_type => Some(id),
            _ => None,
        }
    }

    /// Species anchor whose species must not be a type species
    pub fn excluded_type_species(&self) -> Option<Id> {
        match self.anchor {
            TaxonAnchor::Species(id) if !self.reference_only && !self.include_species_type => {
                Some(id)
            }
            _ => None,
        }
    }
}

/// Page of a result list, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub max_results: usize,
}

impl PageRequest {
    /// `max_results` is clamped to `ceiling`; page 0 is read as page 1
    pub fn new(page: Option<usize>, max_results: Option<usize>, ceiling: usize) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            max_results: max_results.unwrap_or(ceiling).min(ceiling),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.max_results)
    }
}

fn default_true() -> bool {
    true
}

/// Read a blank query parameter (`?family_id=`) as absent
fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse().map(Some).map_err(de::Error::custom),
        _ => Ok(None),
    }
}

/// Query string of `GET /items/`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ItemQuery {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub family_id: Option<Id>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub genus_id: Option<Id>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub species_id: Option<Id>,
    #[serde(default = "default_true")]
    pub include_genus_type: bool,
    #[serde(default = "default_true")]
    pub include_species_type: bool,
    #[serde(default)]
    pub reference_only: bool,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub max_results: Option<usize>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub page: Option<usize>,
}

impl ItemQuery {
    pub fn filter(&self) -> Option<ItemFilter> {
        let anchor = TaxonAnchor::resolve(self.species_id, self.genus_id, self.family_id)?;
        Some(
            ItemFilter::new(anchor)
                .reference_only(self.reference_only)
                .include_genus_type(self.include_genus_type)
                .include_species_type(self.include_species_type),
        )
    }

    pub fn page_request(&self, ceiling: usize) -> PageRequest {
        PageRequest::new(self.page, self.max_results, ceiling)
    }
}
