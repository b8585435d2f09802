use crate::model::{id_or_generate, Id};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The single taxonomic level an item is anchored to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaxonRef {
    Family(Id),
    Genus(Id),
    Species(Id),
    Subspecies(Id),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaxonError {
    #[error("an item must reference one of family_id, genus_id, species_id or subspecies_id")]
    Missing,
    #[error("an item must reference exactly one taxon, got {0}")]
    Ambiguous(usize),
}

/// Nullable taxon columns as stored in the item table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaxonColumns {
    pub family_id: Option<Id>,
    pub genus_id: Option<Id>,
    pub species_id: Option<Id>,
    pub subspecies_id: Option<Id>,
}

impl TaxonRef {
    /// Build from the four nullable columns, requiring exactly one to be set
    pub fn from_columns(columns: TaxonColumns) -> Result<Self, TaxonError> {
        let set = [
            columns.family_id.map(TaxonRef::Family),
            columns.genus_id.map(TaxonRef::Genus),
            columns.species_id.map(TaxonRef::Species),
            columns.subspecies_id.map(TaxonRef::Subspecies),
        ];
        let mut present = set.into_iter().flatten();

        match (present.next(), present.count()) {
            (None, _) => Err(TaxonError::Missing),
            (Some(taxon), 0) => Ok(taxon),
            (Some(_), rest) => Err(TaxonError::Ambiguous(rest + 1)),
        }
    }

    pub fn columns(&self) -> TaxonColumns {
        let mut columns = TaxonColumns::default();
        match *self {
            TaxonRef::Family(id) => columns.family_id = Some(id),
            TaxonRef::Genus(id) => columns.genus_id = Some(id),
            TaxonRef::Species(id) => columns.species_id = Some(id),
            TaxonRef::Subspecies(id) => columns.subspecies_id = Some(id),
        }
        columns
    }
}

/// One pollen image record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "ItemRecord", try_from = "ItemRecord")]
pub struct Item {
    pub id: Id,
    pub key_image: String,
    pub taxon: TaxonRef,
    pub comment: Option<String>,
    pub slide_id: Id,
    pub voxel_width: f64,
}

/// Wire shape of an item: one nullable id per taxonomic level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: Id,
    pub key_image: String,
    #[serde(default)]
    pub family_id: Option<Id>,
    #[serde(default)]
    pub genus_id: Option<Id>,
    #[serde(default)]
    pub species_id: Option<Id>,
    #[serde(default)]
    pub subspecies_id: Option<Id>,
    #[serde(default)]
    pub comment: Option<String>,
    pub slide_id: Id,
    pub voxel_width: f64,
}

impl From<Item> for ItemRecord {
    fn from(item: Item) -> Self {
        let columns = item.taxon.columns();
        Self {
            id: item.id,
            key_image: item.key_image,
            family_id: columns.family_id,
            genus_id: columns.genus_id,
            species_id: columns.species_id,
            subspecies_id: columns.subspecies_id,
            comment: item.comment,
            slide_id: item.slide_id,
            voxel_width: item.voxel_width,
        }
    }
}

impl TryFrom<ItemRecord> for Item {
    type Error = TaxonError;

    fn try_from(record: ItemRecord) -> Result<Self, Self::Error> {
        let taxon = TaxonRef::from_columns(TaxonColumns {
            family_id: record.family_id,
            genus_id: record.genus_id,
            species_id: record.species_id,
            subspecies_id: record.subspecies_id,
        })?;

        Ok(Self {
            id: record.id,
            key_image: record.key_image,
            taxon,
            comment: record.comment,
            slide_id: record.slide_id,
            voxel_width: record.voxel_width,
        })
    }
}

/// Create request for an item; the id is generated when absent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    #[serde(default)]
    pub id: Option<Id>,
    pub key_image: String,
    #[serde(default)]
    pub family_id: Option<Id>,
    #[serde(default)]
    pub genus_id: Option<Id>,
    #[serde(default)]
    pub species_id: Option<Id>,
    #[serde(default)]
    pub subspecies_id: Option<Id>,
    #[serde(default)]
    pub comment: Option<String>,
    pub slide_id: Id,
    pub voxel_width: f64,
}

impl TryFrom<NewItem> for Item {
    type Error = TaxonError;

    fn try_from(new: NewItem) -> Result<Self, Self::Error> {
        let taxon = TaxonRef::from_columns(TaxonColumns {
            family_id: new.family_id,
            genus_id: new.genus_id,
            species_id: new.species_id,
            subspecies_id: new.subspecies_id,
        })?;

        Ok(Self {
            id: id_or_generate(new.id),
            key_image: new.key_image,
            taxon,
            comment: new.comment,
            slide_id: new.slide_id,
            voxel_width: new.voxel_width,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::generate_id;

    #[test]
    fn test_from_columns_requires_exactly_one() {
        let id = generate_id();

        assert_eq!(
            TaxonRef::from_columns(TaxonColumns::default()),
            Err(TaxonError::Missing)
        );
        assert_eq!(
            TaxonRef::from_columns(TaxonColumns {
                genus_id: Some(id),
                ..Default::default()
            }),
            Ok(TaxonRef::Genus(id))
        );
        assert_eq!(
            TaxonRef::from_columns(TaxonColumns {
                family_id: Some(generate_id()),
                species_id: Some(id),
                subspecies_id: Some(generate_id()),
                ..Default::default()
            }),
            Err(TaxonError::Ambiguous(3))
        );
    }

    #[test]
    fn test_item_serializes_with_nullable_taxon_columns() {
        let species_id = generate_id();
        let item = Item {
            id: generate_id(),
            key_image: "slides/a/1.png".to_string(),
            taxon: TaxonRef::Species(species_id),
            comment: None,
            slide_id: generate_id(),
            voxel_width: 0.25,
        };

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["species_id"], serde_json::json!(species_id));
        assert!(json["genus_id"].is_null());
        assert!(json["family_id"].is_null());
        assert!(json.get("taxon").is_none());

        let back: Item = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_new_item_with_two_taxa_is_rejected() {
        let json = serde_json::json!({
            "key_image": "x.png",
            "family_id": generate_id(),
            "genus_id": generate_id(),
            "slide_id": generate_id(),
            "voxel_width": 1.0
        });
        let new: NewItem = serde_json::from_value(json).unwrap();
        assert_eq!(Item::try_from(new), Err(TaxonError::Ambiguous(2)));
    }
}
