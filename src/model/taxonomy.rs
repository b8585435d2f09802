use crate::model::{id_or_generate, Id};
use serde::{Deserialize, Serialize};

/// Root grouping for families and studies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub id: Id,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCatalog {
    #[serde(default)]
    pub id: Option<Id>,
    pub name: String,
}

impl From<NewCatalog> for Catalog {
    fn from(new: NewCatalog) -> Self {
        Self {
            id: id_or_generate(new.id),
            name: new.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Family {
    pub id: Id,
    pub name: String,
    pub catalog_id: Id,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewFamily {
    #[serde(default)]
    pub id: Option<Id>,
    pub name: String,
    pub catalog_id: Id,
}

impl From<NewFamily> for Family {
    fn from(new: NewFamily) -> Self {
        Self {
            id: id_or_generate(new.id),
            name: new.name,
            catalog_id: new.catalog_id,
        }
    }
}

/// A genus; `is_type` marks a placeholder taxon that is not a reference genus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Genus {
    pub id: Id,
    pub name: String,
    pub family_id: Id,
    #[serde(default)]
    pub is_type: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewGenus {
    #[serde(default)]
    pub id: Option<Id>,
    pub name: String,
    pub family_id: Id,
    #[serde(default)]
    pub is_type: bool,
}

impl From<NewGenus> for Genus {
    fn from(new: NewGenus) -> Self {
        Self {
            id: id_or_generate(new.id),
            name: new.name,
            family_id: new.family_id,
            is_type: new.is_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub id: Id,
    pub name: String,
    pub genus_id: Id,
    #[serde(default)]
    pub is_type: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSpecies {
    #[serde(default)]
    pub id: Option<Id>,
    pub name: String,
    pub genus_id: Id,
    #[serde(default)]
    pub is_type: bool,
}

impl From<NewSpecies> for Species {
    fn from(new: NewSpecies) -> Self {
        Self {
            id: id_or_generate(new.id),
            name: new.name,
            genus_id: new.genus_id,
            is_type: new.is_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subspecies {
    pub id: Id,
    pub name: String,
    pub species_id: Id,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSubspecies {
    #[serde(default)]
    pub id: Option<Id>,
    pub name: String,
    pub species_id: Id,
}

impl From<NewSubspecies> for Subspecies {
    fn from(new: NewSubspecies) -> Self {
        Self {
            id: id_or_generate(new.id),
            name: new.name,
            species_id: new.species_id,
        }
    }
}

/// Row of the alphabetical family view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyLetterEntry {
    pub id: Id,
    pub name: String,
    /// Items anchored on the family, its genera or their species
    pub item_count: i64,
    /// True when an item sits on the family or one of its genera (no species assigned)
    pub has_items_without_species: bool,
}

/// Row of the alphabetical genus view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenusLetterEntry {
    pub id: Id,
    pub name: String,
    pub family_id: Id,
    pub is_type: bool,
    /// Items anchored on the genus or its species
    pub item_count: i64,
    /// True when an item sits directly on the genus (no species assigned)
    pub has_items_without_species: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::generate_id;

    #[test]
    fn test_new_genus_defaults_is_type_to_false() {
        let family_id = generate_id();
        let json = serde_json::json!({ "name": "Celtis", "family_id": family_id });
        let new: NewGenus = serde_json::from_value(json).unwrap();
        let genus = Genus::from(new);

        assert!(!genus.is_type);
        assert_eq!(genus.family_id, family_id);
        assert_eq!(genus.name, "Celtis");
    }

    #[test]
    fn test_new_family_keeps_client_id() {
        let id = generate_id();
        let json = serde_json::json!({ "id": id, "name": "Cannabaceae", "catalog_id": generate_id() });
        let family = Family::from(serde_json::from_value::<NewFamily>(json).unwrap());
        assert_eq!(family.id, id);
    }
}
