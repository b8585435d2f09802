use crate::model::{id_or_generate, Id};
use serde::{Deserialize, Serialize};

/// A study groups samples; reference studies are authoritative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Study {
    pub id: Id,
    pub description: Option<String>,
    pub location: Option<String>,
    pub remarks: Option<String>,
    pub catalog_id: Id,
    pub is_reference: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStudy {
    #[serde(default)]
    pub id: Option<Id>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    pub catalog_id: Id,
    #[serde(default)]
    pub is_reference: bool,
}

impl From<NewStudy> for Study {
    fn from(new: NewStudy) -> Self {
        Self {
            id: id_or_generate(new.id),
            description: new.description,
            location: new.location,
            remarks: new.remarks,
            catalog_id: new.catalog_id,
            is_reference: new.is_reference,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: Id,
    pub description: Option<String>,
    pub location: Option<String>,
    pub age: Option<String>,
    pub remarks: Option<String>,
    pub study_id: Id,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSample {
    #[serde(default)]
    pub id: Option<Id>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub age: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    pub study_id: Id,
}

impl From<NewSample> for Sample {
    fn from(new: NewSample) -> Self {
        Self {
            id: id_or_generate(new.id),
            description: new.description,
            location: new.location,
            age: new.age,
            remarks: new.remarks,
            study_id: new.study_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    pub id: Id,
    pub description: Option<String>,
    pub remarks: Option<String>,
    pub sample_id: Id,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSlide {
    #[serde(default)]
    pub id: Option<Id>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    pub sample_id: Id,
}

impl From<NewSlide> for Slide {
    fn from(new: NewSlide) -> Self {
        Self {
            id: id_or_generate(new.id),
            description: new.description,
            remarks: new.remarks,
            sample_id: new.sample_id,
        }
    }
}
