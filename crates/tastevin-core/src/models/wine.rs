use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TastevinError};

pub const MIN_VINTAGE: i32 = 1800;
pub const MAX_VINTAGE: i32 = 2200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WineType {
    Red,
    White,
    #[serde(rename = "Rosé", alias = "Rose")]
    Rose,
    Sparkling,
    Dessert,
}

impl WineType {
    pub const ALL: [WineType; 5] = [
        Self::Red,
        Self::White,
        Self::Rose,
        Self::Sparkling,
        Self::Dessert,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Red => "Red",
            Self::White => "White",
            Self::Rose => "Rosé",
            Self::Sparkling => "Sparkling",
            Self::Dessert => "Dessert",
        }
    }
}

impl std::fmt::Display for WineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WineType {
    type Err = TastevinError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "red" => Ok(Self::Red),
            "white" => Ok(Self::White),
            "rosé" | "rose" => Ok(Self::Rose),
            "sparkling" => Ok(Self::Sparkling),
            "dessert" => Ok(Self::Dessert),
            other => Err(TastevinError::ValidationError(format!(
                "unknown wine type: {other}"
            ))),
        }
    }
}

/// One wine a guest brings to an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WineContribution {
    pub id: Uuid,
    pub event_id: Uuid,
    pub invitee_id: Uuid,
    pub wine_type: WineType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub varietal: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vintage: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WineContribution {
    pub fn new(event_id: Uuid, invitee_id: Uuid, wine_type: WineType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            event_id,
            invitee_id,
            wine_type,
            producer: None,
            varietal: None,
            region: None,
            vintage: None,
            price: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = Some(producer.into());
        self
    }

    pub fn with_varietal(mut self, varietal: impl Into<String>) -> Self {
        self.varietal = Some(varietal.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_vintage(mut self, vintage: i32) -> Self {
        self.vintage = Some(vintage);
        self
    }

    /// Short human label, e.g. `Château Margaux Cabernet Sauvignon 2015 (Red)`.
    pub fn label(&self) -> String {
        let mut parts: Vec<String> = [&self.producer, &self.varietal]
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        if let Some(vintage) = self.vintage {
            parts.push(vintage.to_string());
        }
        if parts.is_empty() {
            format!("({})", self.wine_type)
        } else {
            format!("{} ({})", parts.join(" "), self.wine_type)
        }
    }

    /// Apply a partial update, then clean and validate the merged record.
    pub fn apply(&mut self, changes: WineChanges) -> Result<()> {
        if let Some(wine_type) = changes.wine_type {
            self.wine_type = wine_type;
        }
        if let Some(producer) = changes.producer {
            self.producer = producer;
        }
        if let Some(varietal) = changes.varietal {
            self.varietal = varietal;
        }
        if let Some(region) = changes.region {
            self.region = region;
        }
        if let Some(vintage) = changes.vintage {
            self.vintage = vintage;
        }
        if let Some(price) = changes.price {
            self.price = price;
        }
        if let Some(notes) = changes.notes {
            self.notes = notes;
        }

        self.producer = clean_text(self.producer.take());
        self.varietal = clean_text(self.varietal.take());
        self.region = clean_text(self.region.take());
        self.notes = clean_text(self.notes.take());
        validate_vintage(self.vintage)?;
        validate_price(self.price)?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Input for [`crate::Database::create_wine`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWine {
    pub event_id: Uuid,
    pub invitee_id: Uuid,
    pub wine_type: WineType,

    #[serde(default)]
    pub producer: Option<String>,

    #[serde(default)]
    pub varietal: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub vintage: Option<i32>,

    #[serde(default)]
    pub price: Option<f64>,

    #[serde(default)]
    pub notes: Option<String>,
}

impl NewWine {
    pub fn new(event_id: Uuid, invitee_id: Uuid, wine_type: WineType) -> Self {
        Self {
            event_id,
            invitee_id,
            wine_type,
            producer: None,
            varietal: None,
            region: None,
            vintage: None,
            price: None,
            notes: None,
        }
    }

    /// Clean free text and validate numeric attributes, producing the record to persist.
    pub fn into_contribution(self) -> Result<WineContribution> {
        validate_vintage(self.vintage)?;
        validate_price(self.price)?;

        let mut wine = WineContribution::new(self.event_id, self.invitee_id, self.wine_type);
        wine.producer = clean_text(self.producer);
        wine.varietal = clean_text(self.varietal);
        wine.region = clean_text(self.region);
        wine.vintage = self.vintage;
        wine.price = self.price;
        wine.notes = clean_text(self.notes);
        Ok(wine)
    }
}

/// Partial update of a wine. `None` leaves a field untouched, `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct WineChanges {
    pub wine_type: Option<WineType>,
    pub producer: Option<Option<String>>,
    pub varietal: Option<Option<String>>,
    pub region: Option<Option<String>>,
    pub vintage: Option<Option<i32>>,
    pub price: Option<Option<f64>>,
    pub notes: Option<Option<String>>,
}

impl WineChanges {
    pub fn is_empty(&self) -> bool {
        self.wine_type.is_none()
            && self.producer.is_none()
            && self.varietal.is_none()
            && self.region.is_none()
            && self.vintage.is_none()
            && self.price.is_none()
            && self.notes.is_none()
    }
}

fn clean_text(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn validate_vintage(vintage: Option<i32>) -> Result<()> {
    match vintage {
        Some(year) if !(MIN_VINTAGE..=MAX_VINTAGE).contains(&year) => {
            Err(TastevinError::ValidationError(format!(
                "vintage {year} outside {MIN_VINTAGE}..={MAX_VINTAGE}"
            )))
        }
        _ => Ok(()),
    }
}

fn validate_price(price: Option<f64>) -> Result<()> {
    match price {
        Some(p) if !p.is_finite() || p < 0.0 => Err(TastevinError::ValidationError(format!(
            "price must be a non-negative amount, got {p}"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wine_type_parse() {
        assert_eq!("red".parse::<WineType>().unwrap(), WineType::Red);
        assert_eq!("Rosé".parse::<WineType>().unwrap(), WineType::Rose);
        assert_eq!(" ROSE ".parse::<WineType>().unwrap(), WineType::Rose);
        assert!("orange".parse::<WineType>().is_err());
    }

    #[test]
    fn test_wine_type_serde_uses_display_names() {
        assert_eq!(serde_json::to_string(&WineType::Rose).unwrap(), "\"Rosé\"");
        let parsed: WineType = serde_json::from_str("\"Sparkling\"").unwrap();
        assert_eq!(parsed, WineType::Sparkling);
    }

    #[test]
    fn test_new_wine_blank_text_becomes_absent() {
        let mut input = NewWine::new(Uuid::now_v7(), Uuid::now_v7(), WineType::White);
        input.producer = Some("   ".to_string());
        input.varietal = Some("  Chardonnay ".to_string());

        let wine = input.into_contribution().unwrap();
        assert!(wine.producer.is_none());
        assert_eq!(wine.varietal.as_deref(), Some("Chardonnay"));
    }

    #[test]
    fn test_new_wine_rejects_bad_vintage_and_price() {
        let mut input = NewWine::new(Uuid::now_v7(), Uuid::now_v7(), WineType::Red);
        input.vintage = Some(15);
        assert!(matches!(
            input.clone().into_contribution(),
            Err(TastevinError::ValidationError(_))
        ));

        input.vintage = Some(2015);
        input.price = Some(-3.0);
        assert!(matches!(
            input.into_contribution(),
            Err(TastevinError::ValidationError(_))
        ));
    }

    #[test]
    fn test_apply_changes_sets_and_clears() {
        let mut wine = WineContribution::new(Uuid::now_v7(), Uuid::now_v7(), WineType::Red)
            .with_producer("Penfolds")
            .with_vintage(2018);

        wine.apply(WineChanges {
            producer: Some(None),
            varietal: Some(Some("Shiraz".to_string())),
            ..Default::default()
        })
        .unwrap();

        assert!(wine.producer.is_none());
        assert_eq!(wine.varietal.as_deref(), Some("Shiraz"));
        assert_eq!(wine.vintage, Some(2018));
    }

    #[test]
    fn test_label() {
        let wine = WineContribution::new(Uuid::now_v7(), Uuid::now_v7(), WineType::Red)
            .with_producer("Penfolds")
            .with_vintage(2018);
        assert_eq!(wine.label(), "Penfolds 2018 (Red)");

        let bare = WineContribution::new(Uuid::now_v7(), Uuid::now_v7(), WineType::Dessert);
        assert_eq!(bare.label(), "(Dessert)");
    }
}
