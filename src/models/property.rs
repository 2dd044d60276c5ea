// src/models/property.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

// --- 1. Tipos de propriedade ---
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    #[default]
    Fazenda,
    Sitio,
    Chacara,
    Terreno,
    // Qualquer categoria desconhecida vinda do backend cai aqui
    #[serde(other)]
    Outro,
}

impl PropertyType {
    pub fn label(&self) -> &'static str {
        match self {
            PropertyType::Fazenda => "Fazenda",
            PropertyType::Sitio => "Sítio",
            PropertyType::Chacara => "Chácara",
            PropertyType::Terreno => "Terreno",
            PropertyType::Outro => "Outro",
        }
    }
}

// --- 2. Propriedade (registro do backend) ---
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub property_type: PropertyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub area: Decimal,
    pub perimeter: i64,
    // Anel fechado de pares [lng, lat]
    #[serde(default)]
    pub coordinates: Vec<[f64; 2]>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

// Corpo do POST /properties (o backend atribui o id)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProperty {
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub area: Decimal,
    pub perimeter: i64,
    pub coordinates: Vec<[f64; 2]>,
    pub created_at: DateTime<Utc>,
}

// Corpo do PUT /properties/{id}: somente os campos alterados
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub property_type: Option<PropertyType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perimeter: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Vec<[f64; 2]>>,
}

impl PropertyChanges {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// --- 3. Formulário de propriedade ---
#[derive(Debug, Clone, Default, PartialEq, Validate)]
pub struct PropertyForm {
    #[validate(length(min = 1, message = "Por favor, digite o nome da propriedade."))]
    pub name: String,
    pub property_type: PropertyType,
    pub description: String,
}

impl PropertyForm {
    // Campos de texto chegam do DOM com espaços; validamos a versão aparada
    pub fn trimmed(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            property_type: self.property_type,
            description: self.description.trim().to_string(),
        }
    }

    pub fn description_opt(&self) -> Option<String> {
        let description = self.description.trim();
        (!description.is_empty()).then(|| description.to_string())
    }
}

impl From<&Property> for PropertyForm {
    fn from(property: &Property) -> Self {
        Self {
            name: property.name.clone(),
            property_type: property.property_type,
            description: property.description.clone().unwrap_or_default(),
        }
    }
}

// Modo do formulário: criação de nova área ou edição de um registro existente
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit { property_id: String },
}

// --- 4. Cartão da lista lateral ---
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyCard {
    pub id: String,
    pub name: String,
    pub type_label: &'static str,
    pub area_label: String,
    pub perimeter_label: String,
    pub description: Option<String>,
    pub created_label: String,
}

impl From<&Property> for PropertyCard {
    fn from(property: &Property) -> Self {
        let created_label = property
            .created_at
            .map(|date| date.format("%d/%m/%Y %H:%M").to_string())
            .unwrap_or_else(|| "Data inválida".to_string());

        Self {
            id: property.id.clone(),
            name: property.name.clone(),
            type_label: property.property_type.label(),
            area_label: format!("{} hectares", property.area),
            perimeter_label: format!("{} metros", property.perimeter),
            description: property.description.clone().filter(|d| !d.is_empty()),
            created_label,
        }
    }
}

// Conteúdo do popup de um polígono salvo
pub fn property_popup(property: &Property) -> String {
    let mut popup = format!(
        "{}\nTipo: {}\nÁrea: {} hectares\nPerímetro: {} metros",
        property.name,
        property.property_type.label(),
        property.area,
        property.perimeter
    );
    if let Some(description) = property.description.as_deref().filter(|d| !d.is_empty()) {
        popup.push('\n');
        popup.push_str(description);
    }
    popup
}
