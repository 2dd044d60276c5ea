// src/models/geometry.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// Coordenada na convenção do mapa: [lat, lng]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

// Identificador opaco de uma camada (polígono) na biblioteca de mapas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(pub u64);

// Métricas calculadas de um polígono desenhado
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonMetrics {
    pub area_hectares: Decimal,
    pub perimeter_meters: i64,
    // Anel fechado na convenção armazenada: [lng, lat]
    pub coordinates: Vec<[f64; 2]>,
}

impl PolygonMetrics {
    pub fn zeroed() -> Self {
        Self {
            area_hectares: Decimal::new(0, 2),
            perimeter_meters: 0,
            coordinates: Vec::new(),
        }
    }

    pub fn is_zeroed(&self) -> bool {
        self.coordinates.is_empty()
    }
}
