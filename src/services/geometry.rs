// src/services/geometry.rs

use geo::{ChamberlainDuquetteArea, Haversine, Length, LineString, Polygon};
use rust_decimal::{prelude::FromPrimitive, Decimal};
use thiserror::Error;

use crate::models::geometry::{LatLng, PolygonMetrics};

const SQUARE_METERS_PER_HECTARE: f64 = 10_000.0;

#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("anel precisa de pelo menos 4 posições, recebeu {0}")]
    TooFewPositions(usize),
    #[error("coordenada não finita")]
    NonFinite,
    #[error("área fora do intervalo representável")]
    OutOfRange,
}

// Fecha o anel repetindo o primeiro ponto quando necessário
fn close_ring(mut ring: Vec<[f64; 2]>) -> Vec<[f64; 2]> {
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) {
        if first != last {
            ring.push(first);
        }
    }
    ring
}

// Polígono geo (x = lng, y = lat) a partir do anel fechado armazenado
fn to_polygon(coordinates: &[[f64; 2]]) -> Polygon<f64> {
    Polygon::new(LineString::from(coordinates.to_vec()), vec![])
}

/// Calcula área (hectares, 2 casas) e perímetro (metros inteiros) de um
/// anel na convenção do mapa.
pub fn try_compute_metrics(ring: &[LatLng]) -> Result<PolygonMetrics, GeometryError> {
    if ring.iter().any(|p| !p.lat.is_finite() || !p.lng.is_finite()) {
        return Err(GeometryError::NonFinite);
    }

    let coordinates = close_ring(ring.iter().map(|p| [p.lng, p.lat]).collect());
    if coordinates.len() < 4 {
        return Err(GeometryError::TooFewPositions(coordinates.len()));
    }

    let polygon = to_polygon(&coordinates);
    // Área esférica (Chamberlain-Duquette, raio equatorial WGS84) e perímetro por haversine
    let area_m2 = polygon.chamberlain_duquette_unsigned_area();
    let area_hectares = Decimal::from_f64(area_m2 / SQUARE_METERS_PER_HECTARE)
        .ok_or(GeometryError::OutOfRange)?
        .round_dp(2);
    let perimeter_meters = polygon.exterior().length::<Haversine>().round() as i64;

    Ok(PolygonMetrics {
        area_hectares,
        perimeter_meters,
        coordinates,
    })
}

/// Igual a `try_compute_metrics`, mas nunca falha: geometria inválida vira
/// métricas zeradas.
pub fn compute_metrics(ring: &[LatLng]) -> PolygonMetrics {
    try_compute_metrics(ring).unwrap_or_else(|e| {
        tracing::warn!("⚠️ Erro ao calcular métricas: {}", e);
        PolygonMetrics::zeroed()
    })
}

// Converte o anel armazenado ([lng, lat], fechado) para o anel do mapa ([lat, lng], aberto)
pub fn to_map_ring(coordinates: &[[f64; 2]]) -> Vec<LatLng> {
    let open = match (coordinates.first(), coordinates.last()) {
        (Some(first), Some(last)) if coordinates.len() > 1 && first == last => {
            &coordinates[..coordinates.len() - 1]
        }
        _ => coordinates,
    };
    open.iter().map(|c| LatLng::new(c[1], c[0])).collect()
}
