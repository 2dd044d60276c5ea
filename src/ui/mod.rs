// src/ui/mod.rs
//
// Fronteiras com o que é renderizado: a biblioteca de mapas (`MapView`) e a
// página em volta dela (`PageView`/`Feedback`). Os controladores só falam
// com esses traits.

pub mod headless;

use crate::models::{
    geometry::{LatLng, LayerId, PolygonMetrics},
    property::{FormMode, PropertyCard, PropertyForm},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

// Botões desabilitados enquanto uma requisição está em andamento
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    SaveProperty,
    RefreshProperties,
    Login,
    Signup,
    Confirm,
    ResendCode,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolygonStyle {
    pub color: &'static str,
    pub fill_color: &'static str,
    pub weight: u8,
    pub fill_opacity: f32,
}

// Área recém-desenhada, ainda não salva
pub const DRAFT_STYLE: PolygonStyle = PolygonStyle {
    color: "#667eea",
    fill_color: "#667eea",
    weight: 3,
    fill_opacity: 0.2,
};

pub const SAVED_STYLE: PolygonStyle = PolygonStyle {
    color: "#28a745",
    fill_color: "#28a745",
    weight: 3,
    fill_opacity: 0.2,
};

/// Status, diálogos e navegação.
pub trait Feedback {
    fn show_status(&mut self, message: &str, kind: StatusKind);
    fn confirm(&mut self, question: &str) -> bool;
    fn prompt(&mut self, question: &str) -> Option<String>;
    fn redirect(&mut self, target: &str);
    fn set_busy(&mut self, control: Control, busy: bool);
}

/// A biblioteca de mapas. Dona das camadas; a aplicação só guarda `LayerId`s.
pub trait MapView {
    fn add_polygon(&mut self, ring: &[LatLng], style: PolygonStyle) -> LayerId;
    fn remove_layer(&mut self, layer: LayerId);
    fn clear_layers(&mut self);
    fn set_style(&mut self, layer: LayerId, style: PolygonStyle);
    fn bind_popup(&mut self, layer: LayerId, content: &str);
    fn open_popup(&mut self, layer: LayerId);
    fn fit_bounds(&mut self, layer: LayerId);
    fn layer_ring(&self, layer: LayerId) -> Option<Vec<LatLng>>;
    fn layer_count(&self) -> usize;
}

/// Formulário de propriedade e lista lateral.
pub trait PageView: Feedback {
    fn show_form(&mut self, mode: &FormMode, metrics: &PolygonMetrics);
    fn fill_form(&mut self, form: &PropertyForm);
    fn update_form_metrics(&mut self, metrics: &PolygonMetrics);
    fn hide_form(&mut self);
    fn render_properties(&mut self, cards: &[PropertyCard]);
}
