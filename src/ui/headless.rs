// src/ui/headless.rs
//
// Implementações sem renderização: guardam o estado em memória e registram
// tudo via `tracing`. Usadas pelo binário e pelos testes.

use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::{
    models::{
        geometry::{LatLng, LayerId, PolygonMetrics},
        property::{FormMode, PropertyCard, PropertyForm},
    },
    ui::{Control, Feedback, MapView, PageView, PolygonStyle, StatusKind},
};

#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessLayer {
    pub ring: Vec<LatLng>,
    pub style: PolygonStyle,
    pub popup: Option<String>,
}

#[derive(Debug, Default)]
pub struct HeadlessMap {
    next_id: u64,
    layers: BTreeMap<LayerId, HeadlessLayer>,
    focused: Option<LayerId>,
}

impl HeadlessMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layer(&self, layer: LayerId) -> Option<&HeadlessLayer> {
        self.layers.get(&layer)
    }

    pub fn layers(&self) -> impl Iterator<Item = (&LayerId, &HeadlessLayer)> {
        self.layers.iter()
    }

    pub fn focused(&self) -> Option<LayerId> {
        self.focused
    }

    // Simula a edição de vértices feita pelo usuário na ferramenta de desenho
    pub fn replace_ring(&mut self, layer: LayerId, ring: Vec<LatLng>) -> bool {
        match self.layers.get_mut(&layer) {
            Some(entry) => {
                entry.ring = ring;
                true
            }
            None => false,
        }
    }
}

impl MapView for HeadlessMap {
    fn add_polygon(&mut self, ring: &[LatLng], style: PolygonStyle) -> LayerId {
        self.next_id += 1;
        let id = LayerId(self.next_id);
        self.layers.insert(
            id,
            HeadlessLayer {
                ring: ring.to_vec(),
                style,
                popup: None,
            },
        );
        id
    }

    fn remove_layer(&mut self, layer: LayerId) {
        self.layers.remove(&layer);
        if self.focused == Some(layer) {
            self.focused = None;
        }
    }

    fn clear_layers(&mut self) {
        self.layers.clear();
        self.focused = None;
    }

    fn set_style(&mut self, layer: LayerId, style: PolygonStyle) {
        if let Some(entry) = self.layers.get_mut(&layer) {
            entry.style = style;
        }
    }

    fn bind_popup(&mut self, layer: LayerId, content: &str) {
        if let Some(entry) = self.layers.get_mut(&layer) {
            entry.popup = Some(content.to_string());
        }
    }

    fn open_popup(&mut self, layer: LayerId) {
        if let Some(popup) = self.layers.get(&layer).and_then(|l| l.popup.as_deref()) {
            tracing::debug!("💬 {}", popup.replace('\n', " | "));
        }
    }

    fn fit_bounds(&mut self, layer: LayerId) {
        if self.layers.contains_key(&layer) {
            self.focused = Some(layer);
        }
    }

    fn layer_ring(&self, layer: LayerId) -> Option<Vec<LatLng>> {
        self.layers.get(&layer).map(|l| l.ring.clone())
    }

    fn layer_count(&self) -> usize {
        self.layers.len()
    }
}

#[derive(Debug, Default)]
pub struct HeadlessPage {
    pub statuses: Vec<(String, StatusKind)>,
    pub redirects: Vec<String>,
    pub confirm_answers: VecDeque<bool>,
    pub prompt_answers: VecDeque<String>,
    pub busy: HashSet<Control>,
    pub busy_history: Vec<(Control, bool)>,
    pub form_mode: Option<FormMode>,
    pub form_values: Option<PropertyForm>,
    pub form_metrics: Option<PolygonMetrics>,
    pub cards: Vec<PropertyCard>,
}

impl HeadlessPage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer_confirm(mut self, answer: bool) -> Self {
        self.confirm_answers.push_back(answer);
        self
    }

    pub fn answer_prompt(mut self, answer: impl Into<String>) -> Self {
        self.prompt_answers.push_back(answer.into());
        self
    }

    pub fn last_status(&self) -> Option<&(String, StatusKind)> {
        self.statuses.last()
    }

    pub fn form_visible(&self) -> bool {
        self.form_mode.is_some()
    }
}

impl Feedback for HeadlessPage {
    fn show_status(&mut self, message: &str, kind: StatusKind) {
        match kind {
            StatusKind::Error => tracing::warn!("❌ {}", message),
            _ => tracing::info!("ℹ️ {}", message),
        }
        self.statuses.push((message.to_string(), kind));
    }

    // Sem resposta programada, o diálogo é recusado
    fn confirm(&mut self, question: &str) -> bool {
        let answer = self.confirm_answers.pop_front().unwrap_or(false);
        tracing::info!("❓ {} -> {}", question, answer);
        answer
    }

    fn prompt(&mut self, question: &str) -> Option<String> {
        let answer = self.prompt_answers.pop_front();
        tracing::info!("❓ {} -> {}", question, answer.is_some());
        answer
    }

    fn redirect(&mut self, target: &str) {
        tracing::info!("➡️ Redirecionando para {}", target);
        self.redirects.push(target.to_string());
    }

    fn set_busy(&mut self, control: Control, busy: bool) {
        if busy {
            self.busy.insert(control);
        } else {
            self.busy.remove(&control);
        }
        self.busy_history.push((control, busy));
    }
}

impl PageView for HeadlessPage {
    fn show_form(&mut self, mode: &FormMode, metrics: &PolygonMetrics) {
        self.form_mode = Some(mode.clone());
        self.form_metrics = Some(metrics.clone());
    }

    fn fill_form(&mut self, form: &PropertyForm) {
        self.form_values = Some(form.clone());
    }

    fn update_form_metrics(&mut self, metrics: &PolygonMetrics) {
        self.form_metrics = Some(metrics.clone());
    }

    fn hide_form(&mut self) {
        self.form_mode = None;
        self.form_values = None;
        self.form_metrics = None;
    }

    fn render_properties(&mut self, cards: &[PropertyCard]) {
        if cards.is_empty() {
            tracing::info!("📭 Nenhuma propriedade cadastrada ainda.");
        }
        self.cards = cards.to_vec();
    }
}
