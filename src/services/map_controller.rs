// src/services/map_controller.rs

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use reqwest::header::HeaderMap;
use validator::Validate;

use crate::{
    common::error::AppError,
    db::PropertyRepository,
    middleware::route_guard::{route_guard, MAP_PAGE},
    models::{
        geometry::{LatLng, LayerId, PolygonMetrics},
        property::{
            property_popup, FormMode, NewProperty, Property, PropertyCard, PropertyChanges,
            PropertyForm,
        },
    },
    services::{
        auth::{SessionManager, SignOut},
        geometry::{self, to_map_ring},
    },
    ui::{Control, MapView, PageView, StatusKind, DRAFT_STYLE, SAVED_STYLE},
};

// Página de entrada para onde a sessão expirada é mandada
pub const ENTRY_PAGE: &str = "index.html";

/// Máquina de estados da edição: Idle → Drawing → FormOpen → Submitting → Idle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorState {
    Idle,
    Drawing,
    FormOpen(FormMode),
    Submitting(FormMode),
}

// O polígono "atual": só existe enquanto o formulário está aberto ou enviando
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CurrentPolygon {
    layer: LayerId,
    geometry_changed: bool,
}

fn metrics_popup(title: &str, metrics: &PolygonMetrics) -> String {
    format!(
        "{}\nÁrea: {} hectares\nPerímetro: {} metros",
        title, metrics.area_hectares, metrics.perimeter_meters
    )
}

/// Liga os eventos de desenho do mapa aos registros de propriedade do backend.
pub struct MapController<M: MapView, P: PageView> {
    session: SessionManager,
    repo: Arc<dyn PropertyRepository>,
    map: M,
    page: P,
    state: EditorState,
    current: Option<CurrentPolygon>,
    properties: Vec<Property>,
    // Tabela lateral id da propriedade <-> camada do mapa
    layers_by_property: HashMap<String, LayerId>,
    properties_by_layer: HashMap<LayerId, String>,
}

impl<M: MapView, P: PageView> MapController<M, P> {
    pub fn new(
        session: SessionManager,
        repo: Arc<dyn PropertyRepository>,
        map: M,
        page: P,
    ) -> Self {
        Self {
            session,
            repo,
            map,
            page,
            state: EditorState::Idle,
            current: None,
            properties: Vec::new(),
            layers_by_property: HashMap::new(),
            properties_by_layer: HashMap::new(),
        }
    }

    // --- Acessores ---

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionManager {
        &mut self.session
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut M {
        &mut self.map
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut P {
        &mut self.page
    }

    pub fn current_layer(&self) -> Option<LayerId> {
        self.current.map(|c| c.layer)
    }

    pub fn layer_for(&self, property_id: &str) -> Option<LayerId> {
        self.layers_by_property.get(property_id).copied()
    }

    pub fn property_for_layer(&self, layer: LayerId) -> Option<&Property> {
        let id = self.properties_by_layer.get(&layer)?;
        self.properties.iter().find(|p| &p.id == id)
    }

    // --- Infra interna ---

    fn report(&mut self, error: &AppError) {
        if error.is_session_expired() {
            self.force_sign_out();
        } else {
            self.page.show_status(&error.user_message(), StatusKind::Error);
        }
    }

    fn fail(&mut self, error: AppError) -> AppError {
        self.report(&error);
        error
    }

    // Sessão inválida: sign-out forçado e volta para a página de entrada, sem retry
    fn force_sign_out(&mut self) {
        tracing::warn!("🔒 Sessão expirada ou inválida, encerrando");
        self.page
            .show_status(&AppError::SessionExpired.user_message(), StatusKind::Error);
        self.session.sign_out();
        self.reset_editor();
        self.page.redirect(ENTRY_PAGE);
    }

    fn bearer_headers(&self) -> Result<HeaderMap, AppError> {
        if !self.session.is_authenticated() {
            return Err(AppError::NotAuthenticated);
        }
        if !self.session.is_token_valid() {
            return Err(AppError::SessionExpired);
        }
        self.session.auth_headers()
    }

    fn bind_layer(&mut self, property_id: &str, layer: LayerId) {
        self.layers_by_property.insert(property_id.to_string(), layer);
        self.properties_by_layer.insert(layer, property_id.to_string());
    }

    fn unbind_layer(&mut self, layer: LayerId) {
        if let Some(id) = self.properties_by_layer.remove(&layer) {
            self.layers_by_property.remove(&id);
        }
    }

    // Remove o polígono desenhado e ainda não salvo
    fn discard_draft(&mut self) {
        if let (EditorState::FormOpen(FormMode::Create), Some(current)) =
            (&self.state, self.current)
        {
            self.map.remove_layer(current.layer);
        }
    }

    fn reset_editor(&mut self) {
        self.current = None;
        self.state = EditorState::Idle;
        self.page.hide_form();
    }

    fn ensure_not_submitting(&self) -> Result<(), AppError> {
        match self.state {
            EditorState::Submitting(_) => Err(AppError::RequestInFlight),
            _ => Ok(()),
        }
    }

    fn render_list(&mut self) {
        let cards: Vec<PropertyCard> = self.properties.iter().map(PropertyCard::from).collect();
        self.page.render_properties(&cards);
    }

    // --- Carregamento da página ---

    /// Verifica a sessão, testa a API e carrega as propriedades. Retorna
    /// `false` quando o usuário foi redirecionado.
    pub async fn initialize(&mut self) -> bool {
        if let Err(redirect) = route_guard(MAP_PAGE, &self.session) {
            tracing::info!("🚫 Acesso negado ao mapa");
            self.page.redirect(&redirect.0);
            return false;
        }

        self.page.show_status("Inicializando mapa...", StatusKind::Info);
        if self.check_api_connection().await {
            // Erros já foram exibidos na barra de status
            let _ = self.load_properties().await;
        }
        true
    }

    pub async fn check_api_connection(&mut self) -> bool {
        let auth = match self.bearer_headers() {
            Ok(auth) => auth,
            Err(AppError::NotAuthenticated) => {
                self.page.show_status(
                    "Token de autenticação não encontrado. Faça login novamente.",
                    StatusKind::Error,
                );
                return false;
            }
            Err(e) => {
                self.report(&e);
                return false;
            }
        };

        match self.repo.list(&auth).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!("🔥 Erro ao verificar API: {}", e);
                self.report(&e);
                false
            }
        }
    }

    // --- Eventos de desenho ---

    pub fn start_drawing(&mut self) -> Result<(), AppError> {
        self.ensure_not_submitting()?;
        self.discard_draft();
        if self.state != EditorState::Idle {
            self.reset_editor();
        }
        self.state = EditorState::Drawing;
        Ok(())
    }

    /// O usuário terminou de desenhar um polígono.
    pub fn polygon_created(&mut self, ring: &[LatLng]) -> Result<LayerId, AppError> {
        self.ensure_not_submitting()?;
        self.discard_draft();

        let layer = self.map.add_polygon(ring, DRAFT_STYLE);
        let metrics = self.compute_metrics(layer);

        self.map
            .bind_popup(layer, &metrics_popup("Nova área demarcada", &metrics));
        self.map.open_popup(layer);

        self.current = Some(CurrentPolygon {
            layer,
            geometry_changed: true,
        });
        self.state = EditorState::FormOpen(FormMode::Create);
        self.page.show_form(&FormMode::Create, &metrics);
        self.page.show_status(
            "Área demarcada! Preencha os dados da propriedade.",
            StatusKind::Info,
        );
        Ok(layer)
    }

    pub fn polygons_edited(&mut self, layers: &[LayerId]) {
        for &layer in layers {
            let metrics = self.compute_metrics(layer);
            self.map.bind_popup(layer, &metrics_popup("Área editada", &metrics));

            if let Some(current) = self.current.as_mut().filter(|c| c.layer == layer) {
                current.geometry_changed = true;
                self.page.update_form_metrics(&metrics);
            }
        }
        self.page
            .show_status("Área editada com sucesso!", StatusKind::Success);
    }

    pub fn polygons_deleted(&mut self, layers: &[LayerId]) {
        for &layer in layers {
            self.map.remove_layer(layer);
            self.unbind_layer(layer);
        }
        if self
            .current
            .is_some_and(|current| layers.contains(&current.layer))
        {
            self.reset_editor();
        }
        self.page.show_status("Área removida.", StatusKind::Info);
    }

    /// Métricas da geometria atual de uma camada (zeradas se a camada não existe).
    pub fn compute_metrics(&self, layer: LayerId) -> PolygonMetrics {
        self.map
            .layer_ring(layer)
            .map(|ring| geometry::compute_metrics(&ring))
            .unwrap_or_else(PolygonMetrics::zeroed)
    }

    // --- Formulário ---

    pub fn cancel_form(&mut self) -> Result<(), AppError> {
        self.ensure_not_submitting()?;
        self.discard_draft();
        self.reset_editor();
        Ok(())
    }

    pub fn edit_property(&mut self, property_id: &str) -> Result<(), AppError> {
        self.ensure_not_submitting()?;

        let Some(property) = self.properties.iter().find(|p| p.id == property_id).cloned() else {
            return Err(self.fail(AppError::PropertyNotFound(property_id.to_string())));
        };

        self.discard_draft();

        let mode = FormMode::Edit {
            property_id: property.id.clone(),
        };
        let metrics = PolygonMetrics {
            area_hectares: property.area,
            perimeter_meters: property.perimeter,
            coordinates: property.coordinates.clone(),
        };
        self.page.fill_form(&PropertyForm::from(&property));
        self.page.show_form(&mode, &metrics);

        self.current = self.layer_for(property_id).map(|layer| CurrentPolygon {
            layer,
            geometry_changed: false,
        });
        if let Some(current) = self.current {
            self.map.fit_bounds(current.layer);
            self.map.open_popup(current.layer);
        }

        self.state = EditorState::FormOpen(mode);
        self.page.show_status(
            "Modo de edição ativado. Modifique os dados e clique em \"Atualizar\".",
            StatusKind::Info,
        );
        Ok(())
    }

    /// Salva o formulário: cria a partir do polígono desenhado ou atualiza o
    /// registro em edição. Validação acontece antes de qualquer chamada de rede.
    pub async fn submit_property(&mut self, form: &PropertyForm) -> Result<Property, AppError> {
        let mode = match &self.state {
            EditorState::Submitting(_) => return Err(AppError::RequestInFlight),
            EditorState::FormOpen(mode) => mode.clone(),
            _ => FormMode::Create,
        };

        let form = form.trimmed();
        if let Err(errors) = form.validate() {
            return Err(self.fail(errors.into()));
        }

        match mode {
            FormMode::Create => self.create_property(form).await,
            FormMode::Edit { property_id } => self.update_property(&property_id, form).await,
        }
    }

    async fn create_property(&mut self, form: PropertyForm) -> Result<Property, AppError> {
        let current = match self.current {
            Some(current) => current,
            None => return Err(self.fail(AppError::MissingPolygon)),
        };

        let metrics = self.compute_metrics(current.layer);
        if metrics.is_zeroed() {
            return Err(self.fail(AppError::MissingPolygon));
        }

        let auth = match self.bearer_headers() {
            Ok(auth) => auth,
            Err(e) => return Err(self.fail(e)),
        };

        let payload = NewProperty {
            description: form.description_opt(),
            name: form.name,
            property_type: form.property_type,
            area: metrics.area_hectares,
            perimeter: metrics.perimeter_meters,
            coordinates: metrics.coordinates,
            created_at: Utc::now(),
        };

        self.state = EditorState::Submitting(FormMode::Create);
        self.page.set_busy(Control::SaveProperty, true);
        let result = self.repo.create(&auth, &payload).await;
        self.page.set_busy(Control::SaveProperty, false);

        match result {
            Ok(property) => {
                tracing::info!("✅ Propriedade criada: {} ({})", property.name, property.id);
                self.map.set_style(current.layer, SAVED_STYLE);
                self.map.bind_popup(current.layer, &property_popup(&property));
                self.bind_layer(&property.id, current.layer);

                self.reset_editor();
                self.page.show_status(
                    &format!("Propriedade \"{}\" salva com sucesso!", property.name),
                    StatusKind::Success,
                );
                self.reconcile().await;
                Ok(property)
            }
            Err(e) => {
                tracing::error!("🔥 Erro ao salvar propriedade: {}", e);
                // O formulário continua aberto para um novo envio
                self.state = EditorState::FormOpen(FormMode::Create);
                Err(self.fail(e))
            }
        }
    }

    async fn update_property(
        &mut self,
        property_id: &str,
        form: PropertyForm,
    ) -> Result<Property, AppError> {
        let Some(existing) = self.properties.iter().find(|p| p.id == property_id).cloned() else {
            return Err(self.fail(AppError::PropertyNotFound(property_id.to_string())));
        };

        let mut changes = PropertyChanges::default();
        if form.name != existing.name {
            changes.name = Some(form.name.clone());
        }
        if form.property_type != existing.property_type {
            changes.property_type = Some(form.property_type);
        }
        let description = form.description_opt();
        if description != existing.description.clone().filter(|d| !d.is_empty()) {
            // String vazia apaga a descrição
            changes.description = Some(description.unwrap_or_default());
        }
        if let Some(current) = self.current.filter(|c| c.geometry_changed) {
            let metrics = self.compute_metrics(current.layer);
            if !metrics.is_zeroed() && metrics.coordinates != existing.coordinates {
                changes.area = Some(metrics.area_hectares);
                changes.perimeter = Some(metrics.perimeter_meters);
                changes.coordinates = Some(metrics.coordinates);
            }
        }

        if changes.is_empty() {
            self.reset_editor();
            self.page
                .show_status("Nenhuma alteração para salvar.", StatusKind::Info);
            return Ok(existing);
        }

        let auth = match self.bearer_headers() {
            Ok(auth) => auth,
            Err(e) => return Err(self.fail(e)),
        };

        let mode = FormMode::Edit {
            property_id: property_id.to_string(),
        };
        self.state = EditorState::Submitting(mode.clone());
        self.page.set_busy(Control::SaveProperty, true);
        let result = self.repo.update(&auth, property_id, &changes).await;
        self.page.set_busy(Control::SaveProperty, false);

        match result {
            Ok(updated) => {
                tracing::info!("✅ Propriedade atualizada: {}", updated.id);
                if let Some(current) = self.current {
                    self.map.bind_popup(current.layer, &property_popup(&updated));
                }

                self.reset_editor();
                self.page.show_status(
                    &format!("Propriedade \"{}\" atualizada com sucesso!", updated.name),
                    StatusKind::Success,
                );
                self.reconcile().await;
                Ok(updated)
            }
            Err(e) => {
                tracing::error!("🔥 Erro ao atualizar propriedade: {}", e);
                self.state = EditorState::FormOpen(mode);
                Err(self.fail(e))
            }
        }
    }

    // --- Lista e sobreposições ---

    // Recarrega tudo do backend e reconstrói mapa, lista e tabela lateral
    async fn reload(&mut self) -> Result<usize, AppError> {
        let auth = self.bearer_headers()?;
        let properties = self.repo.list(&auth).await?;

        // Rascunho ou geometria em edição sobrevivem à reconstrução
        let carried = self
            .current
            .and_then(|current| Some((current, self.map.layer_ring(current.layer)?)));

        self.map.clear_layers();
        self.layers_by_property.clear();
        self.properties_by_layer.clear();

        for property in &properties {
            let ring = to_map_ring(&property.coordinates);
            if ring.len() < 3 {
                tracing::warn!("⚠️ Propriedade {} com geometria degenerada", property.id);
            }
            let layer = self.map.add_polygon(&ring, SAVED_STYLE);
            self.map.bind_popup(layer, &property_popup(property));
            self.layers_by_property.insert(property.id.clone(), layer);
            self.properties_by_layer.insert(layer, property.id.clone());
        }

        self.properties = properties;
        self.restore_editor(carried);
        self.render_list();
        Ok(self.properties.len())
    }

    // Religa o polígono atual às camadas recém-criadas
    fn restore_editor(&mut self, carried: Option<(CurrentPolygon, Vec<LatLng>)>) {
        let mode = match &self.state {
            EditorState::FormOpen(mode) | EditorState::Submitting(mode) => mode.clone(),
            _ => return,
        };

        match mode {
            FormMode::Create => {
                self.current = carried.map(|(current, ring)| {
                    let layer = self.map.add_polygon(&ring, DRAFT_STYLE);
                    let metrics = geometry::compute_metrics(&ring);
                    self.map
                        .bind_popup(layer, &metrics_popup("Nova área demarcada", &metrics));
                    CurrentPolygon { layer, ..current }
                });
            }
            FormMode::Edit { property_id } => {
                let Some(saved_layer) = self.layer_for(&property_id) else {
                    tracing::warn!("⚠️ Propriedade {} sumiu do backend", property_id);
                    self.reset_editor();
                    self.page.show_status(
                        "A propriedade em edição não existe mais.",
                        StatusKind::Info,
                    );
                    return;
                };

                self.current = Some(match carried {
                    Some((current, ring)) if current.geometry_changed => {
                        // Mantém a geometria editada e ainda não salva
                        self.map.remove_layer(saved_layer);
                        self.unbind_layer(saved_layer);
                        let layer = self.map.add_polygon(&ring, SAVED_STYLE);
                        let metrics = geometry::compute_metrics(&ring);
                        self.map
                            .bind_popup(layer, &metrics_popup("Área editada", &metrics));
                        self.bind_layer(&property_id, layer);
                        CurrentPolygon { layer, ..current }
                    }
                    _ => CurrentPolygon {
                        layer: saved_layer,
                        geometry_changed: false,
                    },
                });
            }
        }
    }

    // Reconciliação após mutações: erros vão para a barra de status
    async fn reconcile(&mut self) {
        if let Err(e) = self.reload().await {
            tracing::error!("🔥 Erro ao recarregar propriedades: {}", e);
            self.report(&e);
        }
    }

    pub async fn load_properties(&mut self) -> Result<usize, AppError> {
        self.page.set_busy(Control::RefreshProperties, true);
        let result = self.reload().await;
        self.page.set_busy(Control::RefreshProperties, false);

        match result {
            Ok(count) => {
                tracing::info!("📦 {} propriedades carregadas", count);
                self.page
                    .show_status("Propriedades carregadas.", StatusKind::Success);
                Ok(count)
            }
            Err(e) => {
                tracing::error!("🔥 Erro ao carregar propriedades: {}", e);
                Err(self.fail(e))
            }
        }
    }

    /// Exclui após confirmação. Retorna `false` se o usuário desistiu.
    pub async fn delete_property(&mut self, property_id: &str) -> Result<bool, AppError> {
        self.ensure_not_submitting()?;
        if !self.properties.iter().any(|p| p.id == property_id) {
            return Err(self.fail(AppError::PropertyNotFound(property_id.to_string())));
        }

        if !self
            .page
            .confirm("Tem certeza que deseja excluir esta propriedade?")
        {
            return Ok(false);
        }

        let auth = match self.bearer_headers() {
            Ok(auth) => auth,
            Err(e) => return Err(self.fail(e)),
        };

        if let Err(e) = self.repo.delete(&auth, property_id).await {
            tracing::error!("🔥 Erro ao excluir propriedade: {}", e);
            return Err(self.fail(e));
        }

        self.properties.retain(|p| p.id != property_id);
        if let Some(layer) = self.layers_by_property.remove(property_id) {
            self.properties_by_layer.remove(&layer);
            self.map.remove_layer(layer);
            if self.current.is_some_and(|c| c.layer == layer) {
                self.reset_editor();
            }
        }
        self.render_list();
        self.page
            .show_status("Propriedade excluída com sucesso.", StatusKind::Success);

        self.reconcile().await;
        Ok(true)
    }

    pub fn zoom_to_property(&mut self, property_id: &str) -> Result<(), AppError> {
        let Some(property) = self.properties.iter().find(|p| p.id == property_id).cloned() else {
            return Err(self.fail(AppError::PropertyNotFound(property_id.to_string())));
        };

        let layer = match self.layer_for(property_id) {
            Some(layer) => layer,
            None => {
                // Camada removida pela ferramenta de desenho: recria das coordenadas salvas
                let layer = self
                    .map
                    .add_polygon(&to_map_ring(&property.coordinates), SAVED_STYLE);
                self.map.bind_popup(layer, &property_popup(&property));
                self.bind_layer(&property.id, layer);
                layer
            }
        };

        self.map.fit_bounds(layer);
        self.map.open_popup(layer);
        self.page.show_status(
            &format!("Focando na propriedade \"{}\".", property.name),
            StatusKind::Info,
        );
        Ok(())
    }

    pub fn logout(&mut self) -> SignOut {
        let signed_out = self.session.sign_out();
        self.reset_editor();
        self.page.redirect(ENTRY_PAGE);
        signed_out
    }
}
