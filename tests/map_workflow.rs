// Fluxo do mapa contra o backend falso: carga, criação, edição, exclusão,
// falhas do backend e sessão expirada.

mod common;

use common::*;
use mapeamento::{
    common::error::{AppError, CONNECTIVITY_MESSAGE},
    db::{token_repo::TOKEN_KEYS, TokenStore},
    models::{
        geometry::LatLng,
        property::{FormMode, PropertyForm, PropertyType},
    },
    services::map_controller::{EditorState, MapController},
    ui::{
        headless::{HeadlessMap, HeadlessPage},
        Control, MapView, StatusKind, DRAFT_STYLE, SAVED_STYLE,
    },
};
use serde_json::json;

type Controller = MapController<HeadlessMap, HeadlessPage>;

fn triangle() -> Vec<LatLng> {
    vec![
        LatLng::new(-21.206, -46.876),
        LatLng::new(-21.206, -46.866),
        LatLng::new(-21.196, -46.871),
    ]
}

fn form(name: &str) -> PropertyForm {
    PropertyForm {
        name: name.to_string(),
        property_type: PropertyType::Sitio,
        description: String::new(),
    }
}

fn signed_in(env: &TestEnv, page: HeadlessPage) -> Controller {
    env.sign_in_with(&fresh_token(USER));
    env.state.map_controller(HeadlessMap::new(), page)
}

#[tokio::test]
async fn initialize_builds_one_overlay_and_card_per_record() {
    let env = start().await;
    env.backend().properties = vec![
        property_record("a", "Fazenda A"),
        property_record("b", "Sítio B"),
        property_record("c", "Chácara C"),
    ];

    let mut controller = signed_in(&env, HeadlessPage::new());
    assert!(controller.initialize().await);

    assert_eq!(controller.properties().len(), 3);
    assert_eq!(controller.map().layer_count(), 3);
    assert_eq!(controller.page().cards.len(), 3);
    for id in ["a", "b", "c"] {
        let layer = controller.layer_for(id).expect("camada vinculada");
        assert_eq!(controller.property_for_layer(layer).map(|p| p.id.as_str()), Some(id));
        let overlay = controller.map().layer(layer).unwrap();
        assert_eq!(overlay.style, SAVED_STYLE);
        // Anel aberto na convenção do mapa
        assert_eq!(overlay.ring.len(), 4);
        assert_eq!(overlay.ring[1], LatLng::new(0.0, 0.01));
    }
    assert_eq!(controller.page().cards[0].created_label, "10/05/2024 13:45");
    assert_eq!(
        controller.page().last_status(),
        Some(&("Propriedades carregadas.".to_string(), StatusKind::Success))
    );
}

#[tokio::test]
async fn reload_replaces_overlays_instead_of_accumulating() {
    let env = start().await;
    env.backend().properties = vec![property_record("a", "Fazenda A")];

    let mut controller = signed_in(&env, HeadlessPage::new());
    controller.load_properties().await.unwrap();
    env.backend().properties.push(property_record("b", "Sítio B"));
    assert_eq!(controller.load_properties().await.unwrap(), 2);

    assert_eq!(controller.map().layer_count(), 2);
    assert_eq!(controller.page().cards.len(), 2);
}

#[tokio::test]
async fn page_without_session_redirects_before_any_request() {
    let env = start().await;
    let mut controller = env
        .state
        .map_controller(HeadlessMap::new(), HeadlessPage::new());

    assert!(!controller.initialize().await);
    assert_eq!(controller.page().redirects, vec!["/".to_string()]);
    assert!(env.backend().requests.is_empty());
}

#[tokio::test]
async fn expired_token_counts_as_signed_out() {
    let env = start().await;
    env.sign_in_with(&expired_token(USER));
    let mut controller = env
        .state
        .map_controller(HeadlessMap::new(), HeadlessPage::new());

    assert!(!controller.initialize().await);
    assert!(env.backend().requests.is_empty());
}

#[tokio::test]
async fn drawn_polygon_opens_form_with_metrics() {
    let env = start().await;
    let mut controller = signed_in(&env, HeadlessPage::new());

    controller.start_drawing().unwrap();
    assert_eq!(controller.state(), &EditorState::Drawing);
    let layer = controller.polygon_created(&triangle()).unwrap();

    assert_eq!(controller.state(), &EditorState::FormOpen(FormMode::Create));
    assert_eq!(controller.map().layer(layer).unwrap().style, DRAFT_STYLE);
    let metrics = controller.page().form_metrics.clone().unwrap();
    assert_eq!(metrics.area_hectares.to_string(), "57.77");
    assert_eq!(metrics.perimeter_meters, 3490);
    assert_eq!(metrics.coordinates.first(), metrics.coordinates.last());
    assert!(controller
        .map()
        .layer(layer)
        .and_then(|l| l.popup.as_deref())
        .is_some_and(|p| p.contains("57.77 hectares")));
}

#[tokio::test]
async fn blank_name_never_reaches_the_backend() {
    let env = start().await;
    let mut controller = signed_in(&env, HeadlessPage::new());
    controller.polygon_created(&triangle()).unwrap();

    let result = controller.submit_property(&form("   ")).await;

    assert!(matches!(result, Err(AppError::ValidationError(_))));
    assert!(env.backend().requests.is_empty());
    assert_eq!(
        controller.page().last_status().unwrap().0,
        "Por favor, digite o nome da propriedade."
    );
    // Formulário e rascunho continuam lá
    assert_eq!(controller.state(), &EditorState::FormOpen(FormMode::Create));
    assert_eq!(controller.map().layer_count(), 1);
}

#[tokio::test]
async fn submit_without_polygon_is_refused() {
    let env = start().await;
    let mut controller = signed_in(&env, HeadlessPage::new());

    let result = controller.submit_property(&form("Sítio Sem Área")).await;
    assert!(matches!(result, Err(AppError::MissingPolygon)));
    assert!(env.backend().requests.is_empty());
}

#[tokio::test]
async fn create_posts_metrics_then_reconciles() {
    let env = start().await;
    let mut controller = signed_in(&env, HeadlessPage::new());
    controller.polygon_created(&triangle()).unwrap();

    let mut values = form("  Sítio Primavera ");
    values.description = "Beira do rio".into();
    let created = controller.submit_property(&values).await.unwrap();

    {
        let backend = env.backend();
        let posts = backend.mutations();
        assert_eq!(posts.len(), 1);
        let body = &posts[0].body;
        assert_eq!(body["name"], json!("Sítio Primavera"));
        assert_eq!(body["type"], json!("sitio"));
        assert_eq!(body["description"], json!("Beira do rio"));
        assert_eq!(body["area"], json!(57.77));
        assert_eq!(body["perimeter"], json!(3490));
        assert_eq!(body["coordinates"].as_array().unwrap().len(), 4);
        assert_eq!(body["coordinates"][0], json!([-46.876, -21.206]));
        assert!(body["createdAt"].is_string());
        // Reconciliação completa depois da criação
        assert_eq!(backend.requests.last().unwrap().method, "GET");
    }

    assert_eq!(controller.state(), &EditorState::Idle);
    assert!(!controller.page().form_visible());
    assert_eq!(controller.map().layer_count(), 1);
    let layer = controller.layer_for(&created.id).unwrap();
    assert_eq!(controller.map().layer(layer).unwrap().style, SAVED_STYLE);
    assert_eq!(controller.page().cards.len(), 1);
    assert_eq!(controller.page().cards[0].area_label, "57.77 hectares");
    let saved = (
        "Propriedade \"Sítio Primavera\" salva com sucesso!".to_string(),
        StatusKind::Success,
    );
    assert!(controller.page().statuses.contains(&saved));
    assert_eq!(
        controller.page().busy_history.first(),
        Some(&(Control::SaveProperty, true))
    );
    assert!(controller.page().busy.is_empty());
}

#[tokio::test]
async fn backend_error_is_shown_verbatim_and_form_stays_open() {
    let env = start().await;
    let mut controller = signed_in(&env, HeadlessPage::new());
    controller.polygon_created(&triangle()).unwrap();
    let conflict = json!({ "error": "Já existe uma propriedade com esse nome" });
    env.backend().fail_next = Some((400, conflict));

    let result = controller.submit_property(&form("Duplicada")).await;

    assert!(matches!(result, Err(AppError::Backend { status: 400, .. })));
    assert_eq!(
        controller.page().last_status(),
        Some(&(
            "Já existe uma propriedade com esse nome".to_string(),
            StatusKind::Error
        ))
    );
    assert_eq!(controller.state(), &EditorState::FormOpen(FormMode::Create));
    assert_eq!(controller.map().layer_count(), 1);
    assert!(controller.page().busy.is_empty());

    // Segunda tentativa com o mesmo rascunho funciona
    controller.submit_property(&form("Duplicada")).await.unwrap();
    assert_eq!(controller.properties().len(), 1);
}

#[tokio::test]
async fn unauthorized_response_forces_sign_out() {
    let env = start().await;
    env.backend().properties = vec![property_record("a", "Fazenda A")];
    let mut controller = signed_in(&env, HeadlessPage::new());
    env.backend().unauthorized = true;

    let result = controller.load_properties().await;

    assert!(matches!(result, Err(AppError::SessionExpired)));
    assert_eq!(controller.page().redirects, vec!["index.html".to_string()]);
    assert!(!controller.session().is_authenticated());
    for key in TOKEN_KEYS {
        assert_eq!(env.store.get(key), None);
    }
    // Nenhuma nova tentativa automática
    assert_eq!(env.backend().requests.len(), 1);
}

#[tokio::test]
async fn connectivity_failure_suggests_reload() {
    let env = start().await;
    let dead = dead_address().await;
    let config = app_config(&format!("http://{dead}"));
    let state = mapeamento::config::AppState::with_store(config, env.store.clone()).unwrap();
    env.sign_in_with(&fresh_token(USER));

    let mut controller = state.map_controller(HeadlessMap::new(), HeadlessPage::new());
    assert!(controller.initialize().await);

    assert_eq!(
        controller.page().last_status(),
        Some(&(CONNECTIVITY_MESSAGE.to_string(), StatusKind::Error))
    );
    assert_eq!(controller.map().layer_count(), 0);
    // Sessão intacta: falha de rede não é falha de autenticação
    assert!(controller.session().is_authenticated());
}

#[tokio::test]
async fn edit_sends_only_changed_fields() {
    let env = start().await;
    env.backend().properties = vec![property_record("a", "Fazenda A")];
    let mut controller = signed_in(&env, HeadlessPage::new());
    controller.load_properties().await.unwrap();

    controller.edit_property("a").unwrap();
    assert_eq!(
        controller.page().form_values.as_ref().map(|f| f.name.as_str()),
        Some("Fazenda A")
    );
    assert_eq!(controller.map().focused(), controller.layer_for("a"));

    let mut values = controller.page().form_values.clone().unwrap();
    values.name = "Fazenda Renomeada".into();
    let updated = controller.submit_property(&values).await.unwrap();

    assert_eq!(updated.name, "Fazenda Renomeada");
    {
        let backend = env.backend();
        let puts = backend.mutations();
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].path, "/properties/a");
        assert_eq!(puts[0].body, json!({ "name": "Fazenda Renomeada" }));
    }
    assert_eq!(controller.state(), &EditorState::Idle);
    assert_eq!(controller.page().cards[0].name, "Fazenda Renomeada");
}

#[tokio::test]
async fn edited_geometry_is_recomputed_and_sent() {
    let env = start().await;
    env.backend().properties = vec![property_record("a", "Fazenda A")];
    let mut controller = signed_in(&env, HeadlessPage::new());
    controller.load_properties().await.unwrap();

    controller.edit_property("a").unwrap();
    let layer = controller.layer_for("a").unwrap();
    assert!(controller.map_mut().replace_ring(layer, triangle()));
    controller.polygons_edited(&[layer]);
    assert_eq!(
        controller.page().form_metrics.as_ref().map(|m| m.perimeter_meters),
        Some(3490)
    );

    let values = controller.page().form_values.clone().unwrap();
    controller.submit_property(&values).await.unwrap();

    let backend = env.backend();
    let body = &backend.mutations()[0].body;
    assert_eq!(body["area"], json!(57.77));
    assert_eq!(body["perimeter"], json!(3490));
    assert_eq!(body["coordinates"].as_array().unwrap().len(), 4);
    assert!(body.get("name").is_none());
}

#[tokio::test]
async fn edit_without_changes_skips_the_request() {
    let env = start().await;
    env.backend().properties = vec![property_record("a", "Fazenda A")];
    let mut controller = signed_in(&env, HeadlessPage::new());
    controller.load_properties().await.unwrap();

    controller.edit_property("a").unwrap();
    let values = controller.page().form_values.clone().unwrap();
    controller.submit_property(&values).await.unwrap();

    assert!(env.backend().mutations().is_empty());
    assert_eq!(controller.state(), &EditorState::Idle);
    assert_eq!(
        controller.page().last_status().unwrap().0,
        "Nenhuma alteração para salvar."
    );
}

#[tokio::test]
async fn delete_requires_confirmation() {
    let env = start().await;
    env.backend().properties = vec![
        property_record("a", "Fazenda A"),
        property_record("b", "Sítio B"),
    ];
    let page = HeadlessPage::new().answer_confirm(false).answer_confirm(true);
    let mut controller = signed_in(&env, page);
    controller.load_properties().await.unwrap();

    assert!(!controller.delete_property("a").await.unwrap());
    assert!(env.backend().mutations().is_empty());
    assert_eq!(controller.map().layer_count(), 2);

    assert!(controller.delete_property("a").await.unwrap());
    assert_eq!(env.backend().mutations()[0].method, "DELETE");
    assert_eq!(controller.map().layer_count(), 1);
    assert_eq!(controller.page().cards.len(), 1);
    assert!(controller.layer_for("a").is_none());
    assert!(controller.layer_for("b").is_some());
}

#[tokio::test]
async fn unsaved_draft_survives_reconciliation() {
    let env = start().await;
    env.backend().properties = vec![
        property_record("a", "Fazenda A"),
        property_record("b", "Sítio B"),
    ];
    let page = HeadlessPage::new().answer_confirm(true);
    let mut controller = signed_in(&env, page);
    controller.load_properties().await.unwrap();
    controller.polygon_created(&triangle()).unwrap();

    // Excluir outro registro recarrega tudo do backend
    assert!(controller.delete_property("a").await.unwrap());

    assert_eq!(controller.state(), &EditorState::FormOpen(FormMode::Create));
    assert!(controller.page().form_visible());
    assert_eq!(controller.map().layer_count(), 2);
    let draft = controller.current_layer().expect("rascunho mantido");
    let overlay = controller.map().layer(draft).unwrap();
    assert_eq!(overlay.style, DRAFT_STYLE);
    assert_eq!(overlay.ring, triangle());
    assert!(controller.property_for_layer(draft).is_none());

    let created = controller.submit_property(&form("Nova Área")).await.unwrap();
    assert_eq!(created.perimeter, 3490);
    let backend = env.backend();
    let post = backend.mutations().into_iter().find(|r| r.method == "POST").unwrap();
    assert_eq!(post.body["area"], json!(57.77));
}

#[tokio::test]
async fn edited_geometry_survives_manual_refresh() {
    let env = start().await;
    env.backend().properties = vec![property_record("a", "Fazenda A")];
    let mut controller = signed_in(&env, HeadlessPage::new());
    controller.load_properties().await.unwrap();

    controller.edit_property("a").unwrap();
    let layer = controller.layer_for("a").unwrap();
    assert!(controller.map_mut().replace_ring(layer, triangle()));
    controller.polygons_edited(&[layer]);

    controller.load_properties().await.unwrap();

    let mode = FormMode::Edit {
        property_id: "a".to_string(),
    };
    assert_eq!(controller.state(), &EditorState::FormOpen(mode));
    assert_eq!(controller.map().layer_count(), 1);
    let layer = controller.layer_for("a").unwrap();
    assert_eq!(controller.current_layer(), Some(layer));
    assert_eq!(controller.map().layer(layer).unwrap().ring, triangle());

    let values = controller.page().form_values.clone().unwrap();
    controller.submit_property(&values).await.unwrap();
    let backend = env.backend();
    assert_eq!(backend.mutations()[0].body["area"], json!(57.77));
}

#[tokio::test]
async fn refresh_closes_form_of_record_removed_elsewhere() {
    let env = start().await;
    env.backend().properties = vec![property_record("a", "Fazenda A")];
    let mut controller = signed_in(&env, HeadlessPage::new());
    controller.load_properties().await.unwrap();
    controller.edit_property("a").unwrap();

    env.backend().properties.clear();
    controller.load_properties().await.unwrap();

    assert_eq!(controller.state(), &EditorState::Idle);
    assert!(controller.current_layer().is_none());
    assert!(!controller.page().form_visible());
    assert_eq!(controller.map().layer_count(), 0);
}

#[tokio::test]
async fn cancel_discards_the_draft() {
    let env = start().await;
    let mut controller = signed_in(&env, HeadlessPage::new());
    controller.polygon_created(&triangle()).unwrap();

    controller.cancel_form().unwrap();
    assert_eq!(controller.state(), &EditorState::Idle);
    assert_eq!(controller.map().layer_count(), 0);
    assert!(!controller.page().form_visible());

    // Um novo desenho substitui o rascunho anterior
    controller.polygon_created(&triangle()).unwrap();
    controller.polygon_created(&triangle()).unwrap();
    assert_eq!(controller.map().layer_count(), 1);
}

#[tokio::test]
async fn zoom_focuses_layer_and_unknown_id_is_reported() {
    let env = start().await;
    env.backend().properties = vec![property_record("a", "Fazenda A")];
    let mut controller = signed_in(&env, HeadlessPage::new());
    controller.load_properties().await.unwrap();

    controller.zoom_to_property("a").unwrap();
    assert_eq!(controller.map().focused(), controller.layer_for("a"));

    let missing = controller.zoom_to_property("zzz");
    assert!(matches!(missing, Err(AppError::PropertyNotFound(_))));
    assert_eq!(controller.page().last_status().unwrap().0, "Propriedade não encontrada.");
}

#[tokio::test]
async fn deleting_the_overlay_closes_the_form() {
    let env = start().await;
    let mut controller = signed_in(&env, HeadlessPage::new());
    let layer = controller.polygon_created(&triangle()).unwrap();

    controller.polygons_deleted(&[layer]);
    assert_eq!(controller.state(), &EditorState::Idle);
    assert_eq!(controller.map().layer_count(), 0);

    let result = controller.submit_property(&form("Sem área")).await;
    assert!(matches!(result, Err(AppError::MissingPolygon)));
}

#[tokio::test]
async fn logout_clears_session_and_returns_to_entry() {
    let env = start().await;
    let mut controller = signed_in(&env, HeadlessPage::new());

    let signed_out = controller.logout();
    assert!(signed_out.logout_url.is_some());
    assert_eq!(controller.page().redirects, vec!["index.html".to_string()]);
    for key in TOKEN_KEYS {
        assert_eq!(env.store.get(key), None);
    }
}
