//src/main.rs

use mapeamento::{
    config::AppState,
    ui::{
        headless::{HeadlessMap, HeadlessPage},
        MapView,
    },
};
use tracing_subscriber::EnvFilter;

// Equivale a abrir mapeamento.html: restaura a sessão, testa a API e carrega as propriedades
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let app_state = AppState::new()?;
    tracing::info!(
        "🚀 Sessão em {}",
        app_state.config.session_store_path.display()
    );

    let mut controller = app_state.map_controller(HeadlessMap::new(), HeadlessPage::new());
    if !controller.initialize().await {
        tracing::warn!("🔒 Faça login antes de abrir o mapa");
        return Ok(());
    }

    for card in &controller.page().cards {
        tracing::info!(
            "🏡 {} ({}) - {} - {} - {}",
            card.name,
            card.type_label,
            card.area_label,
            card.perimeter_label,
            card.created_label
        );
    }
    tracing::info!("✅ {} polígonos no mapa", controller.map().layer_count());

    Ok(())
}
