// src/middleware/route_guard.rs

use crate::services::auth::SessionManager;

pub const MAP_PAGE: &str = "mapeamento.html";
pub const DASHBOARD_PAGE: &str = "dashboard.html";

// Páginas que exigem sessão válida
pub const PROTECTED_PAGES: [&str; 2] = [DASHBOARD_PAGE, MAP_PAGE];

// Destino de quem chega sem sessão
pub const HOME: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect(pub String);

// "/app/mapeamento.html?x=1" -> "mapeamento.html"; raiz vira "index.html"
pub fn page_name(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    match path.rsplit('/').next() {
        Some("") | None => "index.html",
        Some(name) => name,
    }
}

pub fn is_protected(path: &str) -> bool {
    PROTECTED_PAGES.contains(&page_name(path))
}

/// Libera páginas públicas; páginas protegidas exigem tokens presentes e
/// não expirados, senão redireciona para a raiz.
pub fn route_guard(path: &str, session: &SessionManager) -> Result<(), Redirect> {
    if !is_protected(path) {
        return Ok(());
    }

    if session.is_authenticated() && session.is_token_valid() {
        return Ok(());
    }

    tracing::info!("🚫 Acesso negado a {}: sessão ausente ou expirada", page_name(path));
    Err(Redirect(HOME.to_string()))
}
