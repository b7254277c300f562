//! Example: a ProjectHub API serving a browser front end on another origin
//!
//! Run with:
//!
//! ```bash
//! CORS_ALLOWED_ORIGIN=http://localhost:5173 \
//! SESSION_SECRET=$(openssl rand -hex 64) \
//! DEMO_EMAIL=ada@example.com DEMO_PASSWORD=secret \
//!     cargo run --example server
//! ```
//!
//! Then, from the front end:
//!
//! ```text
//! POST /api/auth/login        {"email": "...", "password": "..."}
//! GET  /api/user/current      (cookie sent automatically)
//! GET  /api/workspaces        (cookie sent automatically)
//! POST /api/auth/logout
//! ```

use axum::{Json, Router, extract::State, routing::get};
use projecthub::auth::{AccountStore, InMemoryAccountStore, PasswordHasher};
use projecthub::{App, AppContext, ConfigBuilder, CurrentPrincipal, RouteModule};
use serde_json::{Value, json};
use std::sync::Arc;

/// Stand-in for the real workspace resource
struct WorkspacesModule;

impl RouteModule for WorkspacesModule {
    fn routes(&self) -> Router<AppContext> {
        Router::new().route("/", get(list_workspaces))
    }

    fn prefix(&self) -> Option<&str> {
        Some("/workspaces")
    }
}

async fn list_workspaces(
    State(ctx): State<AppContext>,
    CurrentPrincipal(owner): CurrentPrincipal,
) -> projecthub::Result<Json<Value>> {
    let owner = ctx.accounts.find_by_id(&owner).await?;
    Ok(Json(json!({
        "owner": owner.map(|p| p.summary()),
        "workspaces": [],
    })))
}

#[tokio::main]
async fn main() -> projecthub::Result<()> {
    let config = ConfigBuilder::new().from_env().build()?;
    projecthub::init_tracing_with_config(&config);

    let hasher = PasswordHasher::default();
    let accounts = Arc::new(InMemoryAccountStore::new());

    if let (Ok(email), Ok(password)) = (std::env::var("DEMO_EMAIL"), std::env::var("DEMO_PASSWORD")) {
        let principal = accounts
            .add_local(email, Some("Demo User".to_string()), hasher.hash(&password)?)
            .await;
        tracing::info!(principal_id = %principal.id, email = %principal.email, "Seeded demo account");
    } else {
        tracing::warn!("DEMO_EMAIL / DEMO_PASSWORD not set; no account can log in");
    }

    let context = AppContext::builder(&config)
        .with_accounts(accounts)
        .with_password_hasher(hasher)
        .build()?;

    App::builder(config)
        .with_context(context)
        .register_module(WorkspacesModule)
        .build()?
        .serve()
        .await
}
