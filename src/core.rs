use crate::{
    app::AppContext,
    auth::{RequireAuth, UserModule, auth_routes},
    config::Config,
    cors::build_cors_layer,
    error::{AppError, Result},
    health,
    http::RouteModule,
    middleware::{MakeRequestUuid, REQUEST_ID_HEADER},
    session::{SessionGate, resolve_session, spawn_cleanup_task},
};
use axum::{Json, Router, extract::DefaultBodyLimit, http::HeaderName, routing::get};
use serde_json::json;
use std::time::Duration;
use tokio::signal;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Main application structure
///
/// Public routes (`/`, `/health`, `{base}/auth/*`) and protected modules are
/// kept apart until [`into_router`](App::into_router) assembles the final
/// stack in one fixed order.
pub struct App {
    config: Config,
    context: AppContext,
    public: Router<AppContext>,
    protected: Router<AppContext>,
}

impl App {
    /// Creates a new App from a validated configuration and its context
    pub fn new(config: Config, context: AppContext) -> Self {
        let public = auth_routes();
        let protected = UserModule.register(Router::new());

        Self {
            config,
            context,
            public,
            protected,
        }
    }

    /// Builder pattern for constructing an App
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// Register a route module behind the authentication gate
    ///
    /// Its handlers only run for requests carrying a live session.
    pub fn register_module<M: RouteModule>(mut self, module: M) -> Self {
        self.protected = module.register(self.protected);
        self
    }

    /// Register a route module under the base path without the gate
    ///
    /// The session is still resolved, so `OptionalPrincipal` works.
    pub fn register_public_module<M: RouteModule>(mut self, module: M) -> Self {
        self.public = module.register(self.public);
        self
    }

    /// Assemble the router with its middleware stack
    ///
    /// Layer order, outermost first:
    /// 1. Trace
    /// 2. Request id
    /// 3. CORS, which answers preflights before anything below runs
    /// 4. Body limit
    /// 5. Session resolution (API routes only)
    /// 6. Authentication gate (protected routes only)
    pub fn into_router(self) -> Router {
        let gate = SessionGate::new(self.context.sessions.clone(), self.context.cors.clone());

        let protected = self
            .protected
            .route_layer(axum::middleware::from_fn(RequireAuth::middleware));

        let api = self
            .public
            .merge(protected)
            .layer(axum::middleware::from_fn_with_state(gate, resolve_session));

        let root = Router::<AppContext>::new()
            .route("/", get(root_handler))
            .route("/health", get(health::health_handler));

        let base_path = self.config.server.base_path.trim_end_matches('/');
        let router = if base_path.is_empty() {
            root.merge(api)
        } else {
            root.nest(base_path, api)
        };

        let mut router = router
            .with_state(self.context.clone())
            .layer(DefaultBodyLimit::max(self.config.server.max_body_size));

        if let Some(cors_layer) = build_cors_layer(&self.context.cors) {
            router = router.layer(cors_layer);
        }

        let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
        router
            .layer(PropagateRequestIdLayer::new(request_id.clone()))
            .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// Start the application server
    ///
    /// Runs the session sweep alongside the server and stops it once the
    /// server has drained after Ctrl+C or SIGTERM.
    pub async fn serve(self) -> Result<()> {
        let addr = self
            .config
            .server
            .addr()
            .map_err(|e| AppError::misconfigured(format!("Invalid server address: {}", e)))?;

        let sweep = spawn_cleanup_task(
            self.context.session_store().clone(),
            self.config.session.cleanup_interval(),
        );

        let base_path = self.config.server.base_path.clone();
        let router = self.into_router();

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;

        tracing::info!("Server starting on http://{}", addr);
        tracing::info!("API mounted at {}", if base_path.is_empty() { "/" } else { base_path.as_str() });
        tracing::info!("Health check available at http://{}/health", addr);

        let result = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| AppError::internal(format!("Server error: {}", e)));

        sweep.abort();
        tracing::info!("Session sweep stopped");
        result
    }
}

async fn root_handler() -> Json<serde_json::Value> {
    Json(json!({ "message": "Welcome to the ProjectHub API" }))
}

/// Builder for App with fluent API
#[must_use = "builder does nothing until you call build()"]
pub struct AppBuilder {
    config: Config,
    context: Option<AppContext>,
    modules: Vec<Box<dyn RouteModule>>,
    public_modules: Vec<Box<dyn RouteModule>>,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            context: None,
            modules: Vec::new(),
            public_modules: Vec::new(),
        }
    }

    /// Use a prebuilt context instead of building one from the config
    pub fn with_context(mut self, context: AppContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn register_module<M: RouteModule + 'static>(mut self, module: M) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    pub fn register_public_module<M: RouteModule + 'static>(mut self, module: M) -> Self {
        self.public_modules.push(Box::new(module));
        self
    }

    /// Build the App
    ///
    /// # Errors
    ///
    /// Returns `MisconfiguredPolicy` if the context cannot be built from the
    /// configuration.
    pub fn build(self) -> Result<App> {
        let context = match self.context {
            Some(context) => context,
            None => AppContext::builder(&self.config).build()?,
        };

        let mut app = App::new(self.config, context);
        for module in self.modules {
            app.protected = module.register(app.protected);
        }
        for module in self.public_modules {
            app.public = module.register(app.public);
        }
        Ok(app)
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, starting graceful shutdown");
        },
    }

    // Give connections a grace period to close
    tokio::time::sleep(Duration::from_secs(1)).await;
}
