use crate::app::AppContext;
use axum::Router;

/// Trait for composable route modules
///
/// Collaborator resources (workspaces, projects, members, tasks) implement
/// this and are mounted under the API base path behind the authentication
/// gate. Handlers use `State<AppContext>` and
/// [`CurrentPrincipal`](crate::auth::CurrentPrincipal).
///
/// # Example
///
/// ```ignore
/// struct WorkspacesModule;
///
/// impl RouteModule for WorkspacesModule {
///     fn routes(&self) -> Router<AppContext> {
///         Router::new()
///             .route("/", get(list_workspaces).post(create_workspace))
///             .route("/{id}", get(get_workspace))
///     }
///
///     fn prefix(&self) -> Option<&str> {
///         Some("/workspaces")
///     }
/// }
/// ```
pub trait RouteModule {
    /// Returns a router with all routes for this module, without state applied
    fn routes(&self) -> Router<AppContext>;

    /// Optional: specify a path prefix for all routes in this module
    fn prefix(&self) -> Option<&str> {
        None
    }

    /// Registers this module's routes into a router
    fn register(&self, router: Router<AppContext>) -> Router<AppContext> {
        let routes = self.routes();

        if let Some(prefix) = self.prefix() {
            router.nest(prefix, routes)
        } else {
            router.merge(routes)
        }
    }
}
