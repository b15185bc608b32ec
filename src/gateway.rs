//! Gateway assembly
//!
//! [`GatewayBuilder`] wires configuration, the route table, the credential validator,
//! the downstream proxy and the GraphQL schema into one immutable [`AppState`], and
//! [`Gateway`] serves it.
//!
//! ```rust,no_run
//! use feedback_gateway::{Gateway, GatewayConfig};
//!
//! # async fn example() -> feedback_gateway::Result<()> {
//! let config = GatewayConfig::from_env()?;
//! Gateway::builder().with_config(config).build()?.serve().await
//! # }
//! ```

use crate::config::GatewayConfig;
use crate::credential::CredentialValidator;
use crate::graph::{build_schema, FeedbackSchema, ResolverPaths};
use crate::headers::HeaderForwardingConfig;
use crate::proxy::DownstreamProxy;
use crate::router::table::RouteTable;
use crate::shutdown::os_signal_shutdown;
use crate::{Error, Result};
use axum::Router;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Read-only state shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub routes: Arc<RouteTable>,
    pub validator: Arc<CredentialValidator>,
    pub proxy: DownstreamProxy,
    pub schema: FeedbackSchema,
    pub resolver_paths: Arc<ResolverPaths>,
    pub passthrough_headers: Arc<HeaderForwardingConfig>,
    pub resolver_headers: Arc<HeaderForwardingConfig>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("routes", &self.routes.rules().len())
            .field("proxy", &self.proxy)
            .finish()
    }
}

/// A built gateway, ready to serve
#[derive(Debug, Clone)]
pub struct Gateway {
    state: AppState,
}

impl Gateway {
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::default()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Validator sharing this gateway's secret, e.g. for issuing credentials.
    pub fn validator(&self) -> &CredentialValidator {
        &self.state.validator
    }

    pub fn into_router(self) -> Router {
        crate::router::build(self.state)
    }

    /// Bind the configured address and serve until SIGINT/SIGTERM.
    pub async fn serve(self) -> Result<()> {
        let listener = TcpListener::bind(self.state.config.bind_addr).await?;
        self.serve_with_shutdown(listener, os_signal_shutdown()).await
    }

    /// Serve on an already bound listener until `shutdown_signal` completes.
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, shutdown_signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!(addr = ?listener.local_addr().ok(), "Gateway listening");

        let app = self.into_router();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

/// Builder for [`Gateway`]
#[derive(Debug, Default)]
pub struct GatewayBuilder {
    config: Option<GatewayConfig>,
    routes: Option<RouteTable>,
    resolver_paths: Option<ResolverPaths>,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: GatewayConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the default route table.
    pub fn with_routes(mut self, routes: RouteTable) -> Self {
        self.routes = Some(routes);
        self
    }

    /// Override the downstream paths used by the GraphQL resolvers.
    pub fn with_resolver_paths(mut self, paths: ResolverPaths) -> Self {
        self.resolver_paths = Some(paths);
        self
    }

    pub fn build(self) -> Result<Gateway> {
        let config = self
            .config
            .ok_or_else(|| Error::Config("gateway requires a configuration".into()))?;
        config.validate()?;

        let validator =
            CredentialValidator::new(&config.jwt_secret, config.jwt_leeway, config.token_ttl);
        let proxy = DownstreamProxy::from_config(&config)?;
        let schema = build_schema(config.graphql_max_depth, config.graphql_max_complexity);

        let state = AppState {
            routes: Arc::new(self.routes.unwrap_or_default()),
            validator: Arc::new(validator),
            proxy,
            schema,
            resolver_paths: Arc::new(self.resolver_paths.unwrap_or_default()),
            passthrough_headers: Arc::new(HeaderForwardingConfig::passthrough()),
            resolver_headers: Arc::new(HeaderForwardingConfig::resolver()),
            config: Arc::new(config),
        };

        Ok(Gateway { state })
    }
}
