//! # feedback-gateway
//!
//! Authenticating API gateway in front of the admin and feedback services, with a
//! GraphQL aggregation layer over their REST APIs.
//!
//! ## Request flow
//!
//! 1. The route table classifies the request as public, admin-protected,
//!    feedback-protected or unmatched.
//! 2. Protected requests are checked by the [`CredentialValidator`]; failures are
//!    answered immediately and never reach a downstream service.
//! 3. The request is either answered locally (health, GraphQL) or handed to the
//!    [`DownstreamProxy`], which forwards it verbatim and passes the response back.
//!
//! GraphQL queries fan out into per-field REST lookups through the same proxy; see
//! [`graph`] for the null-on-failure policy.
//!
//! ## Main Components
//!
//! - [`Gateway`] / [`GatewayBuilder`]: assembles and serves the gateway.
//! - [`GatewayConfig`]: startup configuration, read from the environment.
//! - [`RouteTable`]: the single classification table.
//! - [`CredentialValidator`]: HS256 session credential checks and issuing.
//! - [`DownstreamProxy`]: the forwarding primitive.
//!
//! ## Example
//!
//! ```rust,no_run
//! use feedback_gateway::{Gateway, GatewayConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::new(
//!         "http://localhost:6061",
//!         "http://localhost:6061",
//!         "change-me",
//!     );
//!     let app = Gateway::builder().with_config(config).build()?.into_router();
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8084").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod credential;
pub mod error;
pub mod gateway;
pub mod graph;
pub mod headers;
pub mod health;
pub mod middleware;
pub mod proxy;
pub mod router;
pub mod shutdown;

pub use config::GatewayConfig;
pub use credential::{bearer_token, AdminIdentity, CredentialValidator, SessionClaims};
pub use error::{Error, ErrorBody, Result};
pub use gateway::{AppState, Gateway, GatewayBuilder};
pub use graph::{build_schema, FeedbackSchema, ResolverPaths};
pub use headers::HeaderForwardingConfig;
pub use health::{HealthResponse, HealthStatus};
pub use middleware::RequestContext;
pub use proxy::{DownstreamProxy, ProxyBody, ProxyRequest, ProxyResponse, Upstream};
pub use router::table::{AccessClass, LocalRoute, RouteDecision, RouteRule, RouteTable, RouteTarget};
pub use shutdown::os_signal_shutdown;
