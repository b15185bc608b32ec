//! GraphQL aggregation over the admin and feedback services
//!
//! The schema is fixed: `Admin`, `Feedback` and `Action`, plus four root queries.
//! Every relation is its own field resolver, so a relation costs downstream calls only
//! when it is selected. Lists are resolved concurrently by the executor and keep the
//! order of the downstream list.
//!
//! # Failure policy
//!
//! Resolvers never surface a downstream failure as a GraphQL error:
//!
//! - a root query whose entity is missing or whose lookup fails resolves to `null`
//!   (failures are logged at `error`)
//! - a nested relation that is missing or fails resolves to `null` and leaves its
//!   siblings untouched (failures are logged at `warn`)

mod fetch;
mod types;

pub use fetch::{EntityFetcher, FetchFailure, FetchResult, Fetched, ResolverPaths};
pub use types::{Action, Admin, Feedback};

use async_graphql::http::{playground_source, GraphQLPlaygroundConfig};
use async_graphql::{ComplexObject, Context, EmptyMutation, EmptySubscription, Object, Schema};
use tracing::{error, warn};

pub type FeedbackSchema = Schema<QueryRoot, EmptyMutation, EmptySubscription>;

/// Query served by `GET /api/admin/feedback/graphql`
pub const ALL_FEEDBACK_QUERY: &str = "{ allFeedback { feedbackId name email text \
    submissionDate isDeleted actions { actionId adminId feedbackId comment actionDate \
    admin { adminId email isDeleted } } } }";

/// Build the schema with the configured depth and complexity bounds.
pub fn build_schema(max_depth: usize, max_complexity: usize) -> FeedbackSchema {
    Schema::build(QueryRoot, EmptyMutation, EmptySubscription)
        .limit_depth(max_depth)
        .limit_complexity(max_complexity)
        .finish()
}

pub fn playground_html(endpoint: &str) -> String {
    playground_source(GraphQLPlaygroundConfig::new(endpoint))
}

fn root<T>(field: &'static str, result: FetchResult<T>) -> Option<T> {
    result.unwrap_or_else(|failure| {
        error!(field, path = %failure.path, status = ?failure.status, reason = %failure.reason, "root lookup failed");
        None
    })
}

fn nested<T>(field: &'static str, result: FetchResult<T>) -> Option<T> {
    result.unwrap_or_else(|failure| {
        warn!(field, path = %failure.path, status = ?failure.status, reason = %failure.reason, "nested lookup failed, resolving to null");
        None
    })
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn feedback(&self, ctx: &Context<'_>, id: i64) -> async_graphql::Result<Option<Feedback>> {
        let fetcher = ctx.data::<EntityFetcher>()?;
        Ok(root("Query.feedback", fetcher.feedback(id).await))
    }

    async fn action(&self, ctx: &Context<'_>, id: i64) -> async_graphql::Result<Option<Action>> {
        let fetcher = ctx.data::<EntityFetcher>()?;
        Ok(root("Query.action", fetcher.action(id).await))
    }

    async fn admin(&self, ctx: &Context<'_>, id: i64) -> async_graphql::Result<Option<Admin>> {
        let fetcher = ctx.data::<EntityFetcher>()?;
        Ok(root("Query.admin", fetcher.admin(id).await))
    }

    /// Every feedback item, in the order the feedback service lists them
    async fn all_feedback(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<Vec<Feedback>>> {
        let fetcher = ctx.data::<EntityFetcher>()?;
        Ok(root("Query.allFeedback", fetcher.all_feedback().await))
    }
}

#[ComplexObject]
impl Feedback {
    async fn actions(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<Vec<Action>>> {
        let fetcher = ctx.data::<EntityFetcher>()?;
        Ok(nested(
            "Feedback.actions",
            fetcher.feedback_actions(self.feedback_id).await,
        ))
    }
}

#[ComplexObject]
impl Admin {
    async fn actions(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<Vec<Action>>> {
        let fetcher = ctx.data::<EntityFetcher>()?;
        Ok(nested("Admin.actions", fetcher.admin_actions(self.admin_id).await))
    }
}

#[ComplexObject]
impl Action {
    async fn admin(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<Admin>> {
        let fetcher = ctx.data::<EntityFetcher>()?;
        Ok(nested("Action.admin", fetcher.admin(self.admin_id).await))
    }

    async fn feedback(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<Feedback>> {
        let fetcher = ctx.data::<EntityFetcher>()?;
        Ok(nested("Action.feedback", fetcher.feedback(self.feedback_id).await))
    }
}
