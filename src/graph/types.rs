//! Entities exposed by the GraphQL schema.
//!
//! The storage service is not consistent about key casing, so every field accepts both
//! the camelCase and snake_case spelling, and `isDeleted` may come back as a boolean or
//! as a 0/1 integer.

use async_graphql::SimpleObject;
use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, PartialEq, SimpleObject, Deserialize)]
#[graphql(complex)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    #[serde(alias = "admin_id", alias = "id")]
    pub admin_id: i64,
    pub email: String,
    #[serde(default, alias = "is_deleted", deserialize_with = "flexible_bool")]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, SimpleObject, Deserialize)]
#[graphql(complex)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    #[serde(alias = "feedback_id", alias = "id")]
    pub feedback_id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub text: String,
    #[serde(default, alias = "submission_date")]
    pub submission_date: String,
    #[serde(default, alias = "is_deleted", deserialize_with = "flexible_bool")]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, SimpleObject, Deserialize)]
#[graphql(complex)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(alias = "action_id", alias = "id")]
    pub action_id: i64,
    #[serde(alias = "admin_id")]
    pub admin_id: i64,
    #[serde(alias = "feedback_id")]
    pub feedback_id: i64,
    pub comment: String,
    #[serde(default, alias = "action_date")]
    pub action_date: String,
}

/// `true`/`false`, any integer (non-zero is true) or `null` (false).
fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }

    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(b)) => b,
        Some(Flag::Int(n)) => n != 0,
        None => false,
    })
}
