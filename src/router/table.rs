//! Route classification table
//!
//! Every inbound request is classified exactly once against this table. Carve-outs,
//! such as the public admin lookup-by-email nested under the protected admin prefix,
//! are ordinary rules; the most specific matching rule wins.

use axum::http::Method;

/// Access requirement of a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessClass {
    /// Forwarded regardless of any credential
    Public,
    /// Requires a valid credential carrying an administrator id
    AdminProtected,
    /// Feedback-service routes that require an administrator credential
    FeedbackProtected,
}

impl AccessClass {
    pub fn requires_credential(&self) -> bool {
        !matches!(self, AccessClass::Public)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessClass::Public => "public",
            AccessClass::AdminProtected => "admin-protected",
            AccessClass::FeedbackProtected => "feedback-protected",
        }
    }
}

/// Handlers served by the gateway itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalRoute {
    /// `GET /`, load-balancer probe
    Root,
    Health,
    Playground,
    GraphQl,
    /// Canned `allFeedback` query
    FeedbackGraph,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    /// Sent to the downstream service owning the path
    Forward,
    Local(LocalRoute),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// Whole path equals the pattern
    Exact(String),
    /// Path starts with the pattern's segments
    Prefix(String),
    /// Same segment count; `*` matches any single segment
    Template(String),
}

impl PathPattern {
    fn segments(&self) -> Vec<&str> {
        let raw = match self {
            PathPattern::Exact(p) | PathPattern::Prefix(p) | PathPattern::Template(p) => p,
        };
        split_segments(raw)
    }

    fn rank(&self) -> u8 {
        match self {
            PathPattern::Exact(_) => 2,
            PathPattern::Template(_) => 1,
            PathPattern::Prefix(_) => 0,
        }
    }

    fn matches(&self, path: &[&str]) -> bool {
        let pattern = self.segments();
        match self {
            PathPattern::Exact(_) => pattern == path,
            PathPattern::Prefix(_) => {
                pattern.len() <= path.len() && pattern.iter().zip(path).all(|(p, s)| p == s)
            }
            PathPattern::Template(_) => {
                pattern.len() == path.len()
                    && pattern
                        .iter()
                        .zip(path)
                        .all(|(p, s)| *p == "*" || p == s)
            }
        }
    }

    fn literal_segments(&self) -> usize {
        self.segments().iter().filter(|s| **s != "*").count()
    }
}

/// One row of the table
#[derive(Debug, Clone)]
pub struct RouteRule {
    pub name: &'static str,
    pub pattern: PathPattern,
    /// `None` matches every method
    pub methods: Option<Vec<Method>>,
    pub class: AccessClass,
    pub target: RouteTarget,
    /// JSON field the gateway checks in the request body before forwarding
    pub required_field: Option<&'static str>,
}

impl RouteRule {
    fn new(name: &'static str, pattern: PathPattern) -> Self {
        Self {
            name,
            pattern,
            methods: None,
            class: AccessClass::Public,
            target: RouteTarget::Forward,
            required_field: None,
        }
    }

    pub fn exact(name: &'static str, path: &str) -> Self {
        Self::new(name, PathPattern::Exact(path.to_string()))
    }

    pub fn prefix(name: &'static str, path: &str) -> Self {
        Self::new(name, PathPattern::Prefix(path.to_string()))
    }

    pub fn template(name: &'static str, path: &str) -> Self {
        Self::new(name, PathPattern::Template(path.to_string()))
    }

    pub fn methods(mut self, methods: &[Method]) -> Self {
        self.methods = Some(methods.to_vec());
        self
    }

    pub fn class(mut self, class: AccessClass) -> Self {
        self.class = class;
        self
    }

    pub fn local(mut self, route: LocalRoute) -> Self {
        self.target = RouteTarget::Local(route);
        self
    }

    pub fn require_field(mut self, field: &'static str) -> Self {
        self.required_field = Some(field);
        self
    }

    fn allows(&self, method: &Method) -> bool {
        self.methods
            .as_ref()
            .map_or(true, |methods| methods.contains(method))
    }

    fn specificity(&self) -> (usize, u8, bool) {
        (
            self.pattern.literal_segments(),
            self.pattern.rank(),
            self.methods.is_some(),
        )
    }
}

/// Outcome of classifying one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    pub route: &'static str,
    pub class: AccessClass,
    pub target: RouteTarget,
    pub required_field: Option<&'static str>,
}

/// Ordered set of [`RouteRule`]s
#[derive(Debug, Clone)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl Default for RouteTable {
    fn default() -> Self {
        use AccessClass::*;

        Self::new()
            .rule(RouteRule::exact("root", "/").methods(&[Method::GET]).local(LocalRoute::Root))
            .rule(
                RouteRule::exact("health", "/health")
                    .methods(&[Method::GET])
                    .local(LocalRoute::Health),
            )
            .rule(
                RouteRule::exact("graphql_playground", "/graphql")
                    .methods(&[Method::GET])
                    .local(LocalRoute::Playground),
            )
            .rule(
                RouteRule::exact("graphql", "/graphql")
                    .methods(&[Method::POST])
                    .class(AdminProtected)
                    .local(LocalRoute::GraphQl),
            )
            // looked up during login, before a credential exists
            .rule(RouteRule::prefix("admin_check", "/api/admin/check"))
            .rule(
                RouteRule::exact("admin_check", "/api/admin/check")
                    .methods(&[Method::POST])
                    .require_field("email"),
            )
            .rule(
                RouteRule::exact("admin_register", "/api/admin")
                    .methods(&[Method::POST])
                    .require_field("email"),
            )
            .rule(
                RouteRule::exact("feedback_graph", "/api/admin/feedback/graphql")
                    .methods(&[Method::GET])
                    .class(AdminProtected)
                    .local(LocalRoute::FeedbackGraph),
            )
            .rule(
                RouteRule::template("admin_action_create", "/api/admin/*/feedback/*")
                    .methods(&[Method::POST])
                    .class(AdminProtected)
                    .require_field("comment"),
            )
            .rule(RouteRule::prefix("admin", "/api/admin").class(AdminProtected))
            .rule(
                RouteRule::exact("feedback_submit", "/api/feedback")
                    .methods(&[Method::POST])
                    .require_field("text"),
            )
            .rule(RouteRule::prefix("feedback", "/api/feedback").class(FeedbackProtected))
    }
}

impl RouteTable {
    /// Empty table; every request is unmatched.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn rule(mut self, rule: RouteRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Classify a request; `None` means unmatched.
    ///
    /// `/x` and `/x/` classify identically. Among matching rules the one with the most
    /// literal segments wins, then exact over template over prefix, then a
    /// method-specific rule over a method-agnostic one. Equal candidates resolve to
    /// the first declared.
    pub fn classify(&self, method: &Method, path: &str) -> Option<RouteDecision> {
        let segments = split_segments(path);

        let mut best: Option<&RouteRule> = None;
        for rule in &self.rules {
            if !rule.allows(method) || !rule.pattern.matches(&segments) {
                continue;
            }
            if best.map_or(true, |b| rule.specificity() > b.specificity()) {
                best = Some(rule);
            }
        }

        best.map(|rule| RouteDecision {
            route: rule.name,
            class: rule.class,
            target: rule.target,
            required_field: rule.required_field,
        })
    }
}

/// Non-empty path segments; trailing and repeated slashes are ignored.
fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}
