//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes with their pipelines
//! - Look up the matching route for a request
//! - Return the matched route or an explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Ordered by priority, then by prefix length: most specific first
//! - O(n) scan (acceptable for typical route counts)

use std::sync::Arc;

use crate::gateway::pipeline::Pipeline;
use crate::gateway::request::GatewayRequest;
use crate::routing::matcher::{AndMatcher, Matcher};

/// A compiled route.
#[derive(Clone)]
pub struct Route {
    pub name: String,
    pub priority: u32,
    prefix_len: usize,
    matcher: Arc<AndMatcher>,
    pub pipeline: Arc<Pipeline>,
}

impl Route {
    pub fn new(name: impl Into<String>, priority: u32, prefix_len: usize, matcher: AndMatcher, pipeline: Pipeline) -> Self {
        Self {
            name: name.into(),
            priority,
            prefix_len,
            matcher: Arc::new(matcher),
            pipeline: Arc::new(pipeline),
        }
    }
}

#[derive(Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new(mut routes: Vec<Route>) -> Self {
        // Stable sort: equal keys keep config order.
        routes.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.prefix_len.cmp(&a.prefix_len))
        });
        Self { routes }
    }

    /// First route whose conditions all hold.
    pub fn match_request(&self, req: &GatewayRequest) -> Option<&Route> {
        self.routes.iter().find(|r| r.matcher.matches(req))
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::error::GatewayError;
    use crate::gateway::forwarder::Forward;
    use crate::gateway::request::test_support::*;
    use crate::routing::matcher::{MethodMatcher, PathPrefixMatcher};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Response};
    use std::time::Duration;

    struct Unused;

    #[async_trait]
    impl Forward for Unused {
        async fn forward(&self, _request: &GatewayRequest) -> Result<Response<Body>, GatewayError> {
            unreachable!("routing tests never forward")
        }
    }

    fn route(name: &str, prefix: &str, methods: Vec<Method>, priority: u32) -> Route {
        let matcher = AndMatcher::new(vec![
            Box::new(PathPrefixMatcher::new(prefix)),
            Box::new(MethodMatcher::new(methods)),
        ]);
        let pipeline = Pipeline::new(name, Vec::new(), Arc::new(Unused), Duration::from_secs(1));
        Route::new(name, priority, prefix.len(), matcher, pipeline)
    }

    #[test]
    fn test_longest_prefix_wins_at_equal_priority() {
        let table = RouteTable::new(vec![
            route("root", "/", vec![], 0),
            route("api", "/api", vec![], 0),
            route("login", "/api/login", vec![Method::POST], 0),
        ]);

        let name = |m: &str, p: &str| table.match_request(&request(m, p)).map(|r| r.name.clone());
        assert_eq!(name("POST", "/api/login").as_deref(), Some("login"));
        assert_eq!(name("GET", "/api/login").as_deref(), Some("api"));
        assert_eq!(name("GET", "/other").as_deref(), Some("root"));
    }

    #[test]
    fn test_priority_beats_specificity() {
        let table = RouteTable::new(vec![route("api", "/api", vec![], 0), route("all", "/", vec![], 5)]);
        assert_eq!(table.match_request(&request("GET", "/api/x")).unwrap().name, "all");
    }

    #[test]
    fn test_no_match() {
        let table = RouteTable::new(vec![route("api", "/api", vec![], 0)]);
        assert!(table.match_request(&request("GET", "/web")).is_none());
    }
}
