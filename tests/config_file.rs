//! The shipped sample config loads, validates and builds.

use std::path::Path;
use std::sync::Arc;

use waf_gateway::config::{load_config, CheckKind};
use waf_gateway::observability::events::MemorySink;
use waf_gateway::Gateway;

#[tokio::test]
async fn test_sample_config_builds_every_route() {
    std::env::set_var("JWT_SECRET", "sample-secret");
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("gateway.toml");
    let config = load_config(&path).unwrap();

    assert_eq!(config.auth.secret, "sample-secret");
    assert_eq!(config.routes.len(), 4);
    let posts = config.routes.iter().find(|r| r.name == "posts").unwrap();
    assert_eq!(posts.checks.first(), Some(&CheckKind::RateLimit));
    assert!(posts.schema.as_ref().unwrap().fields["title"].required);

    let gateway = Gateway::from_config(&config, Arc::new(MemorySink::default())).unwrap();
    assert_eq!(gateway.routes().len(), 4);
    // Shared limiter plus the login override.
    assert_eq!(gateway.limiters().len(), 2);
}
