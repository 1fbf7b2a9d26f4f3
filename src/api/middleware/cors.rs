use http::{HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// CORS policy for the read routes. An empty allow-list (dev shells)
/// permits any origin; otherwise only the configured comma-separated
/// origins may call us.
pub fn cors_layer(allow_origins: &str) -> CorsLayer {
    let origins: Vec<HeaderValue> = allow_origins
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .filter_map(|o| o.parse().ok())
        .collect();

    let allow = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(allow)
}
