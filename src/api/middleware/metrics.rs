//! Request counting middleware.

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};

/// Counter incremented once per handled property request.
pub const REQUESTS_TOTAL: &str = "property_requests_total";

/// Map a routed request onto its resource operation.
fn operation_name(method: &Method, matched_path: &str) -> Option<&'static str> {
    let member = matched_path.ends_with("{id}");

    match (method.as_str(), member) {
        ("GET", false) => Some("index"),
        ("POST", false) => Some("create"),
        ("GET", true) => Some("show"),
        ("PUT", true) => Some("upsert"),
        ("PATCH", true) => Some("patch"),
        ("DELETE", true) => Some("destroy"),
        _ => None,
    }
}

/// Outcome label for a response status.
fn outcome(status: StatusCode) -> &'static str {
    if status == StatusCode::NOT_FOUND {
        "not_found"
    } else if status.is_client_error() {
        "rejected"
    } else if status.is_server_error() {
        "error"
    } else {
        "success"
    }
}

/// Count requests by operation and outcome.
///
/// Must be installed with `route_layer` so the matched path is known.
pub async fn track_requests(req: Request<Body>, next: Next) -> Response {
    let operation = req
        .extensions()
        .get::<MatchedPath>()
        .and_then(|path| operation_name(req.method(), path.as_str()));

    let response = next.run(req).await;

    if let Some(operation) = operation {
        metrics::counter!(
            REQUESTS_TOTAL,
            "operation" => operation,
            "outcome" => outcome(response.status())
        )
        .increment(1);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_names() {
        let collection = "/api/properties";
        let member = "/api/properties/{id}";

        assert_eq!(operation_name(&Method::GET, collection), Some("index"));
        assert_eq!(operation_name(&Method::POST, collection), Some("create"));
        assert_eq!(operation_name(&Method::GET, member), Some("show"));
        assert_eq!(operation_name(&Method::PUT, member), Some("upsert"));
        assert_eq!(operation_name(&Method::PATCH, member), Some("patch"));
        assert_eq!(operation_name(&Method::DELETE, member), Some("destroy"));
        assert_eq!(operation_name(&Method::DELETE, collection), None);
    }

    #[test]
    fn test_outcomes() {
        assert_eq!(outcome(StatusCode::OK), "success");
        assert_eq!(outcome(StatusCode::NO_CONTENT), "success");
        assert_eq!(outcome(StatusCode::NOT_FOUND), "not_found");
        assert_eq!(outcome(StatusCode::BAD_REQUEST), "rejected");
        assert_eq!(outcome(StatusCode::INTERNAL_SERVER_ERROR), "error");
    }
}
