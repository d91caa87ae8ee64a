use actix_web::middleware::Next;
use actix_web::{
    Error, HttpResponse,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use secrecy::ExposeSecret;
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::api::AppState;

/// Bearer token check for the operator API. A device without
/// `API_TOKEN` configured accepts every request.
pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let expected = req
        .app_data::<Data<AppState>>()
        .ok_or_else(|| actix_web::error::ErrorInternalServerError("App state missing"))?
        .api_token
        .clone();

    let Some(expected) = expected else {
        return next.call(req).await;
    };

    let header_value = match req.headers().get("Authorization") {
        Some(h) => h.to_str().map_err(|_| {
            actix_web::error::ErrorUnauthorized(
                json!({"error": "Invalid Authorization header encoding"}),
            )
        })?,
        None => {
            let resp =
                HttpResponse::Unauthorized().json(json!({"error": "Missing Authorization header"}));
            return Ok(req.into_response(resp.map_into_boxed_body()));
        }
    };

    let token = match header_value.strip_prefix("Bearer ") {
        Some(t) => t,
        None => {
            let resp = HttpResponse::Unauthorized()
                .json(json!({"error": "Authorization header must start with Bearer"}));
            return Ok(req.into_response(resp.map_into_boxed_body()));
        }
    };

    if !token_matches(token, expected.expose_secret()) {
        let resp = HttpResponse::Unauthorized().json(json!({"error": "Invalid token"}));
        return Ok(req.into_response(resp.map_into_boxed_body()));
    }

    next.call(req).await
}

/// Constant-time; a length mismatch is a mismatch.
fn token_matches(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_exact_token_matches() {
        assert!(token_matches("s3cret", "s3cret"));
        assert!(!token_matches("s3cre", "s3cret"));
        assert!(!token_matches("s3cretX", "s3cret"));
        assert!(!token_matches("S3CRET", "s3cret"));
        assert!(!token_matches("", "s3cret"));
    }
}
