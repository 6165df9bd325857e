use crate::infrastructure::jwt::JwtService;
use actix_web::{dev::ServiceRequest, web, Error, HttpMessage};
use actix_web_httpauth::extractors::bearer::{self, BearerAuth, Config};
use actix_web_httpauth::extractors::AuthenticationError;
use std::sync::Arc;

const REALM: &str = "DoubleV Blog";

fn challenge(req: &ServiceRequest, kind: bearer::Error, description: &str) -> Error {
    let config = req
        .app_data::<Config>()
        .cloned()
        .unwrap_or_default()
        .realm(REALM);

    AuthenticationError::from(config)
        .with_error(kind)
        .with_error_description(description.to_string())
        .into()
}

/// Bearer validator for the admin and REST scopes.
///
/// A valid token puts an `AdminIdentity` into the request extensions; the
/// handlers check the resource tag they need against it. Tokens that carry
/// no resource tag at all are refused here with 403.
pub async fn admin_auth(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    let jwt_service = match req.app_data::<web::Data<Arc<JwtService>>>() {
        Some(service) => service.get_ref().clone(),
        None => {
            return Err((
                actix_web::error::ErrorInternalServerError("JWT service not configured"),
                req,
            ));
        }
    };

    let identity = match jwt_service.verify_token(credentials.token()) {
        Ok(identity) => identity,
        Err(err) => {
            tracing::warn!("Rejected bearer token for {} {}: {}", req.method(), req.path(), err);
            let error = challenge(&req, bearer::Error::InvalidToken, "Token is invalid or expired");
            return Err((error, req));
        }
    };

    if identity.resources.is_empty() {
        tracing::warn!("Admin {} presented a token without resource tags", identity.username);
        let error = challenge(&req, bearer::Error::InsufficientScope, "No admin resources granted");
        return Err((error, req));
    }

    tracing::debug!("{} {} by admin {}", req.method(), req.path(), identity.username);
    req.extensions_mut().insert(identity);
    Ok(req)
}
