use crate::errors::SeedTrackerError;
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    Error, FromRequest, HttpMessage, HttpRequest,
};
use chrono::{Duration, Utc};
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::{ready, Ready};
use std::rc::Rc;

/// Group a caller belongs to. Staff manage inventory; auditors read and export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Staff,
    Auditor,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Role::Staff => write!(f, "staff"),
            Role::Auditor => write!(f, "auditor"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub exp: usize,
}

impl Claims {
    pub fn is_staff(&self) -> bool {
        self.role == Role::Staff
    }

    /// Capability check performed by handlers before calling into the inventory core.
    pub fn require(&self, allowed: &[Role]) -> Result<(), SeedTrackerError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            tracing::warn!("{} ({}) denied: requires one of {:?}", self.sub, self.role, allowed);
            Err(SeedTrackerError::Forbidden(format!(
                "role {} may not perform this action",
                self.role
            )))
        }
    }
}

/// Claims are placed in request extensions by [`JwtAuth`].
impl FromRequest for Claims {
    type Error = SeedTrackerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Claims>()
                .cloned()
                .ok_or(SeedTrackerError::Unauthorized),
        )
    }
}

/// Sign an HS256 token for `sub` with the given role.
pub fn issue_token(
    secret: &str,
    sub: &str,
    role: Role,
    ttl_hours: i64,
) -> Result<String, SeedTrackerError> {
    let expires_at = Duration::try_hours(ttl_hours)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| {
            SeedTrackerError::Validation(format!("token lifetime of {} hours is out of range", ttl_hours))
        })?;
    let exp = usize::try_from(expires_at.timestamp()).map_err(|_| {
        SeedTrackerError::Validation(format!("token lifetime of {} hours is out of range", ttl_hours))
    })?;

    let claims = Claims {
        sub: sub.to_string(),
        role,
        exp,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| SeedTrackerError::Internal(format!("Failed to sign token: {}", e)))
}

pub struct JwtAuth {
    secret: String,
}

impl JwtAuth {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtAuthMiddleware {
            service: Rc::new(service),
            secret: self.secret.clone(),
        }))
    }
}

pub struct JwtAuthMiddleware<S> {
    service: Rc<S>,
    secret: String,
}

impl<S, B> Service<ServiceRequest> for JwtAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Extract token from Authorization header
        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
        {
            Some(token) => token.to_string(),
            None => {
                tracing::warn!("Missing or malformed Authorization header on {}", req.path());
                let res = req.error_response(SeedTrackerError::Unauthorized);
                return Box::pin(async move { Ok(res.map_into_right_body()) });
            }
        };

        let validation = Validation::new(Algorithm::HS256);

        match decode::<Claims>(
            &token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        ) {
            Ok(token_data) => {
                // Add caller info to request extensions for handlers to access
                req.extensions_mut().insert(token_data.claims);

                let fut = self.service.call(req);
                Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
            }
            Err(err) => {
                tracing::warn!("JWT validation failed: {:?}", err);
                let res = req.error_response(SeedTrackerError::Unauthorized);
                Box::pin(async move { Ok(res.map_into_right_body()) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issued_token_decodes() {
        let token = issue_token("secret", "alice", Role::Auditor, 1).unwrap();
        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();
        assert_eq!(data.claims.sub, "alice");
        assert_eq!(data.claims.role, Role::Auditor);
    }

    #[test]
    fn test_out_of_range_lifetime_is_an_error() {
        for ttl in [i64::MAX, i64::MIN, 10_000_000_000_000] {
            assert!(matches!(
                issue_token("secret", "alice", Role::Staff, ttl),
                Err(SeedTrackerError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_require_role() {
        let claims = Claims {
            sub: "bob".to_string(),
            role: Role::Auditor,
            exp: 0,
        };
        assert!(claims.require(&[Role::Staff, Role::Auditor]).is_ok());
        assert!(matches!(
            claims.require(&[Role::Staff]),
            Err(SeedTrackerError::Forbidden(_))
        ));
        assert!(!claims.is_staff());
    }
}
