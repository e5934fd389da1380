/// HTTP middleware and extractors for the content service
///
/// Members authenticate every request with their phone number and the
/// household access code as HTTP Basic credentials. WebSocket upgrades
/// from browsers cannot set headers, so `phone`/`code` query parameters
/// are accepted there as well.
use crate::error::AppError;
use crate::metrics::content::HTTP_REQUEST_DURATION_SECONDS;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, Error, FromRequest, HttpRequest};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use content_model::Credential;
use futures_util::future::LocalBoxFuture;
use serde::Deserialize;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::time::Instant;

// =====================================================================
// Member credential
// =====================================================================

/// Credential presented with the request. Resolution to an identity is
/// left to the service so it happens on every call.
#[derive(Debug, Clone)]
pub struct MemberCredential(pub Credential);

#[derive(Debug, Deserialize)]
struct CredentialQuery {
    phone: Option<String>,
    code: Option<String>,
}

fn from_basic_auth(req: &HttpRequest) -> Option<Result<Credential, AppError>> {
    let header = req.headers().get(AUTHORIZATION)?;
    let parsed = header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Basic "))
        .and_then(|encoded| STANDARD.decode(encoded.trim()).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .and_then(|decoded| {
            decoded
                .split_once(':')
                .map(|(phone, code)| Credential::new(phone, code))
        })
        .filter(|credential| !credential.phone.is_empty());

    Some(parsed.ok_or(AppError::Unauthenticated))
}

fn from_query(req: &HttpRequest) -> Option<Credential> {
    let query = web::Query::<CredentialQuery>::from_query(req.query_string()).ok()?;
    let CredentialQuery { phone, code } = query.into_inner();
    match (phone, code) {
        (Some(phone), Some(code)) if !phone.is_empty() => Some(Credential::new(phone, code)),
        _ => None,
    }
}

impl FromRequest for MemberCredential {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        let credential = match from_basic_auth(req) {
            Some(result) => result,
            None => from_query(req).ok_or(AppError::Unauthenticated),
        };
        ready(credential.map(MemberCredential))
    }
}

// =====================================================================
// Metrics middleware
// =====================================================================

pub struct MetricsMiddleware;

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = MetricsMiddlewareService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsMiddlewareService {
            service: Rc::new(service),
        }))
    }
}

pub struct MetricsMiddlewareService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for MetricsMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let path = req.path().to_string();
        let method = req.method().to_string();
        let start = Instant::now();

        Box::pin(async move {
            let res = service.call(req).await;
            let elapsed = start.elapsed();
            let status = match &res {
                Ok(response) => status_class(response.status().as_u16()),
                Err(err) => status_class(err.as_response_error().status_code().as_u16()),
            };
            HTTP_REQUEST_DURATION_SECONDS
                .with_label_values(&[method.as_str(), status])
                .observe(elapsed.as_secs_f64());
            tracing::debug!(%method, %path, status, elapsed_ms = elapsed.as_millis() as u64, "request completed");
            res
        })
    }
}

fn status_class(status: u16) -> &'static str {
    match status {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    async fn extract(req: HttpRequest) -> Result<MemberCredential, AppError> {
        MemberCredential::from_request(&req, &mut actix_web::dev::Payload::None).await
    }

    #[actix_web::test]
    async fn test_basic_auth_credential() {
        let encoded = STANDARD.encode("555-0100:hearth");
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, format!("Basic {}", encoded)))
            .to_http_request();

        let MemberCredential(credential) = extract(req).await.unwrap();
        assert_eq!(credential.phone, "555-0100");
        assert_eq!(credential.access_code, "hearth");
    }

    #[actix_web::test]
    async fn test_malformed_header_is_rejected() {
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer abc"))
            .uri("/?phone=5550100&code=hearth")
            .to_http_request();
        assert!(matches!(extract(req).await, Err(AppError::Unauthenticated)));
    }

    #[actix_web::test]
    async fn test_query_fallback_for_upgrades() {
        let req = TestRequest::default()
            .uri("/api/v1/realtime/chat?phone=5550100&code=hearth")
            .to_http_request();
        let MemberCredential(credential) = extract(req).await.unwrap();
        assert_eq!(credential.phone, "5550100");

        let missing = TestRequest::default().uri("/?phone=5550100").to_http_request();
        assert!(matches!(extract(missing).await, Err(AppError::Unauthenticated)));
    }

    #[test]
    fn test_status_class() {
        assert_eq!(status_class(201), "2xx");
        assert_eq!(status_class(403), "4xx");
        assert_eq!(status_class(503), "5xx");
    }
}
