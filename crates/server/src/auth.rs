mod claims;
mod credentials;
mod error;
mod issuer;
mod token;

use std::{
    fmt::Display,
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{body::Body, response::IntoResponse};
use config::AuthConfig;
use http::{Request, Response};
use jwt_compact::alg::Hs256Key;
use secrecy::ExposeSecret;
use tower::Layer;

pub(crate) use credentials::CredentialStore;
pub(crate) use error::AuthError;
pub(crate) use issuer::CredentialIssuer;
pub(crate) use token::TokenAuthenticator;

use crate::{client_ip, error::ApiError};

type AuthResult<T> = Result<T, AuthError>;

/// Builds the process-wide signing key.
///
/// Without a configured secret a random key is generated, which invalidates every token on restart.
pub(crate) fn signing_key(config: &AuthConfig) -> Hs256Key {
    match &config.secret {
        Some(secret) => Hs256Key::new(secret.expose_secret().as_bytes()),
        None => {
            log::warn!(
                "No token signing secret configured in [server.auth]. Using a random key: \
                issued tokens will not survive a restart."
            );

            Hs256Key::new(rand::random::<[u8; 32]>())
        }
    }
}

/// Resolves the [`config::Identity`] of every request and stores it in the request extensions.
///
/// Requests carrying an invalid token never reach the inner service.
#[derive(Clone)]
pub(crate) struct IdentityLayer(Arc<IdentityLayerInner>);

struct IdentityLayerInner {
    authenticator: TokenAuthenticator,
    trust_forwarded_headers: bool,
}

impl IdentityLayer {
    pub fn new(authenticator: TokenAuthenticator, trust_forwarded_headers: bool) -> Self {
        Self(Arc::new(IdentityLayerInner {
            authenticator,
            trust_forwarded_headers,
        }))
    }
}

impl<Service> Layer<Service> for IdentityLayer
where
    Service: Send + Clone,
{
    type Service = IdentityService<Service>;

    fn layer(&self, next: Service) -> Self::Service {
        IdentityService {
            next,
            layer: self.0.clone(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct IdentityService<Service> {
    next: Service,
    layer: Arc<IdentityLayerInner>,
}

impl<Service, ReqBody> tower::Service<Request<ReqBody>> for IdentityService<Service>
where
    Service: tower::Service<Request<ReqBody>, Response = Response<Body>> + Send + Clone + 'static,
    Service::Future: Send,
    Service::Error: Display + 'static,
    ReqBody: http_body::Body + Send + 'static,
{
    type Response = Response<Body>;
    type Error = Service::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response<Body>, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.next.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let mut next = self.next.clone();
        let layer = self.layer.clone();

        let (mut parts, body) = req.into_parts();

        Box::pin(async move {
            let origin = client_ip::origin(&parts, layer.trust_forwarded_headers);

            match layer.authenticator.resolve(&parts.headers, &origin) {
                Ok(identity) => {
                    parts.extensions.insert(identity);
                    next.call(Request::from_parts(parts, body)).await
                }
                Err(error) => {
                    log::debug!("Rejecting request from {origin}: {error}");
                    Ok(ApiError::from(error).into_response())
                }
            }
        })
    }
}
