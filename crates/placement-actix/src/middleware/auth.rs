use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, FromRequest, HttpMessage, HttpRequest, ResponseError,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::sync::Arc;

use placement_core::{Claims, PlacementError, Role};

/// The authenticated principal of a request.
///
/// Inserted into request extensions by [`Authenticate`]; handlers take it as an extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl FromRequest for Caller {
    type Error = PlacementError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Caller>()
                .cloned()
                .ok_or_else(|| PlacementError::unauthorized("Authentication required")),
        )
    }
}

fn bearer_token(req: &ServiceRequest) -> Option<&str> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

fn authenticate(req: &ServiceRequest, secret: &str) -> Result<Caller, PlacementError> {
    let token = bearer_token(req)
        .ok_or_else(|| PlacementError::unauthorized("Missing bearer token"))?;

    let claims = Claims::decode(token, secret)
        .map_err(|_| PlacementError::unauthorized("Invalid or expired token"))?;

    if claims.sub.trim().is_empty() {
        return Err(PlacementError::unauthorized("Token has no subject"));
    }

    Ok(Caller {
        user_id: claims.sub,
        role: claims.role,
    })
}

/// Validates `Authorization: Bearer <jwt>` and stores the resulting [`Caller`].
///
/// Requests without a valid token are answered with 401 before reaching the handler.
pub struct Authenticate {
    secret: Arc<str>,
}

impl Authenticate {
    pub fn new(secret: impl Into<Arc<str>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authenticate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthenticateService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthenticateService {
            service: Rc::new(service),
            secret: self.secret.clone(),
        }))
    }
}

pub struct AuthenticateService<S> {
    service: Rc<S>,
    secret: Arc<str>,
}

impl<S, B> Service<ServiceRequest> for AuthenticateService<S>
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
        match authenticate(&req, &self.secret) {
            Ok(caller) => {
                req.extensions_mut().insert(caller);
                let fut = self.service.call(req);
                Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
            }
            Err(err) => {
                tracing::debug!(reason = %err.message, path = %req.path(), "rejected unauthenticated request");
                let res = req.into_response(err.error_response()).map_into_right_body();
                Box::pin(async move { Ok(res) })
            }
        }
    }
}

/// Restricts a scope to callers holding one of the listed roles.
///
/// Must sit inside [`Authenticate`] (i.e. be `.wrap`ped before it).
pub struct RequireRole {
    allowed: Rc<[Role]>,
}

impl RequireRole {
    pub fn any_of(roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            allowed: roles.into_iter().collect(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequireRole
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireRoleService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireRoleService {
            service: Rc::new(service),
            allowed: self.allowed.clone(),
        }))
    }
}

pub struct RequireRoleService<S> {
    service: Rc<S>,
    allowed: Rc<[Role]>,
}

impl<S> RequireRoleService<S> {
    fn check(&self, req: &ServiceRequest) -> Result<(), PlacementError> {
        let extensions = req.extensions();
        let caller = extensions
            .get::<Caller>()
            .ok_or_else(|| PlacementError::unauthorized("Authentication required"))?;

        if self.allowed.contains(&caller.role) {
            Ok(())
        } else {
            Err(PlacementError::forbidden(format!(
                "Role '{}' is not allowed to access this resource",
                caller.role
            )))
        }
    }
}

impl<S, B> Service<ServiceRequest> for RequireRoleService<S>
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
        match self.check(&req) {
            Ok(()) => {
                let fut = self.service.call(req);
                Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
            }
            Err(err) => {
                tracing::info!(reason = %err.message, path = %req.path(), "rejected caller by role");
                let res = req.into_response(err.error_response()).map_into_right_body();
                Box::pin(async move { Ok(res) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App, HttpResponse};

    const SECRET: &str = "test-secret-test-secret-test-secret";

    async fn whoami(caller: Caller) -> HttpResponse {
        HttpResponse::Ok().body(format!("{}:{}", caller.user_id, caller.role))
    }

    fn token(sub: &str, role: Role) -> String {
        Claims::new(sub.to_string(), role, 300)
            .encode(SECRET)
            .expect("encode")
    }

    #[actix_web::test]
    async fn missing_token_is_unauthorized() {
        let app = test::init_service(
            App::new().service(
                web::scope("/user")
                    .wrap(Authenticate::new(SECRET))
                    .route("/me", web::get().to(whoami)),
            ),
        )
        .await;

        let req = test::TestRequest::get().uri("/user/me").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);

        let body: PlacementError = test::read_body_json(resp).await;
        assert_eq!(body.error, "unauthorized");
        assert!(!body.success);
    }

    #[actix_web::test]
    async fn token_signed_with_other_secret_is_rejected() {
        let app = test::init_service(
            App::new().service(
                web::scope("/user")
                    .wrap(Authenticate::new(SECRET))
                    .route("/me", web::get().to(whoami)),
            ),
        )
        .await;

        let forged = Claims::new("u-1".to_string(), Role::Admin, 300)
            .encode("some-other-secret")
            .expect("encode");
        let req = test::TestRequest::get()
            .uri("/user/me")
            .insert_header((header::AUTHORIZATION, format!("Bearer {forged}")))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn valid_token_reaches_handler_as_caller() {
        let app = test::init_service(
            App::new().service(
                web::scope("/user")
                    .wrap(Authenticate::new(SECRET))
                    .route("/me", web::get().to(whoami)),
            ),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/user/me")
            .insert_header((
                header::AUTHORIZATION,
                format!("Bearer {}", token("u-42", Role::Student)),
            ))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, "u-42:student");
    }

    #[actix_web::test]
    async fn role_guard_forbids_other_roles() {
        let app = test::init_service(
            App::new().service(
                web::scope("/admin")
                    .wrap(RequireRole::any_of([Role::Admin]))
                    .wrap(Authenticate::new(SECRET))
                    .route("/me", web::get().to(whoami)),
            ),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/admin/me")
            .insert_header((
                header::AUTHORIZATION,
                format!("Bearer {}", token("c-1", Role::Counsellor)),
            ))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 403);
        let body: PlacementError = test::read_body_json(resp).await;
        assert_eq!(body.error, "forbidden");

        let req = test::TestRequest::get()
            .uri("/admin/me")
            .insert_header((
                header::AUTHORIZATION,
                format!("Bearer {}", token("a-1", Role::Admin)),
            ))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
    }
}
