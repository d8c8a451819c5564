use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;
use std::time::Instant;

use crate::Metrics;

/// Path excluded from request metrics so scrapes do not count themselves.
const SCRAPE_PATH: &str = "/metrics";

/// Actix middleware feeding [`Metrics::observe_request`].
pub struct MetricsMiddleware {
    metrics: Metrics,
}

impl MetricsMiddleware {
    pub fn new(metrics: Metrics) -> Self {
        Self { metrics }
    }
}

impl<S, B> Transform<S, ServiceRequest> for MetricsMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = MetricsService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(MetricsService {
            inner: Rc::new(service),
            metrics: self.metrics.clone(),
        }))
    }
}

pub struct MetricsService<S> {
    inner: Rc<S>,
    metrics: Metrics,
}

impl<S, B> Service<ServiceRequest> for MetricsService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(inner);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if req.path() == SCRAPE_PATH {
            let fut = self.inner.call(req);
            return Box::pin(fut);
        }

        let started = Instant::now();
        let metrics = self.metrics.clone();
        let inner = Rc::clone(&self.inner);
        let method = req.method().clone();

        Box::pin(async move {
            let res = inner.call(req).await?;

            let route = res.request().match_pattern();
            metrics.observe_request(
                method.as_str(),
                route.as_deref(),
                res.status().as_u16(),
                started.elapsed(),
            );

            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App, HttpResponse};

    #[actix_web::test]
    async fn requests_are_labelled_by_route_pattern() {
        let metrics = Metrics::new().expect("metrics");
        let app = test::init_service(
            App::new()
                .wrap(MetricsMiddleware::new(metrics.clone()))
                .route(
                    "/user/{id}",
                    web::get().to(|| async { HttpResponse::Ok().finish() }),
                )
                .route(
                    "/metrics",
                    web::get().to(|| async { HttpResponse::Ok().finish() }),
                ),
        )
        .await;

        for uri in ["/user/a", "/user/b", "/metrics", "/nowhere"] {
            let req = test::TestRequest::get().uri(uri).to_request();
            test::call_service(&app, req).await;
        }

        assert_eq!(metrics.http_requests_total.get(), 3);
        let by_route = |route: &str, status: &str| {
            metrics
                .http_requests_total_by_route
                .with_label_values(&["GET", route, status])
                .get()
        };
        assert_eq!(by_route("/user/{id}", "200"), 2);
        assert_eq!(by_route("unmatched", "404"), 1);
        assert_eq!(by_route("/metrics", "200"), 0);
    }
}
