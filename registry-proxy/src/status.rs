//! Status service.

use crate::AppState;
use actix_web::HttpResponse;

/// Expose liveness status.
///
/// Status:
///  * Live (200 code): the status server has started running.
///  * Not Live (503 code): everything else.
pub async fn serve_liveness(app_data: actix_web::web::Data<AppState>) -> HttpResponse {
    if app_data.is_live() {
        HttpResponse::Ok().finish()
    } else {
        HttpResponse::ServiceUnavailable().finish()
    }
}

/// Expose readiness status.
///
/// Status:
///  * Ready (200 code): the main service is bound and accepts connections.
///  * Not Ready (503 code): everything else.
pub async fn serve_readiness(app_data: actix_web::web::Data<AppState>) -> HttpResponse {
    if app_data.is_ready() {
        HttpResponse::Ok().finish()
    } else {
        HttpResponse::ServiceUnavailable().finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppSettings;
    use actix_web::{test, web, App};

    #[actix_web::test]
    async fn probes_follow_state() {
        let registry = Box::leak(Box::new(prometheus::Registry::new()));
        let settings = AppSettings {
            debug: true,
            ..Default::default()
        };
        let state = AppState::try_new(&settings, registry).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .route("/livez", web::get().to(serve_liveness))
                .route("/readyz", web::get().to(serve_readiness)),
        )
        .await;

        let req = test::TestRequest::get().uri("/livez").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 503);

        state.set_live(true);
        let req = test::TestRequest::get().uri("/livez").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 200);

        let req = test::TestRequest::get().uri("/readyz").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 503);

        state.set_ready(true);
        let req = test::TestRequest::get().uri("/readyz").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 200);
    }
}
