pub mod chat;
pub mod prekeys;
pub mod wsroute;

use actix_web::HttpRequest;

/// Raw `Cookie` header, empty when absent. The verification collaborator
/// owns the judgment call.
pub(crate) fn cookie_header(req: &HttpRequest) -> String {
    req.headers()
        .get(actix_web::http::header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
