pub mod health;

use actix_web::web;

/// This service's HTTP surface is intentionally health/readiness-only —
/// the decision-point API (`evaluate`, `check`, escalation resolution) is
/// consumed in-process via `SupervisionService`, not over HTTP, the same
/// way the original supervision layer is invoked as a library by callers
/// inside the same runtime rather than through a public gateway route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    health::configure(cfg);
}
