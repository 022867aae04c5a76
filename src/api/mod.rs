use actix_web::HttpResponse;
use serde::Serialize;
use serde_json::json;

pub mod attendance;
pub mod attendance_summary;
pub mod extract;
pub mod staff_shift;

/// `200 {"ok": true, "message": ..., "data": ...}`
pub fn ok_json<T: Serialize>(message: &str, data: T) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "ok": true,
        "message": message,
        "data": data,
    }))
}
