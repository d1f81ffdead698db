use crate::auth::AuthFailure;
use crate::error::app_error::ErrorBody;
use rocket::serde::json::Json;
use rocket::{Request, catch};

fn body(error: &str, message: &str) -> Json<ErrorBody> {
    Json(ErrorBody {
        error: error.to_string(),
        message: message.to_string(),
    })
}

#[catch(400)]
pub fn bad_request(_: &Request) -> Json<ErrorBody> {
    body("bad_request", "Bad request")
}

/// Guards record why they refused; fall back to a generic reason otherwise.
#[catch(401)]
pub fn unauthorized(req: &Request) -> Json<ErrorBody> {
    match req.local_cache(|| None::<AuthFailure>) {
        Some(failure) => body(failure.code, &failure.message),
        None => body("invalid_token", "Unauthorized"),
    }
}

#[catch(404)]
pub fn not_found(_: &Request) -> Json<ErrorBody> {
    body("not_found", "Not found")
}

#[catch(409)]
pub fn conflict(_: &Request) -> Json<ErrorBody> {
    body("duplicate", "Conflict")
}

#[catch(422)]
pub fn unprocessable_entity(_: &Request) -> Json<ErrorBody> {
    body("invalid_payload", "Request body could not be parsed")
}

#[catch(500)]
pub fn internal_error(_: &Request) -> Json<ErrorBody> {
    body("server_error", "Internal server error")
}

#[catch(503)]
pub fn service_unavailable(_: &Request) -> Json<ErrorBody> {
    body("service_unavailable", "Service unavailable")
}
