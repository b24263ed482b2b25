use std::fmt::Display;

use crate::config::Settings;
use crate::server::api;

pub struct HttpResponse {
    pub status_code: u16,
    pub status_text: &'static str,
    pub content_type: &'static str,
    pub body: String,
}

impl HttpResponse {
    pub fn to_http_string(&self) -> String {
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            self.status_code,
            self.status_text,
            self.content_type,
            self.body.len(),
            self.body
        )
    }
}

/// Read-only: every route serves the persisted files and never starts a
/// collection run.
pub fn route_request(method: &str, path: &str, settings: &Settings) -> HttpResponse {
    if method != "GET" {
        return error_response(405, "Method Not Allowed", "Only GET is supported");
    }
    let route = path.split('?').next().unwrap_or(path);
    match route {
        "/api/health" => json_or_error(api::health_payload()),
        "/api/boundaries" => json_or_error(api::boundaries_payload(settings, path)),
        "/api/missing" => json_or_error(api::missing_payload(settings)),
        "/api/licenses" => json_or_error(api::licenses_payload(settings)),
        "/api/status" => json_or_error(api::status_payload(settings)),
        _ => error_response(404, "Not Found", "Route not found"),
    }
}

fn json_or_error<E: Display>(payload: Result<String, E>) -> HttpResponse {
    match payload {
        Ok(body) => HttpResponse {
            status_code: 200,
            status_text: "OK",
            content_type: "application/json",
            body,
        },
        Err(err) => error_response(500, "Internal Server Error", &err.to_string()),
    }
}

fn error_response(status_code: u16, status_text: &'static str, message: &str) -> HttpResponse {
    HttpResponse {
        status_code,
        status_text,
        content_type: "application/json",
        body: format!(
            "{{\n  \"status\": \"error\",\n  \"message\": {}\n}}",
            serde_json::to_string(message).unwrap_or_else(|_| "\"Unknown error\"".to_string())
        ),
    }
}
