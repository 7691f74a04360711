//! Route dispatch: exact-string routes first, then pattern routes that
//! pull a project name out of the path, then static-file fallback.

use std::fs;
use std::net::TcpStream;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::{json, Value};
use tracing::debug;

use crate::api::ProjectApi;
use crate::http::{percent_decode, status_line, write_response, HttpRequest};
use crate::state::ServerState;

pub fn handle_request(
    stream: &mut TcpStream,
    state: &ServerState,
    shutdown: &AtomicBool,
    request: &HttpRequest,
) -> std::io::Result<()> {
    let method = request.method.as_str();
    if method != "GET" && method != "HEAD" && method != "POST" {
        return write_response(
            stream,
            "405 Method Not Allowed",
            "text/plain; charset=utf-8",
            b"Method not allowed.",
            false,
        );
    }
    let head_only = method == "HEAD";
    let path = request.path.split('?').next().unwrap_or("/");
    debug!(%method, %path, "request");

    let api = ProjectApi::new(state);

    if method == "GET" || method == "HEAD" {
        match path {
            "/health" | "/_health" => {
                return write_json(stream, &json!({ "status": "ok" }), 200, head_only);
            }
            "/api/projects" => {
                let (body, status) = api.list_projects();
                return write_json(stream, &body, status, head_only);
            }
            "/api/state" => {
                let (body, status) = api.get_state();
                return write_json(stream, &body, status, head_only);
            }
            "/api/highlights" => {
                let (body, status) = api.list_highlights();
                return write_json(stream, &body, status, head_only);
            }
            "/api/project-tags" => {
                let (body, status) = api.list_all_project_tags();
                return write_json(stream, &body, status, head_only);
            }
            _ => {}
        }

        if let Some(reply) = dispatch_project_get(&api, path) {
            let (body, status) = reply;
            return write_json(stream, &body, status, head_only);
        }

        if path.starts_with("/api/") {
            return write_json(stream, &json!({ "error": "Unknown endpoint" }), 404, head_only);
        }
        return serve_static(stream, state, path, head_only);
    }

    // POST from here on.
    let body = parse_body(&request.body);
    match path {
        "/api/projects/open" => {
            let (reply, status) = api.open_project(&body);
            return write_json(stream, &reply, status, false);
        }
        "/api/projects/edit-name" => {
            if body.is_null() {
                return write_json(stream, &json!({ "error": "Invalid JSON" }), 400, false);
            }
            let (reply, status) = api.edit_project_name(&body);
            return write_json(stream, &reply, status, false);
        }
        "/api/exit" => {
            write_json(stream, &json!({ "ok": true, "message": "Shutting down" }), 200, false)?;
            shutdown.store(true, Ordering::SeqCst);
            return Ok(());
        }
        _ => {}
    }

    if let Some(reply) = dispatch_project_post(&api, path, &body) {
        let (reply, status) = reply;
        return write_json(stream, &reply, status, false);
    }

    write_json(stream, &json!({ "error": "Unknown endpoint" }), 404, false)
}

fn write_json(
    stream: &mut TcpStream,
    body: &Value,
    status: u16,
    head_only: bool,
) -> std::io::Result<()> {
    let payload = body.to_string();
    write_response(
        stream,
        status_line(status),
        "application/json; charset=utf-8",
        payload.as_bytes(),
        head_only,
    )
}

/// Malformed JSON maps to `Null`, letting each handler apply its own
/// policy (create treats it as an empty payload, update rejects it).
fn parse_body(raw: &[u8]) -> Value {
    if raw.is_empty() {
        return json!({});
    }
    serde_json::from_slice(raw).unwrap_or(Value::Null)
}

/// Pattern routes: `/api/projects/<name>/tasks` and `/api/projects/<name>/tags`.
/// The name is everything between the prefix and the fixed suffix, so a
/// name containing a slash survives extraction and is rejected by the
/// API-layer validity guard with a 400 rather than a blind 404.
fn project_route(path: &str, suffix: &str) -> Option<Option<String>> {
    let rest = path.strip_prefix("/api/projects/")?;
    let encoded = rest.strip_suffix(suffix)?;
    if encoded.is_empty() {
        return None;
    }
    Some(percent_decode(encoded))
}

fn invalid_name_reply() -> (Value, u16) {
    (json!({ "error": "Invalid project name" }), 400)
}

fn dispatch_project_get(api: &ProjectApi<'_>, path: &str) -> Option<(Value, u16)> {
    if let Some(decoded) = project_route(path, "/tasks") {
        return Some(match decoded {
            Some(name) => api.list_tasks(&name),
            None => invalid_name_reply(),
        });
    }
    if let Some(decoded) = project_route(path, "/tags") {
        return Some(match decoded {
            Some(name) => api.get_project_tags(&name),
            None => invalid_name_reply(),
        });
    }
    None
}

fn dispatch_project_post(api: &ProjectApi<'_>, path: &str, body: &Value) -> Option<(Value, u16)> {
    if let Some(decoded) = project_route(path, "/tasks/create") {
        return Some(match decoded {
            Some(name) => api.create_task(&name, body),
            None => invalid_name_reply(),
        });
    }
    if let Some(decoded) = project_route(path, "/tasks/update") {
        return Some(match decoded {
            Some(name) => api.update_task(&name, body),
            None => invalid_name_reply(),
        });
    }
    if let Some(decoded) = project_route(path, "/tasks/highlight") {
        return Some(match decoded {
            Some(name) => api.highlight_task(&name, body),
            None => invalid_name_reply(),
        });
    }
    if let Some(decoded) = project_route(path, "/tasks/delete") {
        return Some(match decoded {
            Some(name) => api.delete_task(&name, body),
            None => invalid_name_reply(),
        });
    }
    if let Some(decoded) = project_route(path, "/tags/add") {
        return Some(match decoded {
            Some(name) => api.add_project_tags(&name, body),
            None => invalid_name_reply(),
        });
    }
    if let Some(decoded) = project_route(path, "/tags/remove") {
        return Some(match decoded {
            Some(name) => api.remove_project_tag(&name, body),
            None => invalid_name_reply(),
        });
    }
    None
}

fn serve_static(
    stream: &mut TcpStream,
    state: &ServerState,
    path: &str,
    head_only: bool,
) -> std::io::Result<()> {
    let Some(ui_dir) = state.ui_dir.as_deref() else {
        return write_response(
            stream,
            "404 Not Found",
            "text/plain; charset=utf-8",
            b"Not found.",
            head_only,
        );
    };

    let clean = path.trim_start_matches('/');
    let relative = if clean.is_empty() { "index.html" } else { clean };
    if relative.contains("..")
        || relative.starts_with('.')
        || relative.ends_with('/')
        || relative.contains('\\')
    {
        return write_response(
            stream,
            "400 Bad Request",
            "text/plain; charset=utf-8",
            b"Bad request.",
            head_only,
        );
    }

    let target = ui_dir.join(relative);
    // Canonicalize both sides so a symlink inside the UI directory cannot
    // point the response at a file outside it.
    let (Ok(root), Ok(resolved)) = (fs::canonicalize(ui_dir), fs::canonicalize(&target)) else {
        return write_response(
            stream,
            "404 Not Found",
            "text/plain; charset=utf-8",
            b"Not found.",
            head_only,
        );
    };
    if !resolved.starts_with(&root) {
        return write_response(
            stream,
            "403 Forbidden",
            "text/plain; charset=utf-8",
            b"Forbidden.",
            head_only,
        );
    }
    if !resolved.is_file() {
        return write_response(
            stream,
            "404 Not Found",
            "text/plain; charset=utf-8",
            b"Not found.",
            head_only,
        );
    }

    match fs::read(&resolved) {
        Ok(bytes) => write_response(
            stream,
            "200 OK",
            content_type_for(&resolved),
            &bytes,
            head_only,
        ),
        Err(_) => write_response(
            stream,
            "500 Internal Server Error",
            "text/plain; charset=utf-8",
            b"Internal server error.",
            head_only,
        ),
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
