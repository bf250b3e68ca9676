use crate::error::{Result, TaskError};
use crate::service::TaskService;
use crate::types::TaskPatch;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};

/// HTTP endpoint layer: a stateless mapping from (verb, path, body) to a
/// [`TaskService`] call, one thread per connection.
pub struct HttpServer {
    listener: TcpListener,
    service: TaskService,
}

impl HttpServer {
    pub fn bind(host: &str, port: u16, service: TaskService) -> Result<Self> {
        let listener = TcpListener::bind((host, port))
            .map_err(|err| TaskError::Http(format!("bind {host}:{port}: {err}")))?;
        Ok(Self { listener, service })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn run(self) -> Result<()> {
        log::info!("todo service listening on http://{}", self.local_addr()?);
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let service = self.service.clone();
                    std::thread::spawn(move || {
                        if let Err(err) = handle_client(stream, &service) {
                            log::debug!("connection error: {err}");
                        }
                    });
                }
                Err(err) => log::warn!("accept error: {err}"),
            }
        }
        Ok(())
    }
}

fn handle_client(mut stream: TcpStream, service: &TaskService) -> Result<()> {
    let mut reader = BufReader::new(&mut stream);
    let mut request_line = String::new();
    if reader.read_line(&mut request_line)? == 0 {
        return Ok(());
    }
    let request_line = request_line.trim_end_matches(['\r', '\n']);
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let target = parts.next().unwrap_or("/").to_string();
    let path = target.split('?').next().unwrap_or("/").to_string();

    let mut headers = HashMap::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some((key, value)) = trimmed.split_once(':') {
            headers.insert(key.trim().to_lowercase(), value.trim().to_string());
        }
    }

    let mut body = Vec::new();
    if let Some(len) = headers.get("content-length").and_then(|v| v.parse::<usize>().ok()) {
        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf)?;
        body = buf;
    }

    if method == "OPTIONS" {
        return send_empty(&mut stream, 204);
    }

    // A malformed body never propagates a parse fault; it degrades to an
    // empty object and fails service-level validation instead.
    let payload = if body.is_empty() {
        json!({})
    } else {
        serde_json::from_slice::<Value>(&body).unwrap_or_else(|_| json!({}))
    };

    let (status, reply) = match route(service, &method, &path, &payload) {
        Some(Ok(reply)) => reply,
        Some(Err(err)) => (err.status_code(), json!({ "error": err.to_string() })),
        None => (404, json!({ "error": "not found" })),
    };
    log::debug!("{method} {path} -> {status}");
    send_json(&mut stream, status, &reply)
}

/// `None` means no route matched at all.
fn route(
    service: &TaskService,
    method: &str,
    path: &str,
    payload: &Value,
) -> Option<Result<(u16, Value)>> {
    if path == "/todos" {
        return Some(match method {
            "GET" => service.list_all().map(|tasks| (200, json!(tasks))),
            "POST" => {
                let title = payload.get("title").and_then(|v| v.as_str()).unwrap_or("");
                service.create(title).map(|task| (201, json!(task)))
            }
            _ => Ok((405, json!({ "error": "method not allowed" }))),
        });
    }

    let id_segment = path.strip_prefix("/todos/")?;
    if id_segment.is_empty() || id_segment.contains('/') {
        return None;
    }
    let id = match id_segment.parse::<i64>() {
        Ok(id) => id,
        Err(_) => return Some(Err(TaskError::InvalidId(id_segment.to_string()))),
    };

    Some(match method {
        "GET" => service.get(id).map(|task| (200, json!(task))),
        "PUT" => service
            .replace(id, parse_patch(payload))
            .map(|task| (200, json!(task))),
        "PATCH" => service
            .replace(id, TaskPatch::completed(true))
            .map(|task| (200, json!(task))),
        "DELETE" => service.delete(id).map(|_| (200, json!({ "ok": true }))),
        _ => Ok((405, json!({ "error": "method not allowed" }))),
    })
}

/// Wrong-typed fields count as absent, matching the lenient body handling of
/// the endpoint contract.
fn parse_patch(payload: &Value) -> TaskPatch {
    TaskPatch {
        title: payload.get("title").and_then(|v| v.as_str()).map(|s| s.to_string()),
        completed: payload.get("completed").and_then(|v| v.as_bool()),
    }
}

fn send_json(stream: &mut TcpStream, code: u16, value: &Value) -> Result<()> {
    let body = serde_json::to_string(value)
        .map_err(|err| TaskError::Http(err.to_string()))?;
    send_response(stream, code, body.as_bytes(), false)
}

fn send_empty(stream: &mut TcpStream, code: u16) -> Result<()> {
    send_response(stream, code, &[], true)
}

fn send_response(stream: &mut TcpStream, code: u16, body: &[u8], head_only: bool) -> Result<()> {
    let status_text = match code {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        _ => "OK",
    };
    let header = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\nAccess-Control-Allow-Origin: *\r\nAccess-Control-Allow-Methods: GET,POST,PUT,PATCH,DELETE,OPTIONS\r\nAccess-Control-Allow-Headers: Content-Type\r\n\r\n",
        code,
        status_text,
        body.len()
    );
    stream.write_all(header.as_bytes())?;
    if !head_only {
        stream.write_all(body)?;
    }
    stream.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn service() -> TaskService {
        TaskService::new(Box::new(MemoryStore::new()))
    }

    fn status_of(result: Option<Result<(u16, Value)>>) -> u16 {
        match result.unwrap() {
            Ok((status, _)) => status,
            Err(err) => err.status_code(),
        }
    }

    #[test]
    fn non_numeric_id_is_a_client_error_before_the_service() {
        let svc = service();
        let result = route(&svc, "GET", "/todos/abc", &json!({}));
        assert_eq!(status_of(result), 400);
        assert!(svc.list_all().unwrap().is_empty());
    }

    #[test]
    fn create_maps_to_201_and_blank_title_to_400() {
        let svc = service();
        let ok = route(&svc, "POST", "/todos", &json!({ "title": "write tests" }));
        assert_eq!(status_of(ok), 201);
        let blank = route(&svc, "POST", "/todos", &json!({ "title": "  " }));
        assert_eq!(status_of(blank), 400);
        let missing = route(&svc, "POST", "/todos", &json!({}));
        assert_eq!(status_of(missing), 400);
    }

    #[test]
    fn patch_marks_completed_true() {
        let svc = service();
        let task = svc.create("finish me").unwrap();
        let result = route(&svc, "PATCH", &format!("/todos/{}", task.id), &json!({}));
        match result.unwrap().unwrap() {
            (200, value) => assert_eq!(value["completed"], json!(true)),
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[test]
    fn put_with_no_recognized_fields_is_400() {
        let svc = service();
        let task = svc.create("stay").unwrap();
        // Wrong-typed fields count as absent.
        let result = route(
            &svc,
            "PUT",
            &format!("/todos/{}", task.id),
            &json!({ "title": 42, "completed": "yes" }),
        );
        assert_eq!(status_of(result), 400);
    }

    #[test]
    fn unknown_ids_map_to_404() {
        let svc = service();
        for method in ["GET", "PUT", "PATCH", "DELETE"] {
            let payload = json!({ "completed": true });
            let result = route(&svc, method, "/todos/999999", &payload);
            assert_eq!(status_of(result), 404, "method {method}");
        }
    }

    #[test]
    fn unknown_paths_do_not_route() {
        let svc = service();
        assert!(route(&svc, "GET", "/tasks", &json!({})).is_none());
        assert!(route(&svc, "GET", "/todos/1/extra", &json!({})).is_none());
    }
}
