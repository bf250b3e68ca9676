use crate::error::{Result, TaskError};
use crate::types::{Task, TaskPatch};
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpStream;

/// What the list controller needs from the server. The blocking [`HttpApi`]
/// is the real implementation; tests substitute a recording mock.
pub trait TodoApi: Send + Sync {
    fn list(&self) -> Result<Vec<Task>>;
    fn get(&self, id: i64) -> Result<Task>;
    fn create(&self, title: &str) -> Result<Task>;
    fn update(&self, id: i64, patch: &TaskPatch) -> Result<Task>;
    fn delete(&self, id: i64) -> Result<()>;
}

/// One connection per request against the todo endpoints.
pub struct HttpApi {
    addr: String,
}

impl HttpApi {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    fn request(&self, method: &str, path: &str, body: Option<&Value>) -> Result<(u16, Value)> {
        let mut stream = TcpStream::connect(&self.addr)
            .map_err(|err| TaskError::Http(format!("connect {}: {err}", self.addr)))?;
        let body_bytes = match body {
            Some(value) => serde_json::to_vec(value).map_err(|err| TaskError::Http(err.to_string()))?,
            None => Vec::new(),
        };
        let header = format!(
            "{method} {path} HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.addr,
            body_bytes.len()
        );
        stream.write_all(header.as_bytes())?;
        stream.write_all(&body_bytes)?;
        stream.flush()?;

        let mut reader = BufReader::new(stream);
        let mut status_line = String::new();
        reader.read_line(&mut status_line)?;
        let status = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|s| s.parse::<u16>().ok())
            .ok_or_else(|| TaskError::Http(format!("bad status line: {status_line:?}")))?;

        let mut content_length = None;
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
                if key.trim().eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse::<usize>().ok();
                }
            }
        }

        let mut body = Vec::new();
        match content_length {
            Some(len) => {
                body.resize(len, 0);
                reader.read_exact(&mut body)?;
            }
            None => {
                reader.read_to_end(&mut body)?;
            }
        }
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body)
                .map_err(|err| TaskError::Http(format!("bad response body: {err}")))?
        };
        Ok((status, value))
    }
}

fn error_for(status: u16, value: &Value, id: Option<i64>) -> TaskError {
    let message = value
        .get("error")
        .and_then(|v| v.as_str())
        .unwrap_or("request failed")
        .to_string();
    match (status, id) {
        (404, Some(id)) => TaskError::NotFound(id),
        (400, _) => TaskError::Validation(message),
        _ => TaskError::Http(format!("status {status}: {message}")),
    }
}

fn into_task(value: Value) -> Result<Task> {
    serde_json::from_value(value).map_err(|err| TaskError::Http(format!("bad task body: {err}")))
}

impl TodoApi for HttpApi {
    fn list(&self) -> Result<Vec<Task>> {
        let (status, value) = self.request("GET", "/todos", None)?;
        if status != 200 {
            return Err(error_for(status, &value, None));
        }
        serde_json::from_value(value).map_err(|err| TaskError::Http(format!("bad list body: {err}")))
    }

    fn get(&self, id: i64) -> Result<Task> {
        let (status, value) = self.request("GET", &format!("/todos/{id}"), None)?;
        if status != 200 {
            return Err(error_for(status, &value, Some(id)));
        }
        into_task(value)
    }

    fn create(&self, title: &str) -> Result<Task> {
        let (status, value) = self.request("POST", "/todos", Some(&json!({ "title": title })))?;
        if status != 201 {
            return Err(error_for(status, &value, None));
        }
        into_task(value)
    }

    fn update(&self, id: i64, patch: &TaskPatch) -> Result<Task> {
        let body = serde_json::to_value(patch).map_err(|err| TaskError::Http(err.to_string()))?;
        let (status, value) = self.request("PUT", &format!("/todos/{id}"), Some(&body))?;
        if status != 200 {
            return Err(error_for(status, &value, Some(id)));
        }
        into_task(value)
    }

    fn delete(&self, id: i64) -> Result<()> {
        let (status, value) = self.request("DELETE", &format!("/todos/{id}"), None)?;
        if status != 200 {
            return Err(error_for(status, &value, Some(id)));
        }
        Ok(())
    }
}
