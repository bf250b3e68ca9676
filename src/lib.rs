pub mod controller;
pub mod debounce;
pub mod error;
pub mod http_client;
pub mod http_server;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;

pub use controller::{Filter, ListController};
pub use error::{Result, TaskError};
pub use http_client::{HttpApi, TodoApi};
pub use http_server::HttpServer;
pub use service::TaskService;
pub use store::{MemoryStore, SqliteStore, TodoStore};
pub use types::{Task, TaskPatch};
