use std::env;
use todo_service::store::{MemoryStore, SqliteStore, TodoStore};
use todo_service::utils::{ensure_dir, parse_args, resolve_state_dir};
use todo_service::{HttpServer, TaskService};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let argv: Vec<String> = env::args().skip(1).collect();
    let args = parse_args(&argv);
    if args.flags.contains("help") || args.flags.contains("h") {
        print_help();
        return;
    }

    let host = args
        .values
        .get("host")
        .cloned()
        .unwrap_or_else(|| "127.0.0.1".to_string());
    let port = args
        .values
        .get("port")
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(3000);

    let store: Box<dyn TodoStore> = if args.flags.contains("memory") {
        log::info!("using in-memory store");
        Box::new(MemoryStore::new())
    } else {
        let db_path = args.values.get("db").cloned().unwrap_or_else(|| {
            let state_dir = resolve_state_dir();
            if let Err(err) = ensure_dir(&state_dir) {
                eprintln!("failed to create state directory {}: {err}", state_dir.display());
                std::process::exit(1);
            }
            state_dir.join("todos.db.sqlite").to_string_lossy().to_string()
        });
        log::info!("using sqlite store at {db_path}");
        match SqliteStore::open(&db_path) {
            Ok(store) => Box::new(store),
            Err(err) => {
                eprintln!("failed to open todo db: {err}");
                std::process::exit(1);
            }
        }
    };

    let service = TaskService::new(store);
    let server = match HttpServer::bind(&host, port, service) {
        Ok(server) => server,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    if let Err(err) = server.run() {
        eprintln!("todo service crashed: {err}");
        std::process::exit(1);
    }
}

fn print_help() {
    println!(
        "Usage: todo-service-rs [--host <addr>] [--port <p>] [--db <path>] [--memory]\n\nOptions:\n  --host <addr>  Bind host (default 127.0.0.1)\n  --port <p>     Bind port (default 3000)\n  --db <path>    SQLite file path (default ~/.todo-service/todos.db.sqlite)\n  --memory       Use the in-memory store instead of SQLite\n  --help         Show help"
    );
}
