use clap::{Parser, Subcommand};
use hs_parser::report::{parse_request, Outcome, ParseRequest};
use hs_sandbox::{generate_token, ControlServer, ParseResponse};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "hs")]
#[command(about = "Hyperscript parser toolkit")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the token list of a script as JSON
    Tokens {
        /// Input file, or `-` for stdin
        path: String,
    },

    /// Parse a script and print the output or error report as JSON
    Parse {
        /// Input file, or `-` for stdin
        path: String,

        /// Leave the AST out of the output (`nodeData` becomes `{}`)
        #[arg(long)]
        no_node_data: bool,
    },

    /// Check a script for parse errors
    Check {
        /// Input file, or `-` for stdin
        path: String,

        /// Parse a single grammar element instead of a whole script
        #[arg(long)]
        rule: Option<String>,
    },

    /// Parse a script in a sandboxed worker process
    Sandbox {
        /// Input file, or `-` for stdin
        path: String,

        /// Path to the hs-worker binary (defaults to the one next to `hs`)
        #[arg(long)]
        worker: Option<PathBuf>,

        /// Control server port (0 picks a free one)
        #[arg(long, default_value_t = 0)]
        port: u16,
    },
}

/// How long `hs sandbox` waits for the worker to connect.
const WORKER_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Tokens { path } => cmd_tokens(&path),
        Command::Parse { path, no_node_data } => cmd_parse(&path, no_node_data),
        Command::Check { path, rule } => cmd_check(&path, rule.as_deref()),
        Command::Sandbox { path, worker, port } => cmd_sandbox(&path, worker, port),
    }
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {message}");
    std::process::exit(1);
}

fn read_source(path: &str) -> String {
    if path == "-" {
        let mut source = String::new();
        if let Err(e) = std::io::stdin().read_to_string(&mut source) {
            fail(format!("reading stdin: {e}"));
        }
        return source;
    }
    let p = Path::new(path);
    if !p.exists() {
        fail(format!("file not found: {path}"));
    }
    match std::fs::read_to_string(p) {
        Ok(source) => source,
        Err(e) => fail(format!("reading {path}: {e}")),
    }
}

fn print_json(value: &impl serde::Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => fail(e),
    }
}

fn cmd_tokens(path: &str) {
    let source = read_source(path);
    match hs_lexer::Scanner::tokenize(&source) {
        Ok(tokens) => print_json(&tokens),
        Err(e) => fail(e),
    }
}

fn cmd_parse(path: &str, no_node_data: bool) {
    let request = ParseRequest::Options {
        input: read_source(path),
        do_not_include_node_data: no_node_data,
    };
    match parse_request(&request) {
        Outcome::Output(output) => print_json(&output),
        Outcome::Error(report) => {
            print_json(&report);
            std::process::exit(1);
        }
        Outcome::Critical(message) => fail(message),
    }
}

fn cmd_check(path: &str, rule: Option<&str>) {
    let source = read_source(path);
    let result = match rule {
        Some(rule) => hs_parser::Parser::parse_element(rule, &source),
        None => hs_parser::Parser::parse(&source),
    };
    match result {
        Ok(_) => println!("ok"),
        Err(e) => fail(e),
    }
}

fn default_worker() -> PathBuf {
    let name = format!("hs-worker{}", std::env::consts::EXE_SUFFIX);
    match std::env::current_exe() {
        Ok(exe) => exe.with_file_name(name),
        Err(_) => PathBuf::from(name),
    }
}

fn cmd_sandbox(path: &str, worker: Option<PathBuf>, port: u16) {
    let source = read_source(path);
    let worker = worker.unwrap_or_else(default_worker);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => fail(format!("failed to create tokio runtime: {e}")),
    };
    let response = rt.block_on(async {
        let mut server = ControlServer::bind(port, generate_token())
            .await
            .map_err(|e| e.to_string())?;
        let config = server.worker_config().to_json().map_err(|e| e.to_string())?;
        let mut child = tokio::process::Command::new(&worker)
            .arg(config)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to start {}: {e}", worker.display()))?;

        let client = tokio::select! {
            accepted = tokio::time::timeout(WORKER_CONNECT_TIMEOUT, server.accept()) => match accepted {
                Ok(client) => client.map_err(|e| e.to_string())?,
                Err(_) => return Err("the worker did not connect".to_string()),
            },
            status = child.wait() => {
                return Err(match status {
                    Ok(status) => format!("the worker exited early ({status})"),
                    Err(e) => e.to_string(),
                });
            }
        };
        client.parse(&source).await.map_err(|e| e.to_string())
    });

    match response {
        Ok(ParseResponse::Output(json)) => println!("{json}"),
        Ok(ParseResponse::Error(json)) => {
            println!("{json}");
            std::process::exit(1);
        }
        Ok(ParseResponse::Critical(message)) => fail(message),
        Err(message) => fail(message),
    }
}
