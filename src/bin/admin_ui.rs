//! Interactive console for the search index.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use review_search::config::IndexConnection;
use review_search::logging::{self, LogTarget};
use review_search::ui::admin::{
    render_search, AdminCommand, AdminConsole, ClientCache, OpenSearchConnector,
};

#[derive(Parser, Debug)]
#[command(name = "admin-ui", version, about = "Search index console")]
struct Args {
    #[arg(long, env = "OPENSEARCH_HOST", default_value = "localhost")]
    host: String,

    #[arg(long, env = "OPENSEARCH_PORT", default_value_t = 9200)]
    port: u16,

    #[arg(long, env = "OPENSEARCH_USER", default_value = "admin")]
    user: String,

    #[arg(long, env = "OPENSEARCH_INITIAL_ADMIN_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    /// Talk HTTPS (`--use-ssl false` for plain HTTP)
    #[arg(
        long,
        env = "OPENSEARCH_USE_SSL",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    use_ssl: bool,

    /// Verify the server certificate
    #[arg(
        long,
        env = "OPENSEARCH_VERIFY_CERTS",
        default_value_t = false,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    verify_certs: bool,

    /// Seconds a connected client is reused
    #[arg(long, default_value_t = 300)]
    cache_ttl_secs: u64,

    /// Timeout for each request to the index
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init(LogTarget::Stderr, "warn");
    let args = Args::parse();

    let params = connection(&args);
    let connector = Arc::new(OpenSearchConnector::new(Duration::from_secs(args.timeout_secs)));
    let cache = ClientCache::new(connector, Duration::from_secs(args.cache_ttl_secs));
    let mut console = AdminConsole::new(cache, params);

    let mut rl = DefaultEditor::new()?;
    println!("Index console (type 'help' for commands, 'quit' to exit)");
    match console.connect().await {
        Ok(()) => println!("Connected to {}", console.params().base_url()),
        Err(e) => eprintln!("{e}"),
    }

    loop {
        let line = match rl.readline("admin> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Error: {err}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line);

        let command = match AdminCommand::parse(line) {
            Ok(command) => command,
            Err(usage) => {
                eprintln!("{usage}");
                continue;
            }
        };

        match command {
            AdminCommand::Help => print_help(),
            AdminCommand::Quit => break,
            AdminCommand::Info => match console.cluster_info().await {
                Ok(info) => match serde_json::to_string_pretty(&info) {
                    Ok(json) => println!("Cluster info:\n{json}"),
                    Err(e) => eprintln!("Error: {e}"),
                },
                Err(e) => eprintln!("{e}"),
            },
            AdminCommand::Connect {
                host,
                port,
                username,
                password,
            } => {
                let mut params = console.params().clone();
                params.host = host;
                params.port = port;
                if let Some(username) = username {
                    params.username = username;
                }
                if let Some(password) = password {
                    params.password = password;
                }
                console.set_params(params);
                match console.connect().await {
                    Ok(()) => println!("Connected to {}", console.params().base_url()),
                    Err(e) => eprintln!("{e}"),
                }
            }
            AdminCommand::Index { index, id, body } => {
                match console.index_document(&index, id.as_deref(), &body).await {
                    Ok(response) => println!(
                        "Document indexed into '{}' with id '{}' ({}).",
                        response.index, response.id, response.result
                    ),
                    Err(e) => eprintln!("{e}"),
                }
            }
            AdminCommand::Search { index, query } => match console.search(&index, &query).await {
                Ok(response) => println!("{}", render_search(&response)),
                Err(e) => eprintln!("{e}"),
            },
        }
    }

    console.close();
    println!("Goodbye.");
    Ok(())
}

fn connection(args: &Args) -> IndexConnection {
    IndexConnection {
        host: args.host.clone(),
        port: args.port,
        username: args.user.clone(),
        password: args.password.clone(),
        use_ssl: args.use_ssl,
        verify_certs: args.verify_certs,
    }
}

fn print_help() {
    println!(
        "\
Available commands:
  info                                   Show cluster info
  index <index> [<id>] <json>            Index a JSON document (visible immediately)
  search <index> <query>                 Query-string search, e.g. tags:demo AND name:test
  connect <host> <port> [user] [pass]    Change connection parameters
  help                                   Show this help
  quit                                   Exit"
    );
}
