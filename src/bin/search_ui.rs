//! Interactive semantic search over the query API.

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::info;

use review_search::logging::{self, LogTarget};
use review_search::ui::search::{QueryApiClient, SearchForm};

#[derive(Parser, Debug)]
#[command(name = "search-ui", version, about = "Semantic search for food reviews")]
struct Args {
    /// Query API root
    #[arg(long, env = "QUERY_API_URL", default_value = "http://localhost:8000")]
    api_url: String,

    /// Request timeout
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Number of results per search (server default when omitted)
    #[arg(long)]
    limit: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init(LogTarget::Stderr, "warn");
    let args = Args::parse();

    let client = QueryApiClient::new(&args.api_url, Duration::from_secs(args.timeout_secs))?;
    info!(url = client.search_url(), "Using query API");

    let mut form = SearchForm::new();
    let mut rl = DefaultEditor::new()?;

    println!("Semantic Food Review Search (':help' for commands, ':quit' to exit)");
    println!("{}", form.render());

    loop {
        let line = match rl.readline("search> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Error: {err}");
                break;
            }
        };

        match line.trim() {
            ":quit" | ":exit" => break,
            ":help" => {
                print_help();
                continue;
            }
            _ => {}
        }

        let query = match form.submit(&line) {
            Ok(query) => query,
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };
        let _ = rl.add_history_entry(query.as_str());

        println!("{}", form.render());
        let result = client.search(&query, args.limit).await;
        form.resolve(result);
        println!("{}", form.render());
    }

    println!("Goodbye.");
    Ok(())
}

fn print_help() {
    println!(
        "\
Type a query (e.g. 'delicious chocolate cookies' or 'healthy dog food')
and press Enter to find semantically similar reviews.
  :help                        Show this help
  :quit                        Exit"
    );
}
