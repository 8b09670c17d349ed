use clap::{Parser, Subcommand};
use url::form_urlencoded;

#[derive(Parser)]
#[command(name = "route-cli")]
#[command(about = "Manage routes of a running dynamic-proxy", long_about = None)]
struct Cli {
    /// Management API base URL.
    #[arg(short, long, default_value = "http://127.0.0.1:8081")]
    url: String,

    #[arg(long)]
    username: Option<String>,

    #[arg(long)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every route
    List,
    /// Show the routes for the given keys
    Get {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Store routes given as key=url
    Put {
        #[arg(required = true, value_parser = parse_route)]
        routes: Vec<(String, String)>,
    },
    /// Remove the given keys
    Delete {
        #[arg(required = true)]
        keys: Vec<String>,
    },
}

fn parse_route(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, url)) if !key.is_empty() => Ok((key.to_string(), url.to_string())),
        _ => Err(format!("expected key=url, got '{}'", s)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let request = match &cli.command {
        Commands::List => client.get(&cli.url),
        Commands::Get { keys } => {
            let query: Vec<(&str, &str)> = keys.iter().map(|k| (k.as_str(), "")).collect();
            client.get(&cli.url).query(&query)
        }
        Commands::Put { routes } => client.put(&cli.url).form(routes),
        Commands::Delete { keys } => {
            let form: Vec<(&str, &str)> = keys.iter().map(|k| (k.as_str(), "")).collect();
            client.delete(&cli.url).form(&form)
        }
    };

    let request = match (&cli.username, &cli.password) {
        (Some(username), password) => request.basic_auth(username, password.as_ref()),
        (None, _) => request,
    };

    let res = request.send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let body = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: management API returned status {}", status);
        if !body.is_empty() {
            eprintln!("Response: {}", body.trim_end());
        }
        std::process::exit(1);
    }

    for (key, endpoint) in form_urlencoded::parse(body.as_bytes()) {
        println!("{} {}", key, endpoint);
    }
    Ok(())
}
