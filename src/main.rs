use clap::{Parser, Subcommand};
use dotenv::dotenv;

use claimflow_rs::claimflow::bootstrap;
use claimflow_rs::claimflow::config::Config;
use claimflow_rs::claimflow::events::SessionEvent;
use claimflow_rs::claimflow::server;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Ask a single question through the workflow and print the answer
    Ask {
        /// The question to route
        #[arg(short, long)]
        question: String,

        /// User id to attribute the session to
        #[arg(short, long)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let config = Config::from_env();

    match args.command {
        Commands::Serve { port } => {
            let state = bootstrap::build(&config).await?;
            server::serve(state, port.unwrap_or(config.port)).await?;
        }
        Commands::Ask { question, user } => {
            let state = bootstrap::build(&config).await?;
            let (session_id, user_id) = state.sessions.create_session(user.as_deref(), None)?;
            log::info!("asking as user={} session={}", user_id, session_id);

            let token = state.manager.enqueue(&session_id, &user_id, &question);
            let mut rx = state.manager.begin(&token)?;

            while let Some(event) = rx.recv().await {
                match event {
                    SessionEvent::Token(chunk) => print!("{}", chunk),
                    SessionEvent::Meta(meta) => {
                        println!("\n\n--- {} ---\n{}", meta.agent, meta.text);
                        if let Some(checkpoint_id) = meta.checkpoint_id {
                            println!("(paused - resume with checkpoint {})", checkpoint_id);
                        }
                        println!("provenance entries: {}", meta.provenance.len());
                    }
                    SessionEvent::Done => break,
                    SessionEvent::Error(message) => {
                        eprintln!("error: {}", message);
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}
