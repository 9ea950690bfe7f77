use std::{error::Error, path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand, ValueEnum};
use tokio::fs;
use tracing_subscriber::{
    layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

use ticket_desk::{
    model::{
        ticket::{self, Filter, Status},
        user, Ticket,
    },
    Client, Config, DegradedStore,
};

/// Headless front end to the ticket desk.
#[derive(Parser)]
struct Cli {
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Identity to act as when the API is unreachable (an offline login
    /// email).
    #[arg(long = "as", global = true)]
    offline_as: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    /// Lists tickets, optionally filtered.
    Tickets {
        #[arg(long)]
        requester: Option<i64>,
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },
    /// Opens a ticket as the logged-in user (support staff claim it).
    View { id: i64 },
    Resolve { id: i64, solution: String },
    Suggest {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Open,
    InProgress,
    Closed,
}

impl From<StatusArg> for Status {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Open => Self::Open,
            StatusArg::InProgress => Self::InProgress,
            StatusArg::Closed => Self::Closed,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = match fs::read_to_string(&cli.config).await {
        Ok(config) => toml::from_str::<Config>(&config)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Config::default()
        }
        Err(e) => return Err(e.into()),
    };

    let client =
        Client::from_config(&config, Arc::new(DegradedStore::seeded()));

    match cli.command {
        Command::Login { email, password } => {
            let session = client.login(&email, &password).await?;
            match (session.user, session.offline) {
                (Some(user), true) => {
                    println!("offline session as {}", user.name);
                }
                (Some(user), false) => println!("logged in as {}", user.name),
                (None, _) => println!("logged in"),
            }
        }
        Command::Logout => client.logout().await,
        Command::Tickets { requester, status } => {
            let filter = Filter {
                requester: requester.map(user::Id::from),
                status: status.map(Status::from),
            };
            for ticket in client.list_tickets(&filter).await? {
                print_ticket(&ticket);
            }
        }
        Command::View { id } => {
            let me = client.current_user(cli.offline_as.as_deref()).await?;
            let ticket = client.view_ticket(ticket::Id::from(id), &me).await?;
            print_ticket(&ticket);
            println!("{}", ticket.description);
            if let Some(solution) = ticket.solution() {
                println!("solution: {solution}");
            }
        }
        Command::Resolve { id, solution } => {
            let me = client.current_user(cli.offline_as.as_deref()).await?;
            let ticket = client
                .resolve_ticket(ticket::Id::from(id), &me, &solution)
                .await?;
            print_ticket(&ticket);
        }
        Command::Suggest { title, description } => {
            let suggestion = client.suggest_reply(&title, &description).await;
            println!("{}", suggestion.text);
        }
    }

    Ok(())
}

fn print_ticket(ticket: &Ticket) {
    println!(
        "#{:<5} {:<11} {:<6} {}",
        ticket.id,
        format!("{:?}", ticket.status),
        format!("{:?}", ticket.priority),
        ticket.title,
    );
}
