use std::path::PathBuf;
use std::time::Duration;

use chatline::prelude::*;
use clap::{Parser, Subcommand};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "chat-cli", version, about = "Talk to a Chatline backend from the terminal")]
struct Cli {
    /// Backend base URL.
    #[arg(long, env = "CHATLINE_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Directory holding the saved session.
    #[arg(long, env = "CHATLINE_HOME", global = true)]
    home: Option<PathBuf>,

    /// Request timeout in seconds.
    #[arg(long, env = "CHATLINE_TIMEOUT_SECS", global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account. Does not log in.
    Register {
        username: String,
        email: String,
        #[arg(long, env = "CHATLINE_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        avatar_url: Option<String>,
    },
    /// Log in and save the session.
    Login {
        username: String,
        #[arg(long, env = "CHATLINE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the saved session.
    Logout,
    /// Show who is logged in.
    Whoami,
    /// Read and write messages.
    Messages {
        #[command(subcommand)]
        action: MessagesCommand,
    },
    /// Manage users.
    User {
        #[command(subcommand)]
        action: UserCommand,
    },
    /// Invite another user to chat.
    Invite { user_id: String },
}

#[derive(Subcommand)]
enum MessagesCommand {
    List {
        #[arg(long)]
        conversation: Option<String>,
    },
    Send {
        text: String,
        #[arg(long)]
        conversation: Option<String>,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand)]
enum UserCommand {
    Show {
        id: String,
    },
    Update {
        id: String,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        avatar_url: Option<String>,
    },
    Delete {
        id: String,
    },
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

async fn run<N: Navigator>(client: &Chatline<N>, command: Command) -> Result<(), ChatlineError> {
    match command {
        Command::Register {
            username,
            email,
            password,
            avatar_url,
        } => {
            let registration = Registration {
                username,
                password,
                email,
                avatar_url,
            };
            client.register(&registration).await?;
            println!("registered {}; log in to continue", registration.username);
        }
        Command::Login { username, password } => {
            let user = client.login(&username, &password).await?;
            println!("logged in as {} ({})", user.username, user.id);
        }
        Command::Logout => {
            client.logout().await;
            println!("logged out");
        }
        Command::Whoami => match client.current_user().await {
            Some(user) => {
                println!("{} ({})", user.username, user.id);
                println!("email:  {}", user.email);
                println!("avatar: {}", user.avatar_or_fallback());
            }
            None => println!("not logged in"),
        },
        Command::Messages { action } => messages(client, action).await?,
        Command::User { action } => users(client, action).await?,
        Command::Invite { user_id } => {
            client.invite(&UserId::new(user_id)).await?;
            println!("invitation sent");
        }
    }
    Ok(())
}

async fn messages<N: Navigator>(client: &Chatline<N>, action: MessagesCommand) -> Result<(), ChatlineError> {
    match action {
        MessagesCommand::List { conversation } => {
            let me = client.current_user().await;
            let list = client.list_messages(conversation.as_deref()).await?;
            for message in &list {
                let mine = me.as_ref().is_some_and(|u| message.is_authored_by(u));
                let marker = if mine { "*" } else { " " };
                println!("{marker} [{}] {}: {}", message.id, message.author_user_id, message.text);
            }
            if list.is_empty() {
                println!("no messages");
            }
        }
        MessagesCommand::Send { text, conversation } => {
            let message = client.send_message(&text, conversation.as_deref()).await?;
            println!("sent [{}]", message.id);
        }
        MessagesCommand::Delete { id } => {
            client.delete_message(&MessageId::new(id)).await?;
            println!("deleted");
        }
    }
    Ok(())
}

async fn users<N: Navigator>(client: &Chatline<N>, action: UserCommand) -> Result<(), ChatlineError> {
    match action {
        UserCommand::Show { id } => {
            let user = client.fetch_user(&UserId::new(id)).await?;
            println!("{} ({})", user.username, user.id);
            println!("email:  {}", user.email);
            println!("avatar: {}", user.avatar_or_fallback());
        }
        UserCommand::Update {
            id,
            username,
            email,
            avatar_url,
        } => {
            let patch = UserPatch {
                username,
                email,
                avatar_url,
            };
            if patch.is_empty() {
                println!("nothing to update");
                return Ok(());
            }
            let user = client.update_user(&UserId::new(id), &patch).await?;
            println!("updated {} ({})", user.username, user.id);
        }
        UserCommand::Delete { id } => {
            client.delete_user(&UserId::new(id)).await?;
            println!("deleted");
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    chatline::init_tracing();
    let cli = Cli::parse();

    let mut config = ApiConfig::default();
    if let Some(url) = &cli.base_url {
        config = config.with_base_url(url)?;
    }
    if let Some(secs) = cli.timeout {
        config = config.with_timeout(Duration::from_secs(secs))?;
    }

    let mut builder = ChatlineBuilder::new().config(config);
    if let Some(home) = cli.home {
        builder = builder.data_dir(home);
    }
    let client = builder
        .navigator(|route: Route| tracing::debug!(%route, "navigate"))
        .build()?;

    if let Err(e) = run(&client, cli.command).await {
        tracing::debug!(error = %e, "command failed");
        eprintln!("error: {}", e.user_message());
        if e.requires_login() {
            eprintln!("hint: run `chat-cli login <username>`");
        }
        std::process::exit(1);
    }
    Ok(())
}
