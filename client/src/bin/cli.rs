use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{DateTime, Datelike, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use daybook_client::calendar::month_range;
use daybook_client::{
    ApiClient, AuthService, CategoryService, Environment, EventService, FileStorage, History,
    TaskService,
};
use daybook_shared::api::{LoginRequest, NewCategory, NewTask};
use daybook_shared::{EntityId, Priority};

#[derive(Parser)]
#[command(name = "daybook")]
#[command(about = "CLI for the Daybook calendar backend")]
#[command(
    long_about = "A command-line client for the Daybook backend.\n\n\
    Signs in, then lists and edits events, tasks and categories. The session \
    token is kept in a local JSON file between invocations."
)]
struct Cli {
    /// Backend server URL.
    #[arg(short, long, env = "DAYBOOK_API_URL")]
    api_url: Option<String>,

    /// TOML file with the full client configuration.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Where the session token is stored.
    #[arg(long, value_name = "FILE", default_value = ".daybook-session.json")]
    session_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session
    Login {
        /// Account email address
        email: String,

        /// Account password
        #[arg(short, long, env = "DAYBOOK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show who is signed in and until when
    Whoami,
    /// Calendar events
    Events {
        #[command(subcommand)]
        action: EventAction,
    },
    /// Tasks
    Tasks {
        #[command(subcommand)]
        action: TaskAction,
    },
    /// Categories used to colour events and tasks
    Categories {
        #[command(subcommand)]
        action: CategoryAction,
    },
}

#[derive(Subcommand)]
enum EventAction {
    /// List events in a range, the current month by default
    List {
        /// Range start, RFC 3339
        #[arg(long)]
        from: Option<DateTime<Utc>>,

        /// Range end (exclusive), RFC 3339
        #[arg(long)]
        to: Option<DateTime<Utc>>,
    },
    /// Delete an event
    Delete {
        /// Event ID
        id: String,
    },
}

#[derive(Subcommand)]
enum TaskAction {
    /// List all tasks
    List,

    /// Create a new task
    Create {
        /// Task title
        title: String,

        /// Longer description
        #[arg(short, long, value_name = "TEXT")]
        description: Option<String>,

        /// low, medium or high
        #[arg(short, long, default_value = "medium")]
        priority: String,

        /// Due date, RFC 3339
        #[arg(long)]
        due: Option<DateTime<Utc>>,
    },

    /// Mark a task as completed
    Done {
        /// Task ID
        id: String,
    },

    /// Mark a task as not completed
    Undo {
        /// Task ID
        id: String,
    },

    /// Delete a task
    Delete {
        /// Task ID
        id: String,
    },
}

#[derive(Subcommand)]
enum CategoryAction {
    /// List all categories
    List,

    /// Create a new category
    Create {
        /// Category name
        name: String,

        /// Display colour as a hex string
        #[arg(short, long, value_name = "HEX", default_value = "#3b82f6")]
        color: String,

        /// Icon name shown next to the category
        #[arg(short, long)]
        icon: Option<String>,
    },

    /// Delete a category
    Delete {
        /// Category ID
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Logs go to stderr so command output stays pipeable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "daybook=warn,daybook_client=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut environment = match &cli.config {
        Some(path) => Environment::load(path)?,
        None => Environment::from_env()?,
    };
    if let Some(url) = cli.api_url {
        environment.api_url = url;
    }

    let storage = Arc::new(
        FileStorage::open(&cli.session_file)
            .with_context(|| format!("Failed to open session file {}", cli.session_file.display()))?,
    );
    let history = Arc::new(History::default());
    let api = Arc::new(ApiClient::new(&environment, storage, history));
    let auth = AuthService::new(api.clone(), &environment);

    match cli.command {
        Commands::Login { email, password } => {
            let user = auth.login(&LoginRequest { email, password }).await?;
            println!("Signed in as {}", user.name.as_deref().unwrap_or(&user.email));
        }
        Commands::Logout => {
            auth.logout()?;
            println!("Signed out");
        }
        Commands::Whoami => match (auth.current_user()?, auth.session_expires_at()) {
            (Some(user), Some(expires)) if auth.is_authenticated() => {
                println!("{} (session valid until {})", user.email, expires.format("%Y-%m-%d %H:%M"));
            }
            _ => println!("Not signed in"),
        },
        Commands::Events { action } => handle_events(EventService::new(api), action).await?,
        Commands::Tasks { action } => handle_tasks(TaskService::new(api), action).await?,
        Commands::Categories { action } => handle_categories(CategoryService::new(api), action).await?,
    }

    Ok(())
}

async fn handle_events(service: EventService, action: EventAction) -> anyhow::Result<()> {
    match action {
        EventAction::List { from, to } => {
            let now = Utc::now();
            let (month_start, month_end) =
                month_range(now.year(), now.month()).context("Current month out of range")?;
            let events = service
                .between(from.unwrap_or(month_start), to.unwrap_or(month_end))
                .await?;

            if events.is_empty() {
                println!("No events found.");
            }
            for event in events {
                let when = if event.all_day {
                    event.start.format("%Y-%m-%d (all day)").to_string()
                } else {
                    format!("{} - {}", event.start.format("%Y-%m-%d %H:%M"), event.end.format("%H:%M"))
                };
                println!("{} [{}] {}", when, event.id, event.title);
                if let Some(location) = &event.location {
                    println!("    @ {}", location);
                }
            }
        }
        EventAction::Delete { id } => {
            service.delete(&EntityId::from(id.as_str())).await?;
            println!("Deleted event: {}", id);
        }
    }
    Ok(())
}

async fn handle_tasks(service: TaskService, action: TaskAction) -> anyhow::Result<()> {
    match action {
        TaskAction::List => {
            let tasks = service.get_all(1, 100).await?;
            if tasks.is_empty() {
                println!("No tasks found.");
            }
            for task in tasks {
                let status = if task.completed { "✓" } else { "○" };
                println!("{} [{}] {}", status, task.id, task.title);
                if let Some(due) = task.due_date {
                    println!("    Due: {}", due.format("%Y-%m-%d"));
                }
            }
        }
        TaskAction::Create {
            title,
            description,
            priority,
            due,
        } => {
            let task = service
                .create(&NewTask {
                    title,
                    description,
                    priority: parse_priority(&priority)?,
                    due_date: due,
                    category_id: None,
                })
                .await?;
            println!("Created task: [{}] {}", task.id, task.title);
        }
        TaskAction::Done { id } => {
            let task = service.set_completed(&EntityId::from(id.as_str()), true).await?;
            println!("✓ {}", task.title);
        }
        TaskAction::Undo { id } => {
            let task = service.set_completed(&EntityId::from(id.as_str()), false).await?;
            println!("○ {}", task.title);
        }
        TaskAction::Delete { id } => {
            service.delete(&EntityId::from(id.as_str())).await?;
            println!("Deleted task: {}", id);
        }
    }
    Ok(())
}

async fn handle_categories(service: CategoryService, action: CategoryAction) -> anyhow::Result<()> {
    match action {
        CategoryAction::List => {
            let categories = service.get_all(1, 100).await?;
            if categories.is_empty() {
                println!("No categories found.");
            }
            for category in categories {
                println!("[{}] {} {}", category.id, category.color, category.name);
            }
        }
        CategoryAction::Create { name, color, icon } => {
            let category = service
                .create(&NewCategory {
                    name,
                    color,
                    icon,
                    description: None,
                })
                .await?;
            println!("Created category: [{}] {}", category.id, category.name);
        }
        CategoryAction::Delete { id } => {
            service.delete(&EntityId::from(id.as_str())).await?;
            println!("Deleted category: {}", id);
        }
    }
    Ok(())
}

fn parse_priority(value: &str) -> anyhow::Result<Priority> {
    match value.to_ascii_lowercase().as_str() {
        "low" => Ok(Priority::Low),
        "medium" => Ok(Priority::Medium),
        "high" => Ok(Priority::High),
        other => bail!("Unknown priority '{}', expected low, medium or high", other),
    }
}
