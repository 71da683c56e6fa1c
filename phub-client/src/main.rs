//! ProjectHub command-line client (phub)
//!
//! Resolves a session from the configured identity, then runs one view
//! action against the backend and prints the result.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use phub_client::{
    ApiClient, Backend, CommentsView, FavoritesView, ProfileView, ProjectDetailView,
    ProjectListView, Session, SessionResolver, StaticIdentityProvider, ViewContext,
};
use phub_common::config::{ClientConfig, ConfigOverrides, IdentityConfig, LoggingConfig};
use phub_common::{EventBus, Project};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for phub
#[derive(Parser, Debug)]
#[command(name = "phub")]
#[command(about = "ProjectHub command-line client")]
#[command(version)]
struct Args {
    /// Backend base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Bearer token used when no identity is signed in
    #[arg(long, global = true)]
    token: Option<String>,

    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Identity uid
    #[arg(long, global = true)]
    uid: Option<String>,

    /// Identity email
    #[arg(long, global = true)]
    email: Option<String>,

    /// Identity display name
    #[arg(long, global = true)]
    display_name: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the resolved session
    Whoami,
    /// Browse projects
    Projects {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        tag: Option<String>,
    },
    /// Show one project
    Show { id: String },
    /// Like or unlike a project
    Like { id: String },
    /// Add or remove a project from favorites
    Favorite { id: String },
    /// List favorite projects
    Favorites,
    /// Rate a project from 1 to 5
    Rate { id: String, rating: u8 },
    /// List comments of a project
    Comments { id: String },
    /// Comment on a project
    Comment { id: String, text: String },
    /// Delete one of your comments
    Uncomment {
        project_id: String,
        comment_id: String,
    },
    /// Show or update your profile
    Profile {
        /// New display name
        #[arg(long = "name")]
        new_display_name: Option<String>,
        /// New bio
        #[arg(long)]
        bio: Option<String>,
    },
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config_path: self.config.clone(),
            api_base_url: self.api_url.clone(),
            api_token: self.token.clone(),
            identity: IdentityConfig {
                uid: self.uid.clone(),
                email: self.email.clone(),
                display_name: self.display_name.clone(),
                photo_url: None,
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = ClientConfig::load(args.overrides()).context("Failed to load configuration")?;
    init_tracing(&config.logging)?;
    debug!(api = %config.api_base_url, "Configuration loaded");

    let events = EventBus::default();
    let (provider, identity_events) = StaticIdentityProvider::new();
    let client = ApiClient::from_config(&config, provider.clone())
        .context("Failed to create API client")?;
    let backend: Arc<dyn Backend> = Arc::new(client);

    let resolver = Arc::new(SessionResolver::new(Arc::clone(&backend), events.clone()));
    let mut session = resolver.watch();
    let driver = tokio::spawn(Arc::clone(&resolver).run(identity_events));

    match config.identity.clone() {
        Some(identity) => {
            info!(uid = %identity.uid, "Signing in");
            provider.sign_in(identity, config.api_token.clone());
        }
        None => provider.sign_out(),
    }

    let settled = session
        .settled_at(1)
        .await
        .ok_or_else(|| anyhow!("Session resolver stopped before settling"))?;
    if let Some(warning) = settled.warning() {
        eprintln!("warning: {}", warning);
    }

    let ctx = ViewContext::new(backend, session, events);
    let outcome = run_command(args.command, &ctx, &settled).await;

    driver.abort();
    outcome
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("Invalid log level")?;

    let (file_layer, stderr_layer) = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (Some(layer), None)
        }
        None => (
            None,
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
    Ok(())
}

async fn run_command(command: Command, ctx: &ViewContext, session: &Session) -> Result<()> {
    match command {
        Command::Whoami => {
            println!("status: {}", session.status());
            match session.user() {
                Some(user) => {
                    println!("uid: {}", user.uid());
                    println!("email: {}", user.email());
                    println!("name: {}", user.display_name());
                    if let Some(id) = user.id() {
                        println!("id: {}", id);
                    }
                    if user.is_degraded() {
                        println!("profile: unavailable (offline fallback)");
                    }
                }
                None => println!("not signed in"),
            }
        }

        Command::Projects { page, search, tag } => {
            let view = ProjectListView::new(ctx);
            view.set_search(search);
            view.set_tag(tag);
            view.set_page(page);
            view.refresh().await.context("Failed to fetch projects")?;

            for project in view.projects() {
                let likes = view.like_state(&project.id).unwrap_or_default();
                print_card(&project, likes.count, likes.liked);
            }
            println!("page {} of {}", view.query().page, view.total_pages());
        }

        Command::Show { id } => {
            let view = ProjectDetailView::new(ctx, id);
            view.load().await.context("Failed to load project")?;
            print_detail(&view);
        }

        Command::Like { id } => {
            let view = ProjectDetailView::new(ctx, id);
            view.load().await.context("Failed to load project")?;
            let state = view.toggle_like().await?;
            println!(
                "{} ({} likes)",
                if state.liked { "liked" } else { "unliked" },
                state.count
            );
        }

        Command::Favorite { id } => {
            let view = ProjectDetailView::new(ctx, id);
            view.load().await.context("Failed to load project")?;
            let favorite = view.toggle_favorite().await?;
            println!(
                "{}",
                if favorite {
                    "added to favorites"
                } else {
                    "removed from favorites"
                }
            );
        }

        Command::Favorites => {
            let view = FavoritesView::new(ctx);
            view.refresh().await.context("Failed to fetch favorites")?;
            let projects = view.projects();
            if projects.is_empty() {
                println!("no favorites");
            }
            for project in projects {
                let likes = view.like_state(&project.id).unwrap_or_default();
                print_card(&project, likes.count, likes.liked);
            }
        }

        Command::Rate { id, rating } => {
            let view = ProjectDetailView::new(ctx, id);
            view.load().await.context("Failed to load project")?;
            let state = view.rate(rating).await?;
            println!(
                "rated {} (average {:.1})",
                state.user_rating.unwrap_or(rating),
                state.average
            );
        }

        Command::Comments { id } => {
            let view = CommentsView::new(ctx, id);
            view.refresh().await.context("Failed to fetch comments")?;
            let comments = view.comments();
            if comments.is_empty() {
                println!("no comments");
            }
            for comment in comments {
                println!(
                    "[{}] {} ({}): {}",
                    comment.id,
                    comment.author_name,
                    comment.created_at.format("%Y-%m-%d %H:%M"),
                    comment.text
                );
            }
        }

        Command::Comment { id, text } => {
            let view = CommentsView::new(ctx, id);
            view.refresh().await.context("Failed to fetch comments")?;
            let comments = view.post(&text).await?;
            println!("posted ({} comments)", comments.len());
        }

        Command::Uncomment {
            project_id,
            comment_id,
        } => {
            let view = CommentsView::new(ctx, project_id);
            view.refresh().await.context("Failed to fetch comments")?;
            let comments = view.delete(&comment_id).await?;
            println!("deleted ({} comments left)", comments.len());
        }

        Command::Profile {
            new_display_name,
            bio,
        } => {
            let view = ProfileView::new(ctx);
            let mut profile = view.load().await.context("Failed to load profile")?;
            if new_display_name.is_some() || bio.is_some() {
                let name = new_display_name.unwrap_or_else(|| profile.display_name.clone());
                profile = view
                    .update(&name, bio.as_deref())
                    .await
                    .context("Failed to update profile")?;
            }
            println!("name: {}", profile.display_name);
            println!("email: {}", profile.email);
            if let Some(bio) = profile.bio.as_deref().filter(|b| !b.is_empty()) {
                println!("bio: {}", bio);
            }
            println!("member since: {}", profile.created_at.format("%Y-%m-%d"));
        }
    }
    Ok(())
}

fn print_card(project: &Project, likes: u64, liked: bool) {
    println!(
        "{}  {}  by {}  [{} likes{}]",
        project.id,
        project.title,
        project.display_author(),
        likes,
        if liked { ", liked" } else { "" }
    );
}

fn print_detail(view: &ProjectDetailView) {
    let Some(project) = view.project() else {
        println!("project not found");
        return;
    };
    let likes = view.like_state();
    let rating = view.rating();

    println!("{}", project.title);
    println!("by {}", project.display_author());
    if !project.description.is_empty() {
        println!();
        println!("{}", project.description);
        println!();
    }
    if !project.tags.is_empty() {
        println!("tags: {}", project.tags.join(", "));
    }
    if let Some(link) = &project.github_link {
        println!("github: {}", link);
    }
    if let Some(link) = &project.live_link {
        println!("live: {}", link);
    }
    println!(
        "likes: {}{}",
        likes.count,
        if likes.liked { " (you like this)" } else { "" }
    );
    match rating.user_rating {
        Some(value) => println!("rating: {:.1} (yours: {})", rating.average, value),
        None => println!("rating: {:.1}", rating.average),
    }
    if view.is_favorite() {
        println!("in your favorites");
    }
    if view.is_owner() {
        println!("you own this project");
    }
}
