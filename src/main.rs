use std::error::Error;

use chrono::{Local, Utc};
use clap::Parser;
use colored::Colorize;
use devstreak::cli::{BackendArgs, BackendKind, Cli, Command, InitArgs, ServeArgs, Transport};
use devstreak::metadata::{PKG_NAME, PKG_VERSION};
use devstreak::server::TrackerServer;
use devstreak::storage::FileStore;
use dialoguer::Input;
use hyper_util::{
    rt::{TokioExecutor, TokioIo},
    server::conn::auto::Builder,
    service::TowerToHyperService,
};
use rmcp::transport::streamable_http_server::{StreamableHttpService, session::local::LocalSessionManager};
use rmcp::{ServiceExt, transport::stdio};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // stdout carries the stdio transport, so logs go to stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    cli.backend.validate()?;

    match cli.command {
        Command::Version => println!("{PKG_NAME} {PKG_VERSION}"),
        Command::Init(args) => init(&cli.backend, args)?,
        Command::Stats { json } => stats(&cli.backend, json)?,
        Command::Serve(args) => {
            args.validate()?;
            serve(&cli.backend, args).await?;
        }
    }
    Ok(())
}

async fn serve(backend: &BackendArgs, args: ServeArgs) -> Result<(), Box<dyn Error>> {
    let tracker = backend.tracker()?;
    tracing::info!(
        backend = ?backend.backend,
        ai_drafting = tracker.has_drafter(),
        "Starting {PKG_NAME} {PKG_VERSION} MCP server"
    );
    let server = TrackerServer::new(tracker);

    match args.transport {
        Transport::Stdio => {
            let running = server.serve(stdio()).await?;
            running.waiting().await?;
        }
        Transport::Http => {
            let http_service = TowerToHyperService::new(StreamableHttpService::new(
                move || Ok(server.clone()),
                LocalSessionManager::default().into(),
                Default::default(),
            ));
            let listener = tokio::net::TcpListener::bind(&args.http_addr).await?;
            tracing::info!(addr = %listener.local_addr()?, "listening for streamable HTTP");
            loop {
                let (stream, peer) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                let io = TokioIo::new(stream);
                let service = http_service.clone();
                tokio::spawn(async move {
                    if let Err(e) = Builder::new(TokioExecutor::default())
                        .serve_connection(io, service)
                        .await
                    {
                        tracing::debug!(%peer, error = %e, "connection ended with error");
                    }
                });
            }
        }
    }
    Ok(())
}

fn stats(backend: &BackendArgs, as_json: bool) -> Result<(), Box<dyn Error>> {
    let tracker = backend.tracker()?;
    let projects = tracker.dashboard()?;
    let profile = tracker.profile_stats(&Local::now())?;

    if as_json {
        let report = json!({ "projects": projects, "profile": profile });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{}  {}",
        profile.user.username.bold(),
        format!("{} day streak", profile.user.streak).yellow()
    );
    println!(
        "{} completed  {} backlog",
        profile.totals.completed.to_string().green().bold(),
        profile.totals.backlog.to_string().red().bold()
    );

    println!("\n{}", "Projects".bold());
    if projects.is_empty() {
        println!("  {}", "no projects yet".dimmed());
    }
    for project in &projects {
        println!(
            "  {:<28} {:>3}%  {} members  {} day streak",
            project.name, project.progress, project.member_count, project.streak
        );
    }

    println!("\n{}", "Last 7 days".bold());
    for day in &profile.weekly_activity {
        println!("  {} {} {}", day.label, "#".repeat(day.count as usize).green(), day.count);
    }

    if !profile.pending_invites.is_empty() {
        println!("\n{}", "Pending invites".bold());
        for invite in &profile.pending_invites {
            println!(
                "  {} from {} {}",
                invite.project_name,
                invite.inviter_name,
                invite.id.dimmed()
            );
        }
    }
    Ok(())
}

fn init(backend: &BackendArgs, args: InitArgs) -> Result<(), Box<dyn Error>> {
    if backend.backend != BackendKind::File {
        return Err("init only applies to the file backend; Supabase profiles are created at sign-up".into());
    }
    let path = backend.data_path()?;
    let mut store = FileStore::open(&path)?;

    let user = if args.demo {
        store.seed_demo(Utc::now())?
    } else {
        let username = match args.username {
            Some(username) => username,
            None => Input::<String>::new()
                .with_prompt("Username")
                .validate_with(|input: &String| -> Result<(), &str> {
                    if input.trim().chars().count() >= 2 {
                        Ok(())
                    } else {
                        Err("Username must be at least 2 characters")
                    }
                })
                .interact_text()?,
        };
        store.create_user(&username)?
    };

    println!(
        "{} signed in as {} ({})",
        "✓".green().bold(),
        user.username.bold(),
        path.display()
    );
    println!("export DEVSTREAK_USER={}", user.id);
    Ok(())
}
