mod app;
mod logging;

use std::path::PathBuf;

use anyhow::Context;
use app::{engine_error, App};
use clap::{Parser, Subcommand};
use colored::Colorize;
use conversation_store::{
    export_all, export_configurations, import_all, import_configurations, render_markdown,
    ApiSettings, ImportReport,
};
use outline_core::{AppConfig, Checkpoint, NodeCoordinate, OutlineTree};
use outline_engine::{TraversalEvent, TraversalOutcome};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "outline")]
#[command(about = "Generate structured outlines and their details with a chat-completion model")]
#[command(version)]
struct Cli {
    /// Chat-completions endpoint
    #[arg(long, env = "OUTLINE_API_URL", global = true)]
    api_url: Option<String>,

    /// API key for the endpoint
    #[arg(long, env = "OUTLINE_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// Enable debug mode
    #[arg(long, short, default_value = "false", global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an outline for a request in the active conversation
    Ask {
        /// What to plan or write about
        request: String,
    },
    /// Regenerate the current outline from feedback
    AdjustOutline {
        feedback: String,
    },
    /// Write the detail of every outline node, resuming where the last run stopped
    Generate {
        /// Start at this branch (1-based)
        #[arg(long)]
        branch: Option<usize>,
        /// Start at this section (1-based)
        #[arg(long)]
        section: Option<usize>,
        /// Start at this subsection (1-based)
        #[arg(long)]
        subsection: Option<usize>,
    },
    /// Regenerate one detail message from feedback
    AdjustDetail {
        message_id: String,
        feedback: String,
    },
    /// Render the active conversation as Markdown
    ExportMarkdown {
        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Manage conversations
    #[command(subcommand)]
    Chats(ChatCommand),
    /// Manage configurations
    #[command(subcommand)]
    Configs(ConfigCommand),
    /// Export all conversations and configurations as JSON
    Export {
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Replace conversations and configurations from an export file
    Import {
        file: PathBuf,
    },
    /// Stored API endpoint and key
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Subcommand)]
enum ChatCommand {
    /// List conversations
    List,
    /// Start a new conversation and make it active
    New,
    /// Make a conversation active
    Switch { index: usize },
    /// Delete a conversation
    Delete { index: usize },
    /// Find conversations mentioning a keyword
    Search { keyword: String },
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// List configurations
    List,
    /// Print one configuration as JSON
    Show { id: String },
    /// Select the configuration used for new outlines
    Select { id: String },
    /// Add a copy of the default configuration
    Add,
    /// Replace a configuration from a JSON file
    Edit { id: String, file: PathBuf },
    /// Delete a user configuration
    Delete { id: String },
    /// Let the model design a configuration for a scenario and select it
    Generate { scenario: String },
    /// Export user configurations as JSON
    Export {
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Replace user configurations from a JSON file
    Import { file: PathBuf },
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print the stored endpoint and whether a key is stored
    Show,
    /// Store the endpoint and/or key
    Set {
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        key: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init_logging(cli.debug);

    let config = AppConfig::new();
    if cli.debug {
        eprintln!("{}", "[DEBUG] Debug mode enabled".dimmed());
        eprintln!(
            "{}",
            format!("[DEBUG] Data directory: {}", config.data_dir().display()).dimmed()
        );
    }
    let app = App::open(config).await?;

    let result = run(&cli, &app).await;
    if let Err(e) = &result {
        eprintln!("{} {}", "❌".red(), format!("{:#}", e).red());
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: &Cli, app: &App) -> anyhow::Result<()> {
    let url = cli.api_url.as_deref();
    let key = cli.api_key.as_deref();

    match &cli.command {
        Commands::Ask { request } => {
            let workflow = app.workflow(url, key).await?;
            let mut ctx = app.context().await;
            let selected = app.selected().await;
            println!("{}", format!("🚀 Generating outline for: {}", request).cyan());
            let tree = workflow
                .ask(&mut ctx, selected.as_ref(), request)
                .await
                .map_err(engine_error)?;
            print_outline(&tree);
            println!("{}", "Run `outline generate` to write the details.".dimmed());
        }
        Commands::AdjustOutline { feedback } => {
            let workflow = app.workflow(url, key).await?;
            let mut ctx = app.context().await;
            let selected = app.selected().await;
            let tree = workflow
                .adjust_outline(&mut ctx, selected.as_ref(), feedback)
                .await
                .map_err(engine_error)?;
            print_outline(&tree);
        }
        Commands::Generate {
            branch,
            section,
            subsection,
        } => {
            let start = start_checkpoint(*branch, *section, *subsection);
            generate(app, url, key, start).await?;
        }
        Commands::AdjustDetail {
            message_id,
            feedback,
        } => {
            let workflow = app.workflow(url, key).await?;
            let mut ctx = app.context().await;
            let selected = app.selected().await;
            let message = workflow
                .adjust_detail(&mut ctx, selected.as_ref(), message_id, feedback)
                .await
                .map_err(engine_error)?;
            println!("{}", message.content);
            println!("{}", format!("✅ Updated {}", message.id).green());
        }
        Commands::ExportMarkdown { output } => {
            let record = app.manager.active().await;
            let markdown = render_markdown(record.outline_tree.as_ref(), &record.messages);
            write_output(output.as_ref(), &markdown)?;
        }
        Commands::Chats(command) => chats(app, command).await?,
        Commands::Configs(command) => configs(app, url, key, command).await?,
        Commands::Export { output } => {
            let json = export_all(&app.manager, &app.registry).await?;
            write_output(output.as_ref(), &json)?;
        }
        Commands::Import { file } => {
            let json = read_input(file)?;
            let report = import_all(&app.manager, &app.registry, &json).await?;
            print_report(&report);
        }
        Commands::Settings(command) => settings(app, command).await?,
    }
    Ok(())
}

/// Explicit flags override the stored checkpoint; missing levels start at 1.
fn start_checkpoint(
    branch: Option<usize>,
    section: Option<usize>,
    subsection: Option<usize>,
) -> Option<Checkpoint> {
    if branch.is_none() && section.is_none() && subsection.is_none() {
        return None;
    }
    let zero_based = |v: Option<usize>| v.unwrap_or(1).saturating_sub(1);
    Some(Checkpoint::new(
        zero_based(branch),
        zero_based(section),
        zero_based(subsection),
    ))
}

async fn generate(
    app: &App,
    url: Option<&str>,
    key: Option<&str>,
    start: Option<Checkpoint>,
) -> anyhow::Result<()> {
    let workflow = app.workflow(url, key).await?;
    let mut ctx = app.context().await;
    let selected = app.selected().await;

    let token = CancellationToken::new();
    let ctrl_c = {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("{}", "⏸  Stopping after the current node...".yellow());
                token.cancel();
            }
        })
    };

    let (tx, mut rx) = mpsc::channel(64);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    });

    let result = workflow
        .generate_details(&mut ctx, selected.as_ref(), start, tx, token)
        .await;
    ctrl_c.abort();
    let _ = printer.await;

    match result.map_err(engine_error)? {
        TraversalOutcome::Finished { generated, skipped } => println!(
            "{}",
            format!("✅ Done: {} written, {} already present", generated, skipped).green()
        ),
        TraversalOutcome::Cancelled { generated, resume_at, .. } => println!(
            "{}",
            format!(
                "⏸  Stopped after {} nodes; `outline generate` resumes at {}",
                generated,
                checkpoint_label(&resume_at)
            )
            .yellow()
        ),
    }
    Ok(())
}

fn print_event(event: &TraversalEvent) {
    match event {
        TraversalEvent::Started { pending, .. } => {
            println!("{}", format!("📝 {} nodes to write", pending).cyan());
            println!("{}", "─".repeat(50).dimmed());
        }
        TraversalEvent::NodeSkipped { coordinate } => {
            println!("{}", format!("   skip {}", node_label(coordinate)).dimmed());
        }
        TraversalEvent::NodeStarted { coordinate } => {
            println!("{}", format!("🔧 {}", node_label(coordinate)).yellow());
        }
        TraversalEvent::NodeCompleted { message_id, .. } => {
            println!("{}", format!("   ✅ {}", message_id).green());
        }
        TraversalEvent::NodeFailed { coordinate, error } => {
            println!("{}", format!("❌ {}: {}", node_label(coordinate), error).red());
        }
        TraversalEvent::Cancelled { .. } | TraversalEvent::Finished { .. } => {
            println!("{}", "─".repeat(50).dimmed());
        }
    }
}

fn node_label(coordinate: &NodeCoordinate) -> String {
    if coordinate.is_simple_node {
        coordinate.branch_name.clone()
    } else {
        coordinate.label()
    }
}

fn checkpoint_label(checkpoint: &Checkpoint) -> String {
    format!(
        "--branch {} --section {} --subsection {}",
        checkpoint.branch_index + 1,
        checkpoint.section_index + 1,
        checkpoint.subsection_index + 1
    )
}

fn print_outline(tree: &OutlineTree) {
    println!("{}", "─".repeat(50).dimmed());
    println!("{}", render_markdown(Some(tree), &[]));
    println!("{}", "─".repeat(50).dimmed());
}

async fn chats(app: &App, command: &ChatCommand) -> anyhow::Result<()> {
    match command {
        ChatCommand::List => {
            for summary in app.manager.list().await {
                let marker = if summary.active { "*" } else { " " };
                println!(
                    "{} [{}] {} {}",
                    marker.green(),
                    summary.index,
                    summary.title,
                    format!(
                        "({} messages, {})",
                        summary.message_count,
                        summary.updated_at.format("%Y-%m-%d %H:%M")
                    )
                    .dimmed()
                );
            }
        }
        ChatCommand::New => {
            let current = app.manager.active().await;
            let record = app.manager.new_conversation(Some(&current)).await?;
            println!("{}", format!("✅ New conversation {}", record.id).green());
        }
        ChatCommand::Switch { index } => {
            let record = app.manager.switch_to(*index).await?;
            println!("{}", format!("✅ Switched to \"{}\"", record.display_title()).green());
            if let Some(dialect) = app.registry.follow_conversation(&record).await? {
                println!("{}", format!("   Configuration: {}", dialect.name).dimmed());
            }
        }
        ChatCommand::Delete { index } => {
            let removed = app.manager.delete(*index).await?;
            println!("{}", format!("🗑  Deleted \"{}\"", removed.display_title()).green());
            app.registry.follow_conversation(&app.manager.active().await).await?;
        }
        ChatCommand::Search { keyword } => {
            let hits = app.manager.search(keyword).await;
            if hits.is_empty() {
                println!("{}", "No matching conversations".dimmed());
            }
            for summary in hits {
                println!("[{}] {}", summary.index, summary.title);
            }
        }
    }
    Ok(())
}

async fn configs(
    app: &App,
    url: Option<&str>,
    key: Option<&str>,
    command: &ConfigCommand,
) -> anyhow::Result<()> {
    match command {
        ConfigCommand::List => {
            let selected = app.registry.selected_id().await;
            for dialect in app.registry.list().await {
                let marker = if selected.as_deref() == Some(dialect.id.as_str()) { "*" } else { " " };
                let kind = if dialect.is_system_config { " (system)" } else { "" };
                println!("{} {} {}{}", marker.green(), dialect.id, dialect.name, kind.dimmed());
            }
        }
        ConfigCommand::Show { id } => {
            let dialect = app.registry.get(id).await?;
            println!("{}", serde_json::to_string_pretty(&dialect)?);
        }
        ConfigCommand::Select { id } => {
            let record = app.manager.active().await;
            let dialect = app.registry.select(id, &record).await?;
            println!("{}", format!("✅ Selected {}", dialect.name).green());
        }
        ConfigCommand::Add => {
            let dialect = app.registry.add().await?;
            println!("{}", format!("✅ Added {} ({})", dialect.name, dialect.id).green());
        }
        ConfigCommand::Edit { id, file } => {
            let json = read_input(file)?;
            let dialect = app.registry.edit_from_json(id, &json).await?;
            println!("{}", format!("✅ Saved {}", dialect.name).green());
        }
        ConfigCommand::Delete { id } => {
            app.registry.delete(id).await?;
            println!("{}", format!("🗑  Deleted configuration {}", id).green());
        }
        ConfigCommand::Generate { scenario } => {
            let workflow = app.workflow(url, key).await?;
            let mut ctx = app.context().await;
            println!("{}", format!("🚀 Designing a configuration for: {}", scenario).cyan());
            let dialect = workflow
                .generate_configuration(&mut ctx, scenario)
                .await
                .map_err(engine_error)?;
            app.registry.upsert_system(dialect.clone(), &ctx.record()).await?;
            println!("{}", format!("✅ Selected {}", dialect.name).green());
            println!("{}", format!("   Branches: {}", dialect.branch_names.join(", ")).dimmed());
        }
        ConfigCommand::Export { output } => {
            let json = export_configurations(&app.registry).await?;
            write_output(output.as_ref(), &json)?;
        }
        ConfigCommand::Import { file } => {
            let json = read_input(file)?;
            let report = import_configurations(&app.registry, &json).await?;
            print_report(&report);
        }
    }
    Ok(())
}

async fn settings(app: &App, command: &SettingsCommand) -> anyhow::Result<()> {
    let mut stored = ApiSettings::load(app.store.as_ref()).await?;
    match command {
        SettingsCommand::Show => {
            println!(
                "Endpoint: {}",
                stored.api_url.as_deref().unwrap_or(&app.config.api_url)
            );
            println!(
                "API key:  {}",
                if stored.api_key.is_some() { "stored" } else { "not stored" }
            );
            println!("Model:    {}", app.config.model);
        }
        SettingsCommand::Set { url, key } => {
            if url.is_none() && key.is_none() {
                anyhow::bail!("Nothing to set: pass --url and/or --key");
            }
            if let Some(url) = url {
                stored.api_url = Some(url.clone());
            }
            if let Some(key) = key {
                stored.api_key = Some(key.clone());
            }
            stored.save(app.store.as_ref()).await?;
            println!("{}", "✅ Settings saved".green());
        }
    }
    Ok(())
}

fn print_report(report: &ImportReport) {
    println!(
        "{}",
        format!(
            "✅ Imported {} conversations and {} configurations",
            report.conversations, report.configurations
        )
        .green()
    );
    if report.skipped > 0 {
        println!("{}", format!("   {} entries skipped", report.skipped).yellow());
    }
}

fn read_input(file: &PathBuf) -> anyhow::Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("cannot read {}", file.display()))
}

fn write_output(output: Option<&PathBuf>, content: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content).with_context(|| format!("cannot write {}", path.display()))?;
            println!("{}", format!("✅ Wrote {}", path.display()).green());
        }
        None => println!("{}", content),
    }
    Ok(())
}
