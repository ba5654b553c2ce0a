use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{reload, EnvFilter};

use trip_blueprint::config::{Config, EnrichmentBackend};
use trip_blueprint::llm::{create_llm, GroundedPlaceSearch, PoiExtractor, LLM};
use trip_blueprint::models::{BlueprintStatus, Creator};
use trip_blueprint::places::{GooglePlacesClient, PlaceEnricher};
use trip_blueprint::store::{BlueprintStore, LocalStore};
use trip_blueprint::transcript::{format_clock, SupadataClient, TranscriptAssembler};
use trip_blueprint::verification::{
    PointUpdate, ReviewMode, SessionAction, SessionPhase, VerificationSession, VerificationSource, Verifier,
};
use trip_blueprint::{BlueprintAssembler, ChannelIngestor, VideoProcessor, YouTubeClient};

const DEFAULT_LOG_LEVEL: &str = "trip_blueprint=info,warn";

#[derive(Parser)]
#[command(name = "trip-blueprint")]
#[command(version, author = "TigreRoll")]
#[command(about = "Turn creator travel videos into verified trip blueprints")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override the store directory
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage creators
    Creator {
        #[command(subcommand)]
        action: CreatorAction,
    },
    /// Connect a creator to a YouTube channel and ingest a page of uploads
    Connect {
        creator: String,
        /// Channel handle (e.g. "@wanderlust" or a channel URL)
        handle: String,
        /// Fetch the next page using the stored cursor
        #[arg(long)]
        load_more: bool,
    },
    /// Forget the connected channel and its ingested videos
    Disconnect { creator: String },
    /// List a creator's ingested videos
    Videos { creator: String },
    /// Build a draft blueprint from a stored video
    Process { video: String },
    /// List a creator's blueprints
    Blueprints { creator: String },
    /// Review a draft blueprint card by card
    Review { blueprint: String },
    /// Extract points from a text file and review them
    ReviewText {
        creator: String,
        title: String,
        /// File holding the description or caption
        file: PathBuf,
    },
    /// Publish a draft as-is, without creator verification
    PublishDraft { blueprint: String },
    /// Delete a blueprint and make its video reprocessable
    Delete { blueprint: String },
    /// Show which provider keys are configured
    Keys {
        /// Also check that the model endpoint answers
        #[arg(long)]
        probe: bool,
    },
}

#[derive(Subcommand)]
enum CreatorAction {
    /// Create a creator account
    Add { name: String },
    /// List creators
    List,
}

/// Shared services built from configuration
struct App {
    config: Config,
    store: Arc<LocalStore>,
}

impl App {
    async fn open(config: Config) -> Result<Self> {
        let store = if config.storage.persist {
            LocalStore::open(&config.storage.state_dir).await?
        } else {
            LocalStore::in_memory()
        };
        Ok(Self {
            config,
            store: Arc::new(store),
        })
    }

    fn llm(&self) -> Result<Arc<dyn LLM>> {
        let llm = create_llm(&self.config.llm).context("LLM provider is not configured")?;
        Ok(Arc::from(llm))
    }

    fn place_enricher(&self) -> Result<PlaceEnricher> {
        let client = GooglePlacesClient::new(self.config.places.clone())?;
        Ok(PlaceEnricher::new(Arc::new(client)))
    }

    fn assembler(&self) -> Result<Arc<BlueprintAssembler>> {
        Ok(Arc::new(BlueprintAssembler::new(
            self.place_enricher()?,
            self.store.clone(),
            self.config.blueprint.clone(),
            self.config.places.max_concurrent_lookups,
        )))
    }

    fn ingestor(&self) -> Result<ChannelIngestor> {
        let platform = YouTubeClient::new(self.config.youtube.clone())?;
        Ok(ChannelIngestor::new(Arc::new(platform), self.store.clone()))
    }

    fn processor(&self) -> Result<VideoProcessor> {
        let llm = self.llm()?;
        let provider = SupadataClient::new(self.config.transcript.clone())?;
        Ok(VideoProcessor::new(
            TranscriptAssembler::new(Arc::new(provider), self.config.transcript.language.clone()),
            PoiExtractor::new(llm, self.config.llm.clone()),
            self.assembler()?,
            self.store.clone(),
        ))
    }

    fn verifier(&self, with_extractor: bool) -> Result<Verifier> {
        let search = self.place_enricher()?;
        let approval = match self.config.verification.enrichment {
            EnrichmentBackend::Places => search.clone(),
            EnrichmentBackend::Grounded => PlaceEnricher::new(Arc::new(GroundedPlaceSearch::new(
                self.llm()?,
                self.config.llm.clone(),
            ))),
        };

        let verifier = Verifier::new(approval, search, self.assembler()?);
        if with_extractor {
            let extractor = PoiExtractor::new(self.llm()?, self.config.llm.clone());
            Ok(verifier.with_extractor(Arc::new(extractor)))
        } else {
            Ok(verifier)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging before anything logs. RUST_LOG wins, otherwise the
    // configured level is swapped in once the config is loaded.
    let env_filter = EnvFilter::try_from_default_env().ok();
    let explicit_filter = env_filter.is_some() || cli.verbose;
    let initial = env_filter.unwrap_or_else(|| {
        EnvFilter::new(if cli.verbose { "trip_blueprint=debug,info" } else { DEFAULT_LOG_LEVEL })
    });
    let (filter, filter_handle) = reload::Layer::new(initial);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::load().unwrap_or_else(|e| {
        warn!("Failed to load config, using defaults: {}", e);
        Config::from_env()
    });
    if let Some(dir) = &cli.state_dir {
        config.storage.state_dir = dir.clone();
    }

    if !explicit_filter {
        if let Err(e) = filter_handle.reload(EnvFilter::new(&config.logging.level)) {
            warn!("Could not apply log level {}: {}", config.logging.level, e);
        }
    }

    info!("🚀 Trip Blueprint starting...");
    if cli.verbose {
        info!("{}", config.summary());
    }

    let app = App::open(config).await?;

    match cli.command {
        Commands::Creator { action } => match action {
            CreatorAction::Add { name } => {
                let id = app.store.insert_creator(Creator::new(name.clone())).await?;
                println!("✅ Created creator {} ({})", name, id);
            }
            CreatorAction::List => {
                for creator in app.store.list_creators().await? {
                    let channel = creator.channel_handle.as_deref().unwrap_or("-");
                    let more = if creator.has_more_videos() { " (more available)" } else { "" };
                    println!("{}  {}  @{}{}", creator.id, creator.name, channel, more);
                }
            }
        },

        Commands::Connect { creator, handle, load_more } => {
            let outcome = app.ingestor()?.connect_channel(&creator, &handle, load_more).await?;
            println!(
                "📺 Ingested {} videos{}",
                outcome.count,
                if outcome.has_more { ", more available (--load-more)" } else { "" }
            );
        }

        Commands::Disconnect { creator } => {
            let removed = app.ingestor()?.disconnect(&creator).await?;
            println!("🔌 Disconnected, {} videos removed", removed);
        }

        Commands::Videos { creator } => {
            let videos = app.store.list_videos(&creator).await?;
            if videos.is_empty() {
                println!("No videos ingested");
            }
            for video in videos {
                println!("{}  [{:?}]  {}  {}", video.id, video.status, video.duration, video.title);
            }
        }

        Commands::Process { video } => {
            let outcome = app.processor()?.process_video(&video).await?;
            println!(
                "📘 Draft blueprint {} with {} points",
                outcome.blueprint_id, outcome.points_count
            );
        }

        Commands::Blueprints { creator } => {
            for blueprint in app.store.list_blueprints(&creator).await? {
                let trust = match (blueprint.status, blueprint.creator_verified) {
                    (BlueprintStatus::Published, Some(true)) => "verified",
                    (BlueprintStatus::Published, _) => "AI draft",
                    _ => "",
                };
                println!(
                    "{}  [{:?}] {}  {} points  {}",
                    blueprint.id,
                    blueprint.status,
                    trust,
                    blueprint.points.len(),
                    blueprint.title
                );
            }
        }

        Commands::Review { blueprint } => {
            let verifier = app.verifier(false)?;
            let session = verifier.start_verification(VerificationSource::Blueprint(blueprint)).await;
            run_review(&verifier, session).await?;
        }

        Commands::ReviewText { creator, title, file } => {
            if app.store.get_creator(&creator).await?.is_none() {
                return Err(anyhow!("Creator not found: {}", creator));
            }
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let verifier = app.verifier(true)?;
            let session = verifier
                .start_verification(VerificationSource::FreeText { creator_id: creator, title, text })
                .await;
            run_review(&verifier, session).await?;
        }

        Commands::PublishDraft { blueprint } => {
            let verifier = app.verifier(false)?;
            let session = verifier.start_verification(VerificationSource::Blueprint(blueprint)).await;
            let session = verifier.finalize(session, false).await;
            report_publish(&session)?;
        }

        Commands::Delete { blueprint } => {
            app.assembler()?.delete(&blueprint).await?;
            println!("🗑️ Deleted");
        }

        Commands::Keys { probe } => {
            let report = app.config.credential_report();
            for (name, present) in report.entries() {
                println!("{:<12} {}", name, if present { "✅" } else { "❌ missing" });
            }
            if !report.all_present() {
                warn!("Some provider keys are missing");
            }
            if probe {
                match app.llm() {
                    Ok(llm) => {
                        let reachable = llm.is_available().await;
                        println!(
                            "{:<12} {:?} {}",
                            "endpoint",
                            llm.provider_type(),
                            if reachable { "✅ reachable" } else { "❌ unreachable" }
                        );
                    }
                    Err(e) => println!("{:<12} ❌ {}", "endpoint", e),
                }
            }
        }
    }

    Ok(())
}

fn report_publish(session: &VerificationSession) -> Result<()> {
    match session.phase() {
        SessionPhase::Published => {
            let verified = session.publish_verified().unwrap_or(false);
            println!("🚀 Published ({})", if verified { "creator verified" } else { "AI draft" });
            Ok(())
        }
        SessionPhase::Failed { message, .. } => Err(anyhow!("{}", message)),
        other => Err(anyhow!("Nothing published ({:?})", other)),
    }
}

async fn prompt(lines: &mut Lines<BufReader<Stdin>>, text: &str) -> Result<Option<String>> {
    println!("{}", text);
    Ok(lines.next_line().await?.map(|line| line.trim().to_string()))
}

/// Line-driven review: a(pprove) r(eject) e(dit) m(ap mode) q(uit).
/// Map mode accepts `+ query`, `- index`, `p` (publish) and `q`.
async fn run_review(verifier: &Verifier, mut session: VerificationSession) -> Result<()> {
    if let SessionPhase::Failed { message, .. } = session.phase() {
        return Err(anyhow!("{}", message));
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        match (session.phase(), session.mode()) {
            (SessionPhase::Published, _) => {
                report_publish(&session)?;
                return Ok(());
            }
            (SessionPhase::Failed { message, .. }, _) => {
                println!("❌ {}", message);
                let Some(answer) = prompt(&mut lines, "retry? [y/n]").await? else {
                    return Ok(());
                };
                if answer != "y" {
                    return Ok(());
                }
                session = session.apply(SessionAction::Retry);
            }
            (SessionPhase::Complete, _) => {
                println!(
                    "✅ Review complete: {} of {} approved",
                    session.verified().len(),
                    session.candidates().len()
                );
                let Some(answer) = prompt(&mut lines, "publish as verified? [y/n]").await? else {
                    return Ok(());
                };
                if answer != "y" {
                    return Ok(());
                }
                session = verifier.finalize(session, true).await;
            }
            (SessionPhase::Reviewing, ReviewMode::Sequential) => {
                let Some(point) = session.current_candidate() else {
                    println!("No candidates, switching to map mode");
                    session = verifier.switch_to_map_mode(session);
                    continue;
                };
                println!(
                    "\n[{}/{}] {} ({}) day {}{}",
                    session.current_index() + 1,
                    session.candidates().len(),
                    point.name,
                    point.category,
                    point.day,
                    point.timestamp.map(|t| format!(" @ {}", format_clock(t))).unwrap_or_default()
                );
                if !point.description.is_empty() {
                    println!("    {}", point.description);
                }

                let Some(answer) = prompt(&mut lines, "a/r/e/m/q").await? else {
                    return Ok(());
                };
                session = match answer.as_str() {
                    "a" => verifier.approve(session).await,
                    "r" => verifier.reject(session),
                    "e" => {
                        let name = prompt(&mut lines, "name (blank keeps):").await?.filter(|s| !s.is_empty());
                        let description = prompt(&mut lines, "description (blank keeps):")
                            .await?
                            .filter(|s| !s.is_empty());
                        let day = prompt(&mut lines, "day (blank keeps):")
                            .await?
                            .and_then(|s| s.parse::<u32>().ok());
                        let edited = verifier.edit(
                            session,
                            PointUpdate {
                                name,
                                description,
                                day,
                                ..PointUpdate::default()
                            },
                        );
                        verifier.save_edit(edited)
                    }
                    "m" => verifier.switch_to_map_mode(session),
                    "q" => return Ok(()),
                    _ => session,
                };
            }
            (SessionPhase::Reviewing, ReviewMode::Map) => {
                println!("\nMap collection:");
                for (index, point) in session.working().iter().enumerate() {
                    let located = if point.is_enriched() { "📍" } else { "  " };
                    println!("  {} {:>2}. {} (day {})", located, index + 1, point.name, point.day);
                }

                let Some(answer) = prompt(&mut lines, "+ query / - index / p / q").await? else {
                    return Ok(());
                };
                session = if let Some(query) = answer.strip_prefix('+') {
                    verifier.add_place(session, query.trim()).await
                } else if let Some(index) = answer.strip_prefix('-') {
                    let id = index
                        .trim()
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| session.working().get(i.wrapping_sub(1)))
                        .map(|p| p.id.clone());
                    match id {
                        Some(id) => verifier.remove_point(session, &id),
                        None => session,
                    }
                } else if answer == "p" {
                    verifier.finalize(session, true).await
                } else if answer == "q" {
                    return Ok(());
                } else {
                    session
                };
            }
            (phase, _) => {
                return Err(anyhow!("Unexpected review state: {:?}", phase));
            }
        }
    }
}
