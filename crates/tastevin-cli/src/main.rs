use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use tastevin_core::{
    AppConfig, AvailabilityResponse, Database, ExitCode, Invitee, NewEvent, NewInvitee,
    NewTimeOption, NewWine, TastevinError, WineChanges, WineContribution, WineType,
};

// ─── CLI Definition ─────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "tastevin",
    about = "Plan wine tastings, collect bottles, catch duplicates",
    version,
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format (for scripts).
    /// Also enabled by setting TASTEVIN_JSON=1.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Event management.
    Event {
        #[command(subcommand)]
        action: EventAction,
    },

    /// Invitee management.
    Invitee {
        #[command(subcommand)]
        action: InviteeAction,
    },

    /// Record which time slots a guest can make.
    Availability {
        /// Participation token of the guest.
        token: String,
        /// Time option IDs the guest can attend.
        #[arg(long = "yes", action = clap::ArgAction::Append)]
        available: Vec<String>,
        /// Time option IDs the guest cannot attend.
        #[arg(long = "no", action = clap::ArgAction::Append)]
        unavailable: Vec<String>,
    },

    /// Wine contributions.
    Wine {
        #[command(subcommand)]
        action: WineAction,
    },

    /// Score a wine (0-100).
    Rate {
        wine: String,
        score: u8,
        /// Invitee ID or participation token of the taster.
        #[arg(long = "as")]
        taster: String,
        #[arg(long)]
        notes: Option<String>,
    },

    /// Ranked results of an event.
    Recap { event: String },

    /// Config management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

// ─── Event Actions ──────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum EventAction {
    /// Create an event with its guests and candidate time slots.
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Host identifier (e.g. email).
        #[arg(long)]
        by: String,
        /// Guest as `Name` or `Name=email`.
        #[arg(long, action = clap::ArgAction::Append)]
        invitee: Vec<String>,
        /// Time slot as `START/END` in RFC 3339.
        #[arg(long, action = clap::ArgAction::Append)]
        slot: Vec<String>,
    },
    /// List events, newest first.
    List {
        #[arg(long)]
        by: Option<String>,
    },
    /// Show an event with its slots and guests.
    Show { id: String },
    /// Pick the final time slot.
    Finalize {
        id: String,
        #[arg(long)]
        slot: String,
    },
    /// Delete an event and everything attached to it.
    Delete {
        id: String,
        #[arg(long)]
        confirm: bool,
    },
}

// ─── Invitee Actions ────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum InviteeAction {
    /// Invite another guest.
    Add {
        event: String,
        name: String,
        #[arg(long)]
        email: Option<String>,
    },
    /// Find a guest by participation token.
    Lookup { token: String },
}

// ─── Wine Actions ───────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum WineAction {
    /// Register a bottle for an event.
    Add {
        /// Invitee ID or participation token of the contributor.
        #[arg(long = "as")]
        contributor: String,
        #[arg(long = "type")]
        wine_type: WineType,
        #[arg(long)]
        producer: Option<String>,
        #[arg(long)]
        varietal: Option<String>,
        #[arg(long)]
        region: Option<String>,
        #[arg(long)]
        vintage: Option<i32>,
        #[arg(long)]
        price: Option<f64>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Change a bottle's details. Pass an empty string to clear a text field.
    Update {
        id: String,
        #[arg(long = "type")]
        wine_type: Option<WineType>,
        #[arg(long)]
        producer: Option<String>,
        #[arg(long)]
        varietal: Option<String>,
        #[arg(long)]
        region: Option<String>,
        #[arg(long, conflicts_with = "clear_vintage")]
        vintage: Option<i32>,
        #[arg(long)]
        clear_vintage: bool,
        #[arg(long, conflicts_with = "clear_price")]
        price: Option<f64>,
        #[arg(long)]
        clear_price: bool,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Remove a bottle.
    Delete {
        id: String,
        #[arg(long)]
        confirm: bool,
    },
    /// Show a bottle with its duplicate flags and ratings.
    Show { id: String },
    /// List the bottles of an event.
    List { event: String },
    /// Re-run duplicate detection for a bottle.
    Recheck { id: String },
}

// ─── Config Actions ─────────────────────────────────────────────────────────

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the effective configuration.
    Show,
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();
    let json_output = cli.json || std::env::var("TASTEVIN_JSON").as_deref() == Ok("1");

    if let Err(err) = run(cli.command, json_output) {
        let code = err
            .downcast_ref::<TastevinError>()
            .map(TastevinError::exit_code)
            .unwrap_or(ExitCode::GeneralError);
        if json_output {
            let payload = serde_json::json!({
                "status": "error",
                "error": error_kind(code),
                "message": err.to_string(),
            });
            println!("{payload}");
        } else {
            eprintln!("Error: {err:#}");
        }
        std::process::exit(code as i32);
    }
}

fn run(command: Commands, json_output: bool) -> Result<()> {
    let start = Instant::now();

    // Load config (honors TASTEVIN_CONFIG / TASTEVIN_DATA_PATH if set)
    let mut config = AppConfig::load()?;
    if let Ok(data_path) = std::env::var("TASTEVIN_DATA_PATH") {
        config.set_data_path(PathBuf::from(data_path));
    }
    init_tracing(&config);

    match command {
        // ── Events ─────────────────────────────────────────────────────────
        Commands::Event { action } => match action {
            EventAction::Create { title, description, by, invitee, slot } => {
                let db = open_db(&config)?;
                let new = NewEvent {
                    title,
                    description,
                    created_by: by,
                    time_options: slot.iter().map(|s| parse_slot(s)).collect::<Result<_, _>>()?,
                    invitees: invitee.iter().map(|s| parse_invitee(s)).collect(),
                };
                let event = db.create_event(new)?;
                let invitees = db.list_invitees(&event.id)?;
                let options = db.list_time_options(&event.id)?;
                let dur = start.elapsed().as_millis();

                if json_output {
                    print_json(&serde_json::json!({
                        "status": "ok",
                        "data": { "event": event, "time_options": options, "invitees": invitees },
                        "meta": { "duration_ms": dur }
                    }))?;
                } else {
                    println!("Created event {}: {}", event.id, event.title);
                    for guest in &invitees {
                        println!("  {:<20} token {}", guest.name, guest.token);
                    }
                }
            }

            EventAction::List { by } => {
                let db = open_db(&config)?;
                let events = db.list_events(by.as_deref())?;
                let dur = start.elapsed().as_millis();

                if json_output {
                    print_json(&serde_json::json!({
                        "status": "ok",
                        "data": { "items": events, "total": events.len() },
                        "meta": { "duration_ms": dur }
                    }))?;
                } else if events.is_empty() {
                    println!("No events yet. Use `tastevin event create` to plan one.");
                } else {
                    for event in &events {
                        let state = if event.finalized { "final" } else { "open" };
                        println!(
                            "{id}  {title:<40}  {state:<5}  {by}",
                            id = short(&event.id),
                            title = event.title,
                            by = event.created_by,
                        );
                    }
                }
            }

            EventAction::Show { id } => {
                let db = open_db(&config)?;
                let event_id = parse_id(&id, "event")?;
                let event = db.get_event(&event_id)?;
                let options = db.list_time_options(&event_id)?;
                let invitees = db.list_invitees(&event_id)?;
                let wines = db.list_wines(&event_id)?;
                let dur = start.elapsed().as_millis();

                if json_output {
                    print_json(&serde_json::json!({
                        "status": "ok",
                        "data": {
                            "event": event,
                            "time_options": options,
                            "invitees": invitees,
                            "wines": wines,
                        },
                        "meta": { "duration_ms": dur }
                    }))?;
                } else {
                    println!("{} ({})", event.title, event.id);
                    if let Some(description) = &event.description {
                        println!("  {description}");
                    }
                    println!("Time options:");
                    for option in &options {
                        let marker = if event.selected_time_option_id == Some(option.id) { "*" } else { " " };
                        println!(
                            " {marker} {}  {} → {}",
                            option.id,
                            option.start_time.to_rfc3339(),
                            option.end_time.to_rfc3339()
                        );
                    }
                    println!("Guests:");
                    for guest in &invitees {
                        let responded = if guest.responded_at.is_some() { "responded" } else { "pending" };
                        println!("   {:<20} {responded}", guest.name);
                    }
                    println!("Wines: {}", wines.len());
                }
            }

            EventAction::Finalize { id, slot } => {
                let db = open_db(&config)?;
                let event = db.finalize_event(&parse_id(&id, "event")?, &parse_id(&slot, "time option")?)?;
                let dur = start.elapsed().as_millis();

                if json_output {
                    print_json(&serde_json::json!({"status":"ok","data":event,"meta":{"duration_ms":dur}}))?;
                } else {
                    println!("Finalized: {}", event.title);
                }
            }

            EventAction::Delete { id, confirm } => {
                if !confirm {
                    eprintln!("Add --confirm to delete the event and all of its wines.");
                    std::process::exit(ExitCode::InvalidArgs as i32);
                }
                let db = open_db(&config)?;
                db.delete_event(&parse_id(&id, "event")?)?;
                let dur = start.elapsed().as_millis();

                if json_output {
                    print_json(&serde_json::json!({"status":"ok","data":{"deleted":id},"meta":{"duration_ms":dur}}))?;
                } else {
                    println!("Deleted event: {id}");
                }
            }
        },

        // ── Invitees ───────────────────────────────────────────────────────
        Commands::Invitee { action } => match action {
            InviteeAction::Add { event, name, email } => {
                let db = open_db(&config)?;
                let invitee = db.add_invitee(&parse_id(&event, "event")?, &name, email.as_deref())?;
                let dur = start.elapsed().as_millis();

                if json_output {
                    print_json(&serde_json::json!({"status":"ok","data":invitee,"meta":{"duration_ms":dur}}))?;
                } else {
                    println!("Invited {} (token {})", invitee.name, invitee.token);
                }
            }

            InviteeAction::Lookup { token } => {
                let db = open_db(&config)?;
                let invitee = db.invitee_by_token(&token)?;
                let availability = db.list_availability(&invitee.id)?;
                let dur = start.elapsed().as_millis();

                if json_output {
                    print_json(&serde_json::json!({
                        "status": "ok",
                        "data": { "invitee": invitee, "availability": availability },
                        "meta": { "duration_ms": dur }
                    }))?;
                } else {
                    println!("{} ({}) in event {}", invitee.name, invitee.id, invitee.event_id);
                    for response in &availability {
                        let answer = if response.available { "yes" } else { "no" };
                        println!("  {}  {answer}", response.time_option_id);
                    }
                }
            }
        },

        Commands::Availability { token, available, unavailable } => {
            let db = open_db(&config)?;
            let invitee = db.invitee_by_token(&token)?;
            let mut responses = Vec::with_capacity(available.len() + unavailable.len());
            for (ids, answer) in [(&available, true), (&unavailable, false)] {
                for id in ids {
                    responses.push(AvailabilityResponse {
                        time_option_id: parse_id(id, "time option")?,
                        available: answer,
                    });
                }
            }
            let invitee = db.submit_availability(&invitee.id, &responses)?;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":invitee,"meta":{"duration_ms":dur}}))?;
            } else {
                println!("Recorded {} answers for {}", responses.len(), invitee.name);
            }
        }

        // ── Wines ──────────────────────────────────────────────────────────
        Commands::Wine { action } => match action {
            WineAction::Add { contributor, wine_type, producer, varietal, region, vintage, price, notes } => {
                let db = open_db(&config)?;
                let invitee = resolve_invitee(&db, &contributor)?;
                let mut new = NewWine::new(invitee.event_id, invitee.id, wine_type);
                new.producer = producer;
                new.varietal = varietal;
                new.region = region;
                new.vintage = vintage;
                new.price = price;
                new.notes = notes;

                let wine = db.create_wine(new)?;
                let status = db.duplicate_status(&wine.id)?;
                let dur = start.elapsed().as_millis();

                if json_output {
                    print_json(&serde_json::json!({
                        "status": "ok",
                        "data": { "wine": wine, "duplicates": status },
                        "meta": { "duration_ms": dur }
                    }))?;
                } else {
                    println!("Added {} ({})", wine.label(), wine.id);
                    for flag in &status.duplicate_flags {
                        let other = db.get_wine(&flag.duplicate_wine_id)?;
                        println!("  possible duplicate of {} [{}]", other.label(), flag.confidence);
                    }
                }
            }

            WineAction::Update {
                id, wine_type, producer, varietal, region, vintage, clear_vintage, price, clear_price, notes,
            } => {
                let db = open_db(&config)?;
                let wine_id = parse_id(&id, "wine")?;
                let changes = WineChanges {
                    wine_type,
                    producer: producer.map(Some),
                    varietal: varietal.map(Some),
                    region: region.map(Some),
                    vintage: if clear_vintage { Some(None) } else { vintage.map(Some) },
                    price: if clear_price { Some(None) } else { price.map(Some) },
                    notes: notes.map(Some),
                };
                let wine = db.update_wine(&wine_id, changes)?;
                let status = db.duplicate_status(&wine.id)?;
                let dur = start.elapsed().as_millis();

                if json_output {
                    print_json(&serde_json::json!({
                        "status": "ok",
                        "data": { "wine": wine, "duplicates": status },
                        "meta": { "duration_ms": dur }
                    }))?;
                } else {
                    println!("Updated: {}", wine.label());
                    if status.is_possible_duplicate() {
                        println!("  still looks like another bottle in this event");
                    }
                }
            }

            WineAction::Delete { id, confirm } => {
                if !confirm {
                    eprintln!("Add --confirm to delete the wine and its ratings.");
                    std::process::exit(ExitCode::InvalidArgs as i32);
                }
                let db = open_db(&config)?;
                db.delete_wine(&parse_id(&id, "wine")?)?;
                let dur = start.elapsed().as_millis();

                if json_output {
                    print_json(&serde_json::json!({"status":"ok","data":{"deleted":id},"meta":{"duration_ms":dur}}))?;
                } else {
                    println!("Deleted wine: {id}");
                }
            }

            WineAction::Show { id } => {
                let db = open_db(&config)?;
                let wine_id = parse_id(&id, "wine")?;
                let wine = db.get_wine(&wine_id)?;
                let status = db.duplicate_status(&wine_id)?;
                let ratings = db.list_ratings(&wine_id)?;
                let dur = start.elapsed().as_millis();

                if json_output {
                    print_json(&serde_json::json!({
                        "status": "ok",
                        "data": { "wine": wine, "duplicates": status, "ratings": ratings },
                        "meta": { "duration_ms": dur }
                    }))?;
                } else {
                    println!("{} ({})", wine.label(), wine.id);
                    if let Some(price) = wine.price {
                        println!("  price: {price:.2}");
                    }
                    if let Some(notes) = &wine.notes {
                        println!("  notes: {notes}");
                    }
                    for flag in status.duplicate_flags.iter().chain(&status.flagged_as) {
                        let other_id = if flag.original_wine_id == wine.id {
                            flag.duplicate_wine_id
                        } else {
                            flag.original_wine_id
                        };
                        println!("  duplicate? {} [{}]", other_id, flag.confidence);
                    }
                    println!("  ratings: {}", ratings.len());
                }
            }

            WineAction::List { event } => {
                let db = open_db(&config)?;
                let wines = db.list_wines(&parse_id(&event, "event")?)?;
                let mut flagged = Vec::with_capacity(wines.len());
                for wine in &wines {
                    flagged.push(db.duplicate_status(&wine.id)?.is_possible_duplicate());
                }
                let dur = start.elapsed().as_millis();

                if json_output {
                    let items: Vec<_> = wines
                        .iter()
                        .zip(&flagged)
                        .map(|(wine, dup)| serde_json::json!({ "wine": wine, "possible_duplicate": dup }))
                        .collect();
                    print_json(&serde_json::json!({
                        "status": "ok",
                        "data": { "items": items, "total": wines.len() },
                        "meta": { "duration_ms": dur }
                    }))?;
                } else if wines.is_empty() {
                    println!("No wines yet. Use `tastevin wine add` to register one.");
                } else {
                    for (wine, dup) in wines.iter().zip(&flagged) {
                        println!("{}  {}{}", short(&wine.id), wine_line(wine), if *dup { "  [dup?]" } else { "" });
                    }
                }
            }

            WineAction::Recheck { id } => {
                let db = open_db(&config)?;
                let report = db.detect_duplicates(&parse_id(&id, "wine")?)?;
                let dur = start.elapsed().as_millis();

                if json_output {
                    print_json(&serde_json::json!({"status":"ok","data":report,"meta":{"duration_ms":dur}}))?;
                } else {
                    println!(
                        "Compared with {} other wines, {} flagged",
                        report.compared,
                        report.flags.len()
                    );
                }
            }
        },

        // ── Ratings ────────────────────────────────────────────────────────
        Commands::Rate { wine, score, taster, notes } => {
            let db = open_db(&config)?;
            let invitee = resolve_invitee(&db, &taster)?;
            let rating = db.submit_rating(&parse_id(&wine, "wine")?, &invitee.id, score, notes.as_deref())?;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({"status":"ok","data":rating,"meta":{"duration_ms":dur}}))?;
            } else {
                println!("{} scored {}", invitee.name, rating.score);
            }
        }

        Commands::Recap { event } => {
            let db = open_db(&config)?;
            let recap = db.event_recap(&parse_id(&event, "event")?)?;
            let dur = start.elapsed().as_millis();

            if json_output {
                print_json(&serde_json::json!({
                    "status": "ok",
                    "data": { "items": recap, "total": recap.len() },
                    "meta": { "duration_ms": dur }
                }))?;
            } else {
                for entry in &recap {
                    let average = entry
                        .average_score
                        .map(|avg| format!("{avg:>5.1}"))
                        .unwrap_or_else(|| "    -".to_string());
                    println!(
                        "{rank:>2}. {average}  ({count} votes)  {wine}  by {who}",
                        rank = entry.rank,
                        count = entry.rating_count,
                        wine = entry.wine.label(),
                        who = entry.contributor,
                    );
                }
            }
        }

        // ── Config ─────────────────────────────────────────────────────────
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let dur = start.elapsed().as_millis();
                if json_output {
                    print_json(&serde_json::json!({
                        "status": "ok",
                        "data": {
                            "config_path": AppConfig::config_path(),
                            "database_path": config.database_path(),
                            "config": config,
                        },
                        "meta": { "duration_ms": dur }
                    }))?;
                } else {
                    println!("# {}", AppConfig::config_path().display());
                    println!("# database: {}", config.database_path().display());
                    print!("{}", config.to_toml()?);
                }
            }
        },
    }

    tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, "command finished");
    Ok(())
}

// ─── Helpers ────────────────────────────────────────────────────────────────

fn init_tracing(config: &AppConfig) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter)),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_json(val: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(val)?);
    Ok(())
}

fn open_db(config: &AppConfig) -> Result<Database> {
    Ok(Database::with_config(config)?)
}

fn error_kind(code: ExitCode) -> &'static str {
    match code {
        ExitCode::NotFound => "not_found",
        ExitCode::InvalidArgs => "invalid_args",
        ExitCode::Conflict => "conflict",
        ExitCode::FileSystemError => "filesystem",
        ExitCode::Success | ExitCode::GeneralError => "error",
    }
}

fn parse_id(raw: &str, what: &str) -> Result<Uuid, TastevinError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| TastevinError::ValidationError(format!("invalid {what} id: {raw}")))
}

/// Accepts either an invitee UUID or a participation token.
fn resolve_invitee(db: &Database, raw: &str) -> Result<Invitee, TastevinError> {
    match Uuid::parse_str(raw.trim()) {
        Ok(id) => db.get_invitee(&id),
        Err(_) => db.invitee_by_token(raw),
    }
}

fn parse_slot(raw: &str) -> Result<NewTimeOption, TastevinError> {
    let invalid = || TastevinError::ValidationError(format!("invalid time slot `{raw}`, expected START/END"));
    let (start, end) = raw.split_once('/').ok_or_else(invalid)?;
    let parse = |s: &str| {
        DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| invalid())
    };
    Ok(NewTimeOption {
        start_time: parse(start)?,
        end_time: parse(end)?,
    })
}

fn parse_invitee(raw: &str) -> NewInvitee {
    match raw.split_once('=') {
        Some((name, email)) => NewInvitee {
            name: name.trim().to_string(),
            email: Some(email.trim().to_string()),
        },
        None => NewInvitee::new(raw.trim()),
    }
}

fn short(id: &Uuid) -> String {
    id.to_string()[..8].to_string()
}

fn wine_line(wine: &WineContribution) -> String {
    match wine.price {
        Some(price) => format!("{:<45}  {price:>7.2}", wine.label()),
        None => wine.label(),
    }
}
