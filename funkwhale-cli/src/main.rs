use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use funkwhale_api::types::{AlbumQuery, ArtistQuery, TrackQuery};
use funkwhale_api::{FunkwhaleClient, Session, SessionConfig, SessionState, storage};
use qrcode::QrCode;
use qrcode::render::unicode;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "funkwhale", version, about = "Funkwhale music server CLI")]
struct Cli {
    /// Config file (default: ~/.config/funkwhale/config.json)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Override the instance address from the config file
    #[arg(long, global = true, value_name = "URL")]
    domain: Option<String>,
    /// Print raw JSON instead of a summary
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Authorize this application (OAuth) or check the configured login
    Login {
        /// Authorization code obtained from the browser
        #[arg(long)]
        code: Option<String>,
        /// Only report the current login status
        #[arg(long)]
        check: bool,
    },
    /// Delete the stored OAuth token
    Logout,
    /// List artists
    Artists {
        #[command(flatten)]
        filter: Filter,
    },
    /// Show one artist
    Artist {
        id: u64,
        /// Re-fetch federated data first
        #[arg(long)]
        refresh: bool,
    },
    /// List albums
    Albums {
        #[command(flatten)]
        filter: Filter,
        /// Only albums by this artist ID
        #[arg(long)]
        artist: Option<u64>,
    },
    /// Show one album
    Album {
        id: u64,
        #[arg(long)]
        refresh: bool,
    },
    /// List tracks
    Tracks {
        #[command(flatten)]
        filter: Filter,
        #[arg(long)]
        artist: Option<u64>,
        #[arg(long)]
        album: Option<u64>,
        /// Only tracks favorited by you
        #[arg(long)]
        favorites: bool,
        /// License code, e.g. cc-by-4.0
        #[arg(long)]
        license: Option<String>,
    },
    /// Show one track
    Track {
        id: u64,
        #[arg(long)]
        refresh: bool,
    },
    /// List licenses
    Licenses {
        #[command(flatten)]
        page: PageArgs,
    },
    /// List your favorite tracks
    Favorites {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Add a track to your favorites
    Fav { track_id: u64 },
    /// Remove a track from your favorites
    Unfav { track_id: u64 },
    /// Download a track's audio by uuid
    Listen {
        uuid: String,
        /// Transcode on the server
        #[arg(long)]
        to: Option<Format>,
        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct Filter {
    /// Search query
    #[arg(short, long)]
    q: Option<String>,
    /// Sort field, prefix with - for descending
    #[arg(long, allow_hyphen_values = true)]
    ordering: Option<String>,
    /// Only playable items
    #[arg(long)]
    playable: bool,
    #[command(flatten)]
    page: PageArgs,
}

#[derive(Args)]
struct PageArgs {
    #[arg(long)]
    page: Option<u32>,
    #[arg(long)]
    page_size: Option<u32>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Ogg,
    Mp3,
}

impl Format {
    fn as_str(self) -> &'static str {
        match self {
            Self::Ogg => "ogg",
            Self::Mp3 => "mp3",
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref(), cli.domain)?;
    let json = cli.json;

    match cli.command {
        Command::Login { code, check } => cmd_login(&config, code, check),
        Command::Logout => cmd_logout(&config),
        Command::Artists { filter } => {
            let query = ArtistQuery {
                q: filter.q,
                ordering: filter.ordering,
                playable: filter.playable.then_some(true),
                page: filter.page.page,
                page_size: filter.page.page_size,
            };
            let body = connect(&config)?.artists(&query)?;
            print_list(&body, json, |a| format!("[{}] {}", a["id"], text(&a["name"])));
            Ok(())
        }
        Command::Artist { id, refresh } => {
            let body = connect(&config)?.artist(id, refresh)?;
            print_item(&body, json, |a| {
                format!("Artist: {} (id={})", text(&a["name"]), a["id"])
            });
            Ok(())
        }
        Command::Albums { filter, artist } => {
            let query = AlbumQuery {
                q: filter.q,
                artist,
                ordering: filter.ordering,
                playable: filter.playable.then_some(true),
                page: filter.page.page,
                page_size: filter.page.page_size,
            };
            let body = connect(&config)?.albums(&query)?;
            print_list(&body, json, album_line);
            Ok(())
        }
        Command::Album { id, refresh } => {
            let body = connect(&config)?.album(id, refresh)?;
            print_item(&body, json, album_line);
            Ok(())
        }
        Command::Tracks {
            filter,
            artist,
            album,
            favorites,
            license,
        } => {
            let query = TrackQuery {
                q: filter.q,
                artist,
                album,
                favorites: favorites.then_some(true),
                license,
                ordering: filter.ordering,
                playable: filter.playable.then_some(true),
                page: filter.page.page,
                page_size: filter.page.page_size,
            };
            let body = connect(&config)?.tracks(&query)?;
            print_list(&body, json, track_line);
            Ok(())
        }
        Command::Track { id, refresh } => {
            let body = connect(&config)?.track(id, refresh)?;
            print_item(&body, json, track_line);
            Ok(())
        }
        Command::Licenses { page } => {
            let body = connect(&config)?.licenses(page.page, page.page_size)?;
            print_list(&body, json, |l| format!("{}: {}", text(&l["code"]), text(&l["name"])));
            Ok(())
        }
        Command::Favorites { page } => {
            let body = connect(&config)?.favorite_tracks(page.page, page.page_size)?;
            print_list(&body, json, |f| track_line(&f["track"]));
            Ok(())
        }
        Command::Fav { track_id } => {
            connect(&config)?.add_favorite(track_id)?;
            println!("Track {track_id} added to favorites.");
            Ok(())
        }
        Command::Unfav { track_id } => {
            connect(&config)?.remove_favorite(track_id)?;
            println!("Track {track_id} removed from favorites.");
            Ok(())
        }
        Command::Listen { uuid, to, output } => cmd_listen(&config, &uuid, to, output),
    }
}

fn load_config(path: Option<&PathBuf>, domain: Option<String>) -> Result<SessionConfig> {
    let path = match path {
        Some(p) => p.clone(),
        None => SessionConfig::default_path()?,
    };
    let mut config = SessionConfig::load(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    if let Some(domain) = domain {
        config.domain = domain;
    }
    Ok(config)
}

fn connect(config: &SessionConfig) -> Result<FunkwhaleClient> {
    match FunkwhaleClient::new(config) {
        Ok(client) => Ok(client),
        Err(e) if e.is_invalid_token() => bail!("{e}\nRun `funkwhale login` first."),
        Err(e) => Err(e.into()),
    }
}

// ── login / logout ──

fn cmd_login(config: &SessionConfig, code: Option<String>, check: bool) -> Result<()> {
    let mut session = Session::new(config)?;

    if check {
        match session.state() {
            SessionState::BasicReady => println!(
                "Basic authentication as {}.",
                config.username.as_deref().unwrap_or_default()
            ),
            SessionState::OAuthReady => {
                println!("Authorized (token at {}).", token_path(&session));
            }
            _ => println!("Not authorized."),
        }
        return Ok(());
    }

    match session.state() {
        SessionState::BasicReady => {
            println!("Basic authentication configured, nothing to authorize.");
            return Ok(());
        }
        SessionState::OAuthReady if code.is_none() => {
            println!("Already authorized (token at {}).", token_path(&session));
            return Ok(());
        }
        _ => {}
    }

    if let Some(code) = code {
        session.establish_authorization_code(&code)?;
    } else {
        let url = session
            .authorization_url()
            .context("session has no authorization URL")?
            .to_owned();
        println!("To authorize this app go to:\n{url}\n");
        print_qr(&url);
        let answer = prompt("Enter response code (or the full redirect URL): ")?;
        if answer.starts_with("http://") || answer.starts_with("https://") {
            session.authorize_from_redirect(&answer)?;
        } else {
            session.establish_authorization_code(&answer)?;
        }
    }
    println!("Authorized. Token saved to {}.", token_path(&session));
    Ok(())
}

fn cmd_logout(config: &SessionConfig) -> Result<()> {
    if !config.is_oauth() {
        println!("Basic authentication has no stored token.");
        return Ok(());
    }
    let path = config.resolved_token_path()?;
    storage::remove(&path)?;
    println!("Token removed ({}).", path.display());
    Ok(())
}

fn token_path(session: &Session) -> String {
    session
        .token_path()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}

fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_owned())
}

fn print_qr(url: &str) {
    match QrCode::new(url.as_bytes()) {
        Ok(code) => {
            let image = code
                .render::<unicode::Dense1x2>()
                .dark_color(unicode::Dense1x2::Light)
                .light_color(unicode::Dense1x2::Dark)
                .build();
            println!("{image}\n");
        }
        Err(e) => eprintln!("warning: cannot render QR code: {e:?}"),
    }
}

// ── listen ──

fn cmd_listen(
    config: &SessionConfig,
    uuid: &str,
    to: Option<Format>,
    output: Option<PathBuf>,
) -> Result<()> {
    let to = to.map(Format::as_str);
    let dest = output
        .unwrap_or_else(|| PathBuf::from(format!("{uuid}.{}", to.unwrap_or("audio"))));
    let size = connect(config)?.download(uuid, to, &dest)?;
    println!("Downloaded {} ({} bytes)", dest.display(), size);
    Ok(())
}

// ── output ──

fn text(v: &Value) -> &str {
    v.as_str().unwrap_or("")
}

fn album_line(a: &Value) -> String {
    format!(
        "[{}] {} - {}",
        a["id"],
        text(&a["artist"]["name"]),
        text(&a["title"]),
    )
}

fn track_line(t: &Value) -> String {
    format!(
        "[{}] {} - {} ({}) uuid={}",
        t["id"],
        text(&t["artist"]["name"]),
        text(&t["title"]),
        text(&t["album"]["title"]),
        text(&t["uuid"]),
    )
}

fn print_list(body: &Value, json: bool, line: impl Fn(&Value) -> String) {
    if json {
        println!("{body:#}");
        return;
    }
    println!("Total: {}\n", body["count"]);
    for item in body["results"].as_array().into_iter().flatten() {
        println!("  {}", line(item));
    }
    if let Some(next) = body["next"].as_str() {
        println!("\nMore results: {next}");
    }
}

fn print_item(body: &Value, json: bool, line: impl Fn(&Value) -> String) {
    if json {
        println!("{body:#}");
    } else {
        println!("{}", line(body));
    }
}
