use std::{ffi::OsString, process::ExitCode};

use anyhow::Context;
use clap::{CommandFactory, Parser};
use sitepush::{
    loc,
    path::{FsPath, FsPathBuf, PathBuf},
    Config,
};
use sitepush_cli::{
    local, oauth2, provision::provision, storage::gdrive::GoogleDrive, storage::GetMetadata,
    sync::SyncEngine, PersistCache,
};

/// First arguments that only ask for usage
const HELP_ARGS: &[&str] = &["--help", "-help", "/?", "-h", "-?"];

#[derive(Parser)]
#[command(name = "sitepush")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Alternative config file
    #[arg(long)]
    config: Option<FsPathBuf>,

    /// Local folder to deploy
    source: FsPathBuf,

    /// Logical path of the remote folder.
    /// Defaults to the sync root joined with the name of the local folder.
    target: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<OsString> = std::env::args_os().collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(code) => return code,
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("Error: {err}");
            return ExitCode::from(2);
        }
    };

    match rt.block_on(run(cli)) {
        Ok(link) => {
            println!("{link}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            if cfg!(debug_assertions) {
                eprintln!("Error: {err:?}");
            } else {
                eprintln!("Error: {err:#}");
            }
            let code = err
                .downcast_ref::<sitepush::Error>()
                .map(sitepush::Error::exit_code)
                .unwrap_or(2);
            ExitCode::from(code)
        }
    }
}

fn is_help_arg(arg: &str) -> bool {
    HELP_ARGS.iter().any(|h| h.eq_ignore_ascii_case(arg))
}

fn parse_args(args: &[OsString]) -> Result<Cli, ExitCode> {
    if let Some(first) = args.get(1) {
        if is_help_arg(&first.to_string_lossy()) {
            eprintln!("{}", Cli::command().render_help());
            return Err(ExitCode::from(1));
        }
    }
    Cli::try_parse_from(args).map_err(|err| {
        let _ = err.print();
        match err.kind() {
            clap::error::ErrorKind::DisplayVersion => ExitCode::SUCCESS,
            _ => ExitCode::from(1),
        }
    })
}

async fn run(cli: Cli) -> anyhow::Result<String> {
    let config = match &cli.config {
        Some(path) => Config::load_from_file(path).await?,
        None => Config::load_user().await?,
    };
    log::trace!("Loaded config: {config:?}");

    let source = if cli.source.is_absolute() {
        cli.source.clone()
    } else {
        FsPathBuf::try_from(std::env::current_dir()?)?.join(&cli.source)
    };
    let real_source = local::real_dir(&source).await?;
    let target = match cli.target {
        Some(target) => target,
        None => config.default_target(named_dir(&source, &real_source))?,
    };
    let source = real_source;

    let secret_path = match &config.client_secret {
        Some(path) => path.clone(),
        None => loc::find_secret()?,
    };
    log::info!("Using client secret {secret_path}");
    let secret = sitepush::oauth::load_google_secret(&secret_path)
        .await
        .with_context(|| format!("Could not load client secret from {secret_path}"))?;

    let http = reqwest::Client::builder().build()?;
    let token_cache = config.token_cache_file()?;
    let auth = oauth2::Client::new(secret, token_cache, Some(http.clone())).await?;

    let res = deploy(auth.clone(), http, &source, &target).await;
    if let Err(err) = auth.persist_cache().await {
        log::warn!("Could not save the token cache: {err:#}");
    }
    res
}

/// The folder whose name makes the default target: the path as given,
/// unless it ends with `..`, so that a symlinked folder keeps the link name
fn named_dir<'a>(given: &'a FsPath, real: &'a FsPath) -> &'a FsPath {
    if given.file_name().is_some() {
        given
    } else {
        real
    }
}

async fn deploy(
    auth: oauth2::Client,
    http: reqwest::Client,
    source: &FsPath,
    target: &sitepush::path::Path,
) -> anyhow::Result<String> {
    log::info!("Deploying {source} to {target}");

    let drive = GoogleDrive::new(auth, http).await?;
    let folder_id = provision(&drive, target).await?;

    let report = |step: &sitepush_cli::sync::Step| eprintln!("{step}");
    let summary = SyncEngine::new(&drive)
        .with_reporter(&report)
        .sync_folder(source, &folder_id, target)
        .await?;
    log::info!("{summary}");

    let folder = drive.get_metadata(&folder_id).await?;
    Ok(folder
        .web_link
        .unwrap_or_else(|| format!("https://drive.google.com/drive/folders/{folder_id}")))
}
