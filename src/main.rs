//! Headless host for the gallery core: discovers assets, waits for every
//! requested kind to settle, then prints the final layouts as JSON.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, ValueEnum};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use masonry_gallery::asset::MediaKind;
use masonry_gallery::config::Configuration;
use masonry_gallery::events::{GalleryEvent, HostCommand};
use masonry_gallery::gallery::Item;
use masonry_gallery::probe::{AssetProbe, FsProbe, HttpProbe};
use masonry_gallery::processing::layout::MasonryLayout;
use masonry_gallery::tasks::controller::GalleryController;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Photos,
    Videos,
}

impl From<KindArg> for MediaKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Photos => MediaKind::Photos,
            KindArg::Videos => MediaKind::Videos,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "gallery-layout",
    version,
    about = "Discover numbered photos/videos and print their masonry layout"
)]
struct Cli {
    /// Path to YAML config file; built-in defaults are used when omitted
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Container width in pixels
    #[arg(long, value_name = "PX", default_value_t = 900.0)]
    width: f32,

    /// Media kinds to lay out (repeatable); defaults to photos
    #[arg(long = "kind", value_enum, value_name = "KIND")]
    kinds: Vec<KindArg>,

    /// Override the photo base directory or URL
    #[arg(long, value_name = "DIR|URL")]
    photos_base: Option<String>,

    /// Override the video base directory or URL
    #[arg(long, value_name = "DIR|URL")]
    videos_base: Option<String>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Serialize)]
struct KindReport {
    layout: Option<MasonryLayout>,
    items: Vec<Item>,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(format!("masonry_gallery={level}").parse()?)
        .add_directive(format!("gallery_layout={level}").parse()?);
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .init();
    Ok(())
}

fn pick_probe(cfg: &Configuration, kinds: &BTreeSet<MediaKind>) -> Result<Arc<dyn AssetProbe>> {
    let remote: BTreeSet<bool> = kinds
        .iter()
        .map(|kind| cfg.source(*kind).pattern.is_remote())
        .collect();
    if remote.len() > 1 {
        bail!("mixing local and remote bases in one run is not supported");
    }
    if remote.contains(&true) {
        let probe = HttpProbe::new(cfg.resolution.probe_timeout)
            .context("failed to create http probe")?;
        Ok(Arc::new(probe))
    } else {
        Ok(Arc::new(FsProbe))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let mut cfg = match &cli.config {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Configuration::default(),
    };
    if let Some(base) = cli.photos_base.clone() {
        cfg.source_mut(MediaKind::Photos).pattern.base = base;
    }
    if let Some(base) = cli.videos_base.clone() {
        cfg.source_mut(MediaKind::Videos).pattern.base = base;
    }
    let cfg = cfg.validated().context("invalid configuration values")?;
    debug!("configuration: {cfg:#?}");

    let kinds: BTreeSet<MediaKind> = if cli.kinds.is_empty() {
        BTreeSet::from([MediaKind::Photos])
    } else {
        cli.kinds.iter().copied().map(MediaKind::from).collect()
    };
    let probe = pick_probe(&cfg, &kinds)?;

    let (cmd_tx, cmd_rx) = mpsc::channel::<HostCommand>(16);
    let (event_tx, mut event_rx) = mpsc::channel::<GalleryEvent>(256);
    let cancel = CancellationToken::new();

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("ctrl-c handler failed: {err}");
                return;
            }
            info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let controller_task = tokio::spawn({
        let mut controller = GalleryController::new(cfg, probe, cli.width, event_tx);
        let cancel = cancel.clone();
        async move {
            controller
                .run(cmd_rx, cancel)
                .await
                .context("gallery controller failed")?;
            Ok::<_, anyhow::Error>(controller)
        }
    });

    let started = Instant::now();
    for kind in &kinds {
        cmd_tx
            .send(HostCommand::Activate(*kind))
            .await
            .context("gallery controller stopped early")?;
    }

    let mut layouts: BTreeMap<MediaKind, MasonryLayout> = BTreeMap::new();
    let mut done: BTreeSet<MediaKind> = BTreeSet::new();
    while done.len() < kinds.len() {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = event_rx.recv() => event,
        };
        let Some(event) = event else { break };
        match event {
            GalleryEvent::PlaceholderCreated(item) => {
                debug!(kind = %item.asset.kind, index = item.index(), "placeholder");
            }
            GalleryEvent::ItemResolved(item) => {
                debug!(
                    kind = %item.asset.kind,
                    index = item.index(),
                    ratio = item.aspect_ratio,
                    "resolved"
                );
            }
            GalleryEvent::LayoutComputed { kind, layout } => {
                layouts.insert(kind, layout);
            }
            GalleryEvent::Progress { kind, settled, total } => {
                info!(%kind, settled, total, "progress");
            }
            GalleryEvent::AllSettled { kind } => {
                done.insert(kind);
            }
            GalleryEvent::DiscoveryEmpty { kind, pattern } => {
                warn!(%kind, %pattern, "no assets found");
                done.insert(kind);
            }
            GalleryEvent::VisibilityChanged { .. } => {}
        }
    }
    info!(
        elapsed = %humantime::format_duration(started.elapsed()),
        "gallery settled"
    );

    cancel.cancel();
    let controller = controller_task
        .await
        .context("gallery controller panicked")??;

    let report: BTreeMap<MediaKind, KindReport> = kinds
        .iter()
        .map(|kind| {
            let items = controller
                .gallery(*kind)
                .map(|g| g.set().items().cloned().collect())
                .unwrap_or_default();
            (
                *kind,
                KindReport {
                    layout: layouts.remove(kind),
                    items,
                },
            )
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
