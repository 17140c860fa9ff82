use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use futures::stream::{self, StreamExt};
use tokio::io::AsyncWriteExt;

use progfetch_core::fetcher::{DataFetcher, ProgressFetchModule};
use progfetch_core::progress::{format_bytes, ProgressListener, ProgressRegistry};
use progfetch_core::{FetchConfig, FetchError, FetchRequest};

mod terminal_listener;
use terminal_listener::{JsonProgressListener, TerminalProgressListener};

#[derive(Parser)]
#[command(name = "progfetch", about = "Fetch URLs with throttled progress reporting")]
struct Args {
    /// URLs to fetch
    #[arg(required = true)]
    urls: Vec<String>,

    /// Directory the fetched files are written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Minimum progress step, in percent, between two notifications
    #[arg(short, long, default_value_t = 5.0)]
    granularity: f64,

    /// Extra request header, as "Name: value"; may be repeated
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Print progress as JSON lines instead of progress bars
    #[arg(long)]
    json: bool,

    /// Number of URLs fetched at the same time
    #[arg(short, long, default_value_t = 4)]
    concurrency: usize,
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected \"Name: value\", got {:?}", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty header name in {:?}", raw));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    let (registry, delivery) = ProgressRegistry::with_queue();
    let delivery_handle = tokio::spawn(delivery.run());

    let module = match ProgressFetchModule::new(&FetchConfig::from_env(), registry) {
        Ok(module) => module,
        Err(e) => {
            eprintln!("progfetch: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = tokio::fs::create_dir_all(&args.output_dir).await {
        eprintln!("progfetch: cannot create {}: {}", args.output_dir.display(), e);
        std::process::exit(1);
    }

    let listener: Arc<dyn ProgressListener> = if args.json {
        Arc::new(JsonProgressListener::new(args.granularity))
    } else {
        Arc::new(TerminalProgressListener::new(args.granularity))
    };

    let start = Instant::now();
    let results: Vec<(String, Result<(PathBuf, u64), FetchError>)> = stream::iter(args.urls.iter().cloned())
        .map(|url| {
            let request = args
                .headers
                .iter()
                .fold(FetchRequest::new(url.clone()), |request, (name, value)| {
                    request.add_header(name.clone(), value.clone())
                });
            let module = &module;
            let listener = &listener;
            let output_dir = args.output_dir.as_path();
            async move { (url, fetch_one(module, request, listener, output_dir).await) }
        })
        .buffer_unordered(args.concurrency.max(1))
        .collect()
        .await;

    // The loop ends once the registry, and with it the last queue handle, is gone.
    drop(module);
    if let Err(e) = delivery_handle.await {
        log::error!("[progfetch] delivery loop failed: {}", e);
    }

    let mut failed = 0;
    for (url, result) in &results {
        match result {
            Ok((path, bytes)) => {
                if !args.json {
                    println!("{} -> {} ({})", url, path.display(), format_bytes(*bytes));
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("{}: {}", url, e);
            }
        }
    }
    if !args.json {
        println!(
            "{} of {} fetched in {:.2}s",
            results.len() - failed,
            results.len(),
            start.elapsed().as_secs_f64()
        );
    }
    if failed > 0 {
        std::process::exit(1);
    }
}

/// Registers `listener` for the request, fetches it into `output_dir` and
/// unregisters the listener again if the fetch fails before completing.
async fn fetch_one(
    module: &ProgressFetchModule,
    request: FetchRequest,
    listener: &Arc<dyn ProgressListener>,
    output_dir: &Path,
) -> Result<(PathBuf, u64), FetchError> {
    if !module.handles(&request) {
        return Err(FetchError::InvalidUrl(request.url));
    }
    let key = request.key()?;
    module.expect(key.clone(), listener);

    let result = save_to_dir(module, request, output_dir).await;
    if result.is_err() {
        module.forget(&key);
    }
    result
}

async fn save_to_dir(
    module: &ProgressFetchModule,
    request: FetchRequest,
    output_dir: &Path,
) -> Result<(PathBuf, u64), FetchError> {
    let fetched = module.fetcher_for(request).load_data().await?;
    let path = output_dir.join(fetched.file_name());

    let mut file = tokio::fs::File::create(&path).await?;
    let mut reader = fetched.into_async_read();
    let written = tokio::io::copy(&mut reader, &mut file).await?;
    file.flush().await?;

    log::info!("[progfetch] wrote {} bytes to {}", written, path.display());
    Ok((path, written))
}
