//! parley - 対話 I/O ブリッジの CLI
//!
//! - `parley serve`: stdin/stdout を改行区切り JSON の link として worker を動かす
//! - `parley demo`: 同一プロセス内の host を立てて `run_program` を端末で対話実行する
//!
//! ログは stderr（env_logger）。stdout は serve では frame 専用。

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

use parley_core::domain::{Envelope, InvocationId, Stream};
use parley_core::impls::{StdioTransport, channel_pair};
use parley_core::sample::RunProgram;
use parley_core::{Worker, WorkerBuilder, WorkerConfig};

#[derive(Parser)]
#[command(name = "parley", about = "Interactive I/O bridge between a host and a worker")]
struct Cli {
    /// JSON worker config; missing fields take their defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve newline-delimited JSON envelopes on stdin/stdout
    Serve {
        #[arg(long)]
        max_live_tasks: Option<usize>,

        /// Do not announce exports with a `ready` envelope
        #[arg(long)]
        no_ready: bool,
    },
    /// Run an export against this terminal
    Demo {
        #[arg(long, default_value = "run_program")]
        function: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let env = env_logger::Env::default().default_filter_or(cli.log_level.as_str());
    env_logger::Builder::from_env(env).init();

    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            WorkerConfig::from_json(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => WorkerConfig::default(),
    };

    match cli.command {
        Command::Serve {
            max_live_tasks,
            no_ready,
        } => {
            if max_live_tasks.is_some() {
                config.max_live_tasks = max_live_tasks;
            }
            if no_ready {
                config.announce_ready = false;
            }
            serve(config).await
        }
        Command::Demo { function } => demo(config, function).await,
    }
}

fn build_worker(config: WorkerConfig) -> Result<Worker> {
    let worker = WorkerBuilder::new()
        .export(RunProgram)?
        .expect_exports(&["run_program"])
        .config(config)
        .build()?;
    Ok(worker)
}

async fn serve(config: WorkerConfig) -> Result<()> {
    let mut worker = build_worker(config)?;
    let mut transport = StdioTransport::stdio(worker.config().max_frame_bytes);
    worker.run(&mut transport).await?;
    info!("final status: {:?}", worker.status());
    Ok(())
}

async fn demo(config: WorkerConfig, function: String) -> Result<()> {
    let mut worker = build_worker(config)?;
    let (mut transport, mut host) = channel_pair();

    let terminal = async move {
        host.send(&Envelope::invoke(InvocationId::new(1), function))?;
        let mut stdin = BufReader::new(tokio::io::stdin()).lines();

        while let Some(envelope) = host.recv().await? {
            match envelope {
                Envelope::Ready { exports } => info!("worker ready: {exports:?}"),
                Envelope::Notify {
                    stream: Stream::Stdout,
                    text,
                } => println!("{text}"),
                Envelope::Notify {
                    stream: Stream::Stderr,
                    text,
                } => eprintln!("{text}"),
                Envelope::Request {
                    correlation_id,
                    prompt,
                } => {
                    print!("{prompt}");
                    std::io::stdout().flush()?;
                    let reply = match stdin.next_line().await? {
                        Some(line) => Envelope::reply(correlation_id, line),
                        None => Envelope::reply_error(correlation_id, "stdin closed"),
                    };
                    host.send(&reply)?;
                }
                Envelope::Result { value, .. } => {
                    if !value.is_null() {
                        println!("=> {value}");
                    }
                    break;
                }
                Envelope::Error {
                    invocation_id,
                    code,
                    description,
                    ..
                } => {
                    eprintln!("error [{code}]: {description}");
                    if invocation_id.is_some() {
                        break;
                    }
                }
                other => warn!("unexpected {} envelope from worker", other.kind()),
            }
        }

        host.send(&Envelope::Shutdown)?;
        Ok::<_, anyhow::Error>(())
    };

    let (served, hosted) = tokio::join!(worker.run(&mut transport), terminal);
    served?;
    hosted?;
    info!("final status: {:?}", worker.status());
    Ok(())
}
