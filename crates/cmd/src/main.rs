// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::{Args, Parser, Subcommand, ValueEnum};
use lineq_app::{AppConfig, cancel_on_shutdown_signal, worker};
use lineq_client::{ClientConfig, QueueClient};
use lineq_common_storage_queue::QueueRegistry;
use lineq_common_telemetry::{LogFormat, LoggingOptions, init_global_logging, set_panic_hook};
use lineq_sync::{PrefixedQueueName, ProducerMode, QueueNameBuilder};
use snafu::{OptionExt, ResultExt, Whatever};
use tokio_util::sync::CancellationToken;

mod build_info;

#[derive(Debug, Parser)]
#[clap(
name = "lineq",
about = "Move files line by line through named queues",
author = build_info::AUTHOR,
version = build_info::FULL_VERSION,
long_version = build_info::LONG_VERSION)]
struct Cli {
    /// TOML config file; flags given on the command line win over it
    #[arg(long, short, global = true, env = "LINEQ_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    logging: LoggingArgs,

    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Clone, Args)]
struct LoggingArgs {
    /// Log filter, e.g. `info` or `info,lineq_sync=debug`
    #[arg(long, global = true, env = "LINEQ_LOG_LEVEL")]
    log_level: Option<String>,

    /// Also write hourly rolling log files here
    #[arg(long, global = true, env = "LINEQ_LOG_DIR")]
    log_dir: Option<String>,

    /// Emit JSON log lines
    #[arg(long, global = true)]
    log_json: bool,
}

impl LoggingArgs {
    fn apply(&self, options: &mut LoggingOptions) {
        if let Some(level) = &self.log_level {
            options.level = Some(level.clone());
        }
        if let Some(dir) = &self.log_dir {
            options.dir.clone_from(dir);
        }
        if self.log_json {
            options.log_format = LogFormat::Json;
        }
    }
}

#[derive(Debug, Clone, Args)]
struct QueueArgs {
    /// Base URL of the queue service
    #[arg(long, env = "LINEQ_QUEUE_URL")]
    queue_url: Option<String>,

    /// Per-request timeout, e.g. `30s`
    #[arg(long, value_parser = humantime::parse_duration)]
    request_timeout: Option<Duration>,
}

impl QueueArgs {
    fn client_config(&self, base: &ClientConfig) -> ClientConfig {
        let mut config = base.clone();
        if let Some(url) = &self.queue_url {
            config.queue_url.clone_from(url);
        }
        if let Some(timeout) = self.request_timeout {
            config.request_timeout = timeout;
        }
        config
    }

    fn client(&self, base: &ClientConfig, queue: &str) -> Result<QueueClient, Whatever> {
        QueueClient::http(&self.client_config(base), queue)
            .whatever_context("Failed to build queue client")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Read the file once, including a final line without `\n`
    Whole,
    /// Follow appends until interrupted
    Stream,
}

impl From<Mode> for ProducerMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Whole => Self::WholeFile,
            Mode::Stream => Self::Streaming,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    Serve(ServeArgs),
    Produce(ProduceArgs),
    Drain(DrainArgs),
    Pipe(PipeArgs),
    Watch(WatchArgs),
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Starts the queue service.
Examples:

lineq serve --bind 0.0.0.0:8080

")]
struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "LINEQ_BIND")]
    bind: Option<String>,

    /// Largest accepted message in bytes
    #[arg(long)]
    max_body_size: Option<usize>,

    /// Disable permissive CORS headers
    #[arg(long)]
    no_cors: bool,
}

impl ServeArgs {
    async fn run(&self, mut config: AppConfig) -> Result<(), Whatever> {
        if let Some(bind) = &self.bind {
            config.http.bind_address.clone_from(bind);
        }
        if let Some(size) = self.max_body_size {
            config.http.max_body_size = size;
        }
        if self.no_cors {
            config.http.enable_cors = false;
        }
        config.open().run().await
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Enqueues the lines of a file.
Examples:

lineq produce access.log --queue lines-access.log
lineq produce app.log --queue app --mode stream

")]
struct ProduceArgs {
    file: PathBuf,

    /// Target queue
    #[arg(long, short)]
    queue: String,

    #[arg(long, value_enum, default_value_t = Mode::Whole)]
    mode: Mode,

    /// Sleep between polls in stream mode
    #[arg(long, value_parser = humantime::parse_duration)]
    poll_interval: Option<Duration>,

    #[command(flatten)]
    queue_args: QueueArgs,
}

impl ProduceArgs {
    async fn run(&self, config: AppConfig) -> Result<(), Whatever> {
        let client = self.queue_args.client(&config.client, &self.queue)?;
        let mut tail = config.watch.pipeline.tail;
        if let Some(interval) = self.poll_interval {
            tail.poll_interval = interval;
        }
        let cancel = shutdown_token();
        worker::produce(&self.file, &client, self.mode.into(), &tail, &cancel).await
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Writes the messages of a queue to a file or stdout.
Examples:

lineq drain --queue lines-access.log --output access.log
lineq drain --queue app --follow

")]
struct DrainArgs {
    /// Source queue
    #[arg(long, short)]
    queue: String,

    /// Output file; stdout when omitted
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Keep consuming after the queue runs empty, until interrupted
    #[arg(long)]
    follow: bool,

    /// Sleep after an empty dequeue
    #[arg(long, value_parser = humantime::parse_duration)]
    idle_interval: Option<Duration>,

    #[command(flatten)]
    queue_args: QueueArgs,
}

impl DrainArgs {
    async fn run(&self, config: AppConfig) -> Result<(), Whatever> {
        let client = self.queue_args.client(&config.client, &self.queue)?;
        let mut drain = config.watch.pipeline.drain;
        if let Some(interval) = self.idle_interval {
            drain.idle_interval = interval;
        }
        let target = self
            .output
            .clone()
            .map_or(worker::DrainTarget::Stdout, worker::DrainTarget::File);
        let cancel = shutdown_token();
        worker::drain(&client, &target, self.follow, &drain, &cancel).await
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Moves one file through a queue into an output file.
Examples:

lineq pipe report.csv out/report.csv
lineq pipe report.csv out/report.csv --local

")]
struct PipeArgs {
    file: PathBuf,

    output: PathBuf,

    /// Queue to use; defaults to `<base queue name>-<file name>`
    #[arg(long, short)]
    queue: Option<String>,

    #[arg(long, value_enum, default_value_t = Mode::Whole)]
    mode: Mode,

    /// Use an in-process queue instead of the queue service
    #[arg(long)]
    local: bool,

    #[command(flatten)]
    queue_args: QueueArgs,
}

impl PipeArgs {
    async fn run(&self, config: AppConfig) -> Result<(), Whatever> {
        let queue = match &self.queue {
            Some(queue) => queue.clone(),
            None => {
                let file_name = self
                    .file
                    .file_name()
                    .whatever_context("Input path has no file name")?;
                PrefixedQueueName::new(config.watch.base_queue_name.clone())
                    .queue_name(&file_name.to_string_lossy())
            }
        };
        let client = if self.local {
            QueueClient::local(Arc::new(QueueRegistry::new()), queue)
        } else {
            self.queue_args.client(&config.client, &queue)?
        };
        let mut pipeline = config.watch.pipeline;
        pipeline.mode = self.mode.into();
        let cancel = shutdown_token();
        worker::pipe(self.file.clone(), self.output.clone(), &client, &pipeline, &cancel).await
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Watches a directory and syncs every file once it stops growing.
Examples:

lineq watch --dir data/in --out-dir data/out
lineq watch --config lineq.toml --poll-interval 1s

")]
struct WatchArgs {
    #[arg(long)]
    dir: Option<PathBuf>,

    #[arg(long)]
    out_dir: Option<PathBuf>,

    #[arg(long, value_parser = humantime::parse_duration)]
    poll_interval: Option<Duration>,

    /// Equal-size scans needed before a file is processed
    #[arg(long)]
    stability_threshold: Option<u32>,

    /// Queue name prefix
    #[arg(long)]
    base_queue_name: Option<String>,

    /// Pipeline runs allowed per file
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Copy files that failed every attempt here
    #[arg(long)]
    dead_letter_dir: Option<PathBuf>,

    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Use an in-process queue instead of the queue service
    #[arg(long)]
    local: bool,

    #[command(flatten)]
    queue_args: QueueArgs,
}

impl WatchArgs {
    async fn run(&self, config: AppConfig) -> Result<(), Whatever> {
        let mut watch = config.watch;
        if let Some(dir) = &self.dir {
            watch.dir.clone_from(dir);
        }
        if let Some(out_dir) = &self.out_dir {
            watch.out_dir.clone_from(out_dir);
        }
        if let Some(interval) = self.poll_interval {
            watch.poll_interval = interval;
        }
        if let Some(threshold) = self.stability_threshold {
            watch.stability_threshold = threshold;
        }
        if let Some(base) = &self.base_queue_name {
            watch.base_queue_name.clone_from(base);
        }
        if let Some(attempts) = self.max_attempts {
            watch.failure_policy.max_attempts = attempts;
        }
        if let Some(dir) = &self.dead_letter_dir {
            watch.failure_policy.dead_letter_dir = Some(dir.clone());
        }
        if let Some(mode) = self.mode {
            watch.pipeline.mode = mode.into();
        }

        let client = if self.local {
            QueueClient::local(Arc::new(QueueRegistry::new()), watch.base_queue_name.clone())
        } else {
            self.queue_args.client(&config.client, &watch.base_queue_name)?
        };
        let cancel = shutdown_token();
        worker::watch(watch, client, cancel).await
    }
}

fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    cancel_on_shutdown_signal(&token);
    token
}

impl Commands {
    async fn run(&self, config: AppConfig) -> Result<(), Whatever> {
        match self {
            Self::Serve(args) => args.run(config).await,
            Self::Produce(args) => args.run(config).await,
            Self::Drain(args) => args.run(config).await,
            Self::Pipe(args) => args.run(config).await,
            Self::Watch(args) => args.run(config).await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Whatever> {
    human_panic::setup_panic!();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_toml_file(path)?,
        None => AppConfig::default(),
    };
    cli.logging.apply(&mut config.logging);
    let _guards = init_global_logging("lineq", &config.logging);
    set_panic_hook();
    tracing::debug!(version = build_info::FULL_VERSION, ?config, "configuration loaded");

    cli.commands.run(config).await
}
