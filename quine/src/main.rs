//! The agent binary: configuration, stdin plumbing, and runtime assembly.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use quine::cli::Cli;
use quine::oplog;
use quine::orchestrator::Runtime;
use quine::prompt::StdinMode;
use quine::session::Session;
use quine::signal::{self, SignalFlags};
use quine_core::process::seek_stdin;
use quine_core::{ApiFlavor, Config, exit};
use quine_provider_anthropic::Anthropic;
use quine_provider_openai::OpenAi;

#[tokio::main]
async fn main() {
    std::process::exit(run().await);
}

async fn run() -> i32 {
    let cli = Cli::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("quine: {e}");
            return exit::USAGE;
        }
    };

    let mission = {
        let from_argv = cli.mission_string();
        if from_argv.is_empty() {
            config.mission.clone().unwrap_or_default()
        } else {
            from_argv
        }
    };
    if mission.is_empty() {
        eprintln!("quine: a mission is required: quine [-b] <mission words...>");
        return exit::USAGE;
    }

    let _ = std::fs::create_dir_all(&config.data_dir);
    oplog::init(&config.oplog_path(), &config.session_id);

    if config.depth >= config.max_depth {
        eprintln!(
            "quine: recursion depth {} has reached the limit {}",
            config.depth, config.max_depth
        );
        tracing::error!(depth = config.depth, max = config.max_depth, "depth exceeded at startup");
        return exit::DEPTH_EXCEEDED;
    }

    // A replacement process resumes the input stream where its
    // predecessor left it; only seekable stdins have a position.
    if config.stdin_offset > 0 {
        let _ = seek_stdin(config.stdin_offset);
    }

    let stdin_mode = if cli.buffer_stdin {
        match buffer_stdin(&config) {
            Ok((path, bytes)) => {
                config.stdin_offset += bytes;
                StdinMode::Buffered(path)
            }
            Err(e) => {
                eprintln!("quine: failed to buffer stdin: {e}");
                return exit::USAGE;
            }
        }
    } else if std::io::stdin().is_terminal() {
        StdinMode::Terminal
    } else {
        StdinMode::Piped
    };

    tracing::info!(
        model = %config.model,
        dialect = config.flavor.as_str(),
        depth = config.depth,
        max_turns = config.max_turns,
        data_dir = %config.data_dir.display(),
        "session starting"
    );

    let flavor = config.flavor;
    let api_key = config.api_key.clone();
    let api_base = config.api_base.clone();

    let session = Session::start(config, mission);
    let flags = Arc::new(SignalFlags::new());
    signal::spawn_controller(flags.clone(), session.clone());

    match flavor {
        ApiFlavor::Anthropic => {
            let mut provider = Anthropic::new(api_key);
            if let Some(base) = api_base {
                provider = provider.base_url(base);
            }
            Runtime::new(provider, session, flags).run(stdin_mode).await
        }
        ApiFlavor::OpenAi => {
            let mut provider = OpenAi::new(api_key);
            if let Some(base) = api_base {
                provider = provider.base_url(base);
            }
            Runtime::new(provider, session, flags).run(stdin_mode).await
        }
    }
}

/// Consume stdin fully into `<data-dir>/stdin-<session>.bin`.
fn buffer_stdin(config: &Config) -> std::io::Result<(PathBuf, u64)> {
    let path = config.stdin_capture_path();
    std::fs::create_dir_all(&config.data_dir)?;
    let mut file = std::fs::File::create(&path)?;
    let bytes = std::io::copy(&mut std::io::stdin().lock(), &mut file)?;
    file.sync_all()?;
    Ok((path, bytes))
}
