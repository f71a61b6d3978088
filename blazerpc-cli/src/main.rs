mod cli;
mod loader;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Command};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve { app_ref, host, port, workers, reload } => run_serve(&app_ref, &host, port, workers, reload),
        Command::Proto { app_ref, output_dir } => run_proto(&app_ref, &output_dir),
    }
}

fn run_serve(app_ref: &str, host: &str, port: u16, workers: usize, reload: bool) -> ExitCode {
    if reload {
        tracing::warn!("--reload is a no-op; hot-reload is handled by an external front-end, not this binary");
    }

    let app = match loader::load_app(app_ref) {
        Ok(app) => app,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .max_blocking_threads(workers.max(1))
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start the async runtime: {err}");
            return ExitCode::from(2);
        }
    };

    match runtime.block_on(app.serve(host, port)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("server error: {err}");
            ExitCode::from(2)
        }
    }
}

fn run_proto(app_ref: &str, output_dir: &str) -> ExitCode {
    let app = match loader::load_app(app_ref) {
        Ok(app) => app,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(1);
        }
    };

    let proto = app.generate_proto();
    let path = Path::new(output_dir).join("blaze_service.proto");
    if let Err(err) = std::fs::create_dir_all(output_dir).and_then(|_| std::fs::write(&path, proto)) {
        eprintln!("failed to write {}: {err}", path.display());
        return ExitCode::from(2);
    }

    println!("wrote {}", path.display());
    ExitCode::SUCCESS
}
