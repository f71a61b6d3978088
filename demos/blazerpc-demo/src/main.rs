//! Run the demo app directly, without going through `blazerpc-cli`:
//!
//!     cargo run -p blazerpc-demo -- --host 0.0.0.0 --port 50051

use std::process::ExitCode;

#[derive(Default)]
struct Args {
    host: String,
    port: u16,
}

fn parse_args() -> Args {
    let mut args = Args {
        host: "0.0.0.0".to_string(),
        port: 50051,
    };
    let mut raw = std::env::args().skip(1);
    while let Some(flag) = raw.next() {
        match flag.as_str() {
            "--host" => {
                if let Some(value) = raw.next() {
                    args.host = value;
                }
            }
            "--port" => {
                if let Some(value) = raw.next() {
                    if let Ok(port) = value.parse() {
                        args.port = port;
                    }
                }
            }
            _ => {}
        }
    }
    args
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = parse_args();
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start the async runtime: {err}");
            return ExitCode::from(2);
        }
    };

    match runtime.block_on(blazerpc_demo::app().serve(&args.host, args.port)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("server error: {err}");
            ExitCode::from(2)
        }
    }
}
