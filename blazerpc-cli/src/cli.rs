use clap::{Parser, Subcommand};

/// blazerpc: a lightweight gRPC inference-serving framework.
#[derive(Parser)]
#[command(name = "blazerpc", about = "Adaptive-batching gRPC inference server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the gRPC server for an application object.
    Serve {
        /// `module:attribute` string identifying the application object.
        app_ref: String,

        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        #[arg(long, default_value_t = 50051)]
        port: u16,

        /// Size of the blocking-thread pool backing synchronous handlers.
        #[arg(long, default_value_t = 4)]
        workers: usize,

        /// Accepted for CLI parity; hot-reload is an external front-end
        /// concern and is not implemented by this binary.
        #[arg(long)]
        reload: bool,
    },

    /// Write `blaze_service.proto` for an application object.
    Proto {
        /// `module:attribute` string identifying the application object.
        app_ref: String,

        #[arg(long = "output-dir", default_value = ".")]
        output_dir: String,
    },
}
