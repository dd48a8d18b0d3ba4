use avrlink::error::LinkResult;
use clap::{Parser, Subcommand, command};
use program::{FlashOptions, handle_flashing};
use session::{SessionOptions, handle_session};

mod connection;
mod program;
mod session;

#[derive(Parser, Debug, Clone)]
#[command(version, long_about = None)]
struct Cli {
    /// Maximum log level
    #[clap(long, global = true, default_value_t = tracing::Level::INFO)]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
enum Command {
    /// Flash an Intel-HEX firmware onto the peer board
    #[command(name = "flash", alias = "f")]
    Flash(FlashOptions),

    /// Exchange commands with the peer board, reading requests from stdin
    #[command(name = "session", alias = "s")]
    Session(SessionOptions),
}

fn main() -> LinkResult<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .init();

    match cli.command {
        Command::Flash(opts) => handle_flashing(opts)?,
        Command::Session(opts) => handle_session(opts)?,
    }

    Ok(())
}
