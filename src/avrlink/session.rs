use std::cell::Cell;
use std::io::BufRead;
use std::rc::Rc;
use std::sync::mpsc;
use std::time::Duration;

use avrlink::{ClientId, error::LinkResult};
use clap::Parser;
use tracing::{info, warn};

use crate::connection::{ConnectionOptions, open_link};

const LOCAL_CLIENT: ClientId = ClientId(0);

/// Read errors in a row after which the port is considered gone
const MAX_POLL_FAILURES: u32 = 100;

#[derive(Parser, Debug, Clone)]
pub(crate) struct SessionOptions {
    #[clap(flatten)]
    connection: ConnectionOptions,
}

pub(crate) fn handle_session(opts: SessionOptions) -> LinkResult<()> {
    let mut link = open_link(&opts.connection)?;

    let reset_requested = Rc::new(Cell::new(false));
    let flag = Rc::clone(&reset_requested);
    link.on_reset_request(move || flag.set(true));

    // Stdin reader thread
    let (requests, source) = mpsc::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if requests.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Error reading stdin: {:?}", e);
                    break;
                }
            }
        }
        info!("Stdin closed.");
    });

    let mut poll_failures = 0;
    loop {
        match link.poll() {
            Ok(()) => poll_failures = 0,
            Err(e) => {
                poll_failures += 1;
                if poll_failures >= MAX_POLL_FAILURES {
                    return Err(e);
                }
            }
        }

        match source.try_recv() {
            Ok(line) if line.trim() == "quit" => break,
            Ok(line) if line.trim().is_empty() => {}
            Ok(line) => link.handle_request(LOCAL_CLIENT, &line),
            Err(mpsc::TryRecvError::Empty) => {}
            Err(mpsc::TryRecvError::Disconnected) => break,
        }

        if reset_requested.get() {
            warn!("Peer requested a supervisor reset, ending session");
            break;
        }

        std::thread::sleep(Duration::from_millis(1));
    }

    Ok(())
}
