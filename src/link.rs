//! Cooperative driver tying the serial channel, line framing, command
//! queue and flashing together.

use std::fs::File;
use std::io::BufReader;

use indicatif::ProgressBar;
use tracing::{debug, error, info, warn};

use crate::constants::HANDSHAKE_DELAY_MS;
use crate::error::{LinkError, LinkResult};
use crate::flash::flash_firmware;
use crate::interface::{Clock, ResetLine, SerialChannel};
use crate::line::LineReceiver;
use crate::log_buffer::PeerLog;
use crate::peer::request::ClientRequest;
use crate::peer::{ClientId, PeerCommand, PeerContext, PeerRequest, PeerState, ReplySink, protocol};
use crate::scheduler::{Command, CommandScheduler};
use crate::util::create_progress_bar;

pub struct PeerLink<S, R, C, P> {
    serial: S,
    reset: R,
    clock: C,
    replies: P,
    receiver: LineReceiver,
    scheduler: CommandScheduler<PeerCommand>,
    state: PeerState,
    log: PeerLog,
    bootloader_baud: u32,
    handshake_after_flash: bool,
    progress_bar_enable: bool,
}

impl<S, R, C, P> PeerLink<S, R, C, P>
where
    S: SerialChannel,
    R: ResetLine,
    C: Clock,
    P: ReplySink,
{
    pub fn new(serial: S, reset: R, clock: C, replies: P, bootloader_baud: u32) -> Self {
        PeerLink {
            serial,
            reset,
            clock,
            replies,
            receiver: LineReceiver::new(),
            scheduler: CommandScheduler::new(),
            state: PeerState::default(),
            log: PeerLog::default(),
            bootloader_baud,
            handshake_after_flash: true,
            progress_bar_enable: false,
        }
    }

    pub fn progress_bar(&mut self, enable: bool) {
        self.progress_bar_enable = enable;
    }

    pub fn handshake_after_flash(&mut self, enable: bool) {
        self.handshake_after_flash = enable;
    }

    /// Run `callback` when the peer asks for the supervisor to reset
    pub fn on_reset_request(&mut self, callback: impl FnMut() + 'static) {
        self.scheduler.register_event(protocol::RESET_REQUEST, callback);
    }

    pub fn register_event(&mut self, literal: &str, callback: impl FnMut() + 'static) {
        self.scheduler.register_event(literal, callback);
    }

    pub fn enqueue(&mut self, command: Command<PeerCommand>) {
        self.scheduler.enqueue(command);
    }

    pub fn request(&mut self, client: ClientId, request: PeerRequest) {
        self.enqueue(Command::new(PeerCommand::new(request, client)));
    }

    /// Four queries back to back, answered with one report
    pub fn query_settings(&mut self, client: ClientId) {
        for command in PeerCommand::settings_query(client) {
            self.enqueue(command);
        }
    }

    /// Write `text` to the peer outside the command queue
    pub fn send_raw(&mut self, text: &str) -> LinkResult<()> {
        info!("TO   PEER: {}", text);
        self.serial.send(format!("{}\n", text).as_bytes())
    }

    /// Drain received bytes, route complete lines, then advance the
    /// command queue. Never blocks. A read error stops the drain but the
    /// queue still advances; the error is returned afterwards.
    pub fn poll(&mut self) -> LinkResult<()> {
        let now = self.clock.now_ms();
        let PeerLink {
            serial,
            replies,
            receiver,
            scheduler,
            state,
            log,
            ..
        } = self;

        let mut read_error = None;
        loop {
            let byte = match serial.read_byte() {
                Ok(Some(byte)) => byte,
                Ok(None) => break,
                Err(e) => {
                    warn!("Reading from peer failed: {}", e);
                    read_error = Some(e);
                    break;
                }
            };
            match receiver.feed_byte(byte) {
                Ok(Some(line)) => {
                    if state.output_suppressed {
                        debug!("Suppressed peer output: {}", line);
                    } else {
                        info!("FROM PEER: {}", line);
                        log.push_line(line, &mut *replies);
                    }
                    let mut ctx = PeerContext {
                        serial: &mut *serial,
                        replies: &mut *replies,
                        state: &mut *state,
                    };
                    scheduler.on_line(line, &mut ctx);
                }
                Ok(None) => {}
                Err(e) => warn!("Dropping peer output: {}", e),
            }
        }

        let mut ctx = PeerContext {
            serial: &mut *serial,
            replies: &mut *replies,
            state: &mut *state,
        };
        scheduler.tick(now, &mut ctx);

        match read_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Act on a client's text request. Failures are reported to the client.
    pub fn handle_request(&mut self, client: ClientId, text: &str) {
        let request = match ClientRequest::parse(text) {
            Ok(request) => request,
            Err(e) => {
                warn!("Bad request from {}: {}", client, e);
                self.replies.deliver(client, &format!("ERROR: {}", e));
                return;
            }
        };
        debug!("Request {:?} from {}", request, client);

        match request {
            ClientRequest::Peer(request) => self.request(client, request),
            ClientRequest::Settings => self.query_settings(client),
            ClientRequest::Raw(text) => {
                if let Err(e) = self.send_raw(&text) {
                    self.replies.deliver(client, &format!("ERROR: {}", e));
                }
            }
            ClientRequest::Flash(path) => {
                // Already reported to the client
                let _ = self.flash_hex_file(client, &path);
            }
            ClientRequest::StartReadingLogs => {
                if !self.log.is_empty() {
                    self.replies.deliver(client, self.log.contents());
                }
                self.log.subscribe(client);
            }
            ClientRequest::StopReadingLogs => self.log.unsubscribe(client),
        }
    }

    /// Flash the Intel-HEX file at `path` onto the peer
    pub fn flash_hex_file(&mut self, client: ClientId, path: &str) -> LinkResult<usize> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(e) => {
                let err = LinkError::Firmware(format!("can not open firmware file {}: {}", path, e));
                error!("{}", err);
                self.replies.deliver(client, &format!("ERROR: {}", err));
                return Err(err);
            }
        };

        let progress = if self.progress_bar_enable {
            let size = file.metadata().map(|m| m.len()).unwrap_or(0);
            create_progress_bar(size, "Flashing")
        } else {
            ProgressBar::hidden()
        };

        let result = self.flash(client, BufReader::new(file), &progress);
        progress.finish();
        result
    }

    /// Flash an Intel-HEX stream onto the peer, reporting progress to
    /// `client`. Blocks until done; the command queue does not advance
    /// meanwhile.
    pub fn flash<H: std::io::BufRead>(
        &mut self,
        client: ClientId,
        hex: H,
        progress: &ProgressBar,
    ) -> LinkResult<usize> {
        info!("Start flashing peer");
        self.replies.deliver(client, "START FLASHING");

        let result = flash_firmware(
            &mut self.serial,
            &mut self.reset,
            &mut self.clock,
            hex,
            self.bootloader_baud,
            progress,
        );
        // Whatever was half received belongs to the old firmware
        self.receiver.clear();

        match result {
            Ok(pages) => {
                info!("Flashing of peer is completed");
                self.replies.deliver(client, "DONE");
                if self.handshake_after_flash {
                    self.state.output_suppressed = true;
                    let start = self.clock.now_ms() + HANDSHAKE_DELAY_MS;
                    self.enqueue(Command::new(PeerCommand::handshake()).start_at(start));
                }
                Ok(pages)
            }
            Err(e) => {
                error!("Flashing failed: {}", e);
                self.replies.deliver(client, &format!("ERROR: {}", e));
                Err(e)
            }
        }
    }

    pub fn replies(&self) -> &P {
        &self.replies
    }

    pub fn replies_mut(&mut self) -> &mut P {
        &mut self.replies
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }

    pub fn log(&self) -> &PeerLog {
        &self.log
    }

    pub fn pending_commands(&self) -> usize {
        self.scheduler.len()
    }

    pub fn output_suppressed(&self) -> bool {
        self.state.output_suppressed
    }
}
