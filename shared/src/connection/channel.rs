//! Duplex framed byte channel between exactly two peers.
//!
//! A dedicated background thread owns the socket: it drains the outbound
//! queue onto the wire and reassembles inbound frames onto the inbound
//! queue. Everything the tick loop learns about the link — envelopes,
//! connects, disconnects — arrives through that one queue, so no transport
//! callback ever runs off the tick thread.

use std::{
    io::{Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use log::{debug, error, trace, warn};

use crate::{
    connection::{
        config::ConnectionConfig,
        error::{DisconnectReason, TransportError},
        frame::{self, FrameReader},
    },
    messages::envelope::Envelope,
};

/// How long the I/O loop sleeps when neither direction made progress
const IO_IDLE_SLEEP: Duration = Duration::from_millis(1);
/// How long the accept loop sleeps between polls for a new peer
const ACCEPT_POLL: Duration = Duration::from_millis(25);
/// Upper bound on bytes batched into one write pass
const WRITE_BATCH_BYTES: usize = 32 * 1024;

/// What the I/O thread reports onto the inbound queue
#[derive(Debug)]
pub enum ChannelEvent {
    /// A peer is reachable; framing starts now
    Connected(SocketAddr),
    /// The link is gone; observed by the consumer on its next tick
    Disconnected(DisconnectReason),
    /// One reassembled envelope
    Envelope(Envelope),
}

struct IoContext {
    outbound_rx: Receiver<Envelope>,
    inbound_tx: Sender<ChannelEvent>,
    connected: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    kick: Arc<AtomicBool>,
}

/// Tick-thread handle to the background transport.
///
/// Dropping the channel stops the I/O thread and closes the socket.
pub struct Channel {
    outbound_tx: Sender<Envelope>,
    inbound_rx: Receiver<ChannelEvent>,
    connected: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    kick: Arc<AtomicBool>,
    io_thread: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl Channel {
    /// Connect out to a listening peer. The attempt happens on the I/O
    /// thread; failure surfaces as a `Disconnected` event, not an `Err` here.
    pub fn connect(address: SocketAddr, config: &ConnectionConfig) -> Result<Self, TransportError> {
        Self::spawn(config, None, move |ctx, config| {
            connect_loop(address, config, ctx);
        })
    }

    /// Bind and accept exactly one peer at a time, returning to accepting
    /// after each drop. Bind errors are synchronous.
    pub fn listen(address: SocketAddr, config: &ConnectionConfig) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(address).map_err(|source| TransportError::Bind {
            address,
            source,
        })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| TransportError::Bind { address, source })?;
        let local_addr = listener.local_addr().ok();
        Self::spawn(config, local_addr, move |ctx, config| {
            accept_loop(listener, config, ctx);
        })
    }

    fn spawn(
        config: &ConnectionConfig,
        local_addr: Option<SocketAddr>,
        io_main: impl FnOnce(IoContext, ConnectionConfig) + Send + 'static,
    ) -> Result<Self, TransportError> {
        let (outbound_tx, outbound_rx) = bounded(config.outbound_queue_size);
        let (inbound_tx, inbound_rx) = bounded(config.inbound_queue_size);
        let connected = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(AtomicBool::new(false));
        let kick = Arc::new(AtomicBool::new(false));

        let ctx = IoContext {
            outbound_rx,
            inbound_tx,
            connected: connected.clone(),
            shutdown: shutdown.clone(),
            kick: kick.clone(),
        };
        let io_config = config.clone();
        let io_thread = thread::Builder::new()
            .name("tether-io".to_string())
            .spawn(move || io_main(ctx, io_config))
            .map_err(TransportError::Spawn)?;

        Ok(Self {
            outbound_tx,
            inbound_rx,
            connected,
            shutdown,
            kick,
            io_thread: Some(io_thread),
            local_addr,
        })
    }

    /// Queue an envelope for transmission.
    ///
    /// Never fails: while disconnected, or when the outbound queue is full,
    /// the envelope is dropped silently — the caller's newer traffic will
    /// supersede it once the link is back.
    pub fn send(&self, envelope: Envelope) {
        if !self.is_connected() {
            trace!("Dropping envelope sent while disconnected");
            return;
        }
        if self.outbound_tx.try_send(envelope).is_err() {
            debug!("Dropping envelope: outbound queue saturated");
        }
    }

    /// Pop the next event the I/O thread has produced, if any
    pub fn try_recv(&self) -> Option<ChannelEvent> {
        self.inbound_rx.try_recv().ok()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Depth of the outbound queue; one of the throttle's two gates
    pub fn outbound_len(&self) -> usize {
        self.outbound_tx.len()
    }

    /// Actual bound address of a listening channel (resolves port 0)
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Drop the current peer but keep the channel alive. A listening channel
    /// goes back to accepting; a connecting channel's thread exits.
    pub fn drop_peer(&self) {
        if self.is_connected() {
            self.kick.store(true, Ordering::Relaxed);
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.io_thread.take() {
            // The I/O thread may be blocked pushing inbound events; keep the
            // queue draining until it observes the shutdown flag.
            while !handle.is_finished() {
                while self.inbound_rx.try_recv().is_ok() {}
                thread::sleep(Duration::from_millis(1));
            }
            let _ = handle.join();
        }
    }
}

/// Push an event toward the tick thread, yielding to the shutdown flag if
/// the queue stays full. Returns false once nobody is listening.
fn push_inbound(ctx: &IoContext, event: ChannelEvent) -> bool {
    let mut pending = event;
    loop {
        match ctx
            .inbound_tx
            .send_timeout(pending, Duration::from_millis(100))
        {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(returned)) => {
                if ctx.shutdown.load(Ordering::Relaxed) {
                    return false;
                }
                pending = returned;
            }
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}

fn connect_loop(address: SocketAddr, config: ConnectionConfig, ctx: IoContext) {
    match TcpStream::connect_timeout(&address, config.connect_timeout) {
        Ok(stream) => {
            let peer = stream.peer_addr().unwrap_or(address);
            ctx.connected.store(true, Ordering::Relaxed);
            if !push_inbound(&ctx, ChannelEvent::Connected(peer)) {
                return;
            }
            let reason = run_duplex(stream, &config, &ctx);
            ctx.connected.store(false, Ordering::Relaxed);
            if let Some(reason) = reason {
                push_inbound(&ctx, ChannelEvent::Disconnected(reason));
            }
        }
        Err(source) => {
            debug!("Connect to {} failed: {}", address, source);
            push_inbound(&ctx, ChannelEvent::Disconnected(DisconnectReason::ConnectFailed));
        }
    }
}

fn accept_loop(listener: TcpListener, config: ConnectionConfig, ctx: IoContext) {
    while !ctx.shutdown.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, peer)) => {
                // stale outbound traffic belongs to the previous session
                while ctx.outbound_rx.try_recv().is_ok() {}
                ctx.kick.store(false, Ordering::Relaxed);
                ctx.connected.store(true, Ordering::Relaxed);
                if !push_inbound(&ctx, ChannelEvent::Connected(peer)) {
                    return;
                }
                let reason = run_duplex(stream, &config, &ctx);
                ctx.connected.store(false, Ordering::Relaxed);
                if let Some(reason) = reason {
                    if !push_inbound(&ctx, ChannelEvent::Disconnected(reason)) {
                        return;
                    }
                }
            }
            Err(ref source) if source.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(source) => {
                error!("Error accepting peer connection: {}", source);
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
}

/// Run one connected socket until it drops. Returns the reason to report,
/// or None when the whole channel is shutting down.
fn run_duplex(
    mut stream: TcpStream,
    config: &ConnectionConfig,
    ctx: &IoContext,
) -> Option<DisconnectReason> {
    let _ = stream.set_nodelay(true);
    if let Err(source) = stream.set_nonblocking(true) {
        error!("Failed to make stream nonblocking: {}", source);
        return Some(DisconnectReason::Io);
    }

    let mut reader = FrameReader::new(config.max_message_size);
    let mut scratch = vec![0u8; 16 * 1024];
    let mut write_buf: Vec<u8> = Vec::with_capacity(WRITE_BATCH_BYTES);
    let mut write_pos = 0usize;

    loop {
        if ctx.shutdown.load(Ordering::Relaxed) {
            flush_remaining(&mut stream, &mut write_buf, &mut write_pos, config, ctx);
            let _ = stream.shutdown(std::net::Shutdown::Both);
            return None;
        }

        let mut idle = true;

        // refill the write batch once the previous one is fully flushed
        if write_pos == write_buf.len() {
            write_buf.clear();
            write_pos = 0;
            while write_buf.len() < WRITE_BATCH_BYTES {
                match ctx.outbound_rx.try_recv() {
                    Ok(envelope) => {
                        if let Err(error) =
                            frame::encode_into(&envelope, config.max_message_size, &mut write_buf)
                        {
                            warn!("Dropping outbound envelope: {}", error);
                        }
                    }
                    Err(_) => break,
                }
            }
        }

        if write_pos < write_buf.len() {
            match stream.write(&write_buf[write_pos..]) {
                Ok(0) => return Some(DisconnectReason::ClosedByPeer),
                Ok(written) => {
                    write_pos += written;
                    idle = false;
                }
                Err(ref error) if error.kind() == std::io::ErrorKind::WouldBlock => {}
                Err(ref error) if error.kind() == std::io::ErrorKind::Interrupted => {}
                Err(error) => {
                    debug!("Write failed: {}", error);
                    return Some(io_reason(&error));
                }
            }
        }

        // checked after the write pass so a final control envelope (e.g.
        // a session Destroy) gets onto the wire before the close
        if ctx.kick.swap(false, Ordering::Relaxed) {
            flush_remaining(&mut stream, &mut write_buf, &mut write_pos, config, ctx);
            let _ = stream.shutdown(std::net::Shutdown::Both);
            return Some(DisconnectReason::LocalShutdown);
        }

        match stream.read(&mut scratch) {
            Ok(0) => return Some(DisconnectReason::ClosedByPeer),
            Ok(count) => {
                idle = false;
                reader.extend(&scratch[..count]);
                loop {
                    match reader.next_envelope() {
                        Ok(Some(envelope)) => {
                            if !push_inbound(ctx, ChannelEvent::Envelope(envelope)) {
                                return None;
                            }
                        }
                        Ok(None) => break,
                        Err(error) => {
                            warn!("Dropping connection: {}", error);
                            return Some(DisconnectReason::MalformedFrame);
                        }
                    }
                }
            }
            Err(ref error) if error.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(ref error) if error.kind() == std::io::ErrorKind::Interrupted => {}
            Err(error) => {
                debug!("Read failed: {}", error);
                return Some(io_reason(&error));
            }
        }

        if idle {
            thread::sleep(IO_IDLE_SLEEP);
        }
    }
}

/// Best-effort drain of queued outbound traffic before a deliberate close,
/// bounded so a dead peer cannot stall the teardown
fn flush_remaining(
    stream: &mut TcpStream,
    write_buf: &mut Vec<u8>,
    write_pos: &mut usize,
    config: &ConnectionConfig,
    ctx: &IoContext,
) {
    while let Ok(envelope) = ctx.outbound_rx.try_recv() {
        if let Err(error) = frame::encode_into(&envelope, config.max_message_size, write_buf) {
            warn!("Dropping outbound envelope during close: {}", error);
        }
    }
    let deadline = std::time::Instant::now() + Duration::from_millis(50);
    while *write_pos < write_buf.len() && std::time::Instant::now() < deadline {
        match stream.write(&write_buf[*write_pos..]) {
            Ok(0) => return,
            Ok(written) => *write_pos += written,
            Err(ref error) if error.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(1));
            }
            Err(ref error) if error.kind() == std::io::ErrorKind::Interrupted => {}
            Err(_) => return,
        }
    }
}

fn io_reason(error: &std::io::Error) -> DisconnectReason {
    match error.kind() {
        std::io::ErrorKind::UnexpectedEof
        | std::io::ErrorKind::ConnectionReset
        | std::io::ErrorKind::ConnectionAborted
        | std::io::ErrorKind::BrokenPipe => DisconnectReason::ClosedByPeer,
        _ => DisconnectReason::Io,
    }
}
