use std::{
    io::{self, Read, Write},
    net::SocketAddr,
    time::Duration,
};

use dict::{Dict, DictType, int_hash};
use log::{debug, error, info, trace};
use mio::{
    Interest, Poll, Registry, Token,
    event::Event,
    net::{TcpListener, TcpStream},
};

use crate::{
    SERVER, ServerError,
    command::{CommandContext, CommandTable, Reply},
    maintenance::{self, Maintenance},
    util::{interrupted, would_block},
};

/// Longest line a client may send, a client that goes past it is dropped
pub const MAX_LINE: usize = 16 * 1024;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    WantRead,
    WantWrite,
    WantClose,
}

/// One client: the socket plus the bytes still to be parsed and sent
#[derive(Debug)]
pub struct Connection<S = TcpStream> {
    pub stream: S,
    pub token: Token,
    state: ConnectionState,
    pub incoming: Vec<u8>,
    pub outgoing: Vec<u8>,
}

impl<S: Read + Write> Connection<S> {
    pub fn new(stream: S, token: Token) -> Self {
        Self {
            stream,
            token,
            state: ConnectionState::WantRead,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn close(&mut self) {
        self.state = ConnectionState::WantClose;
    }

    pub fn want_read(&self) -> bool {
        matches!(self.state, ConnectionState::WantRead)
    }
    pub fn want_write(&self) -> bool {
        matches!(self.state, ConnectionState::WantWrite)
    }
    pub fn want_close(&self) -> bool {
        matches!(self.state, ConnectionState::WantClose)
    }

    /// Drains the socket, runs every complete line through `commands`
    /// and starts sending the replies.
    ///
    /// Also called while replies are still pending: readiness is edge
    /// triggered, so input left in the socket now would never be reported
    /// again. Lines are handled after every chunk, so the client is dropped
    /// as soon as its pending line goes past [`MAX_LINE`].
    pub fn on_read(&mut self, commands: &mut CommandTable, ctx: &CommandContext) -> io::Result<()> {
        debug_assert!(!self.want_close(), "calling read on a closing connection");

        let mut buf = [0; 1024 * 16];
        loop {
            let n = match self.stream.read(&mut buf) {
                Ok(0) => {
                    info!(target: "on_read", "{}", if self.incoming.is_empty() { "client dropped connection" } else { "unexpected eof" });
                    // let the main loop close the connection
                    self.close();
                    return Ok(());
                }
                Ok(n) => n,
                Err(ref e) if would_block(e) => break,
                Err(ref e) if interrupted(e) => continue,
                Err(e) => {
                    self.close();
                    return Err(e);
                }
            };
            self.incoming.extend_from_slice(&buf[..n]);
            trace!(target: "on_read", "got {n} bytes");

            self.handle_lines(commands, ctx);
            if self.want_close() {
                return Ok(());
            }
            if self.incoming.len() > MAX_LINE {
                error!(target: "on_read", "client {} sent a line over {MAX_LINE} bytes", self.token.0);
                self.close();
                return Ok(());
            }
        }

        if self.outgoing.is_empty() {
            return Ok(());
        }
        // replies are ready, try sending now instead of waiting for the next poll
        self.state = ConnectionState::WantWrite;
        self.on_write()
    }

    /// Dispatches every complete line, stops at the first one that closes
    fn handle_lines(&mut self, commands: &mut CommandTable, ctx: &CommandContext) {
        while let Some(line) = self.take_line() {
            match commands.dispatch(ctx, &line) {
                Some(Reply::Text(mut reply)) => {
                    reply.push('\n');
                    self.outgoing.extend_from_slice(reply.as_bytes());
                }
                Some(Reply::Close) => {
                    debug!(target: "on_read", "client {} asked to quit", self.token.0);
                    self.close();
                    return;
                }
                None => {}
            }
        }
    }

    /// Sends as much of the pending output as the socket takes
    pub fn on_write(&mut self) -> io::Result<()> {
        debug_assert!(self.want_write(), "calling write on non WantWrite state");

        while !self.outgoing.is_empty() {
            let n = match self.stream.write(&self.outgoing) {
                Ok(0) => {
                    info!(target: "on_write", "wrote 0 bytes to socket");
                    self.close();
                    return Ok(());
                }
                Ok(n) => n,
                Err(ref e) if would_block(e) => return Ok(()),
                Err(ref e) if interrupted(e) => continue,
                Err(e) => {
                    self.close();
                    return Err(e);
                }
            };
            trace!(target: "on_write", "wrote {} bytes, out of {}", n, self.outgoing.len());
            self.outgoing.drain(..n);
        }

        self.state = ConnectionState::WantRead;
        Ok(())
    }

    /// Splits the first complete line off the input, without its line ending
    fn take_line(&mut self) -> Option<String> {
        let end = self.incoming.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.incoming.drain(..=end).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

/// Clients keyed by their poll token
struct ClientKeys;

impl DictType for ClientKeys {
    type Key = Token;
    type Value = Connection;

    fn hash(&self, key: &Token) -> u32 {
        let t = key.0 as u64;
        int_hash((t ^ (t >> 32)) as u32)
    }

    fn key_eq(&self, a: &Token, b: &Token) -> bool {
        a == b
    }

    fn free_val(&self, conn: Connection) {
        trace!(target: "handle_close", "dropping connection {}", conn.token.0);
    }
}

pub struct ConnectionManager {
    clients: Dict<ClientKeys>,
    commands: CommandTable,
    token_gen: TokenGen,
}

impl ConnectionManager {
    pub fn new() -> Result<Self, ServerError> {
        Ok(Self {
            clients: Dict::new(ClientKeys),
            commands: CommandTable::new()?,
            token_gen: TokenGen::new(),
        })
    }

    /// Number of connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Accepts every pending connection.
    ///
    /// Failures only cost the connection they happen on, the listener and
    /// the other clients carry on.
    pub fn handle_accept(&mut self, server: &TcpListener, poll: &Poll) {
        loop {
            let (stream, peer) = match server.accept() {
                Ok(accepted) => accepted,
                Err(ref e) if would_block(e) => return,
                Err(ref e) if interrupted(e) => continue,
                Err(e) => {
                    // out of descriptors and the like, the listener itself is fine
                    error!(target: "handle_accept", "accept failed: {e}");
                    return;
                }
            };

            self.add_client(poll.registry(), stream, peer);
        }
    }

    /// Registers a freshly accepted stream and starts tracking it.
    ///
    /// A stream that cannot be set up is dropped, which closes it, and its
    /// token goes back to the pool. Returns whether the client was added.
    fn add_client(&mut self, registry: &Registry, stream: TcpStream, peer: SocketAddr) -> bool {
        let token = self.token_gen.next();
        let mut conn = Connection::new(stream, token);
        if let Err(e) = registry.register(&mut conn.stream, token, Interest::READABLE | Interest::WRITABLE) {
            error!(target: "handle_accept", "registering {peer} failed: {e}");
            self.token_gen.free(token);
            return false;
        }

        match self.clients.add_raw(token) {
            Ok(entry) => {
                entry.set_val(conn);
            }
            Err(e) => {
                error!(target: "handle_accept", "adding {peer} failed: {e}");
                if let Err(e) = registry.deregister(&mut conn.stream) {
                    error!(target: "handle_accept", "deregistering {peer} failed: {e}");
                }
                self.token_gen.free(token);
                return false;
            }
        }
        info!(target: "handle_accept", "accepted {peer} as client {}, {} connected", token.0, self.clients.len());
        true
    }

    /// Handles one readiness event of a client socket
    pub fn handle_event(&mut self, poll: &Poll, event: &Event) -> Result<(), ServerError> {
        let token = event.token();
        let ctx = CommandContext {
            clients: self.clients.len(),
        };

        let Some(conn) = self.clients.find(&token).ok().and_then(|e| e.val_mut()) else {
            trace!(target: "handle_event", "spurious wake for {}", token.0);
            return Ok(());
        };

        if event.is_readable() && !conn.want_close() {
            if let Err(e) = conn.on_read(&mut self.commands, &ctx) {
                error!(target: "handle_event", "read from client {} failed: {e}", token.0);
            }
        }

        if event.is_writable() && conn.want_write() {
            if let Err(e) = conn.on_write() {
                error!(target: "handle_event", "write to client {} failed: {e}", token.0);
            }
        }

        if event.is_read_closed() && conn.outgoing.is_empty() {
            conn.close();
        }

        if conn.want_close() {
            self.handle_close(poll, token)?;
        }
        Ok(())
    }

    /// Stops polling the client's socket, then drops the connection
    pub fn handle_close(&mut self, poll: &Poll, token: Token) -> Result<(), ServerError> {
        let conn = self.clients.find(&token)?;
        if let Some(conn) = conn.val_mut() {
            if let Err(e) = poll.registry().deregister(&mut conn.stream) {
                error!(target: "handle_close", "deregistering client {} failed: {e}", token.0);
            }
        }
        // free_val drops the connection, closing the socket
        self.clients.delete(&token)?;
        self.token_gen.free(token);
        info!(target: "handle_close", "closed client {}, {} left", token.0, self.clients.len());
        Ok(())
    }

    /// Periodic housekeeping of the client table
    pub fn maintenance(&mut self, budget: Duration) -> Maintenance {
        maintenance::maintain(&mut self.clients, budget)
    }
}

/// Hands out client tokens, reusing the ones of closed clients
struct TokenGen {
    next: usize,
    freed: Vec<usize>,
}

impl TokenGen {
    pub const fn new() -> Self {
        Self {
            next: SERVER.0 + 1,
            freed: Vec::new(),
        }
    }

    pub fn next(&mut self) -> Token {
        if let Some(free) = self.freed.pop() {
            return Token(free);
        }
        let t = Token(self.next);
        self.next += 1;
        t
    }

    /// Must be called at most once per token handed out
    pub fn free(&mut self, token: Token) {
        self.freed.push(token.0);
    }
}
