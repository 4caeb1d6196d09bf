use std::time::Instant;

use areactor::{SERVER, ServerError, config::Config, connection::ConnectionManager, util};
use log::{debug, error, info, trace};
use mio::{Events, Interest, Poll, net::TcpListener};
use rand::Rng;

fn main() -> Result<(), ServerError> {
    env_logger::builder().init();

    let config = Config::from_env()?;
    debug!("{config:#?}");

    // must happen before the first dictionary hashes anything
    let seed = config.hash_seed.unwrap_or_else(|| rand::rng().random());
    dict::set_hash_seed(seed)?;
    debug!("hash seed {seed:#010x}");

    let mut poll = Poll::new()?;
    let mut events = Events::with_capacity(config.max_events);
    let mut server = TcpListener::bind(config.addr())?;
    poll.registry()
        .register(&mut server, SERVER, Interest::READABLE)?;
    info!("listening on {}", config.addr());

    let mut clients = ConnectionManager::new()?;
    let mut last_tick = Instant::now();

    loop {
        if let Err(e) = poll.poll(&mut events, Some(config.tick)) {
            if util::interrupted(&e) {
                continue;
            }
            return Err(e.into());
        }

        for event in events.iter() {
            match event.token() {
                SERVER => clients.handle_accept(&server, &poll),
                token => {
                    trace!(target: "event_loop", "event for client {}", token.0);
                    if let Err(e) = clients.handle_event(&poll, event) {
                        error!(target: "event_loop", "client {}: {e}", token.0);
                    }
                }
            }
        }

        if last_tick.elapsed() >= config.tick {
            let done = clients.maintenance(config.rehash_budget);
            trace!(target: "event_loop", "maintenance: {done:?}");
            last_tick = Instant::now();
        }
    }
}
