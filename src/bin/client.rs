use std::{
    io::{self, BufRead, BufReader, Write},
    net::{Ipv4Addr, SocketAddr, TcpStream},
};

use areactor::{ServerError, config::Config};

fn main() -> Result<(), ServerError> {
    let config = Config::from_env()?;
    // the server listens on every interface by default, talk to the local one
    let addr = if config.bind.is_unspecified() {
        SocketAddr::from((Ipv4Addr::LOCALHOST, config.port))
    } else {
        config.addr()
    };

    let sock = TcpStream::connect(addr).inspect_err(|e| eprintln!("error connecting to {addr}: {e}"))?;
    let mut replies = BufReader::new(sock.try_clone()?);
    let mut sock = sock;

    let stdin = io::stdin();
    let mut line = String::with_capacity(1024);
    let mut reply = String::with_capacity(1024);

    loop {
        print!("[you] ");
        io::stdout().flush()?;

        line.clear();
        let nread = stdin.lock().read_line(&mut line).inspect_err(|e| eprintln!("error on stdin read {e}"))?;
        if nread == 0 {
            eprintln!("stdin: EOF");
            return Ok(());
        }
        if line.trim().is_empty() {
            continue;
        }
        if !line.ends_with('\n') {
            line.push('\n');
        }

        sock.write_all(line.as_bytes()).inspect_err(|e| eprintln!("error on socket write {e}"))?;

        reply.clear();
        let nread = replies.read_line(&mut reply).inspect_err(|e| eprintln!("error on socket read {e}"))?;
        if nread == 0 {
            eprintln!("server closed the connection");
            return Ok(());
        }
        println!("[srv] {}", reply.trim_end());
    }
}
