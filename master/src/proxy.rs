//! Log proxy: merges slave log streams into the master's stderr.
//!
//! Slaves optionally connect here and send their log lines; each line lands
//! on stderr prefixed with `"< "`, the client address and a seconds-offset
//! stamp. The master's own log lines carry no such prefix, so the combined
//! stream separates again with a simple regular expression.

use std::io::Write as _;
use std::net::{IpAddr, SocketAddr};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Accept any number of slave log connections, forever.
pub async fn run_proxy(listener: TcpListener, started: Instant) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(peer = %peer, "new log client");
                tokio::spawn(forward_client(stream, peer, started));
            }
            Err(e) => {
                warn!(error = %e, "log proxy accept failed");
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    }
}

async fn forward_client(stream: TcpStream, peer: SocketAddr, started: Instant) {
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let stamped = format_proxy_line(peer.ip(), started.elapsed().as_secs_f64(), &line);
                // Locking stderr keeps each slave line whole; this lock is
                // never combined with the coordination lock.
                let mut sink = std::io::stderr().lock();
                let _ = sink.write_all(stamped.as_bytes());
            }
        }
    }
    debug!(peer = %peer, "log client gone");
}

fn format_proxy_line(ip: IpAddr, elapsed: f64, line: &str) -> String {
    let newline = if line.ends_with('\n') { "" } else { "\n" };
    format!("< {:>15} {:9.3}: {}{}", ip, elapsed, line, newline)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_carry_the_client_prefix_and_stamp() {
        let ip: IpAddr = "10.0.0.7".parse().unwrap();
        let out = format_proxy_line(ip, 12.5, "uct: 4000 playouts\n");
        assert_eq!(out, "<        10.0.0.7    12.500: uct: 4000 playouts\n");
        assert!(out.starts_with("< "));
    }

    #[test]
    fn unterminated_lines_are_terminated() {
        let ip: IpAddr = "127.0.0.1".parse().unwrap();
        let out = format_proxy_line(ip, 0.0, "partial");
        assert!(out.ends_with("partial\n"));
    }
}
