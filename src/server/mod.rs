use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};

use tracing::{debug, info, warn};

use crate::config::Settings;

pub mod api;
pub mod routes;

/// Blocks forever serving the read-only JSON API on `settings.bind_addr`.
pub fn run_server(settings: &Settings) -> std::io::Result<()> {
    let listener = TcpListener::bind(&settings.bind_addr)?;
    info!(addr = %settings.bind_addr, "geoguardian API listening");
    serve(listener, settings)
}

pub fn serve(listener: TcpListener, settings: &Settings) -> std::io::Result<()> {
    for stream in listener.incoming() {
        match stream {
            Ok(mut stream) => {
                if let Err(err) = handle_connection(&mut stream, settings) {
                    warn!(error = %err, "request error");
                }
            }
            Err(err) => warn!(error = %err, "connection failed"),
        }
    }

    Ok(())
}

fn handle_connection(stream: &mut TcpStream, settings: &Settings) -> std::io::Result<()> {
    let mut buffer = [0_u8; 8_192];
    let bytes_read = stream.read(&mut buffer)?;
    if bytes_read == 0 {
        return Ok(());
    }

    let request = String::from_utf8_lossy(&buffer[..bytes_read]);
    let request_line = request.lines().next().unwrap_or_default();
    let mut request_parts = request_line.split_whitespace();
    let method = request_parts.next().unwrap_or("GET");
    let path = request_parts.next().unwrap_or("/");

    let response = routes::route_request(method, path, settings);
    debug!(method, path, status = response.status_code, "handled request");
    stream.write_all(response.to_http_string().as_bytes())?;
    stream.flush()?;
    Ok(())
}
