//! Minimal in-process HTTP server backing WebDAV client tests.
//!
//! Serves GET/PUT/HEAD from an in-memory file map, enough to exercise the
//! real client, the sync engine and the streaming pipeline end to end.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

#[derive(Default)]
struct ServerState {
    /// decoded path (leading `/`) -> content
    files: HashMap<String, Vec<u8>>,
    /// decoded path -> remaining 500 responses before success
    failures: HashMap<String, u32>,
}

pub struct TestServer {
    addr: String,
    state: Arc<Mutex<ServerState>>,
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl TestServer {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let state: Arc<Mutex<ServerState>> = Arc::default();
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = {
            let state = Arc::clone(&state);
            let shutdown = Arc::clone(&shutdown);
            thread::spawn(move || {
                for stream in listener.incoming() {
                    if shutdown.load(Ordering::Relaxed) {
                        break;
                    }
                    let Ok(stream) = stream else { continue };
                    let state = Arc::clone(&state);
                    thread::spawn(move || handle_client(stream, state));
                }
            })
        };

        Self {
            addr,
            state,
            shutdown,
            handle: Some(handle),
        }
    }

    /// webdav:// URL pointing at this server
    pub fn webdav_url(&self) -> String {
        format!("webdav://{}", self.addr)
    }

    /// Store a file under a decoded path like `Artist/Album/track.mp3`
    pub fn put_file(&self, path: &str, data: &[u8]) {
        self.state
            .lock()
            .files
            .insert(format!("/{}", path.trim_start_matches('/')), data.to_vec());
    }

    /// Content previously stored or uploaded by a client
    pub fn get_file(&self, path: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .files
            .get(&format!("/{}", path.trim_start_matches('/')))
            .cloned()
    }

    /// Make the next `times` GET requests for a path answer 500
    pub fn fail_next(&self, path: &str, times: u32) {
        self.state
            .lock()
            .failures
            .insert(format!("/{}", path.trim_start_matches('/')), times);
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        // unblock the accept loop
        let _ = TcpStream::connect(&self.addr);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn handle_client(mut stream: TcpStream, state: Arc<Mutex<ServerState>>) {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    // read the request head
    let head_end = loop {
        match stream.read(&mut chunk) {
            Ok(0) => return,
            Ok(n) => {
                buffer.extend_from_slice(&chunk[..n]);
                if let Some(pos) = find_head_end(&buffer) {
                    break pos;
                }
            }
            Err(_) => return,
        }
    };

    let head = String::from_utf8_lossy(&buffer[..head_end]).to_string();
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let raw_path = parts.next().unwrap_or_default().to_string();

    let content_length: usize = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse().ok())
        .unwrap_or(0);

    // read the body (PUT)
    let mut body = buffer[head_end + 4..].to_vec();
    while body.len() < content_length {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => body.extend_from_slice(&chunk[..n]),
            Err(_) => return,
        }
    }

    let path = urlencoding::decode(&raw_path)
        .map(|p| p.into_owned())
        .unwrap_or(raw_path);

    match method.as_str() {
        "GET" => {
            {
                let mut state = state.lock();
                if let Some(remaining) = state.failures.get_mut(&path) {
                    if *remaining > 0 {
                        *remaining -= 1;
                        drop(state);
                        respond(&mut stream, 500, b"");
                        return;
                    }
                }
            }
            match state.lock().files.get(&path).cloned() {
                Some(data) => respond(&mut stream, 200, &data),
                None => respond(&mut stream, 404, b""),
            }
        }
        "PUT" => {
            state.lock().files.insert(path, body);
            respond(&mut stream, 201, b"");
        }
        "HEAD" => respond(&mut stream, 200, b""),
        _ => respond(&mut stream, 405, b""),
    }
}

fn find_head_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n")
}

fn respond(stream: &mut TcpStream, status: u16, body: &[u8]) {
    let reason = match status {
        200 => "OK",
        201 => "Created",
        404 => "Not Found",
        405 => "Method Not Allowed",
        _ => "Internal Server Error",
    };
    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        reason,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
    let _ = stream.flush();
}
