//! Echo client driven by a `Delegate`.
//!
//! Run against any echo server:
//!   cargo run --example echo_client -- ws://127.0.0.1:9001/

use asyncws::{CloseCode, CloseInfo, Config, Delegate, Error, Message, WebSocket};

const GREETINGS: [&str; 3] = ["hello", "from", "asyncws"];

struct EchoLogger {
    ws: WebSocket,
    received: usize,
}

impl Delegate for EchoLogger {
    fn on_open(&mut self, protocol: Option<&str>, _extensions: &[String]) {
        println!("[{}] opened (protocol: {protocol:?})", self.ws.id());
        for text in GREETINGS {
            if let Err(e) = self.ws.send_text(text) {
                eprintln!("send failed: {e}");
            }
        }
        if let Err(e) = self.ws.ping(b"are you there".to_vec()) {
            eprintln!("ping failed: {e}");
        }
    }

    fn on_connect_failed(&mut self, error: Error) {
        eprintln!("[{}] failed to connect: {error}", self.ws.id());
    }

    fn on_message(&mut self, message: Message) {
        match &message {
            Message::Text(text) => println!("[{}] text: {text}", self.ws.id()),
            Message::Binary(data) => println!("[{}] binary: {} bytes", self.ws.id(), data.len()),
        }
        self.received += 1;
        if self.received == GREETINGS.len() {
            let _ = self.ws.close(CloseCode::Normal, "done");
        }
    }

    fn on_ping(&mut self, payload: &[u8]) -> Option<Vec<u8>> {
        println!("[{}] ping: {payload:?}", self.ws.id());
        None
    }

    fn on_pong(&mut self, payload: &[u8]) {
        println!("[{}] pong: {}", self.ws.id(), String::from_utf8_lossy(payload));
    }

    fn on_close(&mut self, info: CloseInfo) {
        println!(
            "[{}] closed: {} {:?} (clean: {})",
            self.ws.id(),
            info.code,
            info.reason,
            info.was_clean()
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let target = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:9001/".to_string());
    println!("Connecting to {target}");

    let (ws, events) = WebSocket::connect(target.as_str(), Config::new())?;
    let mut delegate = EchoLogger { ws, received: 0 };
    events.run(&mut delegate).await;
    Ok(())
}
