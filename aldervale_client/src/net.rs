// TCP client for connecting to the world server.
//
// Provides a non-blocking interface for the frame loop to talk to the server.
// Architecture:
// - `connect()` performs the TCP connect on the calling thread, then spawns a
//   background reader thread. There is no handshake — the first thing a
//   client sends is an ordinary LOGIN or REGISTER message.
// - The reader thread feeds raw socket reads through a `FrameDecoder`,
//   deserializes `ServerMessage`, and pushes into an `mpsc` channel. A frame
//   that fails to decode is logged and skipped — the connection stays up.
// - The frame loop holds a `BufWriter<TcpStream>` for sending.
// - `poll()` drains the inbox non-blocking, returning all queued messages.
//
// This separation ensures the frame loop never blocks on network I/O. When
// the server closes the stream (or a read fails), the reader thread pushes a
// synthetic `ServerMessage::Disconnect` into the inbox before exiting, so
// connection loss arrives in-band with ordinary messages and the frame loop
// handles it like any other state change.

use std::io::{BufWriter, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use aldervale_protocol::framing::{FrameDecoder, write_frame};
use aldervale_protocol::message::{ClientMessage, ServerMessage};

/// Cap on how long a connection attempt may block its thread.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP client for world-server communication.
#[derive(Debug)]
pub struct NetClient {
    writer: BufWriter<TcpStream>,
    inbox: Receiver<ServerMessage>,
    _reader_thread: Option<JoinHandle<()>>,
}

impl NetClient {
    /// Connect to a world server and spawn a reader thread.
    pub fn connect(addr: &str) -> Result<Self, String> {
        let target = addr
            .to_socket_addrs()
            .map_err(|e| format!("resolve {addr} failed: {e}"))?
            .next()
            .ok_or_else(|| format!("resolve {addr} failed: no address"))?;
        let stream = TcpStream::connect_timeout(&target, CONNECT_TIMEOUT)
            .map_err(|e| format!("connect failed: {e}"))?;

        // The original stream becomes the write half; the clone feeds the
        // reader thread.
        let reader_stream = stream
            .try_clone()
            .map_err(|e| format!("clone failed: {e}"))?;

        let (tx, rx) = mpsc::channel();
        let reader_thread = thread::spawn(move || {
            reader_loop(reader_stream, tx);
        });

        Ok(Self {
            writer: BufWriter::new(stream),
            inbox: rx,
            _reader_thread: Some(reader_thread),
        })
    }

    /// Serialize a message to JSON and send it as one framed write.
    pub fn send(&mut self, msg: &ClientMessage) -> Result<(), String> {
        let json = serde_json::to_vec(msg).map_err(|e| e.to_string())?;
        write_frame(&mut self.writer, &json).map_err(|e| format!("send failed: {e}"))
    }

    /// Drain all queued server messages (non-blocking).
    pub fn poll(&self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.inbox.try_recv() {
            messages.push(msg);
        }
        messages
    }
}

/// Reader thread: feed socket reads through a `FrameDecoder`, push decoded
/// messages to the channel. Exits on EOF, read error, or a dropped receiver,
/// surfacing the first two as a synthetic `Disconnect`.
fn reader_loop(mut stream: TcpStream, tx: mpsc::Sender<ServerMessage>) {
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; 4096];

    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => break, // EOF: the server closed the connection.
            Ok(n) => n,
            Err(e) => {
                log::debug!("server read failed: {e}");
                break;
            }
        };
        decoder.extend(&buf[..n]);

        loop {
            match decoder.next_message::<ServerMessage>() {
                Ok(Some(message)) => {
                    if tx.send(message).is_err() {
                        return; // Frame loop dropped the client.
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    // One bad frame; the decoder already consumed it.
                    log::warn!("dropped server frame: {e}");
                }
            }
        }
    }
    let _ = tx.send(ServerMessage::Disconnect);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::time::Instant;

    use aldervale_protocol::framing::read_frame;
    use aldervale_protocol::types::Position;

    /// Drain the inbox until `n` messages have arrived or five seconds pass.
    fn poll_until(client: &NetClient, n: usize) -> Vec<ServerMessage> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut got = Vec::new();
        while got.len() < n {
            got.extend(client.poll());
            assert!(Instant::now() < deadline, "timed out, received {got:?}");
            thread::sleep(Duration::from_millis(10));
        }
        got
    }

    fn send_server_msg(stream: &mut TcpStream, msg: &ServerMessage) {
        let json = serde_json::to_vec(msg).unwrap();
        write_frame(stream, &json).unwrap();
    }

    #[test]
    fn delivers_server_messages_in_order() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = NetClient::connect(&addr.to_string()).unwrap();
        let (mut server_side, _) = listener.accept().unwrap();

        send_server_msg(&mut server_side, &ServerMessage::RegisterSuccess);
        send_server_msg(
            &mut server_side,
            &ServerMessage::LoginFail {
                message: "Invalid credentials".into(),
            },
        );

        let got = poll_until(&client, 2);
        assert_eq!(got[0], ServerMessage::RegisterSuccess);
        assert_eq!(
            got[1],
            ServerMessage::LoginFail {
                message: "Invalid credentials".into(),
            }
        );
    }

    #[test]
    fn synthesizes_disconnect_when_server_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = NetClient::connect(&addr.to_string()).unwrap();
        let (server_side, _) = listener.accept().unwrap();
        drop(server_side);

        let got = poll_until(&client, 1);
        assert_eq!(got[0], ServerMessage::Disconnect);
    }

    #[test]
    fn send_writes_a_parseable_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = NetClient::connect(&addr.to_string()).unwrap();
        let (mut server_side, _) = listener.accept().unwrap();

        let msg = ClientMessage::Move {
            pos: Position::new(416.0, 300.0),
        };
        client.send(&msg).unwrap();

        let payload = read_frame(&mut server_side).unwrap();
        let received: ClientMessage = serde_json::from_slice(&payload).unwrap();
        assert_eq!(received, msg);
    }

    #[test]
    fn bad_frame_is_dropped_stream_continues() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = NetClient::connect(&addr.to_string()).unwrap();
        let (mut server_side, _) = listener.accept().unwrap();

        write_frame(&mut server_side, b"definitely not json").unwrap();
        send_server_msg(&mut server_side, &ServerMessage::RegisterSuccess);

        let got = poll_until(&client, 1);
        assert_eq!(got[0], ServerMessage::RegisterSuccess);
    }

    #[test]
    fn connect_to_dead_port_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = NetClient::connect(&addr.to_string()).unwrap_err();
        assert!(err.contains("connect failed"), "unexpected error: {err}");
    }

    #[test]
    fn poll_is_empty_when_nothing_arrived() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = NetClient::connect(&addr.to_string()).unwrap();
        let (_server_side, _) = listener.accept().unwrap();

        assert!(client.poll().is_empty());
    }
}
