use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use serial_arq::{duplex, Connection, ConnectionBuilder, FaultyPort, MemPort};
use tracing::{error, info};

const MESSAGES: usize = 32;
const CORRUPT_EVERY_NTH_WRITE: usize = 7;
const DROP_EVERY_NTH_WRITE: usize = 11;
const RETRANSMIT_TIMEOUT_MS: u64 = 50;

type Port = FaultyPort<MemPort>;

fn main() {
    tracing_subscriber::fmt::init();

    let (client_port, server_port) = duplex();
    let client = connect(client_port);
    let server = connect(server_port);

    let stop = Arc::new(AtomicBool::new(false));
    let echo = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || serve(server, &stop))
    };

    let mut client = client;
    for i in 0..MESSAGES {
        let message = format!("ping {:04}", i);
        if let Err(e) = client.send_str(&message) {
            error!(error = %e, "send failed");
            break;
        }
        match receive(&mut client, message.len()) {
            Ok(back) => info!(echo = %String::from_utf8_lossy(&back), "round trip"),
            Err(e) => {
                error!(error = %e, "receive failed");
                break;
            }
        }
    }

    stop.store(true, Ordering::Release);
    let server = echo.join().unwrap();
    println!("client: {:?}", client.stat());
    println!("server: {:?}", server.stat());
}

fn connect(port: MemPort) -> Connection<Port> {
    let mut writes = 0;
    let port = FaultyPort::new(port, move |bytes: &mut Vec<u8>| {
        writes += 1;
        if writes % DROP_EVERY_NTH_WRITE == 0 {
            bytes.clear();
        } else if writes % CORRUPT_EVERY_NTH_WRITE == 0 {
            let i = writes % bytes.len();
            bytes[i] ^= 0x5a;
        }
    });
    ConnectionBuilder {
        retransmit_timeout: Duration::from_millis(RETRANSMIT_TIMEOUT_MS),
        ..ConnectionBuilder::default()
    }
    .build(port)
    .unwrap()
}

/// Echoes whatever arrives, one full payload at a time.
fn serve(mut conn: Connection<Port>, stop: &AtomicBool) -> Connection<Port> {
    let mut pending = Vec::new();
    while !stop.load(Ordering::Acquire) {
        match conn.available() {
            Ok(true) => {
                while let Some(byte) = conn.read_byte() {
                    pending.push(byte);
                }
            }
            Ok(false) => thread::yield_now(),
            Err(e) => {
                error!(error = %e, "server receive failed");
                break;
            }
        }
        if pending.is_empty() {
            continue;
        }
        if let Err(e) = conn.send(&pending) {
            error!(error = %e, "server send failed");
            break;
        }
        pending.clear();
    }
    conn
}

/// Waits for `len` bytes and drops the padding that follows them.
fn receive(conn: &mut Connection<Port>, len: usize) -> serial_arq::Result<Vec<u8>> {
    let payload_len = ConnectionBuilder::default().payload_len;
    let padded = (len + payload_len - 1) / payload_len * payload_len;
    let mut back = Vec::with_capacity(padded);
    while back.len() < padded {
        if conn.available()? {
            while let Some(byte) = conn.read_byte() {
                back.push(byte);
            }
        } else {
            thread::yield_now();
        }
    }
    back.truncate(len);
    Ok(back)
}
