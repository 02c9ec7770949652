//! # TM Server
//!
//! Telemetry is produced on several threads (the engine's sensor cycle and callbacks, and the main
//! loop) and queued on a channel. The main loop drains the channel into a publish socket, each
//! message being sent as a two part message of topic and JSON body.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::sync::{mpsc, Arc, Mutex, PoisonError};

use comms_if::{
    net::{open_socket, zmq, NetParams, SocketError, SocketOptions},
    tm::TmMsg,
};
use log::trace;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Sending half of the telemetry queue. Cheap to clone, never blocks.
#[derive(Clone)]
pub struct TmSender {
    tx: Arc<Mutex<mpsc::Sender<TmMsg>>>,
}

/// Receiving half of the telemetry queue.
pub struct TmReceiver {
    rx: mpsc::Receiver<TmMsg>,
}

/// Telemetry server
pub struct TmServer {
    socket: zmq::Socket,
    rx: TmReceiver,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TmServerError {
    #[error("Socket error: {0}")]
    SocketError(SocketError),

    #[error("Could not send telemetry: {0}")]
    SendError(zmq::Error),

    #[error("Could not serialize the telemetry: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Create a new telemetry queue.
pub fn channel() -> (TmSender, TmReceiver) {
    let (tx, rx) = mpsc::channel();
    (
        TmSender {
            tx: Arc::new(Mutex::new(tx)),
        },
        TmReceiver { rx },
    )
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TmSender {
    /// Queue a message for publishing. Messages sent after the server has gone are dropped.
    pub fn send(&self, msg: TmMsg) {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = tx.send(msg) {
            trace!("Telemetry dropped, no receiver: {:?}", e.0.topic());
        }
    }
}

impl TmReceiver {
    /// Take every message currently queued.
    pub fn drain(&self) -> Vec<TmMsg> {
        self.rx.try_iter().collect()
    }
}

impl TmServer {
    /// Create a new instance of the TM Server, binding to the telemetry endpoint.
    pub fn new(
        ctx: &zmq::Context,
        params: &NetParams,
        rx: TmReceiver,
    ) -> Result<Self, TmServerError> {
        let socket_options = SocketOptions {
            bind: true,
            linger: 1,
            send_timeout: 10,
            ..Default::default()
        };

        let socket = open_socket(ctx, zmq::PUB, &socket_options, &params.tm_endpoint)
            .map_err(TmServerError::SocketError)?;

        Ok(Self { socket, rx })
    }

    /// Publish all queued telemetry, returning the number of messages sent.
    pub fn flush(&self) -> Result<usize, TmServerError> {
        let msgs = self.rx.drain();

        for msg in msgs.iter() {
            let body = serde_json::to_string(msg).map_err(TmServerError::SerializationError)?;

            self.socket
                .send_multipart(vec![msg.topic().as_bytes(), body.as_bytes()], 0)
                .map_err(TmServerError::SendError)?;
        }

        Ok(msgs.len())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_channel_order() {
        let (tx, rx) = channel();
        let tx2 = tx.clone();

        tx.send(TmMsg::MotorsState(true));
        tx2.send(TmMsg::PathState(String::from("PLANNING_PATH")));

        assert_eq!(
            rx.drain(),
            vec![
                TmMsg::MotorsState(true),
                TmMsg::PathState(String::from("PLANNING_PATH"))
            ]
        );
        assert!(rx.drain().is_empty());
    }

    #[test]
    fn test_send_without_receiver() {
        let (tx, rx) = channel();
        drop(rx);
        tx.send(TmMsg::ShutdownConfirm);
    }
}
