//! # Telecommand Server

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    net::{open_socket, zmq, NetParams, SocketError, SocketOptions},
    tc::{Tc, TcParseError, TcResponse},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Telecommand server, answering requests from command clients.
pub struct TcServer {
    socket: zmq::Socket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TcServerError {
    #[error("Socket error: {0}")]
    SocketError(SocketError),

    #[error("Could not send the response: {0}")]
    SendError(zmq::Error),

    #[error("Could not receive a message from the client: {0}")]
    RecvError(zmq::Error),

    #[error("Could not serialize the response: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not parse the received telecommand: {0}")]
    TcParseError(TcParseError),

    #[error("The client sent a message which was not valid UTF-8")]
    NonUtf8Request,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TcServer {
    /// Create a new instance of the TC Server, binding to the telecommand endpoint.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, TcServerError> {
        let socket_options = SocketOptions {
            bind: true,
            linger: 1,
            recv_timeout: 10,
            send_timeout: 10,
            ..Default::default()
        };

        let socket = open_socket(ctx, zmq::REP, &socket_options, &params.tc_endpoint)
            .map_err(TcServerError::SocketError)?;

        Ok(Self { socket })
    }

    /// Receive a single TC from a client.
    ///
    /// Call in a loop until `Ok(None)` is returned, indicating that there are no more pending TCs
    /// right now.
    ///
    /// After receiving a valid TC a response must be sent using `.send_response()` before
    /// attempting to receive another TC. If the TC cannot be parsed the `Invalid` response is sent
    /// by this function.
    pub fn receive_tc(&self) -> Result<Option<Tc>, TcServerError> {
        let tc_str = match self.socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => {
                self.send_response(TcResponse::Invalid)?;
                return Err(TcServerError::NonUtf8Request);
            }
            Err(zmq::Error::EAGAIN) => return Ok(None),
            Err(e) => return Err(TcServerError::RecvError(e)),
        };

        match Tc::from_json(&tc_str) {
            Ok(tc) => Ok(Some(tc)),
            Err(e) => {
                self.send_response(TcResponse::Invalid)?;
                Err(TcServerError::TcParseError(e))
            }
        }
    }

    /// Send the response to the last received TC.
    pub fn send_response(&self, response: TcResponse) -> Result<(), TcServerError> {
        let response_str =
            serde_json::to_string(&response).map_err(TcServerError::SerializationError)?;

        self.socket
            .send(&response_str, 0)
            .map_err(TcServerError::SendError)
    }
}
