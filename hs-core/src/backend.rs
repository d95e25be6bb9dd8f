//! Backend Client
//!
//! Talks to the hardware control backend over its Unix socket. The backend
//! owns the hardware components; this client only resolves a component by
//! role and reads its attributes.
//!
//! Failures are reported in three classes the callers can act on:
//! - `BackendCommunication`: no backend listening, timeouts, dropped connection
//! - `BackendIo`: socket I/O failure, or the component failed on its hardware
//! - `BackendLookup`: no component holds the requested role

use std::io::{self, BufRead, BufReader, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;

use hs_protocol::{ErrorKind, Request, RequestEnvelope, Response, ResponseData, ResponseEnvelope};
use tracing::{debug, trace};

use crate::constants::backend::{INITIAL_BUFFER_SIZE, IO_TIMEOUT};
use crate::error::{HwSelectError, Result};

const MAX_MESSAGE_SIZE: usize = hs_protocol::MAX_MESSAGE_SIZE;

/// Connection to the backend
pub struct BackendClient {
    writer: UnixStream,
    reader: BufReader<UnixStream>,
}

impl BackendClient {
    /// Connect to the backend listening on `socket_path`
    pub fn connect(socket_path: impl AsRef<Path>) -> Result<Self> {
        let socket_path = socket_path.as_ref();
        let stream = UnixStream::connect(socket_path).map_err(|e| {
            HwSelectError::BackendCommunication(format!(
                "failed to connect to backend at {}: {}",
                socket_path.display(),
                e
            ))
        })?;

        let io_err = |e: io::Error| HwSelectError::BackendIo(format!("failed to set up socket: {}", e));
        stream.set_read_timeout(Some(IO_TIMEOUT)).map_err(io_err)?;
        stream.set_write_timeout(Some(IO_TIMEOUT)).map_err(io_err)?;
        let reader_stream = stream.try_clone().map_err(io_err)?;

        debug!("Connected to backend at {}", socket_path.display());
        Ok(Self {
            writer: stream,
            reader: BufReader::new(reader_stream),
        })
    }

    /// Send a request and wait for its response
    pub fn request(&mut self, req: Request) -> Result<ResponseData> {
        req.validate()
            .map_err(|e| HwSelectError::InvalidArgument(format!("invalid backend request: {}", e)))?;

        let envelope = RequestEnvelope::new(req);
        let mut json = serde_json::to_vec(&envelope)?;
        json.push(b'\n');

        if json.len() > MAX_MESSAGE_SIZE {
            return Err(HwSelectError::MessageTooLarge {
                size: json.len(),
                max_size: MAX_MESSAGE_SIZE,
            });
        }

        trace!("Sending {} (id {})", envelope.request.type_name(), envelope.id);
        self.writer
            .write_all(&json)
            .map_err(|e| classify_io_error("send request", e))?;

        let mut response_buf: Vec<u8> = Vec::with_capacity(INITIAL_BUFFER_SIZE);
        (&mut self.reader)
            .take(MAX_MESSAGE_SIZE as u64 + 1)
            .read_until(b'\n', &mut response_buf)
            .map_err(|e| classify_io_error("read response", e))?;

        if response_buf.is_empty() {
            return Err(HwSelectError::BackendCommunication(
                "backend closed connection".to_string(),
            ));
        }

        if response_buf.len() > MAX_MESSAGE_SIZE {
            return Err(HwSelectError::MessageTooLarge {
                size: response_buf.len(),
                max_size: MAX_MESSAGE_SIZE,
            });
        }

        if response_buf.last() != Some(&b'\n') {
            return Err(HwSelectError::BackendCommunication(
                "backend closed connection mid-response".to_string(),
            ));
        }
        response_buf.pop();

        let response_envelope: ResponseEnvelope = serde_json::from_slice(&response_buf)
            .map_err(|e| HwSelectError::BackendProtocol(format!("failed to parse response: {}", e)))?;

        if response_envelope.id != envelope.id {
            return Err(HwSelectError::BackendProtocol(format!(
                "response ID mismatch: expected {}, got {}",
                envelope.id, response_envelope.id
            )));
        }

        if !response_envelope.response.answers(&envelope.request) {
            return Err(HwSelectError::BackendProtocol(format!(
                "response does not answer {}",
                envelope.request.type_name()
            )));
        }

        match response_envelope.response {
            Response::Ok(data) => Ok(data),
            Response::Error { kind, message } => Err(match kind {
                ErrorKind::Lookup => HwSelectError::BackendLookup(message),
                ErrorKind::Io => HwSelectError::BackendIo(message),
                ErrorKind::Internal => HwSelectError::BackendProtocol(message),
            }),
        }
    }

    /// Check that the backend answers
    pub fn ping(&mut self) -> Result<()> {
        self.request(Request::Ping).map(|_| ())
    }

    /// Resolve the component holding `role`.
    ///
    /// The returned handle keeps this connection; the component itself stays
    /// owned by the backend.
    pub fn lookup_component(mut self, role: &str) -> Result<ComponentHandle> {
        let data = self.request(Request::LookupComponent {
            role: role.to_string(),
        })?;
        let name = data.component.ok_or_else(|| {
            HwSelectError::BackendProtocol("lookup answered without component".to_string())
        })?;
        debug!("Role {} is held by component {}", role, name);
        Ok(ComponentHandle { client: self, name })
    }
}

/// A backend component resolved by role
pub struct ComponentHandle {
    client: BackendClient,
    name: String,
}

impl ComponentHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the current value of one of the component attributes
    pub fn read_attribute(&mut self, attribute: &str) -> Result<serde_json::Value> {
        let data = self.client.request(Request::ReadAttribute {
            component: self.name.clone(),
            attribute: attribute.to_string(),
        })?;
        data.value.ok_or_else(|| {
            HwSelectError::BackendProtocol(format!("no value for {}.{}", self.name, attribute))
        })
    }
}

fn classify_io_error(what: &str, e: io::Error) -> HwSelectError {
    match e.kind() {
        io::ErrorKind::TimedOut
        | io::ErrorKind::WouldBlock
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::UnexpectedEof => {
            HwSelectError::BackendCommunication(format!("failed to {}: {}", what, e))
        }
        _ => HwSelectError::BackendIo(format!("failed to {}: {}", what, e)),
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    //! Minimal in-process backend serving canned answers

    use super::*;
    use std::os::unix::net::UnixListener;
    use std::thread::{self, JoinHandle};

    /// Serve one client on `path`, answering every request with `handler`
    pub fn spawn<F>(path: &Path, handler: F) -> JoinHandle<Vec<Request>>
    where
        F: Fn(&Request) -> Response + Send + 'static,
    {
        let listener = UnixListener::bind(path).unwrap();
        thread::spawn(move || {
            let mut seen = Vec::new();
            let (stream, _) = listener.accept().unwrap();
            let mut writer = stream.try_clone().unwrap();
            for line in BufReader::new(stream).lines() {
                let Ok(line) = line else { break };
                let envelope: RequestEnvelope = serde_json::from_str(&line).unwrap();
                let response = ResponseEnvelope::new(envelope.id, handler(&envelope.request));
                let mut out = serde_json::to_vec(&response).unwrap();
                out.push(b'\n');
                writer.write_all(&out).unwrap();
                seen.push(envelope.request);
            }
            seen
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::os::unix::net::UnixListener;
    use tempfile::TempDir;

    fn pcu_backend(req: &Request) -> Response {
        match req {
            Request::Ping => Response::ok(),
            Request::LookupComponent { role } if role == "power-control" => {
                Response::Ok(ResponseData::component("pcu"))
            }
            Request::LookupComponent { role } => {
                Response::error(ErrorKind::Lookup, format!("no component with role {}", role))
            }
            Request::ReadAttribute { attribute, .. } if attribute == "memory_ids" => {
                Response::Ok(ResponseData::value(json!(["238abe69010000c8"])))
            }
            Request::ReadAttribute { .. } => Response::error(ErrorKind::Io, "bus error"),
        }
    }

    #[test]
    fn test_missing_socket_is_communication_error() {
        let dir = TempDir::new().unwrap();
        let err = BackendClient::connect(dir.path().join("absent.sock")).err().unwrap();
        assert!(matches!(err, HwSelectError::BackendCommunication(_)));
        assert!(err.is_backend_unreachable());
    }

    #[test]
    fn test_lookup_and_read_attribute() {
        let dir = TempDir::new().unwrap();
        let sock = dir.path().join("backend.sock");
        let server = test_server::spawn(&sock, pcu_backend);

        let mut client = BackendClient::connect(&sock).unwrap();
        client.ping().unwrap();
        let mut pcu = client.lookup_component("power-control").unwrap();
        assert_eq!(pcu.name(), "pcu");
        assert_eq!(pcu.read_attribute("memory_ids").unwrap(), json!(["238abe69010000c8"]));
        drop(pcu);

        let seen = server.join().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(
            seen[2],
            Request::ReadAttribute {
                component: "pcu".into(),
                attribute: "memory_ids".into()
            }
        );
    }

    #[test]
    fn test_backend_error_kinds() {
        let dir = TempDir::new().unwrap();
        let sock = dir.path().join("backend.sock");
        let server = test_server::spawn(&sock, pcu_backend);

        let client = BackendClient::connect(&sock).unwrap();
        let err = client.lookup_component("light").err().unwrap();
        assert!(matches!(err, HwSelectError::BackendLookup(_)));
        server.join().unwrap();

        let sock = dir.path().join("backend2.sock");
        let server = test_server::spawn(&sock, pcu_backend);
        let mut pcu = BackendClient::connect(&sock)
            .unwrap()
            .lookup_component("power-control")
            .unwrap();
        let err = pcu.read_attribute("power").unwrap_err();
        assert!(matches!(err, HwSelectError::BackendIo(_)));
        drop(pcu);
        server.join().unwrap();
    }

    #[test]
    fn test_garbage_reply_is_protocol_error() {
        let dir = TempDir::new().unwrap();
        let sock = dir.path().join("backend.sock");
        let listener = UnixListener::bind(&sock).unwrap();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut line = String::new();
            BufReader::new(stream.try_clone().unwrap()).read_line(&mut line).unwrap();
            stream.write_all(b"not json\n").unwrap();
        });

        let mut client = BackendClient::connect(&sock).unwrap();
        let err = client.ping().unwrap_err();
        assert!(matches!(err, HwSelectError::BackendProtocol(_)));
        assert!(!err.is_backend_unreachable());
        server.join().unwrap();
    }

    #[test]
    fn test_closed_connection_is_communication_error() {
        let dir = TempDir::new().unwrap();
        let sock = dir.path().join("backend.sock");
        let listener = UnixListener::bind(&sock).unwrap();
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let mut client = BackendClient::connect(&sock).unwrap();
        server.join().unwrap();
        let err = client.ping().unwrap_err();
        assert!(err.is_backend_unreachable(), "unexpected error {:?}", err);
    }
}
