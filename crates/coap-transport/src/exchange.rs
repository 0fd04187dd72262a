//! Request/response exchange types.

use std::fmt;

use coap_protocol::TransportMode;
use serde::{Deserialize, Serialize};

/// Request method codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            other => Err(format!("unknown method: {other}")),
        }
    }
}

/// Response codes used by the resource handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCode {
    /// 2.04
    Changed,
    /// 2.05
    Content,
    /// 4.01
    Unauthorized,
    /// 4.04
    NotFound,
    /// 4.05
    MethodNotAllowed,
    /// 5.03
    ServiceUnavailable,
}

impl ResponseCode {
    /// `(class, detail)` pair, e.g. `(2, 5)` for Content.
    pub fn code(&self) -> (u8, u8) {
        match self {
            Self::Changed => (2, 4),
            Self::Content => (2, 5),
            Self::Unauthorized => (4, 1),
            Self::NotFound => (4, 4),
            Self::MethodNotAllowed => (4, 5),
            Self::ServiceUnavailable => (5, 3),
        }
    }

    pub fn is_success(&self) -> bool {
        self.code().0 == 2
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (class, detail) = self.code();
        write!(f, "{class}.{detail:02}")
    }
}

/// An inbound request as delivered by the protocol listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Resource path, segments separated by `/`, without a leading slash.
    pub path: String,
    /// Request body as text; `None` when the request carried no payload.
    pub payload: Option<String>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>, payload: Option<String>) -> Self {
        Self {
            method,
            path: path.into(),
            payload,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path, None)
    }

    pub fn post(path: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::new(Method::Post, path, Some(payload.into()))
    }
}

/// The response handed back to the protocol listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: ResponseCode,
    pub payload: Option<String>,
}

impl Response {
    pub fn new(code: ResponseCode) -> Self {
        Self {
            code,
            payload: None,
        }
    }

    pub fn with_payload(code: ResponseCode, payload: impl Into<String>) -> Self {
        Self {
            code,
            payload: Some(payload.into()),
        }
    }
}

/// A request in flight together with the listener's acknowledgement hook.
///
/// Handlers call [`Exchange::accept`] to acknowledge the request at the
/// protocol level before doing slow work; the final [`Response`] is then
/// sent as a separate response.
pub struct Exchange {
    request: Request,
    on_accept: Option<Box<dyn FnOnce() + Send>>,
    accepted: bool,
}

impl Exchange {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            on_accept: None,
            accepted: false,
        }
    }

    pub fn with_acceptor(request: Request, on_accept: impl FnOnce() + Send + 'static) -> Self {
        Self {
            request,
            on_accept: Some(Box::new(on_accept)),
            accepted: false,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Acknowledge the request. Only the first call reaches the listener.
    pub fn accept(&mut self) {
        if let Some(on_accept) = self.on_accept.take() {
            on_accept();
        }
        self.accepted = true;
    }

    pub fn is_accepted(&self) -> bool {
        self.accepted
    }

    pub fn into_request(self) -> Request {
        self.request
    }
}

impl fmt::Debug for Exchange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("request", &self.request)
            .field("accepted", &self.accepted)
            .finish()
    }
}

/// Implemented by the resource server; the protocol listener calls it for
/// every request received on one of its endpoints.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle_request(&self, transport: TransportMode, exchange: Exchange) -> Response;
}
