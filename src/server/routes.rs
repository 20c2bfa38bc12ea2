//! Routing and handlers of the document API.
//!
//! | Method | Path                     | Handler                    |
//! |--------|--------------------------|----------------------------|
//! | POST   | `/{key}`                 | Append                     |
//! | GET    | `/{key}`                 | FetchAll (JSON array)      |
//! | PUT    | `/{key}/{name}/{value}`  | UpdateMatching             |
//! | OPTIONS| either shape             | 200, CORS preflight        |
//!
//! `dispatch` is transport-free: it takes the verb, raw URL and body bytes and
//! returns a `Reply`; the tiny_http plumbing lives in `server::mod`.

use log::debug;
use serde_json::Value;

use crate::error::StoreError;
use crate::metrics::record_bad_request;
use crate::table::DocumentTable;
use crate::util::percent_decode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Collection { key: String },
    Match { key: String, field: String, value: String },
}

impl Route {
    fn allow(&self) -> &'static str {
        match self {
            Route::Collection { .. } => "GET, OPTIONS, POST",
            Route::Match { .. } => "OPTIONS, PUT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Put,
    Options,
    Other,
}

impl Verb {
    pub fn has_body(self) -> bool {
        matches!(self, Verb::Post | Verb::Put)
    }
}

impl From<&tiny_http::Method> for Verb {
    fn from(m: &tiny_http::Method) -> Self {
        use tiny_http::Method;
        match m {
            Method::Get => Verb::Get,
            Method::Post => Verb::Post,
            Method::Put => Verb::Put,
            Method::Options => Verb::Options,
            _ => Verb::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: Vec<u8>,
    pub json: bool,
    pub allow: Option<&'static str>,
}

impl Reply {
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
            json: false,
            allow: None,
        }
    }

    /// Short text body: the standard reason phrase.
    pub fn status_text(status: u16) -> Self {
        Self {
            status,
            body: tiny_http::StatusCode(status)
                .default_reason_phrase()
                .as_bytes()
                .to_vec(),
            json: false,
            allow: None,
        }
    }

    pub fn json(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            body,
            json: true,
            allow: None,
        }
    }

    pub fn from_error(e: &StoreError) -> Self {
        let status = e.http_status();
        if status == 400 {
            record_bad_request();
        }
        Self::status_text(status)
    }
}

/// Path shape -> Route. `Ok(None)` for shapes that are not routes (404).
/// Query strings are ignored; segments are percent-decoded.
pub fn parse_route(url: &str) -> Result<Option<Route>, StoreError> {
    let path = url.split('?').next().unwrap_or("");
    let rest = match path.strip_prefix('/') {
        Some(r) => r,
        None => return Ok(None),
    };
    let raw: Vec<&str> = rest.split('/').collect();
    if raw.iter().any(|s| s.is_empty()) {
        return Ok(None);
    }
    let mut seg = Vec::with_capacity(raw.len());
    for s in raw {
        let d = percent_decode(s)
            .ok_or_else(|| StoreError::bad_request(format!("bad path segment '{}'", s)))?;
        seg.push(d);
    }
    let mut it = seg.into_iter();
    Ok(match (it.next(), it.next(), it.next(), it.next()) {
        (Some(key), None, None, None) => Some(Route::Collection { key }),
        (Some(key), Some(field), Some(value), None) => Some(Route::Match { key, field, value }),
        _ => None,
    })
}

fn decode_body(body: Option<&[u8]>) -> Result<Value, StoreError> {
    let bytes = body.unwrap_or_default();
    serde_json::from_slice::<Value>(bytes)
        .map_err(|e| StoreError::bad_request(format!("cannot decode request: {}", e)))
}

pub fn dispatch(table: &DocumentTable, verb: Verb, url: &str, body: Option<&[u8]>) -> Reply {
    let route = match parse_route(url) {
        Ok(Some(r)) => r,
        Ok(None) => return Reply::status_text(404),
        Err(e) => {
            debug!("{}", e);
            return Reply::from_error(&e);
        }
    };

    match (verb, &route) {
        (Verb::Options, r) => {
            let mut rep = Reply::empty(200);
            rep.allow = Some(r.allow());
            rep
        }
        (Verb::Get, Route::Collection { key }) => {
            let list = table.fetch_all(key);
            match serde_json::to_vec(&list) {
                Ok(b) => Reply::json(b),
                Err(_) => Reply::status_text(500),
            }
        }
        (Verb::Post, Route::Collection { key }) => match decode_body(body) {
            Ok(v) => {
                table.append(key, v);
                Reply::empty(200)
            }
            Err(e) => {
                debug!("{}", e);
                Reply::from_error(&e)
            }
        },
        (Verb::Put, Route::Match { key, field, value }) => match decode_body(body) {
            Ok(v) => {
                table.update_matching(key, field, value, v);
                Reply::empty(200)
            }
            Err(e) => {
                debug!("{}", e);
                Reply::from_error(&e)
            }
        },
        (_, r) => {
            let mut rep = Reply::status_text(405);
            rep.allow = Some(r.allow());
            rep
        }
    }
}
