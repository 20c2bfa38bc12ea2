//! HTTP front of the document table (tiny_http).
//!
//! A fixed pool of worker threads shares one `tiny_http::Server`; each worker
//! pulls a request, reads the body (bounded), dispatches and responds.
//! Every response carries permissive CORS headers, mirroring the request's
//! `Access-Control-Request-Method`.

pub mod exporter;
pub mod routes;

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use std::io::Read;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tiny_http::{Header, Request, Response, Server};

use crate::error::StoreError;
use crate::table::DocumentTable;

use routes::{dispatch, Reply, Verb};

/// What request handlers need.
pub struct RequestContext {
    pub table: Arc<DocumentTable>,
    pub max_body_bytes: u64,
}

pub struct HttpServer {
    server: Arc<Server>,
    addr: SocketAddr,
    stopping: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl HttpServer {
    pub fn bind(addr: &str, ctx: Arc<RequestContext>, workers: usize) -> Result<Self> {
        let server = Server::http(addr).map_err(|e| anyhow!("bind http at {}: {}", addr, e))?;
        let local = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| anyhow!("http listener at {} is not an IP socket", addr))?;
        let server = Arc::new(server);
        let stopping = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(workers.max(1));
        for i in 0..workers.max(1) {
            let server = Arc::clone(&server);
            let ctx = Arc::clone(&ctx);
            let stopping = Arc::clone(&stopping);
            let h = thread::Builder::new()
                .name(format!("cloudbase-http-{}", i))
                .spawn(move || worker_loop(&server, &ctx, &stopping))
                .context("spawn http worker")?;
            handles.push(h);
        }

        info!("cloudbase listening on {} ({} worker(s))", local, handles.len());
        Ok(Self {
            server,
            addr: local,
            stopping,
            workers: handles,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    fn join(&mut self) {
        for h in self.workers.drain(..) {
            let _ = h.join();
        }
    }

    pub fn stop(&mut self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        // каждый unblock будит ровно один recv()
        for _ in 0..self.workers.len() {
            self.server.unblock();
        }
        self.join();
        debug!("http: stopped {}", self.addr);
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_loop(server: &Server, ctx: &RequestContext, stopping: &AtomicBool) {
    loop {
        if stopping.load(Ordering::SeqCst) {
            break;
        }
        let rq = match server.recv() {
            Ok(rq) => rq,
            Err(e) => {
                if stopping.load(Ordering::SeqCst) {
                    break;
                }
                warn!("http recv error: {}", e);
                continue;
            }
        };
        handle_request(rq, ctx);
    }
}

fn header_value(rq: &Request, name: &'static str) -> Option<String> {
    rq.headers()
        .iter()
        .find(|h| h.field.equiv(name))
        .map(|h| h.value.as_str().to_string())
}

fn read_body(rq: &mut Request, limit: u64) -> Result<Vec<u8>, StoreError> {
    if let Some(n) = rq.body_length() {
        if n as u64 > limit {
            return Err(StoreError::too_large(limit));
        }
    }
    let mut buf = Vec::new();
    rq.as_reader()
        .take(limit.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(|e| StoreError::bad_request(format!("read body: {}", e)))?;
    if buf.len() as u64 > limit {
        return Err(StoreError::too_large(limit));
    }
    Ok(buf)
}

fn handle_request(mut rq: Request, ctx: &RequestContext) {
    let verb = Verb::from(rq.method());
    let method = rq.method().as_str().to_string();
    let url = rq.url().to_string();
    let requested_method = header_value(&rq, "Access-Control-Request-Method");

    let reply = if verb.has_body() {
        match read_body(&mut rq, ctx.max_body_bytes) {
            Ok(body) => dispatch(&ctx.table, verb, &url, Some(&body)),
            Err(e) => {
                debug!("{} {}: {}", method, url, e);
                Reply::from_error(&e)
            }
        }
    } else {
        dispatch(&ctx.table, verb, &url, None)
    };

    debug!("{} {} -> {}", method, url, reply.status);
    let resp = build_response(reply, requested_method.as_deref());
    if let Err(e) = rq.respond(resp) {
        debug!("respond {} {}: {}", method, url, e);
    }
}

fn push_header(headers: &mut Vec<Header>, name: &str, value: &str) {
    if let Ok(h) = Header::from_bytes(name.as_bytes(), value.as_bytes()) {
        headers.push(h);
    }
}

fn build_response(reply: Reply, requested_method: Option<&str>) -> Response<std::io::Cursor<Vec<u8>>> {
    let mut headers = Vec::new();
    push_header(&mut headers, "Access-Control-Allow-Origin", "*");
    if let Some(m) = requested_method {
        push_header(&mut headers, "Access-Control-Allow-Methods", m);
    }
    if let Some(allow) = reply.allow {
        push_header(&mut headers, "Allow", allow);
    }
    if reply.json {
        push_header(&mut headers, "Content-Type", "application/json");
    } else if !reply.body.is_empty() {
        push_header(&mut headers, "Content-Type", "text/plain; charset=utf-8");
    }

    let mut resp = Response::from_data(reply.body).with_status_code(reply.status);
    for h in headers {
        resp.add_header(h);
    }
    resp
}
