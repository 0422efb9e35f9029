//! Per-connection session loop (spec.md §4.3, §4.5): banner, then a
//! read/dispatch/write cycle until the client quits, the connection goes
//! idle past `deadman-time`, or `-holdconnect` is off and one response has
//! gone out.

mod directives;
mod eval;

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::Instrument;

use crate::context::ServerContext;
use crate::model::SessionState;
use crate::referral::{ReferralEngine, ReferralLookup};
use crate::wire::query::ParseOptions;
use crate::wire::{banner, directive, query, ErrorCode, ResponseLine};

pub use eval::{Hit, resolve_records};

/// One client connection's mutable state and split I/O halves.
pub struct Session {
    ctx: Arc<ServerContext>,
    peer: std::net::SocketAddr,
    state: SessionState,
    session_id: u64,
}

impl Session {
    fn new(ctx: Arc<ServerContext>, peer: std::net::SocketAddr) -> Self {
        let session_id = ctx.next_session_id();
        let hit_limit = ctx.config().main.max_hits_default;
        Session { ctx, peer, state: SessionState::new(hit_limit), session_id }
    }

    /// Drives one connection to completion: banner, read/dispatch loop,
    /// cleanup. Never panics on client input; malformed lines become
    /// `%error` responses, not connection drops.
    pub async fn run(ctx: Arc<ServerContext>, socket: TcpStream, peer: std::net::SocketAddr) {
        let session = Session::new(ctx, peer);
        let session_id = session.session_id;
        session
            .run_inner(socket)
            .instrument(tracing::info_span!("session", id = session_id, peer = %peer))
            .await;
    }

    async fn run_inner(mut self, socket: TcpStream) {
        let (read_half, mut write_half) = tokio::io::split(socket);
        let mut reader = BufReader::new(read_half);

        let banner_line = banner::build(
            &self.ctx.config().directives.enabled_capabilities(),
            &self.ctx.config().main.hostname,
            self.ctx.vendor(),
        );
        if self.write_raw(&mut write_half, &banner_line).await.is_err() {
            return;
        }

        let deadman = Duration::from_secs(self.ctx.config().main.deadman_seconds as u64);
        loop {
            let raw = match read_line_with_deadman(&mut reader, deadman).await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(_) => {
                    let _ = self.write_response(&mut write_half, &ResponseLine::error(ErrorCode::IdleTimeExceeded)).await;
                    break;
                }
            };
            let line = directive::strip_control_chars(&raw);
            if line.trim().is_empty() {
                continue;
            }

            if self.state.in_spool() {
                if directive::is_directive(&line) && directive::parse(&line).name == "register" {
                    let responses = self.dispatch_directive(directive::parse(&line)).await;
                    let should_quit = self.write_responses(&mut write_half, &responses).await;
                    if should_quit {
                        break;
                    }
                } else {
                    self.append_to_spool(&line);
                }
                continue;
            }

            if directive::is_directive(&line) {
                let d = directive::parse(&line);
                let quit_requested = d.name == "quit";
                let responses = self.dispatch_directive(d).await;
                let should_stop = self.write_responses(&mut write_half, &responses).await;
                if quit_requested || should_stop {
                    break;
                }
            } else {
                let responses = self.handle_query(&line).await;
                let should_stop = self.write_responses(&mut write_half, &responses).await;
                if should_stop || !self.state.hold_connect {
                    break;
                }
            }
        }

        let _ = write_half.shutdown().await;
    }

    fn parse_options(&self) -> ParseOptions {
        let cfg = &self.ctx.config().main;
        ParseOptions { allow_wildcard: cfg.query_allow_wildcard, allow_substring: cfg.query_allow_substring, max_terms: 32 }
    }

    async fn handle_query(&mut self, line: &str) -> Vec<ResponseLine> {
        let parsed = match query::parse(line, &self.parse_options()) {
            Ok(q) => q,
            Err(e) => return vec![ResponseLine::error(ErrorCode::from(e))],
        };

        let store = self.ctx.store().lock().await;
        let outcome = eval::evaluate(&store, &parsed, self.state.restricted_auth_area.as_deref(), self.state.hit_limit);

        match outcome {
            eval::EvalOutcome::LimitExceeded => vec![ResponseLine::error(ErrorCode::ExceededMaxObjectsLimit)],
            eval::EvalOutcome::Hits(hits) if hits.is_empty() => self.handle_no_hits(&store, &parsed).await,
            eval::EvalOutcome::Hits(hits) => {
                let records = eval::resolve_records(&store, &hits);
                let mut lines = Vec::new();
                for record in &records {
                    let Some(area) = store.area(&record.area_name) else { continue };
                    let Some(class) = area.class(&record.class_name) else { continue };
                    for rendered in crate::wire::dump::render(record, class, self.state.display, &[]) {
                        lines.push(ResponseLine::data(rendered));
                    }
                }
                lines.push(ResponseLine::Ok);
                lines
            }
        }
    }

    /// When a query comes up empty, tries the referral engine for every
    /// attribute term before reporting "no objects found" (spec.md §4.4).
    async fn handle_no_hits(
        &self,
        store: &crate::store::RecordStore,
        query: &crate::wire::Query,
    ) -> Vec<ResponseLine> {
        if self.ctx.config().main.skip_referral_search {
            return vec![ResponseLine::error(ErrorCode::NoObjectsFound)];
        }

        let engine = ReferralEngine::new(store.areas(), &self.ctx.config().punt_referrals, self.ctx.is_root());
        let mut referrals = Vec::new();
        for branch in &query.expr.branches {
            for term in &branch.terms {
                if let Some(key) = primary_term_key(term) {
                    referrals.extend(engine.resolve(&key, store));
                }
            }
        }

        if referrals.is_empty() {
            return vec![ResponseLine::error(ErrorCode::NoObjectsFound)];
        }
        let mut lines: Vec<ResponseLine> =
            referrals.iter().map(|r| ResponseLine::tagged("referral", r.url.clone())).collect();
        lines.push(ResponseLine::Ok);
        lines
    }

    fn append_to_spool(&self, line: &str) {
        if let crate::model::ProtocolPhase::Spool { path, .. } = &self.state.phase {
            let spool = crate::register::Spool::at(path.clone());
            let _ = spool.append_line(line);
        }
    }

    /// Writes every line in `responses`, returning true if any carried a
    /// fatal/unrecoverable error that should end the connection.
    async fn write_responses<W: AsyncWriteExt + Unpin>(&self, writer: &mut W, responses: &[ResponseLine]) -> bool {
        for response in responses {
            if self.write_response(writer, response).await.is_err() {
                return true;
            }
            if matches!(response, ResponseLine::Error { code: ErrorCode::UnrecoverableError, .. }) {
                return true;
            }
        }
        false
    }

    async fn write_response<W: AsyncWriteExt + Unpin>(&self, writer: &mut W, response: &ResponseLine) -> std::io::Result<()> {
        self.write_raw(writer, &response.render()).await
    }

    async fn write_raw<W: AsyncWriteExt + Unpin>(&self, writer: &mut W, line: &str) -> std::io::Result<()> {
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await
    }
}

/// The hierarchical key a referral lookup is keyed on for one query term:
/// the value of its attribute, restricted to attributes the model marks
/// `hierarchical` makes little sense to check here (the session has no
/// class in hand yet), so this takes the first term carrying a plain value
/// a `HierKey` can parse — the representative key spec.md §4.4 calls for
/// when a query names no hierarchical attribute explicitly.
fn primary_term_key(term: &crate::wire::query::Term) -> Option<crate::referral::key::HierKey> {
    if term.value.contains('*') {
        return None;
    }
    Some(crate::referral::key::HierKey::parse(&term.value))
}

async fn read_line_with_deadman<R: AsyncBufReadExt + Unpin>(
    reader: &mut R,
    deadman: Duration,
) -> Result<Option<String>, tokio::time::error::Elapsed> {
    let mut buf = String::new();
    let result = tokio::time::timeout(deadman, reader.read_line(&mut buf)).await?;
    match result {
        Ok(0) => Ok(None),
        Ok(_) => Ok(Some(buf.trim_end_matches(['\r', '\n']).to_string())),
        Err(_) => Ok(None),
    }
}
