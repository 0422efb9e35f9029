//! Directive dispatch (spec.md §4.5): one handler per built-in directive,
//! plus the `X-` extended-program hook and the registration commit
//! sequence.

use crate::model::{DisplayMode, ProtocolPhase, RegisterAction};
use crate::register::{self, RegistrationRequest, Spool};
use crate::wire::directive::Directive;
use crate::wire::{banner, ErrorCode, ResponseLine};
use crate::xfer;

use super::Session;

impl Session {
    pub(super) async fn dispatch_directive(&mut self, d: Directive) -> Vec<ResponseLine> {
        if self.ctx.config().directives.is_extended(&d.name) {
            return self.dispatch_extended(&d).await;
        }

        let Some(entry) = self.ctx.config().directives.get(&d.name) else {
            return vec![ResponseLine::error(ErrorCode::DirectiveNotAvailable)];
        };
        if entry.disabled {
            return vec![ResponseLine::error(ErrorCode::NotAuthorizedForDirective)];
        }

        match d.name.as_str() {
            "rwhois" => self.handle_rwhois(&d.args),
            "class" => self.handle_class(&d.args),
            "directive" => self.handle_directive_list(),
            "display" => self.handle_display(&d.args),
            "forward" => self.handle_forward(&d.args),
            "holdconnect" => self.handle_holdconnect(&d.args),
            "limit" => self.handle_limit(&d.args),
            "notify" => self.handle_notify(&d.args),
            "quit" => vec![ResponseLine::Ok],
            "register" => self.handle_register(&d.args).await,
            "schema" => self.handle_schema(&d.args).await,
            "security" => self.handle_security(&d.args),
            "soa" => self.handle_soa(&d.args).await,
            "status" => self.handle_status().await,
            "xfer" => self.handle_xfer(&d.args).await,
            _ => vec![ResponseLine::error(ErrorCode::DirectiveNotAvailable)],
        }
    }

    /// Hands the directive's raw argument line to the bound `X-` program
    /// unchanged; anything it writes to stdout is relayed line-for-line.
    /// Running an arbitrary extended program's own network I/O is out of
    /// scope; only the invoke-and-relay-stdout contract is implemented.
    async fn dispatch_extended(&mut self, d: &Directive) -> Vec<ResponseLine> {
        let Some(program) = self.ctx.config().directives.extended_program(&d.name).map(|p| p.to_path_buf()) else {
            return vec![ResponseLine::error(ErrorCode::DirectiveNotAvailable)];
        };

        let output = tokio::process::Command::new(&program).args(&d.args).output().await;
        match output {
            Ok(out) if out.status.success() => {
                let mut lines: Vec<ResponseLine> = String::from_utf8_lossy(&out.stdout)
                    .lines()
                    .map(|l| ResponseLine::data(l.to_string()))
                    .collect();
                lines.push(ResponseLine::Ok);
                lines
            }
            _ => vec![ResponseLine::error(ErrorCode::UnrecoverableError)],
        }
    }

    /// `-rwhois V-<ver> [vendor]`: the client's version handshake
    /// (spec.md §4.5, `original_source/rwhoisd/server/rwhois_directive.c`).
    /// Rejects a mismatched protocol version with `300`, records the
    /// client's vendor string for the registration pipeline's
    /// `CLIENT_VENDOR` env var, and re-emits the welcome banner.
    fn handle_rwhois(&mut self, args: &[String]) -> Vec<ResponseLine> {
        let Some(version) = args.first().and_then(|v| v.strip_prefix("V-")) else {
            return vec![ResponseLine::error(ErrorCode::InvalidDirectiveSyntax)];
        };
        if version != banner::PROTOCOL_VERSION {
            return vec![ResponseLine::error(ErrorCode::NotCompatibleWithVersion)];
        }
        let vendor = args[1..].join(" ");
        if !vendor.is_empty() {
            self.state.client_vendor = Some(vendor);
        }

        let banner_line = banner::build(
            &self.ctx.config().directives.enabled_capabilities(),
            &self.ctx.config().main.hostname,
            self.ctx.vendor(),
        );
        vec![ResponseLine::data(banner_line), ResponseLine::Ok]
    }

    /// `-class [auth-area]`: restricts (or, with no argument, clears the
    /// restriction on) the authority area subsequent queries search.
    fn handle_class(&mut self, args: &[String]) -> Vec<ResponseLine> {
        match args.first() {
            None => {
                self.state.restricted_auth_area = None;
                vec![ResponseLine::Ok]
            }
            Some(area) => {
                if self.ctx.config().areas.contains_key(area) {
                    self.state.restricted_auth_area = Some(area.clone());
                    vec![ResponseLine::Ok]
                } else {
                    vec![ResponseLine::error(ErrorCode::InvalidAuthorityArea)]
                }
            }
        }
    }

    fn handle_directive_list(&self) -> Vec<ResponseLine> {
        let mut lines: Vec<ResponseLine> = self
            .ctx
            .config()
            .directives
            .iter()
            .map(|entry| ResponseLine::data(format!("directive:{}:{}", entry.name, if entry.disabled { "off" } else { "on" })))
            .collect();
        lines.push(ResponseLine::Ok);
        lines
    }

    /// `-display dump|full`.
    fn handle_display(&mut self, args: &[String]) -> Vec<ResponseLine> {
        match args.first().map(String::as_str) {
            Some("dump") => {
                self.state.display = DisplayMode::Dump;
                vec![ResponseLine::Ok]
            }
            Some("full") => {
                self.state.display = DisplayMode::Full;
                vec![ResponseLine::Ok]
            }
            _ => vec![ResponseLine::error(ErrorCode::InvalidDisplayFormat)],
        }
    }

    /// `-forward on|off`: toggles whether the session asks the referral
    /// engine to chase link referrals itself. The chase itself (opening an
    /// upstream connection and merging its results) is out of scope; this
    /// only flips the flag the no-hits path could consult.
    fn handle_forward(&mut self, args: &[String]) -> Vec<ResponseLine> {
        match args.first().map(String::as_str) {
            Some("on") => {
                self.state.forward = true;
                vec![ResponseLine::Ok]
            }
            Some("off") => {
                self.state.forward = false;
                vec![ResponseLine::Ok]
            }
            _ => vec![ResponseLine::error(ErrorCode::InvalidDirectiveSyntax)],
        }
    }

    fn handle_holdconnect(&mut self, args: &[String]) -> Vec<ResponseLine> {
        match args.first().map(String::as_str) {
            Some("on") => {
                self.state.hold_connect = true;
                vec![ResponseLine::Ok]
            }
            Some("off") => {
                self.state.hold_connect = false;
                vec![ResponseLine::Ok]
            }
            _ => vec![ResponseLine::error(ErrorCode::InvalidDirectiveSyntax)],
        }
    }

    /// `-limit N`, bounded by `max-hits-ceiling` (0 meaning uncapped).
    fn handle_limit(&mut self, args: &[String]) -> Vec<ResponseLine> {
        let Some(n) = args.first().and_then(|a| a.parse::<u32>().ok()) else {
            return vec![ResponseLine::error(ErrorCode::InvalidLimit)];
        };
        let ceiling = self.ctx.config().main.max_hits_ceiling;
        if ceiling != 0 && n > ceiling {
            return vec![ResponseLine::error(ErrorCode::InvalidLimit)];
        }
        self.state.hit_limit = n;
        vec![ResponseLine::Ok]
    }

    fn handle_notify(&mut self, args: &[String]) -> Vec<ResponseLine> {
        match args.first() {
            Some(email) => {
                self.state.notify_email = Some(email.clone());
                vec![ResponseLine::Ok]
            }
            None => vec![ResponseLine::error(ErrorCode::InvalidDirectiveSyntax)],
        }
    }

    /// Only the `none` security method is recognised; real authentication
    /// and encryption schemes are out of scope.
    fn handle_security(&mut self, args: &[String]) -> Vec<ResponseLine> {
        match args.first().map(String::as_str) {
            Some("none") => {
                self.state.security_negotiated = true;
                vec![ResponseLine::Ok]
            }
            _ => vec![ResponseLine::error(ErrorCode::InvalidSecurityMethod)],
        }
    }

    /// `-register on <add|mod|del> <class> <email>` opens a spool;
    /// `-register off` parses and commits it; `-register abort` discards
    /// it without committing.
    async fn handle_register(&mut self, args: &[String]) -> Vec<ResponseLine> {
        match args.first().map(String::as_str) {
            Some("on") => self.open_spool(&args[1..]),
            Some("off") => self.commit_registration().await,
            Some("abort") => self.abort_spool(),
            _ => vec![ResponseLine::error(ErrorCode::InvalidDirectiveSyntax)],
        }
    }

    fn open_spool(&mut self, args: &[String]) -> Vec<ResponseLine> {
        if self.state.in_spool() {
            return vec![ResponseLine::error(ErrorCode::InvalidDirectiveSyntax)];
        }
        let (Some(action_str), Some(class), Some(email)) = (args.first(), args.get(1), args.get(2)) else {
            return vec![ResponseLine::error(ErrorCode::InvalidDirectiveSyntax)];
        };
        let Some(action) = RegisterAction::parse(action_str) else {
            return vec![ResponseLine::error(ErrorCode::InvalidDirectiveSyntax)];
        };
        let Some(auth_area) = self.state.restricted_auth_area.clone() else {
            return vec![ResponseLine::error(ErrorCode::InvalidAuthorityArea)];
        };
        if self.ctx.config().areas.get(&auth_area).and_then(|a| a.class(class)).is_none() {
            return vec![ResponseLine::error(ErrorCode::InvalidClass)];
        }

        let spool_dir = self.ctx.config().main.root_dir.join("spool");
        let spool = match Spool::create(&spool_dir, self.session_id) {
            Ok(s) => s,
            Err(_) => return vec![ResponseLine::error(ErrorCode::UnrecoverableError)],
        };
        self.state.phase = ProtocolPhase::Spool {
            path: spool.path().to_path_buf(),
            auth_area,
            class: class.clone(),
            action,
            email: email.clone(),
        };
        vec![ResponseLine::Ok]
    }

    fn abort_spool(&mut self) -> Vec<ResponseLine> {
        if let ProtocolPhase::Spool { path, .. } = std::mem::take(&mut self.state.phase) {
            let _ = Spool::at(path).remove();
        }
        vec![ResponseLine::Ok]
    }

    /// The commit sequence spec.md §4.6 lays out: stamp the timestamp,
    /// optionally run the class's external parse program, check primary-key
    /// uniqueness, write to the store, then bump the area's SOA serial
    /// under its placeholder lock.
    async fn commit_registration(&mut self) -> Vec<ResponseLine> {
        let ProtocolPhase::Spool { path, auth_area, class, action, email } = std::mem::take(&mut self.state.phase)
        else {
            return vec![ResponseLine::error(ErrorCode::InvalidDirectiveSyntax)];
        };
        let spool = Spool::at(path);

        let lines = match spool.read_lines() {
            Ok(lines) => lines,
            Err(_) => return vec![ResponseLine::error(ErrorCode::UnrecoverableError)],
        };
        let mut request = match register::parse_spool(&lines, action) {
            Ok(r) => r,
            Err(_) => {
                let _ = spool.remove();
                return vec![ResponseLine::error(ErrorCode::InvalidAttributeSyntax)];
            }
        };

        let now = chrono::Utc::now();
        self.stamp_updated(&mut request, now);

        let parse_program =
            self.ctx.config().areas.get(&auth_area).and_then(|a| a.class(&class)).and_then(|c| c.parse_program().map(|p| p.to_path_buf()));
        if let Some(program) = parse_program {
            let bin_path = self.ctx.config().main.bin_path.display().to_string();
            let vendor = self.state.client_vendor.clone().unwrap_or_else(|| self.ctx.vendor().to_string());
            match register::run_parse_program(&program, spool.path(), &bin_path, action, &email, &vendor) {
                Ok(register::ParseOutcome::Ok) => {}
                Ok(register::ParseOutcome::Deferred) => {
                    let _ = spool.remove();
                    return vec![ResponseLine::error(ErrorCode::RegistrationDeferred)];
                }
                _ => {
                    let _ = spool.remove();
                    return vec![ResponseLine::error(ErrorCode::UnrecoverableError)];
                }
            }
            // The program may rewrite the spool file in place; re-read it.
            if let Ok(rewritten) = spool.read_lines() {
                if let Ok(reparsed) = register::parse_spool(&rewritten, action) {
                    request = reparsed;
                }
            }
        }

        let expect_existing = match &request {
            RegistrationRequest::Mod { old_id, old_updated, .. } => Some((old_id.as_str(), old_updated.as_deref())),
            _ => None,
        };
        let fields = match &request {
            RegistrationRequest::Add { fields } | RegistrationRequest::Mod { fields, .. } => fields.clone(),
            RegistrationRequest::Del { .. } => Vec::new(),
        };
        if !fields.is_empty() {
            let store = self.ctx.store().lock().await;
            if register::check_primary_key_uniqueness(&store, &auth_area, &class, &fields, expect_existing).is_err() {
                drop(store);
                let _ = spool.remove();
                return vec![ResponseLine::error(ErrorCode::PrimaryKeyNotUnique)];
            }
        }

        {
            let mut store = self.ctx.store().lock().await;
            if register::commit_to_store(&mut store, &auth_area, &class, request).await.is_err() {
                drop(store);
                let _ = spool.remove();
                return vec![ResponseLine::error(ErrorCode::UnrecoverableError)];
            }
        }

        let _ = spool.remove();
        self.bump_area_serial(&auth_area, now).await;
        vec![ResponseLine::Ok]
    }

    /// Step 1 of the commit sequence: stamps an `Updated` field onto the
    /// request's replacement fields with the current protocol timestamp.
    fn stamp_updated(&self, request: &mut RegistrationRequest, now: chrono::DateTime<chrono::Utc>) {
        let stamp = register::format_timestamp(now);
        let fields = match request {
            RegistrationRequest::Add { fields } => fields,
            RegistrationRequest::Mod { fields, .. } => fields,
            RegistrationRequest::Del { .. } => return,
        };
        if let Some(field) = fields.iter_mut().find(|f| f.name.eq_ignore_ascii_case("Updated")) {
            field.value = stamp;
        } else {
            fields.push(crate::model::AttrValue { name: "Updated".to_string(), value: stamp });
        }
    }

    /// Step 4 of the commit sequence: bumps the area's SOA serial under its
    /// placeholder lock and writes the new value back to the SOA file.
    async fn bump_area_serial(&self, auth_area: &str, now: chrono::DateTime<chrono::Utc>) {
        let Some(area) = self.ctx.config().areas.get(auth_area) else { return };
        let soa_path = area.soa_file().clone();
        let Ok(_lock) = crate::store::lock::PlaceholderLock::acquire(&soa_path, 20, std::time::Duration::from_millis(50)).await
        else {
            return;
        };
        let new_serial = register::bump_serial(&area.soa().serial_number, now);
        let _ = update_soa_serial_file(&soa_path, &new_serial);
    }

    /// `-schema [class]`: lists the attribute definitions for one class (or
    /// every class in the restricted area, or every area's schema with no
    /// restriction and no argument).
    async fn handle_schema(&self, args: &[String]) -> Vec<ResponseLine> {
        let areas = self.schema_search_areas();
        let mut lines = Vec::new();
        for area in &areas {
            for class in area.schema() {
                if let Some(name) = args.first() {
                    if !class.matches_name(name) {
                        continue;
                    }
                }
                for attr in class.attributes() {
                    lines.push(ResponseLine::data(format!(
                        "schema:{}:{}:{}",
                        class.name(),
                        attr.name(),
                        attr.description()
                    )));
                }
            }
        }
        lines.push(ResponseLine::Ok);
        lines
    }

    fn schema_search_areas(&self) -> Vec<&crate::model::AuthorityArea> {
        match &self.state.restricted_auth_area {
            Some(name) => self.ctx.config().areas.get(name).into_iter().collect(),
            None => self.ctx.config().areas.values().collect(),
        }
    }

    /// `-soa [area]`.
    async fn handle_soa(&self, args: &[String]) -> Vec<ResponseLine> {
        let area_name = args.first().cloned().or_else(|| self.state.restricted_auth_area.clone());
        let Some(area_name) = area_name else {
            return vec![ResponseLine::error(ErrorCode::InvalidAuthorityArea)];
        };
        let Some(area) = self.ctx.config().areas.get(&area_name) else {
            return vec![ResponseLine::error(ErrorCode::InvalidAuthorityArea)];
        };
        let mut lines: Vec<ResponseLine> = xfer::render_soa_lines(area).into_iter().map(ResponseLine::data).collect();
        lines.push(ResponseLine::Ok);
        lines
    }

    /// `-status`: uptime, active child sessions, and the server's vendor
    /// string, mirroring the fields the original status program reports.
    async fn handle_status(&self) -> Vec<ResponseLine> {
        vec![
            ResponseLine::data(format!("status:Uptime-Seconds:{}", self.ctx.uptime().as_secs())),
            ResponseLine::data(format!("status:Active-Sessions:{}", self.ctx.active_children())),
            ResponseLine::data(format!("status:Vendor:{}", self.ctx.vendor())),
            ResponseLine::Ok,
        ]
    }

    /// `-xfer <area>`: a full-zone manifest, rejecting secondary areas
    /// (spec.md §4.5: only the master for an area may serve a transfer of
    /// it) and areas with nothing to send.
    async fn handle_xfer(&self, args: &[String]) -> Vec<ResponseLine> {
        let Some(area_name) = args.first() else {
            return vec![ResponseLine::error(ErrorCode::InvalidAuthorityArea)];
        };
        let Some(area) = self.ctx.config().areas.get(area_name) else {
            return vec![ResponseLine::error(ErrorCode::InvalidAuthorityArea)];
        };
        if area.area_type() != crate::model::AreaType::Primary {
            return vec![ResponseLine::error(ErrorCode::NotMasterForAuthorityArea)];
        }

        let store = self.ctx.store().lock().await;
        let manifest = xfer::build_transfer_manifest(&store, area);
        if manifest.is_empty() {
            return vec![ResponseLine::error(ErrorCode::NothingToTransfer)];
        }

        let mut lines: Vec<ResponseLine> = xfer::render_soa_lines(area).into_iter().map(ResponseLine::data).collect();
        lines.extend(manifest.iter().map(|entry| ResponseLine::tagged("xferfile", xfer::render_manifest_line(entry))));
        lines.push(ResponseLine::Ok);
        lines
    }
}

fn update_soa_serial_file(soa_path: &std::path::Path, new_serial: &str) -> std::io::Result<()> {
    let text = std::fs::read_to_string(soa_path)?;
    let mut replaced = false;
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        if let Some((tag, _)) = line.split_once(':') {
            if tag.trim().eq_ignore_ascii_case("serial-number") {
                out.push_str(&format!("{tag}:{new_serial}\n"));
                replaced = true;
                continue;
            }
        }
        out.push_str(line);
        out.push('\n');
    }
    if !replaced {
        out.push_str(&format!("serial-number:{new_serial}\n"));
    }
    std::fs::write(soa_path, out)
}
