//! Accept loop, privilege drop, and inetd entry point (spec.md §4.1, §4.2).

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};

use crate::config::Config;
use crate::context::ServerContext;
use crate::session::Session;
use crate::store::RecordStore;

/// Startup options derived from the CLI and main config (spec.md §4.1).
pub struct ListenOptions {
    pub config_path: PathBuf,
    pub vendor: String,
    pub foreground: bool,
}

/// Binds the listening socket, drops privileges, writes the pid file, and
/// serves connections until a shutdown signal arrives.
pub async fn serve(options: ListenOptions) -> io::Result<()> {
    let config = load_config(&options.config_path)?;
    let addr = (config.main.hostname.as_str(), config.main.port);
    let listener = bind(addr, &config).await?;

    tracing::debug!(foreground = options.foreground, "startup options resolved");
    drop_privileges(&config)?;
    write_pid_file(&config.main.pid_file)?;

    let store = RecordStore::open(config.areas.clone()).map_err(to_io_error)?;
    let ctx = Arc::new(ServerContext::new(config, store, options.vendor.clone()));

    let result = accept_loop(listener, ctx, options).await;
    let _ = remove_pid_file_from_env();
    result
}

fn load_config(path: &std::path::Path) -> io::Result<Config> {
    Config::load(path).map_err(to_io_error)
}

async fn bind(addr: (&str, u16), config: &Config) -> io::Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(host = %config.main.hostname, port = config.main.port, "listening");
    Ok(listener)
}

/// Runs the accept loop, rebuilding the server context on SIGHUP and
/// handing every newly accepted connection the freshest `Arc` — sessions
/// already spawned keep whatever `Arc` they were handed (spec.md §4.1's
/// SIGHUP requirement does not disturb in-flight sessions).
async fn accept_loop(listener: TcpListener, mut ctx: Arc<ServerContext>, options: ListenOptions) -> io::Result<()> {
    #[cfg(unix)]
    let mut hangup = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())?;
    #[cfg(unix)]
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    loop {
        #[cfg(unix)]
        tokio::select! {
            accepted = listener.accept() => {
                handle_accepted(accepted, &ctx).await;
            }
            _ = hangup.recv() => {
                match load_config(&options.config_path) {
                    Ok(config) => {
                        let store = match RecordStore::open(config.areas.clone()) {
                            Ok(store) => store,
                            Err(e) => {
                                tracing::error!(error = %e, "reload failed to reopen record store, keeping prior context");
                                continue;
                            }
                        };
                        ctx = Arc::new(ServerContext::new(config, store, options.vendor.clone()));
                        tracing::info!("configuration reloaded");
                    }
                    Err(e) => tracing::error!(error = %e, "configuration reload failed, keeping prior context"),
                }
            }
            _ = terminate.recv() => {
                tracing::info!("shutting down on SIGTERM");
                return Ok(());
            }
        }

        #[cfg(not(unix))]
        {
            let accepted = listener.accept().await;
            handle_accepted(accepted, &ctx).await;
        }
    }
}

async fn handle_accepted(accepted: io::Result<(TcpStream, std::net::SocketAddr)>, ctx: &Arc<ServerContext>) {
    let (socket, peer) = match accepted {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(error = %e, "accept failed");
            return;
        }
    };
    if let Err(e) = socket.set_nodelay(true) {
        tracing::warn!(error = %e, "failed to set TCP_NODELAY");
    }

    if !ctx.acquire_child_slot() {
        tracing::warn!(peer = %peer, "rejecting connection, max-children reached");
        drop(socket);
        return;
    }

    let ctx = Arc::clone(ctx);
    tokio::spawn(async move {
        Session::run(Arc::clone(&ctx), socket, peer).await;
        ctx.release_child_slot();
    });
}

/// Binds first (while still privileged, in case `port` is a low number),
/// then chroots and drops to the configured uid — in that order, since a
/// chroot performed before binding a privileged port would leave the
/// process unable to reach its own listening socket's supporting files.
#[cfg(unix)]
fn drop_privileges(config: &Config) -> io::Result<()> {
    if config.main.chroot {
        let root = config.main.root_dir.display().to_string();
        let c_root = std::ffi::CString::new(root.clone())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let rc = unsafe { libc::chroot(c_root.as_ptr()) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        if unsafe { libc::chdir(b"/\0".as_ptr() as *const libc::c_char) } != 0 {
            return Err(io::Error::last_os_error());
        }
    }

    if let Some(uid_name) = &config.main.process_uid {
        let uid = resolve_uid(uid_name)?;
        if unsafe { libc::setuid(uid) } != 0 {
            return Err(io::Error::last_os_error());
        }
    }

    Ok(())
}

#[cfg(not(unix))]
fn drop_privileges(_config: &Config) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn resolve_uid(name: &str) -> io::Result<libc::uid_t> {
    if let Ok(numeric) = name.parse::<libc::uid_t>() {
        return Ok(numeric);
    }
    let c_name = std::ffi::CString::new(name).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let passwd = unsafe { libc::getpwnam(c_name.as_ptr()) };
    if passwd.is_null() {
        return Err(io::Error::new(io::ErrorKind::NotFound, format!("no such user '{name}'")));
    }
    Ok(unsafe { (*passwd).pw_uid })
}

static PID_FILE_PATH: std::sync::Mutex<Option<String>> = std::sync::Mutex::new(None);

fn write_pid_file(path: &str) -> io::Result<()> {
    std::fs::write(path, format!("{}\n", std::process::id()))?;
    *PID_FILE_PATH.lock().unwrap() = Some(path.to_string());
    Ok(())
}

fn remove_pid_file_from_env() -> io::Result<()> {
    if let Some(path) = PID_FILE_PATH.lock().unwrap().take() {
        let _ = std::fs::remove_file(path);
    }
    Ok(())
}

fn to_io_error<E: std::fmt::Display>(e: E) -> io::Error {
    io::Error::other(e.to_string())
}

/// Serves exactly one session over the inherited stdin file descriptor
/// (the classic inetd/xinetd wiring: the superserver has already accepted
/// the connection and bound it to fd 0).
#[cfg(unix)]
pub async fn serve_inetd(options: ListenOptions) -> io::Result<()> {
    let config = load_config(&options.config_path)?;
    let peer = std::net::SocketAddr::from(([0, 0, 0, 0], 0));

    let store = RecordStore::open(config.areas.clone()).map_err(to_io_error)?;
    let ctx = Arc::new(ServerContext::new(config, store, options.vendor.clone()));

    let std_stream: std::net::TcpStream = unsafe { std::os::fd::FromRawFd::from_raw_fd(0) };
    std_stream.set_nonblocking(true)?;
    let socket = TcpStream::from_std(std_stream)?;
    Session::run(ctx, socket, peer).await;
    Ok(())
}
