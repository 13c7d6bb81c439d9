//! The acceptor and its worker pool.
//!
//! The acceptor runs on a current-thread runtime on the calling thread. Every accepted socket
//! is handed to the next worker in round-robin order. Each worker owns a current-thread runtime
//! on its own thread; connections are spawned there and never migrate.

use std::future::Future;
use std::io;
use std::net::{SocketAddr, TcpListener as StdTcpListener, TcpStream as StdTcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use sharpd_http::connection::{ConnectionConfig, HttpConnection};
use sharpd_http::date::DateService;
use sharpd_http::handler::Handler;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::router::Routes;
use crate::transcode::Ffmpeg;

const DATE_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("can't bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid route table: {0}")]
    Route(#[from] matchit::InsertError),

    #[error("can't build runtime: {0}")]
    Runtime(#[source] io::Error),

    #[error("can't start worker thread: {0}")]
    Spawn(#[source] io::Error),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// A bound server that has not started accepting yet.
#[derive(Debug)]
pub struct Server {
    listener: StdTcpListener,
    config: ServerConfig,
}

impl Server {
    pub fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let address = config.address();
        let listener = StdTcpListener::bind(&address).map_err(|source| ServerError::Bind { address, source })?;
        listener.set_nonblocking(true)?;
        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves until `Ctrl-C`.
    pub fn run(self) -> Result<(), ServerError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(cause = %e, "can't listen for ctrl-c");
            }
        })
    }

    /// Serves until `shutdown` completes, then waits for the workers to stop.
    pub fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let handler = Arc::new(Routes::new(self.config.static_root.clone(), Ffmpeg::new(self.config.ffmpeg.clone()))?);
        let connection_config = self.config.connection_config();

        let workers = (0..self.config.worker_count())
            .map(|id| Worker::spawn(id, Arc::clone(&handler), connection_config.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        let runtime = current_thread_runtime()?;
        let result = runtime.block_on(accept(self.listener, &workers, shutdown));

        for worker in workers {
            worker.join();
        }
        info!("server stopped");
        result
    }
}

fn current_thread_runtime() -> Result<Runtime, ServerError> {
    Builder::new_current_thread().enable_all().build().map_err(ServerError::Runtime)
}

async fn accept<F>(listener: StdTcpListener, workers: &[Worker], shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()>,
{
    let listener = TcpListener::from_std(listener)?;
    info!(address = ?listener.local_addr()?, workers = workers.len(), "start listening");

    let date_refresh = tokio::spawn(DateService::global().run_refresh(DATE_REFRESH_INTERVAL));
    let mut cursor = RoundRobin::new(workers.len());

    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("shutting down");
                break;
            }
            accepted = listener.accept() => {
                let (tcp_stream, remote_addr) = match accepted {
                    Ok(stream_and_addr) => stream_and_addr,
                    Err(e) => {
                        warn!(cause = %e, "failed to accept");
                        continue;
                    }
                };

                let stream = match tcp_stream.into_std() {
                    Ok(stream) => stream,
                    Err(e) => {
                        warn!(cause = %e, "failed to detach accepted socket");
                        continue;
                    }
                };

                let index = cursor.next();
                debug!(%remote_addr, worker = index, "accepted connection");
                if workers[index].sender.send(stream).is_err() {
                    error!(worker = index, "worker is gone, dropping connection");
                }
            }
        }
    }

    date_refresh.abort();
    Ok(())
}

/// Cycles through `0..len`.
#[derive(Debug)]
struct RoundRobin {
    next: usize,
    len: usize,
}

impl RoundRobin {
    fn new(len: usize) -> Self {
        Self { next: 0, len: len.max(1) }
    }

    fn next(&mut self) -> usize {
        let current = self.next;
        self.next = (current + 1) % self.len;
        current
    }
}

#[derive(Debug)]
struct Worker {
    sender: UnboundedSender<StdTcpStream>,
    thread: JoinHandle<()>,
}

impl Worker {
    fn spawn<H>(id: usize, handler: Arc<H>, config: ConnectionConfig) -> Result<Self, ServerError>
    where
        H: Handler + 'static,
    {
        let runtime = current_thread_runtime()?;
        let (sender, receiver) = mpsc::unbounded_channel();
        let thread = thread::Builder::new()
            .name(format!("sharpd-worker-{id}"))
            .spawn(move || runtime.block_on(serve_connections(id, receiver, handler, config)))
            .map_err(ServerError::Spawn)?;

        Ok(Self { sender, thread })
    }

    /// Stops handing out connections and waits for the thread to finish.
    fn join(self) {
        let Self { sender, thread } = self;
        drop(sender);
        if thread.join().is_err() {
            error!("worker thread panicked");
        }
    }
}

async fn serve_connections<H>(id: usize, mut receiver: UnboundedReceiver<StdTcpStream>, handler: Arc<H>, config: ConnectionConfig)
where
    H: Handler + 'static,
{
    while let Some(stream) = receiver.recv().await {
        let tcp_stream = match TcpStream::from_std(stream) {
            Ok(tcp_stream) => tcp_stream,
            Err(e) => {
                warn!(worker = id, cause = %e, "failed to register connection");
                continue;
            }
        };

        let handler = Arc::clone(&handler);
        let config = config.clone();
        tokio::spawn(async move {
            let (reader, writer) = tcp_stream.into_split();
            let connection = HttpConnection::new(reader, writer, &config);
            match connection.process(handler).await {
                Ok(()) => debug!("finished process, connection shutdown"),
                Err(e) => error!(cause = %e, "service has error, connection shutdown"),
            }
        });
    }
    debug!(worker = id, "worker stopped");
}
