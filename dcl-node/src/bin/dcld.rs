//! The compute-node daemon: binds a control-message listener and a
//! data-stream listener, and hands every accepted host connection its own
//! `Session` driven by `RequestProcessor` (spec.md §4.1, §4.12).

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use tokio::sync::Mutex;

use dcl_core::ProcessId;
use dcl_node::{NativeDriver, RequestProcessor, Session, SimDriver};
use dcl_transport::{DataDispatcher, DataStream, Host, MessageDispatcher, Process, QueueEvent, Role};

const DEFAULT_CONTROL_PORT: u16 = 25025;

#[derive(Parser)]
#[command(name = "dcld", about = "compute-node daemon")]
struct Cli {
    #[arg(long, default_value = "0.0.0.0")]
    bind_address: IpAddr,

    #[arg(long, default_value_t = DEFAULT_CONTROL_PORT)]
    control_port: u16,

    /// Defaults to `control-port + 100` when omitted.
    #[arg(long)]
    data_port: Option<u16>,

    /// Defaults to `dcl_<hostname>.log` in the working directory when omitted.
    #[arg(long)]
    log_file: Option<String>,
}

fn main() {
    let cli = Cli::parse();
    let log_file = cli.log_file.clone().unwrap_or_else(default_log_file_name);
    init_logging(&log_file);

    let control_port = cli.control_port;
    let data_port = cli.data_port.unwrap_or(control_port + 100);

    let runtime = tokio::runtime::Runtime::new().expect("failed to start the async runtime");
    runtime.block_on(run(cli.bind_address, control_port, data_port));
}

fn default_log_file_name() -> String {
    let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
    format!("dcl_{}.log", hostname)
}

fn init_logging(log_file: &str) {
    let encoder = || Box::new(PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S)} {l} [{T}] {m}{n}"));
    let console = ConsoleAppender::builder().encoder(encoder()).build();
    let file = FileAppender::builder()
        .encoder(encoder())
        .build(log_file)
        .expect("failed to open log file");

    let level = match std::env::var("DCL_LOG_LEVEL").as_deref() {
        Ok("ERROR") => log::LevelFilter::Error,
        Ok("WARNING") => log::LevelFilter::Warn,
        Ok("DEBUG") => log::LevelFilter::Debug,
        Ok("VERBOSE") => log::LevelFilter::Trace,
        _ => log::LevelFilter::Info,
    };
    let config = Config::builder()
        .appender(Appender::builder().build("console", Box::new(console)))
        .appender(Appender::builder().build("file", Box::new(file)))
        .build(Root::builder().appender("console").appender("file").build(level))
        .expect("invalid logging configuration");
    log4rs::init_config(config).expect("logging already initialized");
}

async fn run(bind_address: IpAddr, control_port: u16, data_port: u16) {
    let local_pid = ProcessId(std::process::id() as u64);
    let control_addr = SocketAddr::new(bind_address, control_port);
    let data_addr = SocketAddr::new(bind_address, data_port);

    let message_dispatcher = match MessageDispatcher::bind(control_addr, local_pid, Role::ComputeNode).await {
        Ok(dispatcher) => dispatcher,
        Err(err) => {
            error!("failed to bind control listener on {}: {}", control_addr, err);
            return;
        }
    };
    let data_dispatcher = match DataDispatcher::bind(data_addr, local_pid, Role::ComputeNode).await {
        Ok(dispatcher) => dispatcher,
        Err(err) => {
            error!("failed to bind data listener on {}: {}", data_addr, err);
            return;
        }
    };

    info!("dcld listening: control={} data={}", control_addr, data_addr);

    let driver: Arc<dyn NativeDriver> = Arc::new(SimDriver::new());
    let pending: Arc<Mutex<HashMap<ProcessId, Pending>>> = Arc::new(Mutex::new(HashMap::new()));

    // A host's control and data sockets arrive independently (spec.md
    // §4.8, §6.3): two accept loops run concurrently and pair them by
    // peer pid in `pending`, whichever order they land in.
    let queue_loop = {
        let pending = pending.clone();
        let driver = driver.clone();
        tokio::spawn(async move {
            loop {
                let (queue, events) = match message_dispatcher.accept().await {
                    Ok(Some(accepted)) => accepted,
                    Ok(None) => continue,
                    Err(err) => {
                        warn!("control accept failed: {}", err);
                        continue;
                    }
                };
                let peer_pid = queue.peer_pid();
                let process = Process::awaiting_data(queue);

                let mut table = pending.lock().await;
                match table.remove(&peer_pid) {
                    Some(Pending::Data(data)) => {
                        drop(table);
                        process.attach_data_stream(data);
                        info!("host {} connected", peer_pid.0);
                        let session = Session::new(Host(process), driver.clone());
                        tokio::spawn(serve_host(session, events));
                    }
                    Some(stale @ Pending::Queue(_, _)) => {
                        warn!("host {} opened a second control connection before pairing; dropping the stale one", peer_pid.0);
                        drop(stale);
                        table.insert(peer_pid, Pending::Queue(process, events));
                    }
                    None => {
                        table.insert(peer_pid, Pending::Queue(process, events));
                    }
                }
            }
        })
    };

    let data_loop = {
        let pending = pending.clone();
        let driver = driver.clone();
        tokio::spawn(async move {
            loop {
                let data = match data_dispatcher.accept().await {
                    Ok(stream) => stream,
                    Err(err) => {
                        warn!("data accept failed: {}", err);
                        continue;
                    }
                };
                let peer_pid = data.peer_pid();

                let mut table = pending.lock().await;
                match table.remove(&peer_pid) {
                    Some(Pending::Queue(process, events)) => {
                        drop(table);
                        process.attach_data_stream(data);
                        info!("host {} connected", peer_pid.0);
                        let session = Session::new(Host(process), driver.clone());
                        tokio::spawn(serve_host(session, events));
                    }
                    Some(stale @ Pending::Data(_)) => {
                        warn!("host {} opened a second data connection before pairing; dropping the stale one", peer_pid.0);
                        drop(stale);
                        table.insert(peer_pid, Pending::Data(data));
                    }
                    None => {
                        table.insert(peer_pid, Pending::Data(data));
                    }
                }
            }
        })
    };

    let _ = tokio::join!(queue_loop, data_loop);
}

/// One half of a host's pairing, waiting in the dispatcher table for its
/// other half to accept (spec.md §4.8).
enum Pending {
    Queue(Arc<Process>, tokio::sync::mpsc::UnboundedReceiver<QueueEvent>),
    Data(Arc<DataStream>),
}

async fn serve_host(session: Session, mut events: tokio::sync::mpsc::UnboundedReceiver<QueueEvent>) {
    let host_pid = session.host.pid();
    while let Some(event) = events.recv().await {
        match event {
            QueueEvent::Message(message) => {
                if let Some(response) = RequestProcessor::handle(&session, message).await {
                    if let Err(err) = session.host.0.notify(response).await {
                        warn!("failed to answer host {}: {}", host_pid.0, err);
                        break;
                    }
                }
            }
            QueueEvent::Disconnected => {
                info!("host {} disconnected", host_pid.0);
                break;
            }
        }
    }
}
