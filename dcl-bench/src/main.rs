//! A small load generator in the spirit of the teacher's `flo-bench-cli`:
//! connects to a running `dcld` as a host would, drives a fixed number of
//! write/read round trips against one buffer, and reports latency stats.
//! Manual/integration tooling only — not part of the wire surface itself.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use clap::Parser;

use dcl_core::{CLError, ObjectId, ProcessId};
use dcl_transport::{ComputeNode, DataStream, MessageQueue, Process, QueueEvent, Role};
use dcl_wire::messages::{CommandOptions, CreateBuffer, CreateCommandQueue, CreateContext, MemFlags};
use dcl_wire::Message;

#[derive(Parser)]
#[command(name = "dcl-bench", about = "drive a compute node with write/read round trips")]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 25025)]
    control_port: u16,

    #[arg(long)]
    data_port: Option<u16>,

    #[arg(long, default_value_t = 100)]
    iterations: u32,

    #[arg(long, default_value_t = 4096)]
    payload_size: u64,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let data_port = cli.data_port.unwrap_or(cli.control_port + 100);

    let control_addr: SocketAddr =
        format!("{}:{}", cli.host, cli.control_port).parse().expect("invalid control address");
    let data_addr: SocketAddr =
        format!("{}:{}", cli.host, data_port).parse().expect("invalid data address");

    let local_pid = ProcessId(std::process::id() as u64);
    let (queue, mut events) = MessageQueue::connect(control_addr, local_pid, Role::Host)
        .await
        .expect("failed to connect control channel");
    let data = DataStream::connect(data_addr, local_pid, Role::Host)
        .await
        .expect("failed to connect data channel");

    let process = Process::new(queue, data);
    let pump = process.clone();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let QueueEvent::Message(message) = event {
                pump.complete_response(message).await;
            }
        }
    });
    let node = ComputeNode(process);

    let context_id = ObjectId(1);
    let queue_id = ObjectId(1);
    let buffer_id = ObjectId(1);

    send(&node, |request_id| {
        Message::CreateContext(CreateContext { request_id, context_id, devices: vec![1] })
    })
    .await;
    send(&node, |request_id| {
        Message::CreateCommandQueue(CreateCommandQueue {
            request_id,
            queue_id,
            context_id,
            device: 1,
            out_of_order: false,
            profiling: false,
        })
    })
    .await;
    send(&node, |request_id| {
        Message::CreateBuffer(CreateBuffer {
            request_id,
            buffer_id,
            context_id,
            flags: MemFlags { read_only: false, write_only: false, copy_host_ptr: false, use_host_ptr: false },
            size: cli.payload_size,
        })
    })
    .await;

    let command_queue = dcl_host::CommandQueue::new(node, queue_id);
    let payload = vec![0xABu8; cli.payload_size as usize];
    let mut samples = Vec::with_capacity(cli.iterations as usize);

    for _ in 0..cli.iterations {
        let started = Instant::now();

        let status = command_queue
            .enqueue_write_buffer(
                buffer_id,
                true,
                0,
                payload.len() as u64,
                vec![],
                CommandOptions { command_id: ObjectId::NONE, want_event: false },
            )
            .await
            .expect("write request failed");
        assert_eq!(status, CLError::SUCCESS, "write enqueue did not succeed");

        let status = command_queue
            .enqueue_read_buffer(
                buffer_id,
                true,
                0,
                payload.len() as u64,
                vec![],
                CommandOptions { command_id: ObjectId::NONE, want_event: false },
            )
            .await
            .expect("read request failed");
        assert_eq!(status, CLError::SUCCESS, "read enqueue did not succeed");

        samples.push(started.elapsed());
    }

    report(&samples);
}

async fn send<F>(node: &ComputeNode, build: F)
where
    F: FnOnce(u32) -> Message,
{
    let request_id = node.0.next_request_id();
    let message = build(request_id);
    let response = node
        .0
        .execute_command(request_id, message, Duration::from_secs(10))
        .await
        .expect("setup request failed");
    if let Message::StatusResponse(status) = response {
        assert_eq!(status.status, CLError::SUCCESS, "setup request returned an error status");
    }
}

fn report(samples: &[Duration]) {
    let total: Duration = samples.iter().sum();
    let mean = total / samples.len().max(1) as u32;
    let min = samples.iter().min().copied().unwrap_or_default();
    let max = samples.iter().max().copied().unwrap_or_default();

    println!("round trips: {}", samples.len());
    println!("min:  {:?}", min);
    println!("mean: {:?}", mean);
    println!("max:  {:?}", max);
}
