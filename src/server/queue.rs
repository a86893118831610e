use std::thread;

use flume::TrySendError;
use tokio::sync::oneshot;

use super::ApiError;
use crate::generation::{GenerationOutput, GenerationRequest, Orchestrator};

type Reply = oneshot::Receiver<anyhow::Result<GenerationOutput>>;

struct Job {
	request: GenerationRequest,
	reply: oneshot::Sender<anyhow::Result<GenerationOutput>>
}

/// A bounded queue in front of a single generation worker thread.
///
/// Requests are generated strictly one at a time, in submission order. At most `max_size` requests wait behind the one
/// being generated; further requests are rejected with [`ApiError::QueueFull`].
#[derive(Debug, Clone)]
pub struct GenerationQueue {
	sender: flume::Sender<Job>
}

impl GenerationQueue {
	/// Spawns the worker thread.
	pub fn start(orchestrator: Orchestrator, max_size: usize) -> anyhow::Result<Self> {
		let (sender, receiver) = flume::bounded(max_size.max(1));
		thread::Builder::new()
			.name("generation-worker".to_string())
			.spawn(move || worker(orchestrator, receiver))?;
		Ok(Self { sender })
	}

	/// Enqueues a request without waiting for it to finish.
	pub fn enqueue(&self, request: GenerationRequest) -> Result<Reply, ApiError> {
		let (reply, receiver) = oneshot::channel();
		self.sender.try_send(Job { request, reply }).map_err(|e| match e {
			TrySendError::Full(_) => ApiError::QueueFull,
			TrySendError::Disconnected(_) => ApiError::WorkerGone
		})?;
		Ok(receiver)
	}

	/// Enqueues a request and waits for its result.
	pub async fn submit(&self, request: GenerationRequest) -> Result<GenerationOutput, ApiError> {
		let reply = self.enqueue(request)?;
		Ok(reply.await.map_err(|_| ApiError::WorkerGone)??)
	}

	/// Number of requests waiting behind the one being generated.
	pub fn len(&self) -> usize {
		self.sender.len()
	}

	/// Whether no request is waiting.
	pub fn is_empty(&self) -> bool {
		self.sender.is_empty()
	}
}

fn worker(orchestrator: Orchestrator, receiver: flume::Receiver<Job>) {
	tracing::info!("generation worker started");
	while let Ok(Job { request, reply }) = receiver.recv() {
		let result = orchestrator.generate(&request);
		if let Err(e) = &result {
			tracing::error!("generation failed: {e:#}");
		}
		// the client may have disconnected while waiting
		let _ = reply.send(result);
	}
	tracing::info!("generation worker stopped");
}
