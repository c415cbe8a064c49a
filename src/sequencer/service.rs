//! Sequencer as a task
//!
//! [`SequencerService::spawn`] moves a [`Sequencer`] onto the runtime and
//! returns a cloneable [`SequencerHandle`]. Commands travel over an mpsc
//! channel with a oneshot reply; status is published on a watch channel
//! after every command and event.

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{Command, Sequencer, SequencerError, SequencerStatus};

const REQUEST_QUEUE: usize = 32;

type Reply<T> = oneshot::Sender<Result<T, SequencerError>>;

enum Request {
    StartRecording(Reply<()>),
    StopRecording(Reply<()>),
    Resume(Reply<bool>),
    Shutdown(oneshot::Sender<()>),
}

pub struct SequencerService {
    sequencer: Sequencer,
    requests: mpsc::Receiver<Request>,
    status: watch::Sender<SequencerStatus>,
}

impl SequencerService {
    /// Spawn the service on the current runtime.
    pub fn spawn(sequencer: Sequencer) -> (SequencerHandle, JoinHandle<()>) {
        let (request_tx, requests) = mpsc::channel(REQUEST_QUEUE);
        let (status, status_rx) = watch::channel(sequencer.status());

        let service = Self {
            sequencer,
            requests,
            status,
        };
        let task = tokio::spawn(service.run());

        (
            SequencerHandle {
                requests: request_tx,
                status: status_rx,
            },
            task,
        )
    }

    async fn run(mut self) {
        debug!("sequencer service running");
        loop {
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(request) => {
                        if self.handle_request(request) {
                            break;
                        }
                    }
                    None => {
                        debug!("all handles dropped");
                        self.sequencer.shutdown();
                        break;
                    }
                },
                event = self.sequencer.next_event() => match event {
                    Some(event) => self.sequencer.handle_event(event),
                    None => {
                        self.sequencer.shutdown();
                        break;
                    }
                },
            }
            self.publish();
        }
        self.publish();
        info!("sequencer service stopped");
    }

    /// Returns true when the service should stop
    fn handle_request(&mut self, request: Request) -> bool {
        match request {
            Request::StartRecording(reply) => {
                let _ = reply.send(self.sequencer.start_recording());
            }
            Request::StopRecording(reply) => {
                let _ = reply.send(self.sequencer.stop_recording());
            }
            Request::Resume(reply) => {
                let _ = reply.send(self.sequencer.resume());
            }
            Request::Shutdown(reply) => {
                self.sequencer.shutdown();
                let _ = reply.send(());
                return true;
            }
        }
        false
    }

    fn publish(&self) {
        self.status.send_replace(self.sequencer.status());
    }
}

/// Cloneable handle to a running [`SequencerService`]
#[derive(Clone)]
pub struct SequencerHandle {
    requests: mpsc::Sender<Request>,
    status: watch::Receiver<SequencerStatus>,
}

impl SequencerHandle {
    pub async fn start_recording(&self) -> Result<(), SequencerError> {
        self.call(Request::StartRecording).await
    }

    pub async fn stop_recording(&self) -> Result<(), SequencerError> {
        self.call(Request::StopRecording).await
    }

    pub async fn resume(&self) -> Result<bool, SequencerError> {
        self.call(Request::Resume).await
    }

    /// Run a [`Command`] and discard its value
    pub async fn send(&self, command: Command) -> Result<(), SequencerError> {
        match command {
            Command::StartRecording => self.start_recording().await,
            Command::StopRecording => self.stop_recording().await,
            Command::Resume => self.resume().await.map(|_| ()),
            Command::Shutdown => self.shutdown().await,
        }
    }

    /// Stop the service. Pending playbacks are cancelled and the context
    /// closed.
    pub async fn shutdown(&self) -> Result<(), SequencerError> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(Request::Shutdown(tx))
            .await
            .map_err(|_| SequencerError::ServiceStopped)?;
        rx.await.map_err(|_| SequencerError::ServiceStopped)
    }

    /// Latest published status
    pub fn status(&self) -> SequencerStatus {
        self.status.borrow().clone()
    }

    /// Watch status changes
    pub fn subscribe(&self) -> watch::Receiver<SequencerStatus> {
        self.status.clone()
    }

    async fn call<T>(
        &self,
        request: impl FnOnce(Reply<T>) -> Request,
    ) -> Result<T, SequencerError> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(request(tx))
            .await
            .map_err(|_| SequencerError::ServiceStopped)?;
        rx.await.map_err(|_| SequencerError::ServiceStopped)?
    }
}
