//! Bounded worker pool and task dispatcher
//!
//! Provider calls block for up to the request timeout, so they run on a fixed
//! set of worker threads fed by a bounded crossbeam queue. Submitting to a
//! full queue fails instead of spawning more threads. Finished tasks come
//! back as [`Event`]s on a channel and are written to the activity log.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};

use super::registry::ProviderRegistry;
use crate::audit::{Action, ActivityEntry, ActivityLogger};
use crate::error::{BillPayError, BillPayResult};
use crate::models::{
    BillLookup, ConnectionStatus, PaymentRequest, PaymentResult, PaymentStatus, ProviderId,
    RefundRequest, RefundResult, Vnd,
};
use crate::providers::ProviderClient;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed number of threads draining a bounded job queue
pub struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    capacity: usize,
}

impl WorkerPool {
    pub fn new(threads: usize, capacity: usize) -> BillPayResult<Self> {
        if threads == 0 || capacity == 0 {
            return Err(BillPayError::Validation(
                "Worker pool needs at least one thread and one queue slot".into(),
            ));
        }

        let (sender, receiver) = bounded::<Job>(capacity);
        let mut workers = Vec::with_capacity(threads);
        for index in 0..threads {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("billpay-worker-{}", index))
                .spawn(move || {
                    for job in receiver.iter() {
                        job();
                    }
                })
                .map_err(|e| BillPayError::Dispatch(format!("Failed to start worker: {}", e)))?;
            workers.push(handle);
        }

        tracing::debug!(threads, capacity, "worker pool started");
        Ok(Self {
            sender: Some(sender),
            workers,
            capacity,
        })
    }

    /// Queue a job; fails when the queue is full or the pool is shut down
    pub fn submit(&self, job: Job) -> BillPayResult<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| BillPayError::Dispatch("Worker pool is shut down".into()))?;
        sender.try_send(job).map_err(|e| match e {
            TrySendError::Full(_) => BillPayError::Dispatch(format!(
                "Worker queue is full ({} pending); try again shortly",
                self.capacity
            )),
            TrySendError::Disconnected(_) => BillPayError::Dispatch("Worker pool is shut down".into()),
        })
    }

    /// Queue a job, blocking while the queue is full
    pub fn submit_wait(&self, job: Job) -> BillPayResult<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| BillPayError::Dispatch("Worker pool is shut down".into()))?;
        sender
            .send(job)
            .map_err(|_| BillPayError::Dispatch("Worker pool is shut down".into()))
    }

    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Stop accepting jobs, finish queued ones and join the workers
    pub fn shutdown(&mut self) {
        self.sender.take();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::warn!("worker thread panicked");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A unit of provider work
#[derive(Debug, Clone)]
pub enum Task {
    Lookup {
        provider: ProviderId,
        bill_number: String,
    },
    Pay {
        provider: ProviderId,
        request: PaymentRequest,
    },
    Query {
        provider: ProviderId,
        order_id: String,
    },
    Refund {
        provider: ProviderId,
        request: RefundRequest,
    },
    QuickPay {
        provider: ProviderId,
        amount: Vnd,
        payment_code: String,
    },
    PullFunds {
        provider: ProviderId,
        amount: Vnd,
        card_number: String,
        currency: String,
    },
    TestConnection {
        provider: ProviderId,
    },
}

impl Task {
    pub fn provider(&self) -> ProviderId {
        match self {
            Task::Lookup { provider, .. }
            | Task::Pay { provider, .. }
            | Task::Query { provider, .. }
            | Task::Refund { provider, .. }
            | Task::QuickPay { provider, .. }
            | Task::PullFunds { provider, .. }
            | Task::TestConnection { provider } => *provider,
        }
    }

    fn action(&self) -> Action {
        match self {
            Task::Lookup { .. } => Action::Lookup,
            Task::Pay { .. } | Task::QuickPay { .. } | Task::PullFunds { .. } => Action::Payment,
            Task::Query { .. } => Action::Query,
            Task::Refund { .. } => Action::Refund,
            Task::TestConnection { .. } => Action::ConnectionTest,
        }
    }

    fn subject(&self) -> String {
        match self {
            Task::Lookup { bill_number, .. } => bill_number.clone(),
            Task::Pay { request, .. } => request.amount.to_string(),
            Task::Query { order_id, .. } => order_id.clone(),
            Task::Refund { request, .. } => request.order_id.clone(),
            Task::QuickPay { amount, .. } | Task::PullFunds { amount, .. } => amount.to_string(),
            Task::TestConnection { .. } => String::new(),
        }
    }

    /// Run this task against a client on the current thread
    pub fn run(&self, client: &dyn ProviderClient) -> BillPayResult<TaskOutput> {
        match self {
            Task::Lookup { bill_number, .. } => client.lookup_bill(bill_number).map(TaskOutput::Lookup),
            Task::Pay { request, .. } => client.create_payment(request).map(TaskOutput::Payment),
            Task::Query { order_id, .. } => client.query_payment(order_id).map(TaskOutput::Status),
            Task::Refund { request, .. } => client.refund_payment(request).map(TaskOutput::Refund),
            Task::QuickPay {
                amount,
                payment_code,
                ..
            } => client.quick_pay(*amount, payment_code).map(TaskOutput::Status),
            Task::PullFunds {
                amount,
                card_number,
                currency,
                ..
            } => client
                .pull_funds(*amount, card_number, currency)
                .map(TaskOutput::Payment),
            Task::TestConnection { .. } => Ok(TaskOutput::Connection(client.test_connection())),
        }
    }
}

/// Successful result of a [`Task`]
#[derive(Debug, Clone)]
pub enum TaskOutput {
    Lookup(BillLookup),
    Payment(PaymentResult),
    Status(PaymentStatus),
    Refund(RefundResult),
    Connection(ConnectionStatus),
}

impl TaskOutput {
    fn summary(&self) -> String {
        match self {
            TaskOutput::Lookup(lookup) => format!("{} {}", lookup.bill.provider, lookup.bill.amount),
            TaskOutput::Payment(result) => format!("order {}", result.order_id),
            TaskOutput::Status(status) => format!("{} ({})", status.state, status.result_code),
            TaskOutput::Refund(refund) => format!("refund {}", refund.refund_request_id),
            TaskOutput::Connection(status) => status.message.clone(),
        }
    }
}

/// Messages delivered to the caller
#[derive(Debug)]
pub enum Event {
    Finished {
        id: u64,
        provider: ProviderId,
        outcome: BillPayResult<TaskOutput>,
    },
}

/// Runs tasks on the pool against the registry's current clients
pub struct Dispatcher {
    pool: WorkerPool,
    registry: Arc<ProviderRegistry>,
    activity: Option<Arc<ActivityLogger>>,
    events_tx: Sender<Event>,
    events_rx: Receiver<Event>,
    next_id: AtomicU64,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        pool: WorkerPool,
        activity: Option<Arc<ActivityLogger>>,
    ) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            pool,
            registry,
            activity,
            events_tx,
            events_rx,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Channel on which finished tasks arrive
    pub fn events(&self) -> &Receiver<Event> {
        &self.events_rx
    }

    /// Queue a task and return its id; fails when the queue is full
    pub fn submit(&self, task: Task) -> BillPayResult<u64> {
        self.enqueue(task, false)
    }

    fn enqueue(&self, task: Task, wait: bool) -> BillPayResult<u64> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let provider = task.provider();
        // snapshot now so a later reconfigure does not affect this task
        let client = self.registry.client(provider);
        let activity = self.activity.clone();
        let events = self.events_tx.clone();

        let job: Job = Box::new(move || {
            let outcome = task.run(client.as_ref());
            match &outcome {
                Ok(_) => tracing::info!(id, provider = %provider, action = %task.action(), "task finished"),
                Err(e) => tracing::warn!(id, provider = %provider, action = %task.action(), kind = ?e.kind(), error = %e, "task failed"),
            }
            if let Some(logger) = activity {
                logger.record(&activity_entry(&task, &outcome));
            }
            let _ = events.send(Event::Finished {
                id,
                provider,
                outcome,
            });
        });
        if wait {
            self.pool.submit_wait(job)?;
        } else {
            self.pool.submit(job)?;
        }

        tracing::debug!(id, provider = %provider, "task queued");
        Ok(id)
    }

    /// Submit a task and wait for its result
    pub fn run(&self, task: Task) -> BillPayResult<TaskOutput> {
        let id = self.submit(task)?;
        self.wait_for(id)
    }

    /// Block until the task with `id` finishes
    ///
    /// Events for other tasks received meanwhile are dropped, so callers
    /// mixing `run` with `submit` should collect through [`Self::events`].
    pub fn wait_for(&self, id: u64) -> BillPayResult<TaskOutput> {
        for event in self.events_rx.iter() {
            let Event::Finished {
                id: finished,
                outcome,
                ..
            } = event;
            if finished == id {
                return outcome;
            }
        }
        Err(BillPayError::Dispatch("Event channel closed".into()))
    }

    /// Submit several tasks and collect every result, in submission order
    ///
    /// Submission waits for queue space, so batches larger than the queue
    /// are throttled rather than rejected.
    pub fn run_all(&self, tasks: Vec<Task>) -> Vec<BillPayResult<TaskOutput>> {
        let mut results: Vec<Option<BillPayResult<TaskOutput>>> = Vec::with_capacity(tasks.len());
        let mut pending = std::collections::HashMap::new();

        for (index, task) in tasks.into_iter().enumerate() {
            results.push(None);
            match self.enqueue(task, true) {
                Ok(id) => {
                    pending.insert(id, index);
                }
                Err(e) => results[index] = Some(Err(e)),
            }
        }

        while !pending.is_empty() {
            let Ok(Event::Finished { id, outcome, .. }) = self.events_rx.recv() else {
                break;
            };
            if let Some(index) = pending.remove(&id) {
                results[index] = Some(outcome);
            }
        }

        results
            .into_iter()
            .map(|r| r.unwrap_or_else(|| Err(BillPayError::Dispatch("Task result lost".into()))))
            .collect()
    }

    pub fn shutdown(mut self) {
        self.pool.shutdown();
    }
}

fn activity_entry(task: &Task, outcome: &BillPayResult<TaskOutput>) -> ActivityEntry {
    let provider = Some(task.provider());
    match outcome {
        Ok(TaskOutput::Connection(status)) if !status.reachable => ActivityEntry {
            success: false,
            ..ActivityEntry::success(task.action(), provider, task.subject(), status.message.clone())
        },
        Ok(output) => ActivityEntry::success(task.action(), provider, task.subject(), output.summary()),
        Err(e) => ActivityEntry::failure(task.action(), provider, task.subject(), e),
    }
}
