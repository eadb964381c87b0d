//! Deferred work drained once per frame tick.
//!
//! Some work must not run inside the callback that requested it: activating
//! a menu while the host is mid-transition, or running a follow-on action
//! while the muster that chose it still exists. Such work is queued here as
//! plain values and dispatched by the service on a later tick.

use std::collections::VecDeque;

use enlist_events::{FollowOnAction, MusterStage};

/// A unit of deferred work.
#[derive(Debug, Clone, PartialEq)]
pub enum DeferredTask {
    /// Activate a muster stage through the guarded switch.
    ActivateStage(MusterStage),
    /// Show the stage a restored session was saved at.
    ResumeStage(MusterStage),
    /// Run an action chosen during a completed muster.
    FollowOn(FollowOnAction),
    /// Raise an escalation event queued by a completed muster.
    RaiseEvent(String),
}

#[derive(Debug, Clone)]
struct Scheduled {
    task: DeferredTask,
    remaining_secs: f32,
}

/// Ordered single-threaded task queue.
#[derive(Debug, Default)]
pub struct DeferredTaskQueue {
    items: VecDeque<Scheduled>,
}

impl DeferredTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a task for the next drain.
    pub fn push(&mut self, task: DeferredTask) {
        self.push_after(task, 0.0);
    }

    /// Queues a task that becomes ready once `secs` of tick time have passed.
    pub fn push_after(&mut self, task: DeferredTask, secs: f32) {
        self.items.push_back(Scheduled {
            task,
            remaining_secs: secs.max(0.0),
        });
    }

    /// Advances countdowns by `dt` and removes every ready task, in queue
    /// order. Tasks pushed while the returned batch is dispatched wait for
    /// the next drain.
    pub fn drain_ready(&mut self, dt: f32) -> Vec<DeferredTask> {
        let mut ready = Vec::new();
        let mut waiting = VecDeque::with_capacity(self.items.len());
        for mut item in self.items.drain(..) {
            item.remaining_secs -= dt;
            if item.remaining_secs <= 0.0 {
                ready.push(item.task);
            } else {
                waiting.push_back(item);
            }
        }
        self.items = waiting;
        ready
    }

    /// Drops every queued stage activation. Used when a session ends early.
    pub fn cancel_stage_activations(&mut self) {
        self.items.retain(|item| {
            !matches!(
                item.task,
                DeferredTask::ActivateStage(_) | DeferredTask::ResumeStage(_)
            )
        });
    }

    pub fn contains(&self, task: &DeferredTask) -> bool {
        self.items.iter().any(|item| &item.task == task)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
