//! Explicit scheduler for timed continuations
//!
//! Drawing a bow, each musket loading step, unjamming, recharging and
//! fragment decay are tasks registered here while the activity runs and
//! removed when it completes or is voided. Nothing subscribes to a global
//! tick.

use std::collections::BTreeMap;

use crate::core::types::{ActorId, ItemId, TaskId, Tick};
use crate::weapons::musket::MusketStep;
use crate::world::inventory::BoundItems;

#[derive(Debug, Clone, PartialEq)]
pub enum TaskKind {
    BowDraw {
        weapon: ItemId,
    },
    MusketStep {
        weapon: ItemId,
        step: MusketStep,
        bound: BoundItems,
    },
    Recharge {
        pack: ItemId,
    },
    FragmentDecay {
        item: ItemId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTask {
    pub id: TaskId,
    /// Actor kept busy by the task, if any
    pub actor: Option<ActorId>,
    pub due: Tick,
    pub repeat_every: Option<Tick>,
    pub kind: TaskKind,
}

#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    queue: BTreeMap<(Tick, TaskId), ScheduledTask>,
    next_id: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self) -> TaskId {
        self.next_id += 1;
        TaskId(self.next_id)
    }

    pub fn schedule(&mut self, actor: Option<ActorId>, due: Tick, kind: TaskKind) -> TaskId {
        let id = self.allocate();
        self.queue.insert(
            (due, id),
            ScheduledTask {
                id,
                actor,
                due,
                repeat_every: None,
                kind,
            },
        );
        id
    }

    /// Register a task that fires every `every` ticks until cancelled
    pub fn schedule_repeating(&mut self, first_due: Tick, every: Tick, kind: TaskKind) -> TaskId {
        let id = self.allocate();
        self.queue.insert(
            (first_due, id),
            ScheduledTask {
                id,
                actor: None,
                due: first_due,
                repeat_every: Some(every.max(1)),
                kind,
            },
        );
        id
    }

    pub fn cancel(&mut self, id: TaskId) -> Option<ScheduledTask> {
        let key = self.queue.keys().find(|(_, task)| *task == id).copied()?;
        self.queue.remove(&key)
    }

    /// Void every task that keeps `actor` busy
    pub fn cancel_for_actor(&mut self, actor: ActorId) -> Vec<ScheduledTask> {
        let keys: Vec<(Tick, TaskId)> = self
            .queue
            .iter()
            .filter(|(_, task)| task.actor == Some(actor))
            .map(|(key, _)| *key)
            .collect();
        keys.into_iter()
            .filter_map(|key| self.queue.remove(&key))
            .collect()
    }

    pub fn is_busy(&self, actor: ActorId) -> bool {
        self.queue.values().any(|task| task.actor == Some(actor))
    }

    pub fn busy_until(&self, actor: ActorId) -> Option<Tick> {
        self.queue
            .values()
            .filter(|task| task.actor == Some(actor))
            .map(|task| task.due)
            .max()
    }

    pub fn get(&self, id: TaskId) -> Option<&ScheduledTask> {
        self.queue.values().find(|task| task.id == id)
    }

    pub fn find(&self, pred: impl Fn(&ScheduledTask) -> bool) -> Option<&ScheduledTask> {
        self.queue.values().find(|task| pred(task))
    }

    /// Earliest due tick among pending tasks
    pub fn next_due(&self) -> Option<Tick> {
        self.queue.keys().next().map(|(due, _)| *due)
    }

    /// Remove and return the earliest task due at or before `now`.
    /// Repeating tasks are re-queued for their next period.
    pub fn pop_due(&mut self, now: Tick) -> Option<ScheduledTask> {
        let key = *self.queue.keys().next()?;
        if key.0 > now {
            return None;
        }
        let task = self.queue.remove(&key)?;
        if let Some(every) = task.repeat_every {
            let mut next = task.clone();
            next.due = task.due + every;
            self.queue.insert((next.due, next.id), next);
        }
        Some(task)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_due_in_order() {
        let mut scheduler = Scheduler::new();
        let late = scheduler.schedule(None, 10, TaskKind::FragmentDecay { item: ItemId(1) });
        let early = scheduler.schedule(None, 5, TaskKind::FragmentDecay { item: ItemId(2) });
        assert!(scheduler.pop_due(4).is_none());
        assert_eq!(scheduler.pop_due(10).unwrap().id, early);
        assert_eq!(scheduler.pop_due(10).unwrap().id, late);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_same_tick_keeps_registration_order() {
        let mut scheduler = Scheduler::new();
        let a = scheduler.schedule(None, 3, TaskKind::Recharge { pack: ItemId(1) });
        let b = scheduler.schedule(None, 3, TaskKind::Recharge { pack: ItemId(2) });
        assert_eq!(scheduler.pop_due(3).unwrap().id, a);
        assert_eq!(scheduler.pop_due(3).unwrap().id, b);
    }

    #[test]
    fn test_repeating_task_requeues() {
        let mut scheduler = Scheduler::new();
        let id = scheduler.schedule_repeating(10, 10, TaskKind::Recharge { pack: ItemId(1) });
        assert_eq!(scheduler.pop_due(10).unwrap().due, 10);
        assert_eq!(scheduler.next_due(), Some(20));
        assert!(scheduler.cancel(id).is_some());
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_busy_and_cancel_for_actor() {
        let mut scheduler = Scheduler::new();
        let actor = ActorId(1);
        scheduler.schedule(Some(actor), 8, TaskKind::BowDraw { weapon: ItemId(3) });
        scheduler.schedule(None, 8, TaskKind::FragmentDecay { item: ItemId(4) });
        assert!(scheduler.is_busy(actor));
        assert_eq!(scheduler.busy_until(actor), Some(8));

        let voided = scheduler.cancel_for_actor(actor);
        assert_eq!(voided.len(), 1);
        assert!(!scheduler.is_busy(actor));
        assert_eq!(scheduler.len(), 1);
    }
}
