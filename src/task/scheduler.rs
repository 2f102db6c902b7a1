//! Round-robin task selection.
//!
//! [`Scheduler`] only decides. Every operation that may change the running
//! task returns a [`Transition`] describing what the CPU has to do, and the
//! caller in `task` carries it out after dropping the scheduler lock.

use crate::arch::context::{self, SwitchFrame};
use crate::config::MAX_TASKS;
use crate::errors::TaskError;

use super::tcb::{TaskEntry, TaskId, TaskState, Tcb};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Keep running whatever is running.
    Stay,
    /// Nothing can run; current was cleared.
    Idle,
    /// First selection ever. Jump into the task without saving anything.
    Bootstrap(TaskId),
    /// The yielding task was the only ready one and carries on.
    Resume(TaskId),
    /// Save the running context (into `from`, or a scratch slot when idle)
    /// and restore `to`.
    Switch { from: Option<TaskId>, to: TaskId },
}

pub struct Scheduler {
    tasks: [Tcb; MAX_TASKS],
    num_tasks: usize,
    current: Option<TaskId>,
    /// Last task selected. Round-robin scans start just after it
    cursor: usize,
    started: bool,
}

impl Scheduler {
    pub const fn new() -> Self {
        let mut tasks = [Tcb::UNUSED; MAX_TASKS];
        let mut i = 0;
        while i < MAX_TASKS {
            tasks[i].id = TaskId::new(i);
            i += 1;
        }

        Self {
            tasks,
            num_tasks: 0,
            current: None,
            cursor: 0,
            started: false,
        }
    }

    pub fn init(&mut self) {
        for task in self.tasks.iter_mut() {
            task.reset();
        }
        self.num_tasks = 0;
        self.current = None;
        self.cursor = 0;
        self.started = false;
    }

    pub fn create(&mut self, entry: TaskEntry) -> Result<TaskId, TaskError> {
        if self.num_tasks >= MAX_TASKS {
            log::warn!("task table full ({} tasks), task not created", MAX_TASKS);
            return Err(TaskError::TableFull);
        }

        let id = TaskId::new(self.num_tasks);
        let task = &mut self.tasks[id.as_usize()];
        task.entry = Some(entry);
        task.context = context::build_initial_frame(
            task.stack.as_mut_bytes(),
            SwitchFrame::bootstrap(super::task_bootstrap, id.as_usize()),
        );
        task.state = TaskState::Ready;
        self.num_tasks += 1;

        log::debug!("created task {}", id);
        Ok(id)
    }

    /// Picks the next task to run.
    ///
    /// The guard check belongs to the caller, which knows whether it runs in
    /// interrupt context.
    pub fn schedule(&mut self) -> Transition {
        if self.num_tasks == 0 {
            return Transition::Stay;
        }

        if !self.started {
            return match self.bootstrap() {
                Some(id) => Transition::Bootstrap(id),
                None => Transition::Stay,
            };
        }

        let from = self.current;
        match (from, self.next_ready()) {
            (Some(current), Some(next)) if current == next => {
                self.tasks[current.as_usize()].state = TaskState::Running;
                Transition::Resume(current)
            }
            (_, Some(next)) => {
                if let Some(current) = from {
                    let task = &mut self.tasks[current.as_usize()];
                    if task.state == TaskState::Running {
                        task.state = TaskState::Ready;
                    }
                }
                self.tasks[next.as_usize()].state = TaskState::Running;
                self.current = Some(next);
                self.cursor = next.as_usize();
                Transition::Switch { from, to: next }
            }
            (Some(current), None) if self.state(current) == Some(TaskState::Running) => Transition::Stay,
            (_, None) => {
                self.current = None;
                Transition::Idle
            }
        }
    }

    /// Gives up the CPU voluntarily.
    pub fn yield_now(&mut self) -> Transition {
        if let Some(current) = self.current {
            let task = &mut self.tasks[current.as_usize()];
            if task.state == TaskState::Running {
                task.state = TaskState::Ready;
            }
        }
        self.schedule()
    }

    /// Selects the task `start_multitasking` jumps into.
    pub fn start(&mut self) -> Result<TaskId, TaskError> {
        if self.started {
            return Err(TaskError::AlreadyStarted);
        }
        self.bootstrap().ok_or(TaskError::NoReadyTask)
    }

    /// Marks a task whose entry procedure returned.
    pub fn block(&mut self, id: TaskId) {
        if let Some(task) = self.tasks[..self.num_tasks].get_mut(id.as_usize()) {
            task.state = TaskState::Blocked;
        }
    }

    pub fn current(&self) -> Option<TaskId> {
        self.current
    }

    pub fn task_count(&self) -> usize {
        self.num_tasks
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn state(&self, id: TaskId) -> Option<TaskState> {
        self.live(id).map(Tcb::state)
    }

    pub fn entry(&self, id: TaskId) -> Option<TaskEntry> {
        self.live(id).and_then(|task| task.entry)
    }

    /// Saved stack pointer of a suspended task.
    pub(super) fn context(&self, id: TaskId) -> usize {
        self.tasks[id.as_usize()].context
    }

    pub(super) fn context_slot(&mut self, id: TaskId) -> *mut usize {
        &mut self.tasks[id.as_usize()].context
    }

    fn live(&self, id: TaskId) -> Option<&Tcb> {
        self.tasks[..self.num_tasks].get(id.as_usize())
    }

    fn bootstrap(&mut self) -> Option<TaskId> {
        let id = self.tasks[..self.num_tasks]
            .iter()
            .find(|task| task.is_ready())
            .map(Tcb::id)?;

        self.tasks[id.as_usize()].state = TaskState::Running;
        self.current = Some(id);
        self.cursor = id.as_usize();
        self.started = true;
        Some(id)
    }

    fn next_ready(&self) -> Option<TaskId> {
        let count = self.num_tasks;
        let start = (self.cursor + 1) % count;
        (0..count)
            .map(|offset| (start + offset) % count)
            .find(|&slot| self.tasks[slot].is_ready())
            .map(TaskId::new)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::context::read_frame;

    // every task stack lives inline, keep the table on the heap
    fn boxed() -> Box<Scheduler> {
        Box::default()
    }

    fn task_a() {}
    fn task_b() {}
    fn task_c() {}

    fn selected(transition: Transition) -> TaskId {
        match transition {
            Transition::Bootstrap(id) | Transition::Resume(id) | Transition::Switch { to: id, .. } => id,
            other => panic!("expected a selection, got {:?}", other),
        }
    }

    #[test]
    fn test_task_creation() {
        let mut scheduler = boxed();
        let id = scheduler.create(task_a).unwrap();

        assert_eq!(id, TaskId::new(0));
        assert_eq!(scheduler.task_count(), 1);
        assert_eq!(scheduler.state(id), Some(TaskState::Ready));
        assert_eq!(scheduler.entry(id), Some(task_a as TaskEntry));
        assert!(scheduler.current().is_none());
    }

    #[test]
    fn test_initial_context_enters_trampoline() {
        let mut scheduler = boxed();
        let id = scheduler.create(task_b).unwrap();

        let sp = scheduler.context(id);
        assert!(scheduler.tasks[id.as_usize()].stack.contains(sp));

        let frame = unsafe { read_frame(sp) };
        assert_eq!(frame.rip, context::trampoline_address() as u64);
        assert_eq!(frame.r12, id.as_usize() as u64);
    }

    #[test]
    fn test_table_full_is_refused() {
        let mut scheduler = boxed();
        for _ in 0..MAX_TASKS {
            scheduler.create(task_a).unwrap();
        }

        assert_eq!(scheduler.create(task_b), Err(TaskError::TableFull));
        assert_eq!(scheduler.task_count(), MAX_TASKS);
        assert!(scheduler.state(TaskId::new(MAX_TASKS)).is_none());
    }

    #[test]
    fn test_schedule_without_tasks_is_noop() {
        let mut scheduler = boxed();
        assert_eq!(scheduler.schedule(), Transition::Stay);
        assert!(!scheduler.is_started());
    }

    #[test]
    fn test_scheduler() {
        let mut scheduler = boxed();
        let a = scheduler.create(task_a).unwrap();
        let b = scheduler.create(task_b).unwrap();
        let c = scheduler.create(task_c).unwrap();

        let order: Vec<TaskId> = (0..5).map(|_| selected(scheduler.schedule())).collect();
        assert_eq!(order, vec![a, b, c, a, b]);
    }

    #[test]
    fn test_first_schedule_bootstraps_without_save() {
        let mut scheduler = boxed();
        let a = scheduler.create(task_a).unwrap();
        let b = scheduler.create(task_b).unwrap();

        assert_eq!(scheduler.schedule(), Transition::Bootstrap(a));
        assert_eq!(scheduler.state(a), Some(TaskState::Running));
        assert!(scheduler.is_started());

        assert_eq!(scheduler.schedule(), Transition::Switch { from: Some(a), to: b });
        assert_eq!(scheduler.state(a), Some(TaskState::Ready));
        assert_eq!(scheduler.state(b), Some(TaskState::Running));
        assert_eq!(scheduler.current(), Some(b));
    }

    #[test]
    fn test_bootstrap_skips_blocked_slots() {
        let mut scheduler = boxed();
        let a = scheduler.create(task_a).unwrap();
        let b = scheduler.create(task_b).unwrap();
        scheduler.block(a);

        assert_eq!(scheduler.start(), Ok(b));
        assert_eq!(scheduler.start(), Err(TaskError::AlreadyStarted));
    }

    #[test]
    fn test_start_without_ready_task() {
        let mut scheduler = boxed();
        assert_eq!(scheduler.start(), Err(TaskError::NoReadyTask));

        let a = scheduler.create(task_a).unwrap();
        scheduler.block(a);
        assert_eq!(scheduler.start(), Err(TaskError::NoReadyTask));
        assert!(!scheduler.is_started());
    }

    #[test]
    fn test_round_robin_is_fair() {
        let mut scheduler = boxed();
        let count = 4;
        for _ in 0..count {
            scheduler.create(task_a).unwrap();
        }

        scheduler.schedule();
        for _ in 0..3 {
            let mut seen = [false; 4];
            for _ in 0..count {
                let id = selected(scheduler.schedule());
                assert!(!seen[id.as_usize()], "task {} picked twice in one cycle", id);
                seen[id.as_usize()] = true;
            }
            assert!(seen.iter().all(|&s| s));
        }
    }

    #[test]
    fn test_lone_running_task_keeps_cpu() {
        let mut scheduler = boxed();
        let a = scheduler.create(task_a).unwrap();

        scheduler.schedule();
        assert_eq!(scheduler.schedule(), Transition::Stay);
        assert_eq!(scheduler.state(a), Some(TaskState::Running));
    }

    #[test]
    fn test_yield_with_no_other_task_resumes_in_place() {
        let mut scheduler = boxed();
        let a = scheduler.create(task_a).unwrap();

        scheduler.schedule();
        assert_eq!(scheduler.yield_now(), Transition::Resume(a));
        assert_eq!(scheduler.state(a), Some(TaskState::Running));
        assert_eq!(scheduler.current(), Some(a));
    }

    #[test]
    fn test_yield_hands_over_to_next_ready() {
        let mut scheduler = boxed();
        let a = scheduler.create(task_a).unwrap();
        let b = scheduler.create(task_b).unwrap();

        scheduler.schedule();
        assert_eq!(scheduler.yield_now(), Transition::Switch { from: Some(a), to: b });
        assert_eq!(scheduler.yield_now(), Transition::Switch { from: Some(b), to: a });
    }

    #[test]
    fn test_blocked_task_is_never_selected_again() {
        let mut scheduler = boxed();
        let a = scheduler.create(task_a).unwrap();
        let b = scheduler.create(task_b).unwrap();
        let c = scheduler.create(task_c).unwrap();

        scheduler.schedule();
        scheduler.block(a);
        for _ in 0..6 {
            let id = selected(scheduler.schedule());
            assert!(id == b || id == c);
        }
        assert_eq!(scheduler.state(a), Some(TaskState::Blocked));
    }

    #[test]
    fn test_all_blocked_goes_idle() {
        let mut scheduler = boxed();
        let a = scheduler.create(task_a).unwrap();

        scheduler.schedule();
        scheduler.block(a);
        assert_eq!(scheduler.schedule(), Transition::Idle);
        assert!(scheduler.current().is_none());

        // a task created while idle is switched to from the scratch slot
        let b = scheduler.create(task_b).unwrap();
        assert_eq!(scheduler.schedule(), Transition::Switch { from: None, to: b });
        assert_eq!(scheduler.current(), Some(b));
    }

    #[test]
    fn test_init_resets_table() {
        let mut scheduler = boxed();
        scheduler.create(task_a).unwrap();
        scheduler.schedule();

        scheduler.init();
        assert_eq!(scheduler.task_count(), 0);
        assert!(scheduler.current().is_none());
        assert!(!scheduler.is_started());
        assert!(scheduler.tasks.iter().all(|task| task.state() == TaskState::Blocked));
    }
}
