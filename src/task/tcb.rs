use core::fmt;

use crate::config::TASK_STACK_SIZE;

/// Index of a task in the task table. Stable for the life of the kernel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(usize);

impl TaskId {
    pub const fn new(id: usize) -> Self {
        Self(id)
    }

    pub const fn as_usize(self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Ready,
    Running,
    /// The entry procedure returned. Never scheduled again.
    Blocked,
    /// Reserved. Nothing moves a task here.
    Terminated,
}

pub type TaskEntry = fn();

#[repr(C, align(16))]
pub struct TaskStack([u8; TASK_STACK_SIZE]);

impl TaskStack {
    const fn new() -> Self {
        Self([0; TASK_STACK_SIZE])
    }

    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.0
    }

    pub fn contains(&self, addr: usize) -> bool {
        let base = self.0.as_ptr() as usize;
        (base..base + TASK_STACK_SIZE).contains(&addr)
    }
}

/// Task control block.
pub struct Tcb {
    pub(super) id: TaskId,
    pub(super) state: TaskState,
    /// Stack pointer of the suspended context
    pub(super) context: usize,
    pub(super) entry: Option<TaskEntry>,
    pub(super) stack: TaskStack,
}

impl Tcb {
    pub(super) const UNUSED: Tcb = Tcb {
        id: TaskId(0),
        state: TaskState::Blocked,
        context: 0,
        entry: None,
        stack: TaskStack::new(),
    };

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == TaskState::Ready
    }

    pub(super) fn reset(&mut self) {
        self.state = TaskState::Blocked;
        self.context = 0;
        self.entry = None;
    }
}
