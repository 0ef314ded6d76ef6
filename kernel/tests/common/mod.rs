//! Hosted machine for integration tests
//!
//! Host threads stand in for both processors and process stacks:
//! - the thread calling `schedule_once` (or `scheduler`) is a processor
//! - every process runs on its own thread, started at its first dispatch
//! - a context switch passes a baton from one thread to the other and parks
//!   the sender until the baton comes back
//!
//! Exactly one thread per processor is ever unparked, so the per-processor
//! state the kernel keeps sees the same discipline as on real hardware.

#![allow(dead_code)]

use std::cell::Cell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock};
use std::thread;
use std::time::Duration;

use prio_kernel::{Channel, Kernel, KernelConfig, Machine, Pid, ProcError, Slot, SpinLock};

pub type HostKernel = Kernel<HostMachine>;

/// Code run by a process; returning means exit(0)
pub type Program = Box<dyn FnOnce(&'static HostKernel) + Send>;

/// Upper bound on one process run before the test is declared hung
const SWITCH_TIMEOUT: Duration = Duration::from_secs(20);

thread_local! {
    static CPU: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Make the calling thread act as processor `cpu`
pub fn bind_cpu(cpu: usize) {
    CPU.with(|c| c.set(Some(cpu)));
}

// ============================================================================
// Baton
// ============================================================================

/// One-shot handoff carrying the processor the receiver now runs on
struct Baton {
    turn: Mutex<Option<usize>>,
    cv: Condvar,
}

impl Baton {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            turn: Mutex::new(None),
            cv: Condvar::new(),
        })
    }

    fn pass(&self, cpu: usize) {
        *self.turn.lock().unwrap() = Some(cpu);
        self.cv.notify_one();
    }

    fn take(&self) -> usize {
        let mut turn = self.turn.lock().unwrap();
        loop {
            if let Some(cpu) = turn.take() {
                return cpu;
            }
            turn = self.cv.wait(turn).unwrap();
        }
    }

    fn take_timeout(&self, timeout: Duration) -> Option<usize> {
        let turn = self.turn.lock().unwrap();
        let (mut turn, _) = self
            .cv
            .wait_timeout_while(turn, timeout, |turn| turn.is_none())
            .unwrap();
        turn.take()
    }
}

// ============================================================================
// Host Machine
// ============================================================================

#[derive(Default)]
struct Contexts {
    /// Baton of every prepared slot
    batons: HashMap<usize, Arc<Baton>>,
    /// Slots whose thread is already running
    started: HashSet<usize>,
    /// Program each prepared slot will run
    programs: HashMap<usize, Program>,
    /// Programs queued by a parent for its next forks
    pending: HashMap<usize, VecDeque<Program>>,
    /// Program of the root process
    init: Option<Program>,
}

pub struct HostMachine {
    cpu_batons: Vec<Arc<Baton>>,
    interrupts: Vec<AtomicBool>,
    contexts: Mutex<Contexts>,
    kernel: OnceLock<&'static HostKernel>,
    fail_prepare: AtomicBool,
    fail_duplicate: AtomicBool,
    resources_released: AtomicUsize,
    contexts_released: AtomicUsize,
    unlocked_releases: AtomicUsize,
}

impl HostMachine {
    pub fn new(ncpu: usize) -> Self {
        Self {
            cpu_batons: (0..ncpu).map(|_| Baton::new()).collect(),
            interrupts: (0..ncpu).map(|_| AtomicBool::new(false)).collect(),
            contexts: Mutex::new(Contexts::default()),
            kernel: OnceLock::new(),
            fail_prepare: AtomicBool::new(false),
            fail_duplicate: AtomicBool::new(false),
            resources_released: AtomicUsize::new(0),
            contexts_released: AtomicUsize::new(0),
            unlocked_releases: AtomicUsize::new(0),
        }
    }

    fn kernel(&self) -> &'static HostKernel {
        self.kernel.get().expect("machine not attached to a kernel")
    }

    /// Program the next fork by the process in `parent` gives its child
    pub fn queue_child(&self, parent: Slot, program: Program) {
        let mut contexts = self.contexts.lock().unwrap();
        contexts
            .pending
            .entry(parent.index())
            .or_default()
            .push_back(program);
    }

    /// Make the next kernel stack allocation fail
    pub fn fail_next_prepare(&self) {
        self.fail_prepare.store(true, Ordering::SeqCst);
    }

    /// Make the next address space copy fail
    pub fn fail_next_duplicate(&self) {
        self.fail_duplicate.store(true, Ordering::SeqCst);
    }

    pub fn resources_released(&self) -> usize {
        self.resources_released.load(Ordering::SeqCst)
    }

    pub fn contexts_released(&self) -> usize {
        self.contexts_released.load(Ordering::SeqCst)
    }

    /// Contexts released without the process table lock held
    pub fn unlocked_releases(&self) -> usize {
        self.unlocked_releases.load(Ordering::SeqCst)
    }

    /// Number of prepared contexts not yet released
    pub fn live_contexts(&self) -> usize {
        self.contexts.lock().unwrap().batons.len()
    }

    fn baton(&self, slot: Slot) -> Arc<Baton> {
        let contexts = self.contexts.lock().unwrap();
        contexts
            .batons
            .get(&slot.index())
            .cloned()
            .expect("switch to a slot without context")
    }

    /// Start the thread of a slot on its first dispatch
    fn start(&self, slot: Slot, baton: Arc<Baton>) {
        let program = {
            let mut contexts = self.contexts.lock().unwrap();
            if !contexts.started.insert(slot.index()) {
                return;
            }
            contexts.programs.remove(&slot.index())
        };
        let kernel = self.kernel();

        thread::Builder::new()
            .name(format!("proc-{}", slot.index()))
            .spawn(move || {
                bind_cpu(baton.take());
                // SAFETY: first code on a fresh process stack
                unsafe { kernel.fork_return() };
                if let Some(program) = program {
                    program(kernel);
                }
                kernel.exit(0)
            })
            .expect("spawn process thread");
    }
}

impl Machine for HostMachine {
    fn cpu_id(&self) -> usize {
        CPU.with(|c| c.get()).expect("thread is not bound to a cpu")
    }

    fn interrupts_enabled(&self) -> bool {
        self.interrupts[self.cpu_id()].load(Ordering::SeqCst)
    }

    fn enable_interrupts(&self) {
        self.interrupts[self.cpu_id()].store(true, Ordering::SeqCst);
    }

    fn disable_interrupts(&self) {
        self.interrupts[self.cpu_id()].store(false, Ordering::SeqCst);
    }

    fn idle(&self) {
        thread::sleep(Duration::from_micros(50));
    }

    fn prepare_context(&self, slot: Slot) -> Result<(), ProcError> {
        if self.fail_prepare.swap(false, Ordering::SeqCst) {
            return Err(ProcError::OutOfMemory);
        }
        let mut contexts = self.contexts.lock().unwrap();
        contexts.batons.insert(slot.index(), Baton::new());
        contexts.started.remove(&slot.index());
        Ok(())
    }

    fn setup_init(&self, slot: Slot) -> Result<(), ProcError> {
        let mut contexts = self.contexts.lock().unwrap();
        let program = contexts.init.take().ok_or(ProcError::OutOfMemory)?;
        contexts.programs.insert(slot.index(), program);
        Ok(())
    }

    fn duplicate(&self, parent: Slot, child: Slot) -> Result<(), ProcError> {
        let mut contexts = self.contexts.lock().unwrap();
        let program = contexts
            .pending
            .get_mut(&parent.index())
            .and_then(VecDeque::pop_front);
        if self.fail_duplicate.swap(false, Ordering::SeqCst) {
            return Err(ProcError::OutOfMemory);
        }
        if let Some(program) = program {
            contexts.programs.insert(child.index(), program);
        }
        Ok(())
    }

    fn release_context(&self, slot: Slot) {
        if !self.kernel().holds_table() {
            self.unlocked_releases.fetch_add(1, Ordering::SeqCst);
        }
        let mut contexts = self.contexts.lock().unwrap();
        contexts.batons.remove(&slot.index());
        contexts.started.remove(&slot.index());
        contexts.programs.remove(&slot.index());
        contexts.pending.remove(&slot.index());
        self.contexts_released.fetch_add(1, Ordering::SeqCst);
    }

    fn release_resources(&self, _slot: Slot) {
        self.resources_released.fetch_add(1, Ordering::SeqCst);
    }

    unsafe fn switch_to_process(&self, cpu: usize, slot: Slot) {
        let baton = self.baton(slot);
        self.start(slot, baton.clone());
        baton.pass(cpu);

        if self.cpu_batons[cpu].take_timeout(SWITCH_TIMEOUT).is_none() {
            panic!("cpu {}: process in slot {} never switched back", cpu, slot.index());
        }
    }

    unsafe fn switch_to_scheduler(&self, cpu: usize, slot: Slot) {
        let baton = self.baton(slot);
        self.cpu_batons[cpu].pass(cpu);

        // A zombie is never passed the baton again
        bind_cpu(baton.take());
    }
}

// ============================================================================
// Test Harness
// ============================================================================

/// Build a kernel whose root process runs `init`, then idles reaping
/// children
///
/// The calling thread becomes processor 0.
pub fn boot<F>(ncpu: usize, init: F) -> &'static HostKernel
where
    F: FnOnce(&'static HostKernel) + Send + 'static,
{
    let config = KernelConfig::new().with_cpus(ncpu).with_init_name("init");
    let kernel: &'static HostKernel = Box::leak(Box::new(Kernel::new(config, HostMachine::new(ncpu))));
    assert!(kernel.machine().kernel.set(kernel).is_ok());

    kernel.machine().contexts.lock().unwrap().init = Some(Box::new(move |k: &'static HostKernel| {
        init(k);
        reap_forever(k)
    }));

    bind_cpu(0);
    kernel.spawn_init().expect("spawn init");
    kernel
}

/// Fork a child of the calling process that runs `program`
pub fn fork_with<F>(k: &'static HostKernel, program: F) -> Result<Pid, ProcError>
where
    F: FnOnce(&'static HostKernel) + Send + 'static,
{
    let me = k.current().expect("fork outside process context");
    k.machine().queue_child(me, Box::new(program));
    k.fork()
}

/// Reap children until there are none, then sleep for good
pub fn reap_forever(k: &'static HostKernel) -> ! {
    loop {
        if k.wait(None).is_err() {
            park(k);
        }
    }
}

/// Block the calling process on a channel nobody wakes
pub fn park(k: &'static HostKernel) -> ! {
    let lock = SpinLock::new("park", ());
    let mut guard = lock.lock(k);
    loop {
        guard = k.sleep(Channel::of(&lock), guard);
    }
}

/// Dispatch on processor 0 until nothing is runnable
pub fn run_until_idle(k: &'static HostKernel) {
    for _ in 0..100_000 {
        if !k.schedule_once() {
            return;
        }
    }
    panic!("system never went idle");
}

/// Alternate idle runs and clock ticks until `done` holds
pub fn run_ticking(k: &'static HostKernel, done: impl Fn() -> bool) {
    for _ in 0..10_000 {
        run_until_idle(k);
        if done() {
            return;
        }
        k.clock_interrupt();
    }
    panic!("condition never reached");
}

/// Ordered event log shared between processes and the test
#[derive(Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<String>>>);

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}
