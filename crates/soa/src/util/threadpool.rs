use std::{
    ptr::NonNull,
    sync::{
        Arc, Mutex, RwLock,
        atomic::{AtomicBool, Ordering},
    },
    thread::{JoinHandle, available_parallelism, park, spawn},
};

/// a fixed set of parked worker threads that run borrowed jobs
///
/// [`ThreadPool::execute`] does not return before every job it was handed has finished,
/// which is what allows jobs and the job function to borrow from the caller
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    pub fn new() -> Self {
        Self::with_threads(available_parallelism().map(|x| x.get()).unwrap_or(1))
    }

    /// `threads` counts the calling thread, so `with_threads(1)` spawns nothing
    pub fn with_threads(threads: usize) -> Self {
        let shared = Arc::new(Shared::new());

        let workers = (1..threads.max(1))
            .map(|thread_idx| {
                let shared = shared.clone();
                spawn(move || {
                    while !shared.is_closed() {
                        if !shared.run_next(thread_idx) {
                            park();
                        }
                    }
                })
            })
            .collect();

        Self { shared, workers }
    }

    pub fn num_threads(&self) -> usize {
        1 + self.workers.len()
    }

    /// runs `func(job, thread_idx)` for every job, `thread_idx` is below [`ThreadPool::num_threads`]
    pub fn execute<'a, T: 'a + Sync>(
        &mut self,
        jobs: impl IntoIterator<Item = &'a T>,
        func: impl Fn(&'a T, usize) + Send + Sync,
    ) {
        let runner = |job: *const (), thread_idx: usize| {
            func(unsafe { &*(job as *const T) }, thread_idx);
        };

        self.shared.with_runner(&runner, || {
            let queued = self.shared.push_jobs(jobs.into_iter().map(|job| job as *const T as *const ()));
            tracing::trace!(jobs = queued, threads = self.num_threads(), "dispatching jobs");

            for worker in self.workers.iter().take(queued.saturating_sub(1)) {
                worker.thread().unpark();
            }

            while self.shared.run_next(0) {}
        });
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shared.close();
        for worker in self.workers.drain(..) {
            worker.thread().unpark();
            let _ = worker.join();
        }
    }
}

type Runner = NonNull<dyn Fn(*const (), usize) + Send + Sync>;

struct Shared {
    closed: AtomicBool,
    jobs: Mutex<Vec<*const ()>>,
    runner: RwLock<Option<Runner>>,
}

// SAFETY: job pointers and the runner are only dereferenced while `execute` keeps them alive
unsafe impl Send for Shared {}
unsafe impl Sync for Shared {}

impl Shared {
    fn new() -> Self {
        Self {
            closed: AtomicBool::new(false),
            jobs: Mutex::new(Vec::new()),
            runner: RwLock::new(None),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn push_jobs(&self, jobs: impl IntoIterator<Item = *const ()>) -> usize {
        let mut queue = self.jobs.lock().unwrap();
        queue.extend(jobs);
        queue.len()
    }

    /// pops and runs one job, returns false when there was nothing to run
    ///
    /// the runner read guard is held for the duration of the job, `with_runner` cannot
    /// clear the runner (and return) while a job is still in flight
    fn run_next(&self, thread_idx: usize) -> bool {
        let runner = self.runner.read().unwrap();
        let Some(runner) = *runner else {
            return false;
        };

        let Some(job) = self.jobs.lock().unwrap().pop() else {
            return false;
        };

        unsafe { runner.as_ref()(job, thread_idx) };
        true
    }

    fn with_runner(&self, runner: &(dyn Fn(*const (), usize) + Send + Sync), f: impl FnOnce()) {
        // SAFETY: lifetime erasure, the pointer is cleared below before `runner` goes out of scope
        let runner: Runner = unsafe { std::mem::transmute(NonNull::from(runner)) };
        *self.runner.write().unwrap() = Some(runner);

        f();

        *self.runner.write().unwrap() = None;
    }
}
