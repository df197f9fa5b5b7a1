use crate::resolvable_future::ResolvableFuture;
use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;
use futures::FutureExt;
use lazy_static::lazy_static;
use std::any::Any;
use std::cell::RefCell;
use std::fmt::Formatter;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::Arc;
use std::thread::Thread;

lazy_static! {
    static ref IDS: AtomicUsize = AtomicUsize::new(0);
}

fn next_id() -> usize {
    IDS.fetch_add(1, Ordering::SeqCst)
}

type Task = Box<dyn FnOnce() + Send + 'static>;

/// get the message of a panic payload as passed to panic!
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// the EventLoop struct is a single thread event queue
/// all tasks and futures added to it run cooperatively on one worker thread
///
/// dropping the EventLoop does not abort anything, the worker runs every task it was given to
/// completion and then exits
pub struct EventLoop {
    tx: Sender<Task>,
    worker: Thread,
    stopping: Arc<AtomicBool>,
    id: usize,
}

thread_local! {
    static SPAWNER: RefCell<Option<LocalSpawner>> = RefCell::new(None);
    static LOCAL_ID: RefCell<Option<usize>> = RefCell::new(None);
}

impl EventLoop {
    /// init a new EventLoop
    pub fn new() -> Self {
        let (tx, rx) = channel::<Task>();

        let id = next_id();
        let stopping = Arc::new(AtomicBool::new(false));
        let worker_stopping = stopping.clone();

        let join_handle = std::thread::spawn(move || {
            LOCAL_ID.with(|rc| {
                rc.borrow_mut().replace(id);
            });

            let mut pool = LocalPool::new();
            SPAWNER.with(|rc| {
                let _ = rc.borrow_mut().replace(pool.spawner());
            });

            log::debug!("EventLoop {} worker loop started", id);

            loop {
                // read the flag before draining so tasks sent before the drop are spawned
                let stopping = worker_stopping.load(Ordering::SeqCst);

                while let Ok(task) = rx.try_recv() {
                    EventLoop::add_local_void(task);
                }

                pool.run_until_stalled();

                if stopping {
                    log::debug!("EventLoop {} finishing pending tasks", id);
                    // blocks until every task in the pool completed, wakes still reach the pool
                    pool.run();
                    break;
                }

                // woken by new tasks (see add_void), by wakers of pending futures in the pool or by drop
                std::thread::park();
            }

            SPAWNER.with(|rc| {
                let _ = rc.borrow_mut().take();
            });
            log::debug!("EventLoop {} worker loop done", id);
        });

        Self {
            tx,
            worker: join_handle.thread().clone(),
            stopping,
            id,
        }
    }

    /// check if the current thread is the worker thread of this EventLoop
    pub fn is_my_pool_thread(&self) -> bool {
        LOCAL_ID.with(|rc| {
            let opt = &*rc.borrow();
            *opt == Some(self.id)
        })
    }

    /// check if the current thread is the worker thread of any EventLoop
    pub fn is_a_pool_thread() -> bool {
        SPAWNER.with(|rc| rc.borrow().is_some())
    }

    /// add a future to the EventLoop from within a running task
    /// a panic in the future is logged and does not stop the worker
    pub fn add_local_future_void<F: Future<Output = ()> + 'static>(fut: F) {
        debug_assert!(EventLoop::is_a_pool_thread());
        let guarded = AssertUnwindSafe(fut).catch_unwind().map(|res| {
            if let Err(payload) = res {
                log::error!(
                    "EventLoop task panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
        });
        SPAWNER.with(move |rc| {
            let spawner = &*rc.borrow();
            match spawner.as_ref() {
                Some(spawner) => {
                    if spawner.spawn_local(guarded).is_err() {
                        log::error!("EventLoop could not spawn local future");
                    }
                }
                None => log::error!("add_local_future_void called outside of an EventLoop"),
            }
        });
    }

    /// add a task to the EventLoop from within a running task
    pub fn add_local_void<T: FnOnce() + 'static>(task: T) {
        debug_assert!(EventLoop::is_a_pool_thread());
        Self::add_local_future_void(async move { task() });
    }

    /// execute a task in the EventLoop and block until it completes
    /// # Panics
    /// when the task panics
    pub fn exe<R: Send + 'static, T: FnOnce() -> R + Send + 'static>(&self, task: T) -> R {
        if Self::is_my_pool_thread(self) {
            task()
        } else {
            let (tx, rx) = channel();
            self.add_void(move || {
                let _ = tx.send(task());
            });
            rx.recv().expect("EventLoop task did not complete")
        }
    }

    /// add an async block to the EventLoop, the returned future resolves with its output
    /// dropping the returned future does not cancel the async block
    /// #Example
    /// ```rust
    /// use hirofa_loader::eventloop::EventLoop;
    /// use futures::executor::block_on;
    /// let test_loop = EventLoop::new();
    /// let fut = test_loop.add_future(async move {
    ///    // this is an async block, you can .await async functions here
    ///    123
    /// });
    /// let res = block_on(fut); // get result
    /// assert_eq!(res, 123);
    /// ```
    pub fn add_future<R: Send + 'static, F: Future<Output = R> + Send + 'static>(
        &self,
        fut: F,
    ) -> ResolvableFuture<R> {
        let rf = ResolvableFuture::new();
        let resolver = rf.get_resolver();
        self.add_future_void(async move {
            if resolver.resolve(fut.await).is_err() {
                log::trace!("EventLoop::add_future result was dropped before resolving");
            }
        });
        rf
    }

    /// add a Future to the pool, for when you don't need the result
    pub fn add_future_void<F: Future<Output = ()> + Send + 'static>(&self, fut: F) {
        self.add_void(move || EventLoop::add_local_future_void(fut))
    }

    /// add a task to the pool
    pub fn add_void<T: FnOnce() + Send + 'static>(&self, task: T) {
        if self.is_my_pool_thread() {
            Self::add_local_void(task);
        } else {
            if self.tx.send(Box::new(task)).is_err() {
                log::error!("EventLoop {} worker loop is gone, task dropped", self.id);
            }
            self.worker.unpark();
        }
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        // the worker is not joined, it exits on its own once its pending tasks completed
        log::debug!("EventLoop {} dropped", self.id);
        self.stopping.store(true, Ordering::SeqCst);
        self.worker.unpark();
    }
}
impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("EventLoop")
    }
}
