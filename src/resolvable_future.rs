use futures::task::{Context, Poll, Waker};
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::mpsc::{
    sync_channel, Receiver, SendError, SyncSender, TryRecvError, TrySendError,
};
use std::sync::{Arc, Weak};

type WakerSlot = Arc<Mutex<Option<Waker>>>;

/// the resolving half of a ResolvableFuture, may be moved to any thread
/// dropping the last resolver without resolving wakes the future as disconnected
pub struct ResolvableFutureResolver<R> {
    sender: Option<SyncSender<R>>,
    waker: WakerSlot,
}

impl<R> ResolvableFutureResolver<R> {
    fn new(tx: SyncSender<R>, waker: WakerSlot) -> Self {
        Self {
            sender: Some(tx),
            waker,
        }
    }
    /// resolve the future, this fails when the future was already resolved or dropped
    pub fn resolve(&self, resolution: R) -> Result<(), SendError<R>> {
        log::trace!("ResolvableFutureResolver.resolve");
        let sender = match &self.sender {
            Some(sender) => sender,
            None => return Err(SendError(resolution)),
        };
        if let Err(e) = sender.try_send(resolution) {
            return Err(SendError(match e {
                TrySendError::Full(r) | TrySendError::Disconnected(r) => r,
            }));
        }
        self.wake();
        Ok(())
    }

    fn wake(&self) {
        // poll stores its waker while holding this lock, so we either see it here or poll sees our value
        let waker_opt = self.waker.lock().take();
        if let Some(waker) = waker_opt {
            waker.wake();
        }
    }
}

impl<R> Drop for ResolvableFutureResolver<R> {
    fn drop(&mut self) {
        // the sender must be gone before waking so the next poll sees the disconnect
        drop(self.sender.take());
        self.wake();
    }
}

/// a Future which is resolved by calling resolve on its resolver
/// #Example
/// ```rust
/// use hirofa_loader::resolvable_future::ResolvableFuture;
/// use futures::executor::block_on;
/// let rf = ResolvableFuture::new();
/// let resolver = rf.get_resolver();
/// std::thread::spawn(move || {
///     resolver.resolve(123).expect("resolve failed");
/// });
/// assert_eq!(block_on(rf), 123);
/// ```
pub struct ResolvableFuture<R> {
    result: Receiver<R>,
    waker: WakerSlot,
    // held until the first get_resolver, the future itself never keeps the sender alive after that
    unclaimed: Mutex<Option<Arc<ResolvableFutureResolver<R>>>>,
    claimed: Weak<ResolvableFutureResolver<R>>,
}
impl<R> ResolvableFuture<R> {
    pub fn new() -> Self {
        let (tx, rx) = sync_channel(1);
        let waker: WakerSlot = Arc::new(Mutex::new(None));
        let resolver = Arc::new(ResolvableFutureResolver::new(tx, waker.clone()));

        Self {
            result: rx,
            waker,
            claimed: Arc::downgrade(&resolver),
            unclaimed: Mutex::new(Some(resolver)),
        }
    }
    /// create a future which is already resolved
    pub fn resolved(resolution: R) -> Self {
        let rf = Self::new();
        // a fresh channel always has room for one value
        let _ = rf.get_resolver().resolve(resolution);
        rf
    }
    /// get the resolver, once every resolver is dropped the future can no longer be resolved
    pub fn get_resolver(&self) -> Arc<ResolvableFutureResolver<R>> {
        if let Some(resolver) = self.unclaimed.lock().take() {
            return resolver;
        }
        match self.claimed.upgrade() {
            Some(resolver) => resolver,
            None => {
                let (tx, _rx) = sync_channel(1);
                Arc::new(ResolvableFutureResolver::new(tx, self.waker.clone()))
            }
        }
    }

    /// poll for the resolution, Ready(None) means every resolver was dropped without resolving
    pub fn poll_resolution(&self, cx: &mut Context<'_>) -> Poll<Option<R>> {
        let waker_opt = &mut *self.waker.lock();
        match self.result.try_recv() {
            Ok(res) => {
                log::trace!("ResolvableFuture::poll -> Ready");
                Poll::Ready(Some(res))
            }
            Err(TryRecvError::Disconnected) => {
                log::trace!("ResolvableFuture::poll -> Disconnected");
                Poll::Ready(None)
            }
            Err(TryRecvError::Empty) => {
                log::trace!("ResolvableFuture::poll -> Pending");
                let _ = waker_opt.replace(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}
impl<R> Default for ResolvableFuture<R> {
    fn default() -> Self {
        Self::new()
    }
}
impl<R> Future for ResolvableFuture<R> {
    type Output = R;

    /// stays pending forever when every resolver was dropped without resolving,
    /// use poll_resolution to observe that
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        log::trace!("ResolvableFuture::poll");
        match self.poll_resolution(cx) {
            Poll::Ready(Some(res)) => Poll::Ready(res),
            Poll::Ready(None) => {
                log::error!("ResolvableFuture::poll all resolvers dropped without resolving");
                Poll::Pending
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
