use std::{
    future::Future,
    task::{Context, Poll},
    thread,
    time::Duration,
};

use futures::task::noop_waker_ref;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Drives `future` to completion on the calling thread.
///
/// I/O resources must be registered with a runtime whose workers run on
/// other threads (the binary enters a multi-threaded tokio runtime before
/// calling into `ObjectFS`).
pub fn poll_until_ready<Fut>(future: Fut) -> Fut::Output
where
    Fut: Future,
{
    let mut future = Box::pin(future);
    let mut context = Context::from_waker(noop_waker_ref());

    loop {
        match future.as_mut().poll(&mut context) {
            Poll::Ready(result) => return result,
            Poll::Pending => thread::sleep(POLL_INTERVAL),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;

    use super::*;

    struct PendingFor(u32);

    impl Future for PendingFor {
        type Output = u32;

        fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<u32> {
            if self.0 == 0 {
                Poll::Ready(42)
            } else {
                self.0 -= 1;
                Poll::Pending
            }
        }
    }

    #[test]
    fn test_poll_until_ready() {
        assert_eq!(poll_until_ready(futures::future::ready(7)), 7);
        assert_eq!(poll_until_ready(PendingFor(3)), 42);
    }

    #[test]
    fn test_poll_until_ready_error() {
        let result: Result<(), String> =
            poll_until_ready(futures::future::ready(Err("boom".to_string())));

        assert_eq!(result, Err("boom".to_string()));
    }
}
