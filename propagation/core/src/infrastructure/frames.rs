// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::cell::RefCell;
use std::sync::Arc;

use crate::domain::frame::{ContextFrame, FrameStack};

thread_local! {
    static ACTIVE_FRAME: RefCell<Option<Arc<ContextFrame>>> = const { RefCell::new(None) };
}

/// [`FrameStack`] over a per-thread active-frame slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadFrameStack;

impl FrameStack for ThreadFrameStack {
    fn current_frame(&self) -> Option<Arc<ContextFrame>> {
        ACTIVE_FRAME.with(|slot| slot.borrow().clone())
    }

    fn enter_frame(&self, frame: Arc<ContextFrame>) -> Option<Arc<ContextFrame>> {
        ACTIVE_FRAME.with(|slot| slot.replace(Some(frame)))
    }

    fn exit_frame(&self, prior: Option<Arc<ContextFrame>>) -> Option<Arc<ContextFrame>> {
        ACTIVE_FRAME.with(|slot| slot.replace(prior))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::frame::Attributes;

    #[test]
    fn test_frames_are_per_thread() {
        let frame = Arc::new(ContextFrame::new(Attributes::new()));
        assert!(ThreadFrameStack.enter_frame(Arc::clone(&frame)).is_none());

        let seen_elsewhere = std::thread::spawn(|| ThreadFrameStack.current_frame().is_some())
            .join()
            .unwrap();

        assert!(!seen_elsewhere);
        let popped = ThreadFrameStack.exit_frame(None).unwrap();
        assert!(Arc::ptr_eq(&popped, &frame));
    }
}
