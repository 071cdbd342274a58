// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Apply a local change before the remote write lands, and undo it if the write fails.

use std::future::Future;

/// A reversible local change to some state `S`.
pub trait Patch<S> {
    fn apply(&self, state: &mut S);
    fn revert(&self, state: &mut S);
}

/// A patch that has been applied locally and awaits the remote outcome.
#[must_use = "an applied patch must be settled with the remote outcome"]
#[derive(Debug)]
pub struct Applied<P> {
    patch: P,
}

impl<P> Applied<P> {
    pub fn apply<S>(patch: P, state: &mut S) -> Self
    where
        P: Patch<S>,
    {
        patch.apply(state);
        Self { patch }
    }

    pub fn patch(&self) -> &P {
        &self.patch
    }

    /// Keep the change.
    pub fn commit(self) -> P {
        self.patch
    }

    /// Undo the change.
    pub fn revert<S>(self, state: &mut S) -> P
    where
        P: Patch<S>,
    {
        self.patch.revert(state);
        self.patch
    }

    /// Keep the change on success; revert it on failure.
    ///
    /// Returns the patch so the caller can act on what was undone.
    pub fn settle<S, T, E>(self, state: &mut S, outcome: &Result<T, E>) -> P
    where
        P: Patch<S>,
    {
        if outcome.is_err() {
            self.revert(state)
        } else {
            self.commit()
        }
    }
}

/// Apply `patch`, run `remote`, and revert if it fails.
///
/// For callers that can hold `state` across the await. The swipe session
/// cannot (the stack must stay responsive) and uses [`Applied`] directly.
pub async fn run<S, P, T, E, F>(state: &mut S, patch: P, remote: F) -> Result<T, E>
where
    P: Patch<S>,
    F: Future<Output = Result<T, E>>,
{
    let applied = Applied::apply(patch, state);
    let outcome = remote.await;
    applied.settle(state, &outcome);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Push(u32);

    impl Patch<Vec<u32>> for Push {
        fn apply(&self, state: &mut Vec<u32>) {
            state.push(self.0);
        }

        fn revert(&self, state: &mut Vec<u32>) {
            state.retain(|v| *v != self.0);
        }
    }

    #[tokio::test]
    async fn test_success_keeps_change() {
        let mut state = vec![1];
        let result: Result<(), &str> = run(&mut state, Push(2), async { Ok(()) }).await;
        assert!(result.is_ok());
        assert_eq!(state, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_failure_reverts_change() {
        let mut state = vec![1];
        let result: Result<(), &str> = run(&mut state, Push(2), async { Err("offline") }).await;
        assert_eq!(result, Err("offline"));
        assert_eq!(state, vec![1]);
    }

    #[test]
    fn test_split_apply_and_settle() {
        let mut state = Vec::new();
        let applied = Applied::apply(Push(7), &mut state);
        assert_eq!(state, vec![7]);

        let patch = applied.settle(&mut state, &Err::<(), _>("boom"));
        assert_eq!(patch.0, 7);
        assert!(state.is_empty());
    }
}
