// src/engine/alloc.rs

//! Resource allocation.
//!
//! The scheduler requests `{np, mem}` before starting a task and returns the
//! grant when the task ends. [`LocalAllocator`] is the minimal correct
//! implementation: two fair semaphores granting in FIFO order of waiters.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::engine::task::Requirement;

/// A permanently unsatisfiable request (e.g. exceeding configured totals).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct AllocError(pub String);

/// Held resources; returned to the allocator on drop.
#[derive(Debug)]
pub struct ResourceGrant {
    np: usize,
    mem: usize,
    _cpu: Option<OwnedSemaphorePermit>,
    _mem: Option<OwnedSemaphorePermit>,
}

impl ResourceGrant {
    pub fn np(&self) -> usize {
        self.np
    }

    pub fn mem(&self) -> usize {
        self.mem
    }
}

#[async_trait]
pub trait Allocator: Send + Sync {
    /// Resolve once the requested resources are available, or fail
    /// immediately when the request can never be satisfied.
    async fn request(&self, req: Requirement) -> Result<ResourceGrant, AllocError>;

    /// Return a grant. Grants also release on drop; this exists for callers
    /// that want the release to be explicit.
    fn release(&self, grant: ResourceGrant) {
        drop(grant);
    }
}

/// Semaphore-backed allocator over a fixed pool of CPU slots and MB.
pub struct LocalAllocator {
    np_total: usize,
    mem_total: usize,
    cpu: Arc<Semaphore>,
    memory: Arc<Semaphore>,
}

impl LocalAllocator {
    pub fn new(np_total: usize, mem_total: usize) -> Self {
        Self {
            np_total,
            mem_total,
            cpu: Arc::new(Semaphore::new(np_total)),
            memory: Arc::new(Semaphore::new(mem_total)),
        }
    }

    pub fn np_total(&self) -> usize {
        self.np_total
    }

    pub fn mem_total(&self) -> usize {
        self.mem_total
    }
}

#[async_trait]
impl Allocator for LocalAllocator {
    async fn request(&self, req: Requirement) -> Result<ResourceGrant, AllocError> {
        if req.np > self.np_total {
            return Err(AllocError(format!(
                "requested {} CPU slots but only {} are configured",
                req.np, self.np_total
            )));
        }
        if req.mem > self.mem_total {
            return Err(AllocError(format!(
                "requested {} MB but only {} are configured",
                req.mem, self.mem_total
            )));
        }

        // Fixed acquisition order (cpu, then mem) so concurrent waiters
        // cannot hold one half of each other's request.
        let cpu = if req.np > 0 {
            let permit = self
                .cpu
                .clone()
                .acquire_many_owned(req.np as u32)
                .await
                .map_err(|_| AllocError("allocator has shut down".into()))?;
            Some(permit)
        } else {
            None
        };

        let memory = if req.mem > 0 {
            let permit = self
                .memory
                .clone()
                .acquire_many_owned(req.mem as u32)
                .await
                .map_err(|_| AllocError("allocator has shut down".into()))?;
            Some(permit)
        } else {
            None
        };

        Ok(ResourceGrant {
            np: req.np,
            mem: req.mem,
            _cpu: cpu,
            _mem: memory,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn oversized_requests_fail_immediately() {
        let alloc = LocalAllocator::new(2, 100);

        let err = alloc
            .request(Requirement::new(3, 0))
            .await
            .expect_err("3 slots can never be granted out of 2");
        assert!(err.0.contains("CPU"));

        let err = alloc
            .request(Requirement::new(1, 200))
            .await
            .expect_err("200 MB can never be granted out of 100");
        assert!(err.0.contains("MB"));
    }

    #[tokio::test]
    async fn grants_release_on_drop() {
        let alloc = LocalAllocator::new(1, 10);

        let grant = alloc.request(Requirement::new(1, 10)).await.unwrap();
        assert_eq!(grant.np(), 1);
        drop(grant);

        // The pool is whole again; a second full-size request succeeds.
        let again = alloc.request(Requirement::new(1, 10)).await.unwrap();
        alloc.release(again);
    }

    #[tokio::test]
    async fn zero_requirements_never_wait() {
        let alloc = LocalAllocator::new(1, 1);
        let _held = alloc.request(Requirement::new(1, 1)).await.unwrap();
        // Everything is taken, yet a zero request is granted immediately.
        let grant = alloc.request(Requirement::NONE).await.unwrap();
        assert_eq!(grant.np(), 0);
    }
}
