//! 任务调度：子代生产的并行许可
//!
//! 每个种群槽位是一个独立任务；Semaphore 限制同时运行的生成 + 评估数量（对应 n_workers）。

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// 工作许可调度器（可克隆，克隆共享同一组许可）
#[derive(Clone, Debug)]
pub struct TaskScheduler {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl TaskScheduler {
    pub fn new(max_workers: usize) -> Self {
        let capacity = max_workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// 获取一个工作许可；调度器存活期间信号量不会关闭，关闭时返回 None
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        self.permits.clone().acquire_owned().await.ok()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_permits_bounded() {
        let scheduler = TaskScheduler::new(2);
        let a = scheduler.acquire().await;
        let b = scheduler.acquire().await;
        assert!(a.is_some() && b.is_some());
        let waiting = tokio::time::timeout(Duration::from_millis(20), scheduler.acquire()).await;
        assert!(waiting.is_err());
        drop(a);
        let third = tokio::time::timeout(Duration::from_millis(20), scheduler.acquire()).await;
        assert!(matches!(third, Ok(Some(_))));
    }

    #[test]
    fn test_zero_workers_clamped() {
        assert_eq!(TaskScheduler::new(0).capacity(), 1);
    }
}
