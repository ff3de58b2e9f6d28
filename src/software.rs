// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A compute backend that runs on the CPU.

Passes are executed eagerly and in parallel.  A general pass computes every slot of the output
independently, so it is built with [`vec_parallel::build_vec`] across the whole buffer.  A fused
pass runs one task per synchronized group; each task carries its `2*unit_size` slice through every
fused stage, which is exactly the work a GPU workgroup does between its barriers.

Tasks are spawned on the current [`some_executor`] executor.

The backend keeps a log of every dispatched [`PassDescriptor`], which is useful for counting
barriers in tests.

```
use bitonic_sort::software::{SoftwareBackend, SoftwareConfig};
use bitonic_sort::{BitonicSort, SortConfig};
use std::sync::Arc;

test_executors::sleep_on(async {
    let backend = Arc::new(SoftwareBackend::new(SoftwareConfig {
        max_group_size: Some(2),
        ..SoftwareConfig::default()
    }));
    let mut sort = BitonicSort::<u32, _>::new(backend.clone(), SortConfig::default());
    sort.prepare(&[6, 2, 7, 1, 0, 4, 5, 3]).await.unwrap();
    sort.sort().await.unwrap();
    assert_eq!(sort.read().await.unwrap(), vec![0, 1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(backend.dispatched_passes().len(), 3);
});
```
*/

use crate::backend::{ComputeBackend, DispatchError};
use crate::scalar::{ScalarType, SortScalar};
use crate::schedule::{PassDescriptor, PassKind, lane_for_slot, partner_slots};
use crate::{Priority, SortOrder, Strategy};
use some_executor::SomeExecutor;
use some_executor::hint::Hint;
use some_executor::observer::FinishedObservation;
use some_executor::task::{ConfigurationBuilder, Task};
use vec_parallel::VecBuilder;
use std::sync::{Arc, Mutex, PoisonError};

/// Configures a [`SoftwareBackend`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftwareConfig {
    /// Reported as the backend's group capability.  `None` disables fusion.
    pub max_group_size: Option<usize>,
    /// How passes are split into tasks.
    pub strategy: Strategy,
    pub priority: Priority,
}

impl Default for SoftwareConfig {
    fn default() -> Self {
        SoftwareConfig {
            max_group_size: Some(256),
            strategy: Strategy::TasksPerCore(2),
            priority: Priority::UserInitiated,
        }
    }
}

/// A buffer owned by the [`SoftwareBackend`].
#[derive(Debug, Clone)]
pub struct SoftwareBuffer<T> {
    data: Vec<T>,
    debug_name: String,
}

impl<T> SoftwareBuffer<T> {
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}

/// Runs compare-exchange passes on the CPU.
#[derive(Debug, Default)]
pub struct SoftwareBackend {
    config: SoftwareConfig,
    dispatched: Mutex<Vec<PassDescriptor>>,
}

impl SoftwareBackend {
    pub fn new(config: SoftwareConfig) -> Self {
        SoftwareBackend {
            config,
            dispatched: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &SoftwareConfig {
        &self.config
    }

    /// Every pass dispatched since creation or the last [`Self::clear_dispatch_log`].
    pub fn dispatched_passes(&self) -> Vec<PassDescriptor> {
        self.dispatched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear_dispatch_log(&self) {
        self.dispatched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    async fn general_pass<T: SortScalar>(
        &self,
        source: Vec<T>,
        pass: PassDescriptor,
    ) -> Result<Vec<T>, Cancelled> {
        let len = source.len();
        let source = Arc::new(source);
        let builder = vec_parallel::build_vec(len, self.config.strategy, move |slot| {
            let lane = lane_for_slot(slot, pass.block_size, pass.distance);
            let (low, high) = partner_slots(lane, pass.block_size, pass.distance);
            let (a, b) = (source[low], source[high]);
            if pass.order.out_of_order(&a, &b) {
                if slot == low { b } else { a }
            } else {
                source[slot]
            }
        });
        self.join(builder).await
    }

    async fn fused_pass<T: SortScalar>(
        &self,
        source: Vec<T>,
        pass: PassDescriptor,
    ) -> Result<Vec<T>, Cancelled> {
        let group_len = pass.unit_size * 2;
        let groups = source.len() / group_len;
        let source = Arc::new(source);
        let builder = vec_parallel::build_vec(groups, self.config.strategy, move |group| {
            let start = group * group_len;
            let mut local = source[start..start + group_len].to_vec();
            match pass.kind {
                PassKind::First => {
                    let mut block = 2;
                    while block <= group_len {
                        let mut distance = block / 2;
                        while distance > 0 {
                            stage(&mut local, pass.unit_size, block, distance, pass.order);
                            distance /= 2;
                        }
                        block *= 2;
                    }
                }
                PassKind::Final => {
                    let mut distance = pass.distance;
                    while distance > 0 {
                        stage(&mut local, pass.unit_size, pass.block_size, distance, pass.order);
                        distance /= 2;
                    }
                }
                PassKind::General => unreachable!("general passes are not fused"),
            }
            local
        });
        let chunks = self.join(builder).await?;
        Ok(chunks.into_iter().flatten().collect())
    }

    /// Spawns every task of `builder` on the current executor and collects the vector.
    ///
    /// The result is only awaited once every task has been observed finished.  A task still
    /// inside its `poll` holds a strong reference to the shared storage, and the result future
    /// panics if it sees one.
    async fn join<I, B>(&self, mut builder: VecBuilder<I, B>) -> Result<Vec<I>, Cancelled>
    where
        I: Send + 'static,
        B: FnMut(usize) -> I + Send + 'static,
    {
        let configuration = ConfigurationBuilder::new()
            .priority(self.config.priority)
            .hint(Hint::CPU)
            .build();
        let executor = some_executor::current_executor::current_executor();
        let mut executors: Vec<_> = (0..builder.tasks.len())
            .map(|_| executor.clone_box())
            .collect();
        let observers: Vec<_> = builder
            .tasks
            .drain(..)
            .zip(executors.iter_mut())
            .enumerate()
            .map(|(t, (task, executor))| {
                let label = format!("software pass task {t}");
                executor.spawn(Task::without_notifications(label, configuration.clone(), task))
            })
            .collect();
        let mut cancelled = false;
        for observer in observers {
            if let FinishedObservation::Cancelled = observer.await {
                cancelled = true;
            }
        }
        //a cancelled task never fills its range
        if cancelled {
            return Err(Cancelled);
        }
        Ok(builder.result.await)
    }
}

/// The executor dropped a pass task before it ran.
#[derive(Debug)]
struct Cancelled;

/// One network stage over a group-local slice.
fn stage<T: SortScalar>(
    local: &mut [T],
    lanes: usize,
    block_size: usize,
    distance: usize,
    order: SortOrder,
) {
    for lane in 0..lanes {
        let (low, high) = partner_slots(lane, block_size, distance);
        if order.out_of_order(&local[low], &local[high]) {
            local.swap(low, high);
        }
    }
}

impl ComputeBackend for SoftwareBackend {
    type Buffer<T: SortScalar> = SoftwareBuffer<T>;

    fn max_parallel_group_size(&self, _scalar_type: ScalarType) -> Option<usize> {
        self.config.max_group_size
    }

    async fn upload<T: SortScalar>(
        &self,
        elements: &[T],
        debug_name: &str,
    ) -> Result<SoftwareBuffer<T>, DispatchError> {
        Ok(SoftwareBuffer {
            data: elements.to_vec(),
            debug_name: debug_name.to_string(),
        })
    }

    fn buffer_len<T: SortScalar>(&self, buffer: &SoftwareBuffer<T>) -> usize {
        buffer.data.len()
    }

    async fn dispatch_compare_exchange<T: SortScalar>(
        &self,
        buffer: &mut SoftwareBuffer<T>,
        pass: &PassDescriptor,
    ) -> Result<(), DispatchError> {
        let len = buffer.data.len();
        if len != pass.grid_size * 2 || !len.is_power_of_two() {
            return Err(DispatchError::new(
                buffer.debug_name.clone(),
                format!("pass covers {} slots but the buffer holds {len}", pass.grid_size * 2),
            ));
        }
        if pass.is_fused() && len % (pass.unit_size * 2) != 0 {
            return Err(DispatchError::new(
                buffer.debug_name.clone(),
                format!("group of {} lanes does not tile {len} slots", pass.unit_size),
            ));
        }
        self.dispatched
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(*pass);
        let source = std::mem::take(&mut buffer.data);
        let sorted = if pass.is_fused() {
            self.fused_pass(source, *pass).await
        } else {
            self.general_pass(source, *pass).await
        };
        buffer.data = sorted.map_err(|Cancelled| {
            DispatchError::new(buffer.debug_name.clone(), "executor cancelled a pass task")
        })?;
        Ok(())
    }

    async fn synchronize<T: SortScalar>(
        &self,
        _buffer: &mut SoftwareBuffer<T>,
    ) -> Result<(), DispatchError> {
        //passes complete before dispatch returns
        Ok(())
    }

    async fn read_back<T: SortScalar>(
        &self,
        buffer: &SoftwareBuffer<T>,
        count: usize,
    ) -> Result<Vec<T>, DispatchError> {
        buffer
            .data
            .get(..count)
            .map(|s| s.to_vec())
            .ok_or_else(|| {
                DispatchError::new(
                    buffer.debug_name.clone(),
                    format!("read of {count} elements from a buffer of {}", buffer.data.len()),
                )
            })
    }
}
