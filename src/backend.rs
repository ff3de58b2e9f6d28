// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! The compute backend seam.

The sorter only needs a handful of primitives from whatever executes it: allocate a buffer, run one
compare-exchange pass over it, wait for the work to finish, and read the result.  Everything about
*how* lanes are grouped and synchronized is the backend's business, subject to one guarantee:
all writes of pass *k* are visible to pass *k+1*.

Two backends ship with the crate:

* [`crate::software::SoftwareBackend`], which runs passes on the CPU
* [`crate::ComputeContext`], which runs passes on a GPU through wgpu (feature `backend_wgpu`)
*/

use crate::scalar::{ScalarType, SortScalar};
use crate::schedule::PassDescriptor;
use std::fmt::Debug;

/// A backend operation failed.
///
/// Backend failures abort the sort; the buffer contents are unspecified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{label}: {reason}")]
pub struct DispatchError {
    label: String,
    reason: String,
}

impl DispatchError {
    pub fn new(label: impl Into<String>, reason: impl Into<String>) -> Self {
        DispatchError {
            label: label.into(),
            reason: reason.into(),
        }
    }

    /// The operation or buffer that failed.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Something that can execute compare-exchange passes.
#[allow(async_fn_in_trait)]
pub trait ComputeBackend: Debug {
    /// A buffer of padded elements owned by this backend.
    type Buffer<T: SortScalar>;

    /// Maximum number of compare-exchange lanes that can run in one synchronized group.
    ///
    /// `None` when the backend can't answer; the sorter then issues unfused passes only.
    fn max_parallel_group_size(&self, scalar_type: ScalarType) -> Option<usize>;

    /// Copies `elements` into a new backend buffer.
    async fn upload<T: SortScalar>(
        &self,
        elements: &[T],
        debug_name: &str,
    ) -> Result<Self::Buffer<T>, DispatchError>;

    /// Number of elements the buffer holds.
    fn buffer_len<T: SortScalar>(&self, buffer: &Self::Buffer<T>) -> usize;

    /// Enqueues one pass.  The pass may not have run when this returns.
    async fn dispatch_compare_exchange<T: SortScalar>(
        &self,
        buffer: &mut Self::Buffer<T>,
        pass: &PassDescriptor,
    ) -> Result<(), DispatchError>;

    /// Waits for every pass enqueued on `buffer`.
    async fn synchronize<T: SortScalar>(
        &self,
        buffer: &mut Self::Buffer<T>,
    ) -> Result<(), DispatchError>;

    /// Reads the first `count` elements.  The buffer must be synchronized.
    async fn read_back<T: SortScalar>(
        &self,
        buffer: &Self::Buffer<T>,
        count: usize,
    ) -> Result<Vec<T>, DispatchError>;
}
