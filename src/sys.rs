// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0

//! Platform shims.

pub mod time {
    //! `std::time` does not work on wasm32; `web_time` stands in there.

    #[cfg(not(target_arch = "wasm32"))]
    pub use std::time::Instant;

    #[cfg(target_arch = "wasm32")]
    pub use web_time::Instant;
}
