//! Protocol Surface
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PROTOCOL CONTROLLER                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  controller.rs - deposit / withdraw / settle / flip / admin │
//! │  context.rs    - Authenticated caller identity              │
//! │  host.rs       - Host token ledger seam                     │
//! │  state.rs      - Persisted root, oracle key, cursor         │
//! │  events.rs     - Collateral update events                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod context;
pub mod controller;
pub mod events;
pub mod host;
pub mod state;

pub use context::{CallContext, CallError, CallOperation, CallScope, SignedCall};
pub use controller::{ProtocolController, SettlementReport};
pub use events::CollateralUpdateEvent;
pub use host::{HostError, HostLedger, InMemoryHost};
pub use state::ProtocolState;
