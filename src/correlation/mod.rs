//! Correlation between intercepted events and rendered page content
//!
//! # Architecture
//!
//! ```text
//! AuditPipeline (background)
//!     │
//!     └──→ PageContext::request(tab, PageRequest)
//!             │
//!             └──→ PageRegistry ──mpsc──→ PageAgent (one per tab)
//!                                             │
//!                                             ├──→ latest HTML snapshot
//!                                             └──→ DomResolver (locator chain)
//!                                                     │
//!                  PageReply ◀──oneshot───────────────┘
//! ```

pub mod agent;
pub mod bridge;
pub mod protocol;
pub mod resolver;

pub use bridge::{BridgeError, PageContext, PageRegistry};
pub use protocol::MessageInfo;
pub use resolver::DomResolver;
