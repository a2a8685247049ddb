//! Client for the `putinventory` key/value contract.
//!
//! Stores, retrieves, updates, renames and deletes string records in a
//! smart-contract table, either signing transactions locally or routing
//! writes through a fee-delegating relay that co-signs them.
//!
//! ```no_run
//! use put_client::{Config, PutClient};
//!
//! # async fn run() -> put_client::Result<()> {
//! let client = PutClient::connect(
//!     Config::new("putuseruser1")
//!         .chain_endpoint("http://localhost:8888")
//!         .private_key("5JtUScZK2XEp3g9gh7F8bwtPTRAkASmNrrftmx4AxDKD5K4zDnr"),
//! )
//! .await?;
//!
//! client.add("flag1", "true").await?;
//! let record = client.get("flag1").await?;
//! assert_eq!(record.value, "true");
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod codec;
pub mod config;
pub mod cosign;
pub mod error;
pub mod estimate;
pub mod keys;
pub mod locator;
pub mod relay;
pub mod transact;

mod client;

pub use chain::Account;
pub use client::{PutClient, RamUsage};
pub use codec::Authorization;
pub use config::Config;
pub use cosign::{PackedTransaction, PreparedTransaction, SignedTransaction};
pub use error::{Error, Result};
pub use keys::{Keypair, KeypairSet, PrivateKey};
pub use locator::Record;
pub use transact::{Submission, TransactOptions};
