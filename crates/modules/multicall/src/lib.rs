//! On-chain collaborator: chain → RPC provider registry and a
//! Multicall3-based batched ERC-20 reader.

pub mod multicall;
pub mod providers;

pub use multicall::MulticallClient;
pub use providers::ProviderRegistry;
