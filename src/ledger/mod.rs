//! Remote ledger services
//!
//! - GraphQL indexer for movement history
//! - REST RPC for resources, account state and submission

pub mod indexer;
pub mod rpc;

pub use indexer::{
    GraphQlIndexer, IndexedTransaction, IndexerClient, MovementEdge, MovementNode, MovementsPage,
    Order,
};
pub use rpc::{AccountResource, ResourceKind, RestClient, RpcClient, SIGNED_TRANSACTION_CONTENT_TYPE};
