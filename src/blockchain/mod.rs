pub mod eth_client;
pub mod ledger_client;
