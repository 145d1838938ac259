pub mod anchor_coordinator;
pub mod api_server;
pub mod credential_issuer;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_support;
