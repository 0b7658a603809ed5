use thiserror::Error;

#[derive(Debug, Error)]
pub enum VmError {
    /// The transaction failed upfront validation (signature, nonce,
    /// intrinsic gas). Routed through the executive's exception path.
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    /// A host callback failed below the VM (cache or trie trouble).
    #[error("Host error: {0}")]
    Host(String),
}
