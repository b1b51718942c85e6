use thiserror::Error;

/// Outcome of a device operation that did not complete normally.
///
/// These are simulated media conditions handed back to the code under test,
/// not failures of the configuration engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BdError {
    /// The block is worn out or otherwise unreadable/unwritable.
    #[error("block {block} is corrupt")]
    Corrupt { block: u32 },

    /// Misaligned or out-of-bounds access.
    #[error("invalid access: {detail}")]
    Invalid { detail: String },

    /// Simulated power loss. The device state reflects what survived.
    #[error("power lost after {cycles} power cycles")]
    PowerLoss { cycles: u64 },
}

/// Result type alias using `BdError`.
pub type BdResult<T> = std::result::Result<T, BdError>;

/// A flash-like block device.
///
/// This is the interface the storage engine under test drives. Reads and
/// programs address a byte offset within a block; erases reset a whole
/// block.
pub trait BlockDevice {
    /// Size of one erase block in bytes.
    fn block_size(&self) -> usize;

    /// Number of erase blocks.
    fn block_count(&self) -> usize;

    /// Read `buf.len()` bytes from `block` starting at `off`.
    fn read(&mut self, block: u32, off: usize, buf: &mut [u8]) -> BdResult<()>;

    /// Program `data` into `block` starting at `off`.
    fn prog(&mut self, block: u32, off: usize, data: &[u8]) -> BdResult<()>;

    /// Erase `block`.
    fn erase(&mut self, block: u32) -> BdResult<()>;

    /// Make all previous programs and erases durable.
    fn sync(&mut self) -> BdResult<()>;
}
