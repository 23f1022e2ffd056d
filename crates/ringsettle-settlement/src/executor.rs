//! The token-transfer primitive, as seen by the settlement core.

use ringsettle_types::{Result, TransferItem};

/// Moves tokens for one [`TransferItem`]. Assumed atomic per item.
pub trait TransferExecutor {
    fn execute(&mut self, item: &TransferItem) -> Result<()>;
}

/// Executor that only records what it was asked to move.
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    executed: Vec<TransferItem>,
}

impl RecordingExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn executed(&self) -> &[TransferItem] {
        &self.executed
    }
}

impl TransferExecutor for RecordingExecutor {
    fn execute(&mut self, item: &TransferItem) -> Result<()> {
        self.executed.push(item.clone());
        Ok(())
    }
}
